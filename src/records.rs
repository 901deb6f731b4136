// src/records.rs
//! Wire shapes of the analytical endpoints. Field names are part of the
//! contract with the analytics backend and must not be renamed.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::catalog::SourceKey;
use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyDemandEntry {
    pub date: String,
    pub province: String,
    pub market: String,
    pub supply_quantity: f64,
    pub demand_forecast_units: f64,
    /// Sent by the backend; the aggregator recomputes it from the two totals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitEntry {
    pub date: String,
    pub province: String,
    pub market: String,
    pub price: f64,
    pub total_cost: f64,
    pub profit_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub date: String,
    pub province: String,
    pub market: String,
    pub commodity: String,
    pub export_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportEntry {
    pub date: String,
    pub province: String,
    pub market: String,
    pub transport_cost_lkr_per_unit: f64,
}

/// Parsed payload of one source, typed by the source it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceRecords {
    PriceTrend(Vec<PricePoint>),
    SupplyDemand(Vec<SupplyDemandEntry>),
    CostProfit(Vec<ProfitEntry>),
    Exports(Vec<ExportEntry>),
    Transport(Vec<TransportEntry>),
}

impl SourceRecords {
    /// Parse a JSON array body according to the shape expected for `key`.
    pub fn parse(key: SourceKey, body: &str) -> Result<Self, FetchError> {
        Ok(match key {
            SourceKey::PriceTrend => SourceRecords::PriceTrend(parse_array(key, body)?),
            SourceKey::SupplyDemandGap => SourceRecords::SupplyDemand(parse_array(key, body)?),
            SourceKey::CostProfit => SourceRecords::CostProfit(parse_array(key, body)?),
            SourceKey::ExportOpportunity => SourceRecords::Exports(parse_array(key, body)?),
            SourceKey::Transportation => SourceRecords::Transport(parse_array(key, body)?),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            SourceRecords::PriceTrend(v) => v.len(),
            SourceRecords::SupplyDemand(v) => v.len(),
            SourceRecords::CostProfit(v) => v.len(),
            SourceRecords::Exports(v) => v.len(),
            SourceRecords::Transport(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_price_trend(&self) -> Option<&[PricePoint]> {
        match self {
            SourceRecords::PriceTrend(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_supply_demand(&self) -> Option<&[SupplyDemandEntry]> {
        match self {
            SourceRecords::SupplyDemand(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_cost_profit(&self) -> Option<&[ProfitEntry]> {
        match self {
            SourceRecords::CostProfit(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_exports(&self) -> Option<&[ExportEntry]> {
        match self {
            SourceRecords::Exports(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_transport(&self) -> Option<&[TransportEntry]> {
        match self {
            SourceRecords::Transport(v) => Some(v),
            _ => None,
        }
    }
}

fn parse_array<T: DeserializeOwned>(key: SourceKey, body: &str) -> Result<Vec<T>, FetchError> {
    serde_json::from_str::<Vec<T>>(body)
        .map_err(|e| FetchError::Parse(format!("{key} payload: {e}")))
}
