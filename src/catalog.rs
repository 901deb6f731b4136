// src/catalog.rs
//! Static list of analytical sources the dashboard pulls from.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::CatalogError;

/// Closed set of analytical datasets. The slug doubles as the endpoint path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKey {
    PriceTrend,
    SupplyDemandGap,
    CostProfit,
    ExportOpportunity,
    Transportation,
}

impl SourceKey {
    pub const ALL: [SourceKey; 5] = [
        SourceKey::PriceTrend,
        SourceKey::SupplyDemandGap,
        SourceKey::CostProfit,
        SourceKey::ExportOpportunity,
        SourceKey::Transportation,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            SourceKey::PriceTrend => "price-trend",
            SourceKey::SupplyDemandGap => "supply-demand-gap",
            SourceKey::CostProfit => "cost-profit",
            SourceKey::ExportOpportunity => "export-opportunity",
            SourceKey::Transportation => "transportation",
        }
    }

    /// Human label used for chart titles.
    pub fn title(self) -> &'static str {
        match self {
            SourceKey::PriceTrend => "Price Trend",
            SourceKey::SupplyDemandGap => "Supply-Demand Gap",
            SourceKey::CostProfit => "Cost-Profit",
            SourceKey::ExportOpportunity => "Export Opportunities",
            SourceKey::Transportation => "Transportation Cost",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub key: SourceKey,
    pub endpoint: String,
}

/// Fixed, non-empty list of sources with unique keys.
///
/// Enumeration order is significant: it decides which failure message wins
/// when several sources fail in the same cycle.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: Vec<DataSource>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<DataSource>) -> Result<Self, CatalogError> {
        if sources.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for s in &sources {
            if !seen.insert(s.key) {
                return Err(CatalogError::DuplicateKey(s.key.to_string()));
            }
        }
        Ok(Self { sources })
    }

    /// The five standard endpoints under `base_url`, e.g.
    /// `http://localhost:5000/price-trend`.
    pub fn standard(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let sources = SourceKey::ALL
            .into_iter()
            .map(|key| DataSource {
                key,
                endpoint: format!("{base}/{}", key.slug()),
            })
            .collect();
        Self { sources }
    }

    pub fn list_sources(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn keys(&self) -> impl Iterator<Item = SourceKey> + '_ {
        self.sources.iter().map(|s| s.key)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
