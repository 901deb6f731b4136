// src/view.rs
//! Rendering-agnostic projections of aggregated data: chart series, tables
//! and the combined dashboard view. Numbers are rounded to two decimals here
//! and nowhere earlier.

use indexmap::IndexMap;
use serde::Serialize;

use crate::aggregate::{self, DashboardSummary, MarketGap};
use crate::catalog::SourceKey;
use crate::records::{PricePoint, ProfitEntry, TransportEntry};
use crate::state::{DashboardState, FetchStatus};
use crate::suppliers::StoredSupplierEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatusView {
    pub key: SourceKey,
    pub title: String,
    pub status: FetchStatus,
    pub records: usize,
    /// Previous records are shown while a new fetch is in flight.
    pub refreshing: bool,
    pub error: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryCard {
    pub label: String,
    pub value: String,
}

/// Everything the presentation layer needs for one render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub sources: Vec<SourceStatusView>,
    pub charts: Vec<ChartView>,
    pub tables: Vec<TableView>,
    pub cards: Vec<SummaryCard>,
    pub banner: Option<String>,
    pub last_refreshed_at: Option<String>,
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn format_amount(x: f64) -> String {
    format!("{:.2}", round2(x))
}

pub fn price_trend_chart(points: &[PricePoint]) -> ChartView {
    let ordered = aggregate::chronological(points);
    ChartView {
        title: SourceKey::PriceTrend.title().to_string(),
        labels: ordered.iter().map(|p| p.date.clone()).collect(),
        series: vec![Series {
            name: "Price".into(),
            values: ordered.iter().map(|p| round2(p.price)).collect(),
        }],
    }
}

pub fn supply_demand_chart(grouped: &IndexMap<String, MarketGap>) -> ChartView {
    let col = |f: fn(&MarketGap) -> f64| -> Vec<f64> {
        grouped.values().map(|g| round2(f(g))).collect()
    };
    ChartView {
        title: SourceKey::SupplyDemandGap.title().to_string(),
        labels: grouped.keys().cloned().collect(),
        series: vec![
            Series {
                name: "Supply".into(),
                values: col(|g| g.supply),
            },
            Series {
                name: "Demand".into(),
                values: col(|g| g.demand),
            },
            Series {
                name: "Gap".into(),
                values: col(|g| g.gap),
            },
        ],
    }
}

/// One-series chart over a grouped mapping, labels in mapping order.
pub fn grouped_chart(title: &str, series_name: &str, grouped: &IndexMap<String, f64>) -> ChartView {
    ChartView {
        title: title.to_string(),
        labels: grouped.keys().cloned().collect(),
        series: vec![Series {
            name: series_name.to_string(),
            values: grouped.values().map(|v| round2(*v)).collect(),
        }],
    }
}

pub fn profit_table(entries: &[ProfitEntry]) -> TableView {
    TableView {
        title: SourceKey::CostProfit.title().to_string(),
        columns: ["Date", "Province", "Market", "Price", "Total Cost", "Profit/Unit"]
            .map(String::from)
            .to_vec(),
        rows: entries
            .iter()
            .map(|e| {
                vec![
                    e.date.clone(),
                    e.province.clone(),
                    e.market.clone(),
                    format_amount(e.price),
                    format_amount(e.total_cost),
                    format_amount(e.profit_per_unit),
                ]
            })
            .collect(),
    }
}

pub fn transport_table(entries: &[TransportEntry]) -> TableView {
    TableView {
        title: SourceKey::Transportation.title().to_string(),
        columns: ["Date", "Province", "Market", "Cost (LKR/unit)"]
            .map(String::from)
            .to_vec(),
        rows: entries
            .iter()
            .map(|e| {
                vec![
                    e.date.clone(),
                    e.province.clone(),
                    e.market.clone(),
                    format_amount(e.transport_cost_lkr_per_unit),
                ]
            })
            .collect(),
    }
}

/// Total quantity per location from locally entered supplier records.
pub fn supply_by_location_chart(entries: &[StoredSupplierEntry]) -> ChartView {
    let mut grouped: IndexMap<String, f64> = IndexMap::new();
    for e in entries {
        *grouped.entry(e.entry.location.clone()).or_default() += e.entry.quantity;
    }
    grouped_chart("Coconut Supply", "Quantity", &grouped)
}

pub fn summary_cards(s: &DashboardSummary) -> Vec<SummaryCard> {
    let mut cards = Vec::new();
    if let Some(p) = s.current_price {
        cards.push(card("Current Price (LKR)", format_amount(p)));
    }
    if let Some(pct) = s.price_change_pct {
        cards.push(card("Price Change", format!("{:+.2}%", pct)));
    }
    if let Some(p) = s.average_profit {
        cards.push(card("Average Profit/Unit", format_amount(p)));
    }
    if let Some(t) = s.total_exports {
        cards.push(card("Total Exports", format_amount(t)));
    }
    if let Some(n) = s.markets_in_deficit {
        cards.push(card("Markets in Deficit", n.to_string()));
    }
    cards
}

fn card(label: &str, value: String) -> SummaryCard {
    SummaryCard {
        label: label.to_string(),
        value,
    }
}

/// Build the full view. Sources with records to render (fresh, or the previous
/// cycle's while refreshing) contribute charts and tables; failed sources only
/// show up in `sources` with their error.
pub fn build_dashboard_view(state: &DashboardState) -> DashboardView {
    let mut charts = Vec::new();
    let mut tables = Vec::new();

    for key in state.sources.keys().copied() {
        let Some(recs) = state.records(key) else {
            continue;
        };
        match key {
            SourceKey::PriceTrend => {
                if let Some(points) = recs.as_price_trend() {
                    charts.push(price_trend_chart(points));
                }
            }
            SourceKey::SupplyDemandGap => {
                if let Some(rows) = recs.as_supply_demand() {
                    charts.push(supply_demand_chart(
                        &aggregate::group_supply_demand_by_market(rows),
                    ));
                }
            }
            SourceKey::CostProfit => {
                if let Some(rows) = recs.as_cost_profit() {
                    charts.push(grouped_chart(
                        key.title(),
                        "Average Profit/Unit",
                        &aggregate::profit_by_market(rows),
                    ));
                    tables.push(profit_table(rows));
                }
            }
            SourceKey::ExportOpportunity => {
                if let Some(rows) = recs.as_exports() {
                    charts.push(grouped_chart(
                        key.title(),
                        "Export Quantity",
                        &aggregate::sum_exports_by_province(rows),
                    ));
                }
            }
            SourceKey::Transportation => {
                if let Some(rows) = recs.as_transport() {
                    charts.push(grouped_chart(
                        key.title(),
                        "Avg Cost (LKR/unit)",
                        &aggregate::average_transport_cost_by_market(rows),
                    ));
                    tables.push(transport_table(rows));
                }
            }
        }
    }

    let sources = state
        .sources
        .iter()
        .map(|(key, s)| SourceStatusView {
            key: *key,
            title: key.title().to_string(),
            status: s.status,
            records: s.records.as_ref().map_or(0, |r| r.len()),
            refreshing: s.status == FetchStatus::Pending && s.records.is_some(),
            error: s.error.clone(),
            updated_at: s.updated_at.map(|t| t.to_rfc3339()),
        })
        .collect();

    DashboardView {
        sources,
        charts,
        tables,
        cards: summary_cards(&aggregate::summarize(state)),
        banner: state.last_error_message.clone(),
        last_refreshed_at: state.last_refreshed_at.map(|t| t.to_rfc3339()),
    }
}
