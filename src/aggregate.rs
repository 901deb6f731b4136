//! # Aggregator
//! Pure, total functions from raw per-source records to grouped totals,
//! derived ratios and summary metrics. No I/O, no rounding to display
//! precision (that happens in `view`), and empty input yields empty/zero
//! outputs rather than errors.
//!
//! Grouped results are `IndexMap`s in first-seen key order so the view layer
//! gets a stable label order for a given input.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::catalog::SourceKey;
use crate::records::{ExportEntry, PricePoint, ProfitEntry, SupplyDemandEntry, TransportEntry};
use crate::state::DashboardState;

/// Supply/demand totals for one market. `gap = demand - supply`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MarketGap {
    pub supply: f64,
    pub demand: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceTrendSummary {
    pub current: Option<f64>,
    pub percent_change: Option<f64>,
}

pub fn group_supply_demand_by_market(
    entries: &[SupplyDemandEntry],
) -> IndexMap<String, MarketGap> {
    let mut out: IndexMap<String, MarketGap> = IndexMap::new();
    for e in entries {
        let g = out.entry(e.market.clone()).or_default();
        g.supply += e.supply_quantity;
        g.demand += e.demand_forecast_units;
    }
    for g in out.values_mut() {
        g.gap = g.demand - g.supply;
    }
    out
}

/// Latest price and change against the previous point, by date.
///
/// Points with unparsable dates sort before dated ones and otherwise keep
/// their input order. Both fields are `None` with fewer than two points;
/// `percent_change` is also `None` when the previous price is zero.
pub fn summarize_price_trend(points: &[PricePoint]) -> PriceTrendSummary {
    if points.len() < 2 {
        return PriceTrendSummary::default();
    }
    let ordered = chronological(points);
    let last = ordered[ordered.len() - 1];
    let prev = ordered[ordered.len() - 2];

    let percent_change = if prev.price == 0.0 {
        None
    } else {
        Some(round1((last.price - prev.price) / prev.price * 100.0))
    };

    PriceTrendSummary {
        current: Some(last.price),
        percent_change,
    }
}

/// Price points sorted by date (stable).
pub fn chronological(points: &[PricePoint]) -> Vec<&PricePoint> {
    let mut v: Vec<&PricePoint> = points.iter().collect();
    v.sort_by_key(|p| parse_date(&p.date));
    v
}

/// Mean `profit_per_unit`; `0.0` for no entries.
pub fn average_profit(entries: &[ProfitEntry]) -> f64 {
    mean(entries.iter().map(|e| e.profit_per_unit))
}

pub fn sum_exports_by_province(entries: &[ExportEntry]) -> IndexMap<String, f64> {
    let mut out: IndexMap<String, f64> = IndexMap::new();
    for e in entries {
        *out.entry(e.province.clone()).or_default() += e.export_quantity;
    }
    out
}

pub fn total_exports(entries: &[ExportEntry]) -> f64 {
    entries.iter().map(|e| e.export_quantity).sum()
}

/// Mean profit per unit for each market.
pub fn profit_by_market(entries: &[ProfitEntry]) -> IndexMap<String, f64> {
    grouped_mean(entries.iter().map(|e| (&e.market, e.profit_per_unit)))
}

/// Mean transport cost (LKR per unit) for each market.
pub fn average_transport_cost_by_market(entries: &[TransportEntry]) -> IndexMap<String, f64> {
    grouped_mean(
        entries
            .iter()
            .map(|e| (&e.market, e.transport_cost_lkr_per_unit)),
    )
}

/// Headline figures across all successful sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub current_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub average_profit: Option<f64>,
    pub total_exports: Option<f64>,
    /// Markets whose demand exceeds supply.
    pub markets_in_deficit: Option<usize>,
}

/// Summarize whatever records are renderable. Failed sources and sources
/// that never settled leave their figures as `None`.
pub fn summarize(state: &DashboardState) -> DashboardSummary {
    let mut s = DashboardSummary::default();

    if let Some(points) = state
        .records(SourceKey::PriceTrend)
        .and_then(|r| r.as_price_trend())
    {
        let t = summarize_price_trend(points);
        s.current_price = t.current;
        s.price_change_pct = t.percent_change;
    }
    if let Some(rows) = state
        .records(SourceKey::CostProfit)
        .and_then(|r| r.as_cost_profit())
    {
        s.average_profit = Some(average_profit(rows));
    }
    if let Some(rows) = state
        .records(SourceKey::ExportOpportunity)
        .and_then(|r| r.as_exports())
    {
        s.total_exports = Some(total_exports(rows));
    }
    if let Some(rows) = state
        .records(SourceKey::SupplyDemandGap)
        .and_then(|r| r.as_supply_demand())
    {
        let grouped = group_supply_demand_by_market(rows);
        s.markets_in_deficit = Some(grouped.values().filter(|g| g.gap > 0.0).count());
    }
    s
}

fn grouped_mean<'a>(items: impl Iterator<Item = (&'a String, f64)>) -> IndexMap<String, f64> {
    let mut acc: IndexMap<String, (f64, usize)> = IndexMap::new();
    for (k, v) in items {
        let slot = acc.entry(k.clone()).or_insert((0.0, 0));
        slot.0 += v;
        slot.1 += 1;
    }
    acc.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
