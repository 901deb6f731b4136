// tests/fetch_coordinator.rs
//
// Fan-out behaviour of the fetch coordinator against an in-memory transport:
// partial failure isolation, timeouts, deterministic banner, and per-source
// commits into the controller while slower sources are still in flight.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use coconut_dashboard::catalog::{SourceCatalog, SourceKey};
use coconut_dashboard::error::FetchError;
use coconut_dashboard::fetch::FetchCoordinator;
use coconut_dashboard::http::{HttpResponse, HttpTransport};
use coconut_dashboard::state::{CyclePolicy, DashboardController, FetchStatus};
use coconut_dashboard::view::build_dashboard_view;

const PRICE: &str = r#"[{"date":"2024-01-01","price":100},{"date":"2024-01-02","price":110}]"#;
const SUPPLY: &str = r#"[
  {"date":"2024-01-01","province":"Western","market":"Colombo","supply_quantity":100,"demand_forecast_units":140,"gap":40},
  {"date":"2024-01-01","province":"Central","market":"Kandy","supply_quantity":80,"demand_forecast_units":60,"gap":-20}
]"#;
const PROFIT: &str = r#"[
  {"date":"2024-01-01","province":"Western","market":"Colombo","price":110,"total_cost":100,"profit_per_unit":10},
  {"date":"2024-01-02","province":"Western","market":"Colombo","price":98,"total_cost":100,"profit_per_unit":-2}
]"#;
const EXPORT: &str = r#"[{"date":"2024-01-01","province":"Western","market":"Colombo","commodity":"Coconut oil","export_quantity":500}]"#;
const TRANSPORT: &str = r#"[{"date":"2024-01-01","province":"Western","market":"Colombo","transport_cost_lkr_per_unit":4.5}]"#;

#[derive(Clone)]
enum Reply {
    Json(&'static str),
    Status(u16),
    Network,
    Wait(Arc<Notify>, &'static str),
}

#[derive(Clone)]
struct Route {
    delay_ms: u64,
    reply: Reply,
}

fn now(reply: Reply) -> Route {
    Route { delay_ms: 0, reply }
}

fn after(delay_ms: u64, reply: Reply) -> Route {
    Route { delay_ms, reply }
}

struct StubTransport {
    routes: HashMap<String, Route>,
}

impl StubTransport {
    fn new(routes: Vec<(SourceKey, Route)>) -> Arc<Self> {
        Arc::new(Self {
            routes: routes
                .into_iter()
                .map(|(k, r)| (format!("http://stub/{}", k.slug()), r))
                .collect(),
        })
    }

    fn healthy() -> Vec<(SourceKey, Route)> {
        vec![
            (SourceKey::PriceTrend, now(Reply::Json(PRICE))),
            (SourceKey::SupplyDemandGap, now(Reply::Json(SUPPLY))),
            (SourceKey::CostProfit, now(Reply::Json(PROFIT))),
            (SourceKey::ExportOpportunity, now(Reply::Json(EXPORT))),
            (SourceKey::Transportation, now(Reply::Json(TRANSPORT))),
        ]
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, FetchError> {
        let Some(route) = self.routes.get(url).cloned() else {
            return Err(FetchError::Network(format!("no route for {url}")));
        };
        if route.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(route.delay_ms)).await;
        }
        match route.reply {
            Reply::Json(b) => Ok(HttpResponse::ok(b)),
            Reply::Status(status) => Ok(HttpResponse {
                status,
                body: String::new(),
            }),
            Reply::Network => Err(FetchError::Network("connection refused".into())),
            Reply::Wait(gate, b) => {
                gate.notified().await;
                Ok(HttpResponse::ok(b))
            }
        }
    }

    async fn post_json(
        &self,
        _url: &str,
        _body: &serde_json::Value,
        _timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        Err(FetchError::Network("not used".into()))
    }
}

fn coordinator(routes: Vec<(SourceKey, Route)>) -> FetchCoordinator {
    FetchCoordinator::new(
        Arc::new(SourceCatalog::standard("http://stub")),
        StubTransport::new(routes),
    )
}

fn with(mut routes: Vec<(SourceKey, Route)>, key: SourceKey, route: Route) -> Vec<(SourceKey, Route)> {
    for (k, r) in routes.iter_mut() {
        if *k == key {
            *r = route.clone();
        }
    }
    routes
}

#[tokio::test]
async fn all_sources_succeed() {
    let state = coordinator(StubTransport::healthy()).refresh_all().await;
    assert_eq!(state.count(FetchStatus::Success), 5);
    assert!(state.last_error_message.is_none());
    assert!(state.last_refreshed_at.is_some());
    assert_eq!(
        state
            .records(SourceKey::CostProfit)
            .and_then(|r| r.as_cost_profit())
            .map(|v| v.len()),
        Some(2)
    );
}

#[tokio::test(start_paused = true)]
async fn one_timeout_four_successes() {
    let routes = with(
        StubTransport::healthy(),
        SourceKey::PriceTrend,
        after(60_000, Reply::Json(PRICE)),
    );
    let state = coordinator(routes).refresh_all().await;

    assert_eq!(state.count(FetchStatus::Success), 4);
    assert_eq!(state.count(FetchStatus::Failed), 1);

    let price = state.source(SourceKey::PriceTrend).unwrap();
    assert_eq!(price.status, FetchStatus::Failed);
    assert!(price.records.is_none());
    assert_eq!(price.error.as_deref(), Some("timed out after 10000ms"));

    let banner = state.last_error_message.as_deref().unwrap();
    assert!(banner.contains("Price Trend"), "banner: {banner}");
    assert!(banner.contains("timed out"), "banner: {banner}");

    for key in [
        SourceKey::SupplyDemandGap,
        SourceKey::CostProfit,
        SourceKey::ExportOpportunity,
        SourceKey::Transportation,
    ] {
        assert!(state.records(key).is_some(), "{key} should have records");
    }

    let view = build_dashboard_view(&state);
    assert_eq!(view.charts.len(), 4);
    assert!(view.charts.iter().all(|c| c.title != "Price Trend"));
    assert_eq!(view.banner.as_deref(), Some(banner));
}

#[tokio::test(start_paused = true)]
async fn outcome_is_independent_of_resolution_order() {
    // Same failures, opposite timing.
    let fast_fail = with(
        with(
            StubTransport::healthy(),
            SourceKey::SupplyDemandGap,
            after(10, Reply::Status(500)),
        ),
        SourceKey::Transportation,
        after(500, Reply::Json(r#"{"not":"an array"}"#)),
    );
    let slow_fail = with(
        with(
            StubTransport::healthy(),
            SourceKey::SupplyDemandGap,
            after(500, Reply::Status(500)),
        ),
        SourceKey::Transportation,
        after(10, Reply::Json(r#"{"not":"an array"}"#)),
    );

    let a = coordinator(fast_fail).refresh_all().await;
    let b = coordinator(slow_fail).refresh_all().await;

    for st in [&a, &b] {
        assert_eq!(st.count(FetchStatus::Success), 3);
        let sd = st.source(SourceKey::SupplyDemandGap).unwrap();
        assert_eq!(sd.error.as_deref(), Some("http error: status 500"));
        assert!(sd.records.is_none());
        let tr = st.source(SourceKey::Transportation).unwrap();
        assert!(tr.error.as_deref().unwrap().starts_with("parse error"));
    }
    // Transportation is later in catalog order, so its failure is the banner.
    assert_eq!(a.last_error_message, b.last_error_message);
    assert!(a
        .last_error_message
        .as_deref()
        .unwrap()
        .starts_with("Error fetching Transportation Cost"));
}

#[tokio::test]
async fn network_errors_are_captured_not_raised() {
    let routes = with(StubTransport::healthy(), SourceKey::ExportOpportunity, now(Reply::Network));
    let state = coordinator(routes).refresh_all().await;
    let s = state.source(SourceKey::ExportOpportunity).unwrap();
    assert_eq!(s.status, FetchStatus::Failed);
    assert_eq!(s.error.as_deref(), Some("network error: connection refused"));
    assert_eq!(state.count(FetchStatus::Success), 4);
}

#[tokio::test]
async fn streamed_cycle_commits_sources_as_they_settle() {
    let gate = Arc::new(Notify::new());
    let routes = with(
        StubTransport::healthy(),
        SourceKey::CostProfit,
        now(Reply::Wait(gate.clone(), PROFIT)),
    );
    let coord = coordinator(routes);
    let catalog = SourceCatalog::standard("http://stub");
    let controller = Arc::new(DashboardController::new(&catalog, CyclePolicy::LastWriteWins));

    let task = {
        let coord = coord.clone();
        let controller = controller.clone();
        tokio::spawn(async move { coord.refresh_into(&controller).await })
    };

    // Wait until the four fast sources have landed.
    let mut settled = 0;
    for _ in 0..100 {
        settled = controller.snapshot().count(FetchStatus::Success);
        if settled == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(settled, 4);
    let mid = controller.snapshot();
    assert_eq!(
        mid.source(SourceKey::CostProfit).unwrap().status,
        FetchStatus::Pending
    );
    assert!(mid.last_refreshed_at.is_none());

    gate.notify_one();
    let report = task.await.unwrap();
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.failed, 0);

    let done = controller.snapshot();
    assert_eq!(done.count(FetchStatus::Success), 5);
    assert!(done.last_refreshed_at.is_some());
}

#[tokio::test]
async fn streamed_cycle_sets_banner_then_clears_it_on_recovery() {
    let catalog = SourceCatalog::standard("http://stub");
    let controller = DashboardController::new(&catalog, CyclePolicy::LastWriteWins);

    let failing = coordinator(with(
        StubTransport::healthy(),
        SourceKey::PriceTrend,
        now(Reply::Status(404)),
    ));
    let r1 = failing.refresh_into(&controller).await;
    assert_eq!(r1.failed, 1);
    let snap = controller.snapshot();
    assert_eq!(
        snap.last_error_message.as_deref(),
        Some("Error fetching Price Trend: http error: status 404")
    );
    // Other sources keep rendering.
    assert!(snap.records(SourceKey::Transportation).is_some());

    let healthy = coordinator(StubTransport::healthy());
    let r2 = healthy.refresh_into(&controller).await;
    assert_eq!(r2.cycle, r1.cycle + 1);
    let snap = controller.snapshot();
    assert!(snap.last_error_message.is_none());
    assert_eq!(snap.count(FetchStatus::Success), 5);
}

#[tokio::test]
async fn previous_records_keep_rendering_while_a_source_refreshes() {
    let catalog = SourceCatalog::standard("http://stub");
    let controller = Arc::new(DashboardController::new(&catalog, CyclePolicy::LastWriteWins));

    coordinator(StubTransport::healthy())
        .refresh_into(&controller)
        .await;
    let before = build_dashboard_view(&controller.snapshot());
    assert_eq!(before.charts.len(), 5);

    let gate = Arc::new(Notify::new());
    let slow_price = coordinator(with(
        StubTransport::healthy(),
        SourceKey::PriceTrend,
        now(Reply::Wait(gate.clone(), PRICE)),
    ));
    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { slow_price.refresh_into(&controller).await })
    };

    let mut settled = 0;
    for _ in 0..100 {
        settled = controller.snapshot().count(FetchStatus::Success);
        if settled == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(settled, 4);

    let mid = build_dashboard_view(&controller.snapshot());
    assert_eq!(mid.charts.len(), 5, "price chart vanished mid-refresh");
    assert!(mid.charts.iter().any(|c| c.title == "Price Trend"));
    assert_eq!(mid.cards, before.cards);
    let price = mid
        .sources
        .iter()
        .find(|s| s.key == SourceKey::PriceTrend)
        .unwrap();
    assert_eq!(price.status, FetchStatus::Pending);
    assert!(price.refreshing);

    gate.notify_one();
    task.await.unwrap();
    let after = build_dashboard_view(&controller.snapshot());
    assert!(after.sources.iter().all(|s| !s.refreshing));
}

const PRICE_NEWER: &str =
    r#"[{"date":"2024-02-01","price":120},{"date":"2024-02-02","price":132}]"#;

/// Cycle 1 has a slow price source that lands after cycle 2 finished.
async fn overlapping_cycles(policy: CyclePolicy) -> (DashboardController, usize, u64) {
    let catalog = SourceCatalog::standard("http://stub");
    let controller = DashboardController::new(&catalog, policy);

    let first = coordinator(with(
        StubTransport::healthy(),
        SourceKey::PriceTrend,
        after(500, Reply::Json(PRICE)),
    ));
    let second = coordinator(with(
        StubTransport::healthy(),
        SourceKey::PriceTrend,
        now(Reply::Json(PRICE_NEWER)),
    ));

    let (r1, r2) = tokio::join!(first.refresh_into(&controller), second.refresh_into(&controller));
    assert_eq!(r2.cycle, r1.cycle + 1);
    assert_eq!(r2.discarded, 0);
    (controller, r1.discarded, r1.cycle)
}

fn latest_price(controller: &DashboardController) -> f64 {
    let snap = controller.snapshot();
    let points = snap
        .records(SourceKey::PriceTrend)
        .and_then(|r| r.as_price_trend())
        .unwrap()
        .to_vec();
    points.last().unwrap().price
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycles_last_write_wins() {
    let (controller, discarded, first_cycle) = overlapping_cycles(CyclePolicy::LastWriteWins).await;
    assert_eq!(discarded, 0);
    // The late cycle-1 price overwrote cycle 2's.
    assert_eq!(latest_price(&controller), 110.0);
    let snap = controller.snapshot();
    assert_eq!(snap.source(SourceKey::PriceTrend).unwrap().cycle, first_cycle);
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycles_discard_stale() {
    let (controller, discarded, first_cycle) = overlapping_cycles(CyclePolicy::DiscardStale).await;
    assert!(discarded >= 1);
    assert_eq!(latest_price(&controller), 132.0);
    let snap = controller.snapshot();
    assert_eq!(
        snap.source(SourceKey::PriceTrend).unwrap().cycle,
        first_cycle + 1
    );
    assert_eq!(snap.count(FetchStatus::Success), 5);
}
