// src/api.rs
//! HTTP surface: dashboard view and state, manual refresh, predictions and
//! the per-user supplier entries. Errors leave as `{"error": ...}` JSON.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::config::DashboardConfig;
use crate::error::{FetchError, PredictError, SupplierError};
use crate::fetch::FetchCoordinator;
use crate::http::HttpTransport;
use crate::predict::{DemandQuery, PredictionClient, PriceQuery};
use crate::scheduler::RefreshScheduler;
use crate::session::SessionContext;
use crate::state::{DashboardController, DashboardState};
use crate::suppliers::{group_by_supplier, InMemorySupplierStore, SupplierEntry, SupplierStore};
use crate::view::{self, ChartView, DashboardView};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<DashboardController>,
    pub coordinator: FetchCoordinator,
    pub scheduler: Arc<RefreshScheduler>,
    pub predictor: PredictionClient,
    pub suppliers: Arc<dyn SupplierStore>,
}

impl AppState {
    /// Wire catalog, controller, coordinator and prediction client from config.
    /// The scheduler is created idle; call `start_refresh` to begin polling.
    pub fn from_config(cfg: &DashboardConfig, transport: Arc<dyn HttpTransport>) -> anyhow::Result<Self> {
        let catalog = Arc::new(cfg.catalog()?);
        let controller = Arc::new(DashboardController::new(&catalog, cfg.cycle_policy));
        let coordinator =
            FetchCoordinator::new(catalog, transport.clone()).with_timeout(cfg.fetch_timeout());
        let predictor = PredictionClient::new(
            transport,
            cfg.price_prediction_url.clone(),
            cfg.demand_prediction_url.clone(),
        )
        .with_timeout(cfg.fetch_timeout());
        Ok(Self {
            controller,
            coordinator,
            scheduler: Arc::new(RefreshScheduler::new()),
            predictor,
            suppliers: Arc::new(InMemorySupplierStore::new()),
        })
    }

    /// Start periodic refresh cycles committing into the controller.
    pub fn start_refresh(&self, interval: std::time::Duration) {
        let coordinator = self.coordinator.clone();
        let controller = self.controller.clone();
        self.scheduler.start(interval, move || {
            let coordinator = coordinator.clone();
            let controller = controller.clone();
            async move {
                coordinator.refresh_into(&controller).await;
            }
        });
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/dashboard", get(dashboard_view))
        .route("/dashboard/state", get(dashboard_state))
        .route("/dashboard/refresh", post(dashboard_refresh))
        .route("/predict/price", post(predict_price))
        .route("/predict/demand", post(predict_demand))
        .route("/suppliers", get(list_suppliers))
        .route("/suppliers/chart", get(supplier_chart))
        .route("/suppliers/{supplier_id}", post(create_supplier_entry))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Validation(String),
    /// Body could not be read as the expected JSON shape.
    Malformed { status: StatusCode, message: String },
    Upstream(FetchError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                format!("missing {USER_ID_HEADER} header"),
            ),
            ApiError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            ApiError::Malformed { status, message } => (status, message),
            ApiError::Upstream(e @ FetchError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, e.to_string())
            }
            ApiError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::Validation(v) => ApiError::Validation(v.to_string()),
            PredictError::Fetch(f) => ApiError::Upstream(f),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Malformed {
            status: r.status(),
            message: r.body_text(),
        }
    }
}

impl From<SupplierError> for ApiError {
    fn from(e: SupplierError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

fn session_from(headers: &HeaderMap) -> Result<SessionContext, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(SessionContext::new)
        .ok_or(ApiError::Unauthorized)
}

async fn dashboard_view(State(state): State<AppState>) -> Json<DashboardView> {
    Json(view::build_dashboard_view(&state.controller.snapshot()))
}

async fn dashboard_state(State(state): State<AppState>) -> Json<DashboardState> {
    Json(state.controller.snapshot())
}

async fn dashboard_refresh(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if !state.scheduler.trigger_now() {
        // No periodic schedule registered; run a one-off cycle.
        let coordinator = state.coordinator.clone();
        let controller = state.controller.clone();
        tokio::spawn(async move {
            coordinator.refresh_into(&controller).await;
        });
    }
    (StatusCode::ACCEPTED, "refresh scheduled")
}

#[derive(Serialize)]
struct PricePredictionOut {
    predicted_price: f64,
}

#[derive(Serialize)]
struct DemandPredictionOut {
    predicted_demand_units: f64,
}

async fn predict_price(
    State(state): State<AppState>,
    payload: Result<Json<PriceQuery>, JsonRejection>,
) -> Result<Json<PricePredictionOut>, ApiError> {
    let Json(q) = payload?;
    let predicted_price = state.predictor.predict_price(&q).await?;
    Ok(Json(PricePredictionOut { predicted_price }))
}

async fn predict_demand(
    State(state): State<AppState>,
    payload: Result<Json<DemandQuery>, JsonRejection>,
) -> Result<Json<DemandPredictionOut>, ApiError> {
    let Json(q) = payload?;
    let predicted_demand_units = state.predictor.predict_demand(&q).await?;
    Ok(Json(DemandPredictionOut {
        predicted_demand_units,
    }))
}

async fn create_supplier_entry(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<SupplierEntry>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session_from(&headers)?;
    let Json(entry) = payload?;
    let stored = state.suppliers.create(&session, &supplier_id, entry).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn list_suppliers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = session_from(&headers)?;
    let entries = state
        .suppliers
        .list(&session, q.get("q").map(String::as_str))
        .await?;
    Ok(Json(group_by_supplier(&entries)))
}

async fn supplier_chart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ChartView>, ApiError> {
    let session = session_from(&headers)?;
    let entries = state.suppliers.list(&session, None).await?;
    Ok(Json(view::supply_by_location_chart(&entries)))
}
