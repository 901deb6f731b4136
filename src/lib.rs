// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod metrics;
pub mod predict;
pub mod records;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod suppliers;
pub mod view;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::catalog::{DataSource, SourceCatalog, SourceKey};
pub use crate::error::{FetchError, PredictError, ValidationError};
pub use crate::fetch::FetchCoordinator;
pub use crate::scheduler::RefreshScheduler;
pub use crate::state::{DashboardController, DashboardState, FetchStatus, SourceState};
