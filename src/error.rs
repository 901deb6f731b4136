// src/error.rs
//! Error kinds surfaced by the fetch, prediction and supplier paths.
//!
//! Source fetch errors are captured per source and turned into a
//! human-readable `SourceState::error`; they never escape the coordinator.

use std::time::Duration;

use thiserror::Error;

/// Failure of one HTTP round-trip against an analytical or prediction endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete (DNS, connect, reset, body read).
    #[error("network error: {0}")]
    Network(String),
    /// The endpoint answered with a non-success status.
    #[error("http error: status {status}")]
    Http { status: u16 },
    /// The payload did not match the expected record shape.
    #[error("parse error: {0}")]
    Parse(String),
    /// No answer within the per-request budget.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Client-side input violations for a prediction request or a supplier entry.
///
/// All violations are collected so the caller gets one combined message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    /// `Ok(())` when nothing was collected, otherwise the combined error.
    pub fn check(violations: Vec<String>) -> Result<(), ValidationError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredictError {
    #[error("invalid prediction request: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("source catalog must not be empty")]
    Empty,
    #[error("duplicate source key `{0}`")]
    DuplicateKey(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupplierError {
    #[error("invalid supplier entry: {0}")]
    Validation(#[from] ValidationError),
    #[error("supplier id must not be empty")]
    MissingSupplierId,
}
