// src/suppliers.rs
//! Supplier entry store: records entered through the data-input form,
//! scoped per user via `SessionContext`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{SupplierError, ValidationError};
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    /// Premium
    #[default]
    A,
    /// Standard
    B,
    /// Utility
    C,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierEntry {
    pub supplier: String,
    pub location: String,
    #[serde(deserialize_with = "number_or_text")]
    pub quantity: f64,
    #[serde(deserialize_with = "number_or_text")]
    pub price_per_unit: f64,
    pub harvest_date: String,
    #[serde(default)]
    pub quality_grade: QualityGrade,
    #[serde(deserialize_with = "number_or_text")]
    pub transport_cost: f64,
    #[serde(deserialize_with = "number_or_text")]
    pub storage_cost: f64,
    /// Blank form input means "no forecast".
    #[serde(default, deserialize_with = "optional_number_or_text")]
    pub demand_forecast: Option<f64>,
    #[serde(default)]
    pub is_exported: bool,
}

/// Form fields arrive either as JSON numbers or as the raw input text.
#[derive(Deserialize)]
#[serde(untagged)]
enum FormNumber {
    Number(f64),
    Text(String),
}

impl FormNumber {
    fn into_value<E: de::Error>(self) -> Result<Option<f64>, E> {
        match self {
            FormNumber::Number(n) => Ok(Some(n)),
            FormNumber::Text(t) if t.trim().is_empty() => Ok(None),
            FormNumber::Text(t) => t
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("expected a number, got {t:?}"))),
        }
    }
}

fn number_or_text<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    FormNumber::deserialize(d)?
        .into_value()?
        .ok_or_else(|| de::Error::custom("expected a number, got an empty value"))
}

fn optional_number_or_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<FormNumber>::deserialize(d)? {
        Some(n) => n.into_value(),
        None => Ok(None),
    }
}

impl SupplierEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Vec::new();
        if self.supplier.trim().is_empty() {
            v.push("supplier name is required".to_string());
        }
        if self.location.trim().is_empty() {
            v.push("location is required".to_string());
        }
        if !(self.quantity > 0.0) {
            v.push("quantity must be greater than 0".to_string());
        }
        if !(self.price_per_unit > 0.0) {
            v.push("price per unit must be greater than 0".to_string());
        }
        if !(self.transport_cost >= 0.0) {
            v.push("transport cost must not be negative".to_string());
        }
        if !(self.storage_cost >= 0.0) {
            v.push("storage cost must not be negative".to_string());
        }
        if matches!(self.demand_forecast, Some(d) if !(d >= 0.0)) {
            v.push("demand forecast must not be negative".to_string());
        }
        ValidationError::check(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSupplierEntry {
    pub id: String,
    pub supplier_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: SupplierEntry,
}

/// Persistence collaborator for supplier entries.
#[async_trait]
pub trait SupplierStore: Send + Sync {
    /// Store a validated entry for `supplier_id`; the store assigns id and timestamp.
    async fn create(
        &self,
        session: &SessionContext,
        supplier_id: &str,
        entry: SupplierEntry,
    ) -> Result<StoredSupplierEntry, SupplierError>;

    /// The caller's entries, newest first, optionally narrowed to supplier ids
    /// containing `filter` (case-insensitive).
    async fn list(
        &self,
        session: &SessionContext,
        filter: Option<&str>,
    ) -> Result<Vec<StoredSupplierEntry>, SupplierError>;
}

#[derive(Debug, Default)]
pub struct InMemorySupplierStore {
    by_user: Mutex<HashMap<String, Vec<StoredSupplierEntry>>>,
    next_id: AtomicU64,
}

impl InMemorySupplierStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SupplierStore for InMemorySupplierStore {
    async fn create(
        &self,
        session: &SessionContext,
        supplier_id: &str,
        entry: SupplierEntry,
    ) -> Result<StoredSupplierEntry, SupplierError> {
        let supplier_id = supplier_id.trim();
        if supplier_id.is_empty() {
            return Err(SupplierError::MissingSupplierId);
        }
        entry.validate()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let stored = StoredSupplierEntry {
            id: format!("entry-{id}"),
            supplier_id: supplier_id.to_string(),
            timestamp: Utc::now(),
            entry,
        };
        self.by_user
            .lock()
            .expect("supplier store mutex poisoned")
            .entry(session.user_id.clone())
            .or_default()
            .push(stored.clone());

        tracing::info!(target: "suppliers", supplier_id = %stored.supplier_id, id = %stored.id, "supplier entry stored");
        Ok(stored)
    }

    async fn list(
        &self,
        session: &SessionContext,
        filter: Option<&str>,
    ) -> Result<Vec<StoredSupplierEntry>, SupplierError> {
        let needle = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());
        let g = self.by_user.lock().expect("supplier store mutex poisoned");
        let mut out: Vec<StoredSupplierEntry> = g
            .get(&session.user_id)
            .map(|v| {
                v.iter()
                    .filter(|e| {
                        needle
                            .as_deref()
                            .map_or(true, |n| e.supplier_id.to_lowercase().contains(n))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Newest first; insertion order breaks timestamp ties.
        out.reverse();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }
}

/// Entries grouped under one supplier id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierProfile {
    pub supplier_name: String,
    pub entries: Vec<StoredSupplierEntry>,
}

/// Group by supplier id in first-seen order; the name comes from the first
/// entry seen for that id.
pub fn group_by_supplier(entries: &[StoredSupplierEntry]) -> IndexMap<String, SupplierProfile> {
    let mut out: IndexMap<String, SupplierProfile> = IndexMap::new();
    for e in entries {
        out.entry(e.supplier_id.clone())
            .or_insert_with(|| SupplierProfile {
                supplier_name: e.entry.supplier.clone(),
                entries: Vec::new(),
            })
            .entries
            .push(e.clone());
    }
    out
}
