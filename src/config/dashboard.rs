// src/config/dashboard.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{DataSource, SourceCatalog, SourceKey};
use crate::state::CyclePolicy;

pub const ENV_DASHBOARD_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/dashboard.toml";
pub const DEFAULT_JSON_PATH: &str = "config/dashboard.json";

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_refresh_interval_ms() -> u64 {
    300_000
}
fn default_fetch_timeout_ms() -> u64 {
    10_000
}
fn default_price_prediction_url() -> String {
    format!("{}/predict-price", default_base_url())
}
fn default_demand_prediction_url() -> String {
    format!("{}/predict-demand", default_base_url())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
    #[serde(default = "default_price_prediction_url")]
    pub price_prediction_url: String,
    #[serde(default = "default_demand_prediction_url")]
    pub demand_prediction_url: String,
    /// Per-source endpoint overrides keyed by slug, e.g. `price-trend`.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            refresh_interval_ms: default_refresh_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            cycle_policy: CyclePolicy::default(),
            price_prediction_url: default_price_prediction_url(),
            demand_prediction_url: default_demand_prediction_url(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl DashboardConfig {
    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: DashboardConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $DASHBOARD_CONFIG_PATH
    /// 2) config/dashboard.toml
    /// 3) config/dashboard.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_DASHBOARD_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!(
                "{ENV_DASHBOARD_CONFIG_PATH} points to non-existent path"
            ));
        }
        for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    /// Zero interval/timeout fall back to defaults; trailing slashes dropped.
    fn sanitized(mut self) -> Self {
        if self.refresh_interval_ms == 0 {
            self.refresh_interval_ms = default_refresh_interval_ms();
        }
        if self.fetch_timeout_ms == 0 {
            self.fetch_timeout_ms = default_fetch_timeout_ms();
        }
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            self.base_url = default_base_url();
        }
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Standard catalog under `base_url` with endpoint overrides applied.
    /// Unknown override keys are an error.
    pub fn catalog(&self) -> Result<SourceCatalog> {
        for k in self.endpoints.keys() {
            if SourceKey::from_slug(k).is_none() {
                return Err(anyhow!("unknown source `{k}` in endpoint overrides"));
            }
        }
        let sources = SourceCatalog::standard(&self.base_url)
            .list_sources()
            .iter()
            .map(|s| DataSource {
                key: s.key,
                endpoint: self
                    .endpoints
                    .iter()
                    .find(|(k, _)| SourceKey::from_slug(k) == Some(s.key))
                    .map(|(_, url)| url.clone())
                    .unwrap_or_else(|| s.endpoint.clone()),
            })
            .collect();
        Ok(SourceCatalog::new(sources)?)
    }
}
