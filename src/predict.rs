// src/predict.rs
//! One-shot price/demand prediction requests against the external model
//! service. Inputs are range-checked locally; an invalid request is never sent
//! and never retried.

use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FetchError, PredictError, ValidationError};
use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::http::HttpTransport;
use crate::metrics::ensure_metrics_described;

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 2000..=2030;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub province: String,
    pub district: String,
    pub market: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandQuery {
    pub year: i32,
    pub month: u32,
    pub dayofweek: u32,
    pub market: String,
    pub district: String,
    pub province: String,
    pub category: String,
    pub lag_demand_1: f64,
    pub price: f64,
}

impl PriceQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Vec::new();
        check_year(self.year, &mut v);
        check_month(self.month, &mut v);
        if !(1..=31).contains(&self.day) {
            v.push(format!("day must be between 1 and 31 (got {})", self.day));
        }
        require("province", &self.province, &mut v);
        require("district", &self.district, &mut v);
        require("market", &self.market, &mut v);
        ValidationError::check(v)
    }
}

impl DemandQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Vec::new();
        check_year(self.year, &mut v);
        check_month(self.month, &mut v);
        if self.dayofweek > 6 {
            v.push(format!(
                "dayofweek must be between 0 and 6 (got {})",
                self.dayofweek
            ));
        }
        require("market", &self.market, &mut v);
        require("district", &self.district, &mut v);
        require("province", &self.province, &mut v);
        require("category", &self.category, &mut v);
        if !(self.lag_demand_1 >= 0.0) {
            v.push("lag_demand_1 must not be negative".to_string());
        }
        if !(self.price >= 0.0) {
            v.push("price must not be negative".to_string());
        }
        ValidationError::check(v)
    }
}

fn check_year(year: i32, v: &mut Vec<String>) {
    if !YEAR_RANGE.contains(&year) {
        v.push(format!("year must be between 2000 and 2030 (got {year})"));
    }
}

fn check_month(month: u32, v: &mut Vec<String>) {
    if !(1..=12).contains(&month) {
        v.push(format!("month must be between 1 and 12 (got {month})"));
    }
}

fn require(field: &str, value: &str, v: &mut Vec<String>) {
    if value.trim().is_empty() {
        v.push(format!("{field} is required"));
    }
}

#[derive(Debug, Deserialize)]
struct PricePrediction {
    predicted_price: f64,
}

#[derive(Debug, Deserialize)]
struct DemandPrediction {
    predicted_demand_units: f64,
}

#[derive(Clone)]
pub struct PredictionClient {
    transport: Arc<dyn HttpTransport>,
    price_url: String,
    demand_url: String,
    timeout: Duration,
}

impl PredictionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        price_url: impl Into<String>,
        demand_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            price_url: price_url.into(),
            demand_url: demand_url.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn predict_price(&self, q: &PriceQuery) -> Result<f64, PredictError> {
        reject_invalid("price", q.validate())?;
        let out: PricePrediction = self.post("price", &self.price_url, q).await?;
        Ok(out.predicted_price)
    }

    pub async fn predict_demand(&self, q: &DemandQuery) -> Result<f64, PredictError> {
        reject_invalid("demand", q.validate())?;
        let out: DemandPrediction = self.post("demand", &self.demand_url, q).await?;
        Ok(out.predicted_demand_units)
    }

    async fn post<Q: Serialize, R: DeserializeOwned>(
        &self,
        kind: &'static str,
        url: &str,
        q: &Q,
    ) -> Result<R, FetchError> {
        let body = serde_json::to_value(q).map_err(|e| FetchError::Parse(e.to_string()))?;
        counter!("prediction_requests_total", "kind" => kind).increment(1);

        let res = match tokio::time::timeout(
            self.timeout,
            self.transport.post_json(url, &body, self.timeout),
        )
        .await
        {
            Ok(r) => r.and_then(|resp| resp.into_success_body()).and_then(|text| {
                serde_json::from_str::<R>(&text)
                    .map_err(|e| FetchError::Parse(format!("{kind} prediction: {e}")))
            }),
            Err(_elapsed) => Err(FetchError::Timeout(self.timeout)),
        };
        if let Err(e) = &res {
            tracing::warn!(target: "predict", kind, error = %e, "prediction request failed");
        }
        res
    }
}

fn reject_invalid(kind: &'static str, res: Result<(), ValidationError>) -> Result<(), PredictError> {
    ensure_metrics_described();
    if let Err(e) = &res {
        counter!("prediction_validation_errors_total", "kind" => kind).increment(1);
        tracing::info!(target: "predict", kind, error = %e, "prediction request rejected locally");
    }
    res.map_err(PredictError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_q() -> PriceQuery {
        PriceQuery {
            year: 2024,
            month: 6,
            day: 15,
            province: "Western".into(),
            district: "Colombo".into(),
            market: "Pettah".into(),
        }
    }

    #[test]
    fn valid_price_query_passes() {
        assert!(price_q().validate().is_ok());
    }

    #[test]
    fn price_query_collects_all_range_errors() {
        let q = PriceQuery {
            year: 1999,
            month: 13,
            day: 0,
            ..price_q()
        };
        let err = q.validate().unwrap_err();
        assert_eq!(err.violations.len(), 3);
        assert_eq!(
            err.to_string(),
            "year must be between 2000 and 2030 (got 1999); \
             month must be between 1 and 12 (got 13); \
             day must be between 1 and 31 (got 0)"
        );
    }

    #[test]
    fn demand_query_checks_weekday_and_non_negative_inputs() {
        let q = DemandQuery {
            year: 2030,
            month: 1,
            dayofweek: 7,
            market: "Pettah".into(),
            district: "Colombo".into(),
            province: "Western".into(),
            category: "Fresh nuts".into(),
            lag_demand_1: -1.0,
            price: 0.0,
        };
        let err = q.validate().unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err.violations[0].starts_with("dayofweek"));
        assert!(err.violations[1].starts_with("lag_demand_1"));
    }
}
