// src/http.rs
//! Injectable HTTP transport. The engine only ever talks to this trait so
//! tests (and other runtimes) can swap the network out.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::FetchError;

/// Status + raw body of a completed request. Status handling is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response, otherwise `FetchError::Http`.
    pub fn into_success_body(self) -> Result<String, FetchError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(FetchError::Http {
                status: self.status,
            })
        }
    }
}

/// Transport errors are limited to `FetchError::Network` and `FetchError::Timeout`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError>;

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError>;
}

/// Production transport on top of `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("coconut-dashboard/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn finish(
        res: Result<reqwest::Response, reqwest::Error>,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let resp = res.map_err(|e| map_reqwest_error(e, timeout))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let res = self.client.get(url).timeout(timeout).send().await;
        Self::finish(res, timeout).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let res = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await;
        Self::finish(res, timeout).await
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_2xx_becomes_http_error() {
        let r = HttpResponse {
            status: 503,
            body: "down".into(),
        };
        assert_eq!(
            r.into_success_body().unwrap_err(),
            FetchError::Http { status: 503 }
        );
        assert_eq!(HttpResponse::ok("[]").into_success_body().unwrap(), "[]");
    }
}
