//! HTTP gateway implementation over reqwest.

use super::{GatewayError, QueryGateway};
use crate::config::InverterConfig;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// API major version this gateway speaks.
pub const API_VERSION: u32 = 1;

/// Compatibility ranges this crate was exercised against.
pub const TESTED_COMPATIBILITY_RANGES: &[&str] = &["1.5-4"];

/// Channel pair carrying the device's event and error log streams.
pub const EVENT_CHANNELS: &[&str] = &["InverterEvents", "InverterErrors"];

/// Blocking-style HTTP transport: one GET per call, JSON body decoded.
pub struct HttpGateway {
    client: reqwest::Client,
    host: String,
    base_url: String,
    max_query_time: Duration,
}

impl HttpGateway {
    /// Build a gateway for the configured host.
    pub fn new(config: &InverterConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            client,
            host: config.host.clone(),
            base_url: format!("http://{}/solar_api/v{}/", config.host, API_VERSION),
            max_query_time: config.max_query_time,
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::Status {
                code: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Probe the version endpoint and compare against the tested values.
    ///
    /// Drift is reported with a warning and `false`; the raw version
    /// document is returned either way so callers can inspect it.
    pub async fn check_compatibility(&self) -> Result<(bool, Value), GatewayError> {
        let url = format!("http://{}/solar_api/GetAPIVersion.cgi", self.host);
        let version = self.get_json(&url, &[]).await?;

        let api_version = version.get("APIVersion").and_then(Value::as_i64);
        let range = version
            .get("CompatibilityRange")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut compatible = true;
        if api_version != Some(API_VERSION as i64) {
            tracing::warn!(
                "device reports API version {:?}, tested against {}",
                api_version,
                API_VERSION
            );
            compatible = false;
        }
        if !TESTED_COMPATIBILITY_RANGES.contains(&range) {
            tracing::warn!(
                "device reports compatibility range {:?}, tested against {:?}",
                range,
                TESTED_COMPATIBILITY_RANGES
            );
            compatible = false;
        }

        Ok((compatible, version))
    }

    /// Query the archive for the device's event and error log streams.
    pub async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Value, GatewayError> {
        self.fetch_archive(start, end, EVENT_CHANNELS).await
    }
}

#[async_trait]
impl QueryGateway for HttpGateway {
    async fn fetch_archive(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        channels: &[&str],
    ) -> Result<Value, GatewayError> {
        if end - start > self.max_query_time {
            // The device is known to reject or truncate these.
            tracing::warn!(
                "archive query span {} exceeds the device limit of {}",
                end - start,
                self.max_query_time
            );
        }

        let url = format!("{}GetArchiveData.cgi", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("Scope", "System".to_string()),
            ("StartDate", start.to_rfc3339()),
            ("EndDate", end.to_rfc3339()),
        ];
        for channel in channels {
            query.push(("Channel", (*channel).to_string()));
        }

        tracing::debug!("GET {} [{} -> {}]", url, start, end);
        self.get_json(&url, &query).await
    }

    async fn fetch_realtime(&self) -> Result<Value, GatewayError> {
        let url = format!("{}GetInverterRealtimeData.cgi", self.base_url);
        let query = [("Scope", "System".to_string())];

        tracing::debug!("GET {}", url);
        self.get_json(&url, &query).await
    }
}
