//! High-level inverter client.
//!
//! Wires a configuration and a gateway together and delegates to the
//! fetcher, locator, and parsers. Generic over the gateway so tests and
//! alternative transports can slot in.

use crate::config::InverterConfig;
use crate::fetch::{EarliestDataLocator, FetchError, FetchReport, HistoryFetcher, TimeSpec};
use crate::gateway::{GatewayError, HttpGateway, QueryGateway};
use crate::response::{DeviceTable, RealtimeResponse, TIMESTAMP_LABEL};

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;

/// Client for one inverter installation.
pub struct Inverter<G = HttpGateway> {
    config: InverterConfig,
    gateway: G,
}

impl Inverter<HttpGateway> {
    /// Connect to a host with default configuration.
    pub fn connect(host: &str) -> Result<Self, GatewayError> {
        Self::with_config(InverterConfig::for_host(host))
    }

    /// Connect with an explicit configuration.
    pub fn with_config(config: InverterConfig) -> Result<Self, GatewayError> {
        let gateway = HttpGateway::new(&config)?;
        Ok(Self { config, gateway })
    }

    /// Probe the device's API version against the tested values.
    pub async fn check_compatibility(&self) -> Result<(bool, Value), GatewayError> {
        self.gateway.check_compatibility().await
    }

    /// Raw event and error log streams for a window.
    pub async fn events_raw(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Value, GatewayError> {
        self.gateway.fetch_events(from, to).await
    }
}

impl<G: QueryGateway> Inverter<G> {
    /// Build a client over a caller-supplied gateway.
    pub fn with_gateway(config: InverterConfig, gateway: G) -> Self {
        Self { config, gateway }
    }

    pub fn config(&self) -> &InverterConfig {
        &self.config
    }

    /// Fetch historical series for `[from, to)`; see [`HistoryFetcher::fetch`].
    pub async fn history(
        &self,
        from: impl Into<TimeSpec>,
        to: impl Into<TimeSpec>,
        channels: Option<&[&str]>,
        strict: bool,
    ) -> Result<FetchReport, FetchError> {
        HistoryFetcher::new(&self.gateway, &self.config)
            .fetch(from, to, channels, strict)
            .await
    }

    /// Earliest instant the device has data for, searching from the epoch
    /// to now; see [`EarliestDataLocator::locate`].
    pub async fn earliest_data(&self) -> Result<Option<DateTime<FixedOffset>>, FetchError> {
        EarliestDataLocator::new(&self.gateway, &self.config)
            .locate(None, None)
            .await
    }

    /// Earliest-data search over an explicit range.
    pub async fn earliest_data_in(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<FixedOffset>>, FetchError> {
        EarliestDataLocator::new(&self.gateway, &self.config)
            .locate(from, to)
            .await
    }

    /// Current snapshot as a parsed response.
    pub async fn realtime_response(&self) -> Result<RealtimeResponse, FetchError> {
        let raw = self.gateway.fetch_realtime().await?;
        Ok(RealtimeResponse::parse(&raw)?)
    }

    /// Current snapshot as a one-row table, optionally appended onto a
    /// table from earlier polls.
    pub async fn realtime(
        &self,
        append_to: Option<DeviceTable>,
    ) -> Result<DeviceTable, FetchError> {
        let response = self.realtime_response().await?;
        Ok(response.data(TIMESTAMP_LABEL, append_to))
    }
}
