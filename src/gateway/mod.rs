//! Transport layer for the inverter's HTTP API.
//!
//! The fetch drivers only talk to [`QueryGateway`]; tests substitute a
//! scripted implementation, production uses [`HttpGateway`].

mod http;

pub use http::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Transport error types. Retry policy, if any, belongs to the caller.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device answered HTTP {code} for {url}")]
    Status { code: u16, url: String },
}

/// Abstract query transport.
///
/// Implementations return the endpoint's raw JSON; parsing and windowing
/// stay with the callers. One request at a time — callers issue sequential
/// awaited queries and never pipeline.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Query the archive endpoint for one bounded window.
    async fn fetch_archive(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        channels: &[&str],
    ) -> Result<Value, GatewayError>;

    /// Query the realtime endpoint for the current snapshot.
    async fn fetch_realtime(&self) -> Result<Value, GatewayError>;
}
