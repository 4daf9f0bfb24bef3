//! Client library for a solar inverter's HTTP telemetry API.
//!
//! The device answers archive queries with paginated, relative-timestamped
//! JSON: samples are keyed by seconds elapsed since the requested window
//! start, and a single query may cover at most 16 days. This crate turns
//! that into something usable:
//!
//! - windowed fetching: an arbitrarily wide interval becomes a sequence of
//!   device-limited queries, stitched back into continuous per-device tables
//! - archive parsing: sparse per-channel offset maps become aligned
//!   absolute-time tables, one per device
//! - realtime polling: single-sample snapshots, appendable into a series
//! - earliest-data search: linear or bisection probing for the first
//!   instant the installation ever recorded
//!
//! # Example
//!
//! ```no_run
//! use heliotrace::Inverter;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let inverter = Inverter::connect("192.168.1.154")?;
//!
//! let snapshot = inverter.realtime(None).await?;
//! println!("current PAC: {:?}", snapshot.value(0, "PAC"));
//!
//! if let Some(installed) = inverter.earliest_data().await? {
//!     let report = inverter
//!         .history(installed.with_timezone(&chrono::Utc), chrono::Utc::now(), None, true)
//!         .await?;
//!     for (device, table) in &report.series {
//!         println!("{}: {} rows", device, table.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod fetch;
mod gateway;
mod response;

pub use client::Inverter;
pub use config::{Channel, ChannelRegistry, InverterConfig, PROBE_CHANNEL};
pub use fetch::{EarliestDataLocator, FetchError, FetchReport, HistoryFetcher, TimeSpec};
pub use gateway::{
    GatewayError, HttpGateway, QueryGateway, API_VERSION, EVENT_CHANNELS,
    TESTED_COMPATIBILITY_RANGES,
};
pub use response::{
    ArchiveChannel, ArchiveDevice, ArchiveResponse, DeviceTable, ParseError, RealtimeMeasurement,
    RealtimeResponse, Status, TableRow, REALTIME_MARKER, TIMESTAMP_LABEL,
};
