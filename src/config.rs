//! Configuration for an inverter connection.
//!
//! All configuration is an immutable value injected at construction; nothing
//! here is shared mutable state.

use chrono::{DateTime, Duration, Utc};
use std::env;

/// Channel the locator probes with; present on every installation and cheap
/// to request on its own.
pub const PROBE_CHANNEL: &str = "TimeSpanInSec";

/// Archive channels the device knows about, with their unit tags.
const DEFAULT_CHANNELS: &[(&str, &str)] = &[
    ("TimeSpanInSec", "sec"),
    ("Digital_PowerManagementRelay_Out_1", "1"),
    ("EnergyReal_WAC_Sum_Produced", "Wh"),
    ("Current_DC_String_1", "1A"),
    ("Current_DC_String_2", "1A"),
    ("Voltage_DC_String_1", "1V"),
    ("Voltage_DC_String_2", "1V"),
    ("Temperature_Powerstage", "1C"),
    ("Voltage_AC_Phase_1", "1V"),
    ("Voltage_AC_Phase_2", "1V"),
    ("Voltage_AC_Phase_3", "1V"),
    ("Current_AC_Phase_1", "1A"),
    ("Current_AC_Phase_2", "1A"),
    ("Current_AC_Phase_3", "1A"),
    ("PowerReal_PAC_Sum", "1W"),
    ("EnergyReal_WAC_Minus_Absolute", "1Wh"),
    ("EnergyReal_WAC_Plus_Absolute", "1Wh"),
    ("Meter_Location_Current", "1"),
    ("Temperature_Channel_1", "1"),
    ("Temperature_Channel_2", "1"),
    ("Digital_Channel_1", "1"),
    ("Digital_Channel_2", "1"),
    ("Radiation", "1"),
    ("Hybrid_Operating_State", "1"),
];

/// One named measurement stream and its unit tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub unit: String,
}

/// The fixed name-to-unit registry of archive channels.
///
/// The default registry carries the full channel set; callers may subset it
/// or build their own for devices with extra channels.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        let channels = DEFAULT_CHANNELS
            .iter()
            .map(|(name, unit)| Channel {
                name: (*name).to_string(),
                unit: (*unit).to_string(),
            })
            .collect();
        Self { channels }
    }
}

impl ChannelRegistry {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Channel names in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// Unit tag for a channel, if the registry knows it.
    pub fn unit(&self, name: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.unit.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// A new registry restricted to the given names, keeping registry order.
    pub fn subset(&self, names: &[&str]) -> Self {
        let channels = self
            .channels
            .iter()
            .filter(|c| names.contains(&c.name.as_str()))
            .cloned()
            .collect();
        Self { channels }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Connection configuration for one inverter installation.
#[derive(Debug, Clone)]
pub struct InverterConfig {
    /// Hostname or IP address of the inverter's data logger.
    pub host: String,
    /// Widest span a single archive query may cover; the device rejects
    /// queries for more than 16 days of data.
    pub max_query_time: Duration,
    /// Earliest instant the archive API could possibly have data for; the
    /// locator's default lower search bound.
    pub epoch: DateTime<Utc>,
    /// Channel used for cheap existence probes.
    pub probe_channel: String,
    /// Per-request timeout applied by the HTTP gateway.
    pub http_timeout: std::time::Duration,
    /// Known channels and their unit tags.
    pub channels: ChannelRegistry,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            max_query_time: Duration::days(16),
            epoch: default_epoch(),
            probe_channel: PROBE_CHANNEL.to_string(),
            http_timeout: std::time::Duration::from_secs(10),
            channels: ChannelRegistry::default(),
        }
    }
}

impl InverterConfig {
    /// Default configuration for the given host.
    pub fn for_host(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HELIOTRACE_HOST`: inverter hostname or IP (default: empty)
    /// - `HELIOTRACE_MAX_QUERY_DAYS`: archive query span limit (default: 16)
    /// - `HELIOTRACE_HTTP_TIMEOUT_SECS`: per-request timeout (default: 10)
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("HELIOTRACE_HOST") {
            cfg.host = host;
        }

        if let Ok(days_str) = env::var("HELIOTRACE_MAX_QUERY_DAYS") {
            if let Ok(days) = days_str.parse() {
                cfg.max_query_time = Duration::days(days);
            }
        }

        if let Ok(secs_str) = env::var("HELIOTRACE_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = secs_str.parse() {
                cfg.http_timeout = std::time::Duration::from_secs(secs);
            }
        }

        cfg
    }
}

/// 2017-01-01T00:00:00Z, the era the archive API first shipped.
fn default_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_483_228_800, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
