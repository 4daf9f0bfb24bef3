//! Realtime (single-sample) response parsing.

use super::{parse_head, split_envelope, DeviceTable, Head, ParseError, Status};

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

/// Measurement key that must be present on any realtime response the parser
/// understands; its absence signals an unknown response shape.
pub const REALTIME_MARKER: &str = "YEAR_ENERGY";

/// One scalar measurement from a realtime response.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeMeasurement {
    pub name: String,
    pub unit: String,
    /// The single sample, `None` when the device omitted it.
    pub value: Option<f64>,
}

/// A parsed realtime response: the device's current snapshot.
#[derive(Debug, Clone)]
pub struct RealtimeResponse {
    head: Head,
    measurements: Vec<RealtimeMeasurement>,
}

impl RealtimeResponse {
    /// Parse a raw realtime document.
    ///
    /// Beyond the envelope precondition, a successful response (status code
    /// `0`) must carry the [`REALTIME_MARKER`] measurement; a shape without
    /// it is a hard failure, not a warning.
    pub fn parse(raw: &Value) -> Result<Self, ParseError> {
        let (head, body) = split_envelope(raw)?;
        let head = parse_head(head)?;

        let mut measurements = Vec::new();
        if let Some(data) = body.get("Data").and_then(Value::as_object) {
            for (name, entry) in data {
                let unit = entry
                    .get("Unit")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let value = entry
                    .get("Values")
                    .and_then(|v| v.get("1"))
                    .and_then(Value::as_f64);
                measurements.push(RealtimeMeasurement {
                    name: name.clone(),
                    unit,
                    value,
                });
            }
        }

        if head.status.code == 0 && !measurements.iter().any(|m| m.name == REALTIME_MARKER) {
            return Err(ParseError::Marker(REALTIME_MARKER));
        }

        Ok(Self { head, measurements })
    }

    pub fn error_code(&self) -> i64 {
        self.head.status.code
    }

    pub fn status(&self) -> &Status {
        &self.head.status
    }

    /// Server-side timestamp of the snapshot, offset preserved.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.head.timestamp
    }

    /// Measurement names in server order.
    pub fn measurement_names(&self) -> Vec<&str> {
        self.measurements.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn measurements(&self) -> &[RealtimeMeasurement] {
        &self.measurements
    }

    /// Unit tag the device reported for a measurement.
    pub fn unit(&self, name: &str) -> Option<&str> {
        self.measurements
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.unit.as_str())
    }

    /// One row stamped with the response timestamp, one column per
    /// measurement in server order.
    ///
    /// With `append_to`, the row is unioned onto the prior table (outer join
    /// on column names), so repeated polling grows one series without the
    /// caller re-specifying the schema.
    pub fn data(&self, timestamp_label: &str, append_to: Option<DeviceTable>) -> DeviceTable {
        let columns: Vec<String> = self.measurements.iter().map(|m| m.name.clone()).collect();
        let mut row = DeviceTable::with_label(timestamp_label, columns);
        row.push_row(
            self.head.timestamp,
            self.measurements.iter().map(|m| m.value).collect(),
        );

        match append_to {
            Some(mut table) => {
                table.merge_union(row);
                table
            }
            None => row,
        }
    }
}
