//! Archive (historical) response parsing and reshaping.
//!
//! The device timestamps archive samples as integer seconds since the
//! requested window start. Parsing keeps the wire layout (per-device,
//! per-channel offset maps, all in server order); `data()` reshapes that
//! into absolute-time [`DeviceTable`]s.

use super::{parse_head, split_envelope, DeviceTable, Head, ParseError, Status};

use chrono::{DateTime, Duration, FixedOffset};
use serde_json::Value;
use std::collections::BTreeMap;

/// One channel's samples for one device, in server key order.
#[derive(Debug, Clone)]
pub struct ArchiveChannel {
    pub name: String,
    pub unit: String,
    samples: Vec<(i64, f64)>,
}

impl ArchiveChannel {
    /// `(second offset, value)` pairs as the device returned them.
    pub fn samples(&self) -> &[(i64, f64)] {
        &self.samples
    }
}

/// One device's section of an archive response.
#[derive(Debug, Clone)]
pub struct ArchiveDevice {
    pub id: String,
    channels: Vec<ArchiveChannel>,
}

impl ArchiveDevice {
    /// Channels in server order.
    pub fn channels(&self) -> &[ArchiveChannel] {
        &self.channels
    }
}

/// A parsed archive response.
#[derive(Debug, Clone)]
pub struct ArchiveResponse {
    head: Head,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    devices: Vec<ArchiveDevice>,
}

impl ArchiveResponse {
    /// Parse a raw archive document.
    ///
    /// Fails if the value is not a `Head`/`Body` envelope, if the head lacks
    /// the requested window or a valid timestamp, or if any sample map is
    /// malformed. Feeding non-conforming input is a caller bug, not a
    /// recoverable path.
    pub fn parse(raw: &Value) -> Result<Self, ParseError> {
        let (head, body) = split_envelope(raw)?;
        let head = parse_head(head)?;
        let start = head
            .start
            .ok_or(ParseError::MissingField("Head.RequestArguments.StartDate"))?;
        let end = head
            .end
            .ok_or(ParseError::MissingField("Head.RequestArguments.EndDate"))?;

        let data = body
            .get("Data")
            .and_then(Value::as_object)
            .ok_or(ParseError::MissingField("Body.Data"))?;

        let mut devices = Vec::with_capacity(data.len());
        for (device_id, entry) in data {
            devices.push(parse_device(device_id, entry)?);
        }

        Ok(Self {
            head,
            start,
            end,
            devices,
        })
    }

    /// Status code from the head; `0` is success.
    pub fn error_code(&self) -> i64 {
        self.head.status.code
    }

    pub fn status(&self) -> &Status {
        &self.head.status
    }

    /// True when the response carries no device data. Holds for every
    /// non-zero status code; empty success responses are also legal.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Start of the requested window, offset preserved from the wire.
    pub fn start_date(&self) -> DateTime<FixedOffset> {
        self.start
    }

    /// End of the requested window, offset preserved from the wire.
    pub fn end_date(&self) -> DateTime<FixedOffset> {
        self.end
    }

    /// Server-side timestamp of the response.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.head.timestamp
    }

    /// Device ids in the order the device returned them.
    pub fn device_ids(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn devices(&self) -> &[ArchiveDevice] {
        &self.devices
    }

    /// Channel names for a device, in server order. `None` selects the
    /// first device. Unknown devices yield an empty list.
    pub fn channels(&self, device_id: Option<&str>) -> Vec<&str> {
        let device = match device_id {
            Some(id) => self.devices.iter().find(|d| d.id == id),
            None => self.devices.first(),
        };
        device
            .map(|d| d.channels.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Unit tag a device reported for a channel.
    pub fn unit(&self, device_id: &str, channel: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.id == device_id)?
            .channels
            .iter()
            .find(|c| c.name == channel)
            .map(|c| c.unit.as_str())
    }

    /// Smallest second offset anywhere in the response.
    pub fn min_offset(&self) -> Option<i64> {
        self.devices
            .iter()
            .flat_map(|d| d.channels.iter())
            .flat_map(|c| c.samples.iter().map(|(offset, _)| *offset))
            .min()
    }

    /// Absolute timestamp of the earliest sample in the response: the
    /// minimum offset across all devices, added to the requested start.
    pub fn earliest_sample(&self) -> Option<DateTime<FixedOffset>> {
        self.min_offset()
            .map(|offset| self.start + Duration::seconds(offset))
    }

    /// Reshape into one table per device.
    ///
    /// Each channel contributes a column; rows are the union of offsets seen
    /// for the device (channels reporting at different offsets leave `None`
    /// cells), ascending by timestamp. Column order is the timestamp column
    /// followed by channels in server order, so repeated calls over the same
    /// document produce identical tables.
    pub fn data(&self) -> BTreeMap<String, DeviceTable> {
        let mut tables = BTreeMap::new();

        for device in &self.devices {
            let columns: Vec<String> =
                device.channels.iter().map(|c| c.name.clone()).collect();
            let mut table = DeviceTable::new(columns);

            let mut by_offset: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
            for (index, channel) in device.channels.iter().enumerate() {
                for (offset, value) in &channel.samples {
                    let cells = by_offset
                        .entry(*offset)
                        .or_insert_with(|| vec![None; device.channels.len()]);
                    cells[index] = Some(*value);
                }
            }

            for (offset, values) in by_offset {
                table.push_row(self.start + Duration::seconds(offset), values);
            }

            tables.insert(device.id.clone(), table);
        }

        tables
    }
}

fn parse_device(device_id: &str, entry: &Value) -> Result<ArchiveDevice, ParseError> {
    let channel_map = entry
        .get("Data")
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::DeviceData(device_id.to_string()))?;

    let mut channels = Vec::with_capacity(channel_map.len());
    for (name, channel) in channel_map {
        let unit = channel
            .get("Unit")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let values = channel
            .get("Values")
            .and_then(Value::as_object)
            .ok_or_else(|| ParseError::ChannelValues(name.clone()))?;

        let mut samples = Vec::with_capacity(values.len());
        for (key, value) in values {
            let offset: i64 = key
                .parse()
                .map_err(|_| ParseError::Offset(key.clone()))?;
            let value = value
                .as_f64()
                .ok_or_else(|| ParseError::Sample(name.clone()))?;
            samples.push((offset, value));
        }

        channels.push(ArchiveChannel {
            name: name.clone(),
            unit,
            samples,
        });
    }

    Ok(ArchiveDevice {
        id: device_id.to_string(),
        channels,
    })
}
