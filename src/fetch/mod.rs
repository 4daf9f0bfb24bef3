//! Time-windowed history fetching.
//!
//! The device caps a single archive query at [`InverterConfig::max_query_time`];
//! [`HistoryFetcher`] turns an arbitrarily wide interval into a sequence of
//! bounded queries and stitches the parsed windows back into continuous
//! per-device series.

mod locate;

pub use locate::*;

use crate::config::InverterConfig;
use crate::gateway::{GatewayError, QueryGateway};
use crate::response::{ArchiveResponse, DeviceTable, ParseError, Status};

use chrono::{DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fetch and locate error types.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid range: {from} does not precede {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("malformed response: {0}")]
    Malformed(#[from] ParseError),
    #[error("earliest-data search exceeded its iteration budget of {0} probes")]
    SearchBudgetExhausted(usize),
}

/// A fetch bound that may or may not carry an explicit UTC offset.
#[derive(Debug, Clone, Copy)]
pub enum TimeSpec {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl From<DateTime<Utc>> for TimeSpec {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeSpec::Aware(dt.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for TimeSpec {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        TimeSpec::Aware(dt)
    }
}

impl From<NaiveDateTime> for TimeSpec {
    fn from(naive: NaiveDateTime) -> Self {
        TimeSpec::Naive(naive)
    }
}

impl TimeSpec {
    /// Normalize to UTC. Naive values get the caller's local offset
    /// attached first; the device mis-handles ambiguous local-time strings,
    /// so the resolution is surfaced as a warning rather than silently
    /// applied.
    pub fn resolve(self) -> DateTime<Utc> {
        match self {
            TimeSpec::Aware(dt) => dt.with_timezone(&Utc),
            TimeSpec::Naive(naive) => {
                let resolved = match Local.from_local_datetime(&naive) {
                    LocalResult::Single(dt) => dt,
                    LocalResult::Ambiguous(earlier, _) => earlier,
                    LocalResult::None => Local.from_utc_datetime(&naive),
                };
                tracing::warn!(
                    "bound {} has no UTC offset, assuming local time {}",
                    naive,
                    resolved.to_rfc3339()
                );
                resolved.with_timezone(&Utc)
            }
        }
    }
}

/// Outcome of a windowed fetch.
///
/// A device status error stops the window loop but keeps everything
/// accumulated so far; the halting status is carried here so the caller
/// sees it next to the partial data.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Per-device series, keyed by device id.
    pub series: BTreeMap<String, DeviceTable>,
    /// Status that halted the window loop, if any.
    pub halt: Option<Status>,
}

impl FetchReport {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Drives repeated bounded archive queries across a caller-supplied
/// interval and merges the parsed windows.
pub struct HistoryFetcher<'a, G> {
    gateway: &'a G,
    config: &'a InverterConfig,
}

impl<'a, G: QueryGateway> HistoryFetcher<'a, G> {
    pub fn new(gateway: &'a G, config: &'a InverterConfig) -> Self {
        Self { gateway, config }
    }

    /// Fetch `[from, to)` as a sequence of device-limited windows.
    ///
    /// `channels` defaults to the full registry. With `strict` (the
    /// default-on mode), rows outside `[from, to)` are trimmed afterwards:
    /// the device returns whole-day-aligned data regardless of sub-day
    /// bounds, so windows commonly over-return. Non-strict keeps the
    /// over-returned rows for diagnosing that quirk.
    pub async fn fetch(
        &self,
        from: impl Into<TimeSpec>,
        to: impl Into<TimeSpec>,
        channels: Option<&[&str]>,
        strict: bool,
    ) -> Result<FetchReport, FetchError> {
        let from = from.into().resolve();
        let to = to.into().resolve();
        if from >= to {
            return Err(FetchError::InvalidRange { from, to });
        }

        let registry_names;
        let channels: &[&str] = match channels {
            Some(names) => names,
            None => {
                registry_names = self.config.channels.names();
                &registry_names
            }
        };

        let window = self.config.max_query_time;
        let mut report = FetchReport::default();
        let mut cursor = from;

        // One bounded query per window. The probe's EndDate is inclusive on
        // the device side, hence the one-second pullback; the cursor still
        // advances by the full window so coverage stays gap-free.
        while cursor < to {
            let probe_end = (cursor + window - Duration::seconds(1)).min(to);
            let raw = self.gateway.fetch_archive(cursor, probe_end, channels).await?;
            let response = ArchiveResponse::parse(&raw)?;

            if response.error_code() != 0 {
                let status = response.status().clone();
                tracing::warn!(
                    "archive window [{} -> {}] failed with status {}: {}",
                    cursor,
                    probe_end,
                    status.code,
                    status.reason
                );
                report.halt = Some(status);
                break;
            }

            for (device, table) in response.data() {
                match report.series.entry(device) {
                    Entry::Occupied(mut existing) => {
                        existing.get_mut().merge_union(table);
                        existing.get_mut().sort_by_timestamp();
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(table);
                    }
                }
            }

            cursor += window;
        }

        if strict {
            for table in report.series.values_mut() {
                table.retain_range(from, to);
            }
        }

        Ok(report)
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn config() -> InverterConfig {
        InverterConfig::for_host("test")
    }

    #[tokio::test]
    async fn test_single_window_fetch() {
        let gateway = ScriptedGateway::new(|start, end| {
            archive_json(start, end, 0, &[("inverter/1", "PowerReal_PAC_Sum", &[(0, 100.0), (300, 110.0)])])
        });
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let report = fetcher
            .fetch(utc(2020, 1, 1, 0, 0, 0), utc(2020, 1, 2, 0, 0, 0), None, true)
            .await
            .unwrap();

        assert_eq!(gateway.call_count(), 1);
        assert!(report.halt.is_none());
        let table = &report.series["inverter/1"];
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "PowerReal_PAC_Sum"), Some(100.0));
    }

    #[tokio::test]
    async fn test_window_count_matches_span() {
        // 16-day limit: one probe per full-or-partial window.
        let cases = [
            (utc(2020, 1, 1, 0, 0, 0), utc(2020, 1, 17, 0, 0, 0), 1), // exactly one window
            (utc(2020, 1, 1, 0, 0, 0), utc(2020, 2, 2, 0, 0, 0), 2),  // 32 days
            (utc(2020, 1, 1, 0, 0, 0), utc(2020, 2, 3, 0, 0, 0), 3),  // 33 days
        ];

        for (from, to, expected) in cases {
            let gateway =
                ScriptedGateway::new(|start, end| archive_json(start, end, 0, &[]));
            let config = config();
            let fetcher = HistoryFetcher::new(&gateway, &config);
            fetcher.fetch(from, to, None, true).await.unwrap();

            assert_eq!(gateway.call_count(), expected, "span {} -> {}", from, to);
            // No probe exceeds the device limit.
            for (start, end) in gateway.calls.lock().unwrap().iter() {
                assert!(*end - *start <= config.max_query_time);
            }
        }
    }

    #[tokio::test]
    async fn test_multi_window_merge_sorts_rows() {
        let data_from = utc(2020, 1, 1, 0, 0, 0);
        let gateway = ScriptedGateway::new(move |start, end| {
            let samples = samples_from(start, end, data_from, 6 * 3600);
            archive_json(start, end, 0, &[("inverter/1", "TimeSpanInSec", &samples)])
        });
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let from = utc(2020, 1, 1, 0, 0, 0);
        let to = utc(2020, 2, 2, 0, 0, 0);
        let report = fetcher.fetch(from, to, None, true).await.unwrap();

        assert_eq!(gateway.call_count(), 2);
        let table = &report.series["inverter/1"];
        assert!(!table.is_empty());
        // Ascending across the window seam.
        for pair in table.rows().windows(2) {
            assert!(pair[0].ts <= pair[1].ts);
        }
        // Both windows contributed.
        assert!(table.rows().last().unwrap().ts > utc(2020, 1, 17, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_strict_trims_over_returned_rows() {
        // Device quirk: whole-day data regardless of the requested sub-day
        // bounds, i.e. offsets before and after the asked-for interval.
        let gateway = ScriptedGateway::new(|start, end| {
            archive_json(
                start,
                end,
                0,
                &[("inverter/1", "PowerReal_PAC_Sum", &[(-21600, 90.0), (0, 100.0), (3600, 110.0), (86400, 120.0)])],
            )
        });
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let from = utc(2020, 1, 1, 6, 0, 0);
        let to = utc(2020, 1, 1, 12, 0, 0);

        let strict = fetcher.fetch(from, to, None, true).await.unwrap();
        let table = &strict.series["inverter/1"];
        assert_eq!(table.len(), 2);
        for row in table.rows() {
            assert!(row.ts >= from && row.ts < to);
        }

        let loose = fetcher.fetch(from, to, None, false).await.unwrap();
        assert_eq!(loose.series["inverter/1"].len(), 4);
    }

    #[tokio::test]
    async fn test_status_error_halts_and_keeps_partial_data() {
        // First window healthy, second answers status 255.
        let boundary = utc(2020, 1, 17, 0, 0, 0);
        let gateway = ScriptedGateway::new(move |start, end| {
            if start < boundary {
                archive_json(start, end, 0, &[("inverter/1", "TimeSpanInSec", &[(0, 1.0)])])
            } else {
                archive_json(start, end, 255, &[])
            }
        });
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let report = fetcher
            .fetch(utc(2020, 1, 1, 0, 0, 0), utc(2020, 3, 1, 0, 0, 0), None, true)
            .await
            .unwrap();

        // Halted on the second probe; later windows never queried.
        assert_eq!(gateway.call_count(), 2);
        let halt = report.halt.expect("halting status should be reported");
        assert_eq!(halt.code, 255);
        assert_eq!(report.series["inverter/1"].len(), 1);
    }

    #[tokio::test]
    async fn test_all_empty_success_is_empty_aggregate() {
        let gateway = ScriptedGateway::new(|start, end| archive_json(start, end, 0, &[]));
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let report = fetcher
            .fetch(utc(2020, 1, 1, 0, 0, 0), utc(2020, 2, 1, 0, 0, 0), None, true)
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(report.halt.is_none());
    }

    #[tokio::test]
    async fn test_rejects_inverted_range() {
        let gateway = ScriptedGateway::new(|start, end| archive_json(start, end, 0, &[]));
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let result = fetcher
            .fetch(utc(2020, 1, 2, 0, 0, 0), utc(2020, 1, 1, 0, 0, 0), None, true)
            .await;
        assert!(matches!(result, Err(FetchError::InvalidRange { .. })));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_naive_bounds_resolve_to_local_offset() {
        let gateway = ScriptedGateway::new(|start, end| {
            archive_json(start, end, 0, &[("inverter/1", "TimeSpanInSec", &[(0, 1.0)])])
        });
        let config = config();
        let fetcher = HistoryFetcher::new(&gateway, &config);

        let from = utc(2020, 1, 1, 0, 0, 0).naive_local();
        let to = utc(2020, 1, 2, 0, 0, 0).naive_local();
        let report = fetcher.fetch(from, to, None, true).await.unwrap();

        assert_eq!(gateway.call_count(), 1);
        assert_eq!(report.series.len(), 1);
    }
}
