//! Locating the earliest instant the device has archive data for.
//!
//! Installations predate their owners' curiosity: nobody remembers when the
//! logger started recording. Both search strategies probe a single cheap
//! channel over bounded windows until they pin down the first sample.

use super::FetchError;
use crate::config::InverterConfig;
use crate::gateway::QueryGateway;
use crate::response::ArchiveResponse;

use chrono::{DateTime, Duration, FixedOffset, Utc};

/// Searches an unbounded time axis for the first instant with any data.
pub struct EarliestDataLocator<'a, G> {
    gateway: &'a G,
    config: &'a InverterConfig,
}

impl<'a, G: QueryGateway> EarliestDataLocator<'a, G> {
    pub fn new(gateway: &'a G, config: &'a InverterConfig) -> Self {
        Self { gateway, config }
    }

    /// Find the earliest available sample in `[from, to)`.
    ///
    /// Defaults: `from` = the configured epoch, `to` = now. `Ok(None)` means
    /// the range holds no data at all, which is a valid outcome, not an
    /// error. Uses the bisection strategy.
    pub async fn locate(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<FixedOffset>>, FetchError> {
        self.locate_binary(from, to).await
    }

    /// Linear fallback: stride forward one maximum window at a time.
    ///
    /// Takes O(range / window) probes but makes no assumption about where
    /// the device reports data; use it when the bisection's monotonicity
    /// assumption is in doubt. The first stride answering with exactly one
    /// device is resolved to its minimum-offset timestamp.
    pub async fn locate_linear(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<FixedOffset>>, FetchError> {
        let (from, to) = self.bounds(from, to)?;
        let step = self.config.max_query_time;

        let mut cursor = from;
        while cursor < to {
            let probe_end = (cursor + step).min(to);
            let response = self.probe(cursor, probe_end).await?;
            if response.device_ids().len() == 1 {
                return Ok(response.earliest_sample());
            }
            cursor += step;
        }

        Ok(None)
    }

    /// Bisection search, preferred for wide ranges: O(log(range)) probes.
    ///
    /// Each pass probes a window one maximum-query-span wide, centered on
    /// the midpoint of the remaining range and clipped to the bounds.
    /// Correct only under the assumption that data existence is
    /// non-decreasing with time from `from` onward. The device sometimes
    /// returns values outside the requested interval, which can violate
    /// that assumption; [`Self::locate_linear`] stays available as the
    /// fallback for when the answer looks wrong.
    pub async fn locate_binary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Option<DateTime<FixedOffset>>, FetchError> {
        let (from, to) = self.bounds(from, to)?;
        let scope = self.config.max_query_time;

        let mut lower = from;
        let mut upper = to;

        // Every pass either halves [lower, upper) or advances lower past an
        // empty probe, so 2*log2(range) plus slack bounds the loop; going
        // over means the narrowing stalled and the search must not spin.
        let range_seconds = (to - from).num_seconds().max(1) as u64;
        let budget = 2 * (64 - range_seconds.leading_zeros() as usize) + 16;

        for _ in 0..budget {
            if lower >= upper {
                return Ok(None);
            }

            let mid = lower + (upper - lower) / 2;
            let probe_start = (mid - scope / 2).max(lower);
            let probe_end = (probe_start + scope).min(to);
            let response = self.probe(probe_start, probe_end).await?;

            if response.is_empty() {
                if probe_end >= to {
                    // Empty all the way to the hard upper bound; under the
                    // monotonicity assumption the whole range is dataless.
                    return Ok(None);
                }
                lower = probe_end;
                continue;
            }

            let earliest = match response.earliest_sample() {
                Some(ts) => ts,
                None => return Ok(None),
            };

            if probe_start == lower {
                // The probe began at the search floor, so nothing earlier
                // can exist: this is the answer.
                return Ok(Some(earliest));
            }

            // Something exists at `earliest`; look for anything before it.
            upper = earliest.with_timezone(&Utc) + Duration::seconds(1);
        }

        Err(FetchError::SearchBudgetExhausted(budget))
    }

    /// One cheap existence probe: the single probe channel, one window.
    async fn probe(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ArchiveResponse, FetchError> {
        let channels = [self.config.probe_channel.as_str()];
        let raw = self.gateway.fetch_archive(start, end, &channels).await?;
        Ok(ArchiveResponse::parse(&raw)?)
    }

    fn bounds(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), FetchError> {
        let from = from.unwrap_or(self.config.epoch);
        let to = to.unwrap_or_else(Utc::now);
        if from >= to {
            return Err(FetchError::InvalidRange { from, to });
        }
        Ok((from, to))
    }
}
