//! Sampling-rate self-calibration.
//!
//! The device streams samples at its own pace and never announces the rate.
//! The estimator counts whole samples arriving in consecutive 100 ms
//! sub-intervals and takes the most frequent count, which ignores the
//! occasional burst or dropout that would skew an average.

use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, info};

use crate::models::error::{SamplerError, TransportError};
use crate::processing::sample_reader::SampleReader;
use crate::traits::clock::Clock;
use crate::traits::serial_transport::SerialTransport;

/// Length of one measurement sub-interval.
pub const MEASURE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateEstimator {
    calibration: Duration,
    interval: Duration,
}

impl RateEstimator {
    pub fn new(calibration: Duration) -> Self {
        Self {
            calibration,
            interval: MEASURE_INTERVAL,
        }
    }

    /// Number of sub-intervals in the calibration window.
    pub fn interval_count(&self) -> usize {
        (self.calibration.as_millis() / self.interval.as_millis()) as usize
    }

    /// Measure the transport and return the sampling rate in Hz.
    ///
    /// Fails with `ZeroSamplingRate` when no sample arrived in most
    /// sub-intervals.
    pub fn estimate<T: SerialTransport + ?Sized>(
        &self,
        transport: &mut T,
        clock: &dyn Clock,
    ) -> Result<u32, SamplerError> {
        info!(
            "Calculating sampling rate over {:.1}s ({} intervals)",
            self.calibration.as_secs_f64(),
            self.interval_count()
        );
        let counts = self.measure(transport, clock)?;
        debug!("Calibration counts: {:?}", counts);

        let rate = rate_from_counts(&counts, self.interval);
        if rate == 0 {
            return Err(SamplerError::ZeroSamplingRate);
        }
        info!("Sampling rate: {} Hz", rate);
        Ok(rate)
    }

    /// Count complete samples per sub-interval for the whole window.
    pub fn measure<T: SerialTransport + ?Sized>(
        &self,
        transport: &mut T,
        clock: &dyn Clock,
    ) -> Result<Vec<u32>, TransportError> {
        let intervals = self.interval_count();
        let mut counts = Vec::with_capacity(intervals);
        let mut reader = SampleReader::new();
        let mut count = 0u32;
        let mut last = clock.now();

        while counts.len() < intervals {
            let now = clock.now();
            if now.saturating_sub(last) >= self.interval {
                counts.push(count);
                last = now;
                count = 0;
                continue;
            }
            if reader.poll(transport, Duration::ZERO)?.is_some() {
                count += 1;
            }
        }
        Ok(counts)
    }
}

/// Most frequent value in `counts`; ties go to the smallest value.
///
/// Returns 0 for an empty slice.
pub fn most_frequent(counts: &[u32]) -> u32 {
    let mut occurrences: BTreeMap<u32, usize> = BTreeMap::new();
    for &count in counts {
        *occurrences.entry(count).or_default() += 1;
    }

    // BTreeMap iterates in ascending key order, so `>` keeps the smallest
    // value among equally frequent ones.
    let mut best = (0u32, 0usize);
    for (value, occurrence) in occurrences {
        if occurrence > best.1 {
            best = (value, occurrence);
        }
    }
    best.0
}

/// Convert per-interval counts to Hz using the mode.
pub fn rate_from_counts(counts: &[u32], interval: Duration) -> u32 {
    let per_second = 1000 / interval.as_millis().max(1) as u32;
    most_frequent(counts) * per_second
}
