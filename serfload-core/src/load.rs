//! Delta-to-percentage formulas and the hysteresis gate. All arithmetic is
//! truncating integer division; percentages are coarse signals, not
//! measurements.

use crate::CpuSample;

/// Capacity in bytes/s per Mbit/s of configured link speed. 1024*1024/8,
/// deliberately not the SI 1_000_000/8; published percentages depend on
/// this exact value.
pub const BYTES_PER_MBIT: u64 = 131_072;

/// Default width of the report gate, in percentage points.
pub const REPORT_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Nothing elapsed between the samples (or the rate basis is zero);
    /// the formula would divide by zero.
    #[error("degenerate sample window")]
    DegenerateSample,
    /// A cumulative counter went backwards, e.g. wraparound or a reset.
    #[error("counter regressed between samples")]
    CounterRegression,
}

/// CPU load over the window between two samples: the non-idle share of
/// elapsed ticks, truncated to a whole percentage.
pub fn cpu_load_percent(prev: CpuSample, cur: CpuSample) -> Result<i64, LoadError> {
    if cur.total < prev.total || cur.idle < prev.idle {
        return Err(LoadError::CounterRegression);
    }
    let delta_total = cur.total - prev.total;
    let delta_idle = cur.idle - prev.idle;
    if delta_total == 0 {
        return Err(LoadError::DegenerateSample);
    }
    if delta_idle > delta_total {
        // idle is accounted inside total, so this is a regression too
        return Err(LoadError::CounterRegression);
    }
    Ok((100 * (delta_total - delta_idle) / delta_total) as i64)
}

/// Throughput over the window as a percentage of configured link capacity.
/// Bytes/s truncates first, then the capacity share.
pub fn net_load_percent(
    prev_bytes: u64,
    cur_bytes: u64,
    period_secs: u64,
    netspeed_mbps: u64,
) -> Result<i64, LoadError> {
    if cur_bytes < prev_bytes {
        return Err(LoadError::CounterRegression);
    }
    if period_secs == 0 || netspeed_mbps == 0 {
        return Err(LoadError::DegenerateSample);
    }
    let bytes_per_sec = (cur_bytes - prev_bytes) / period_secs;
    Ok((100 * bytes_per_sec / (netspeed_mbps * BYTES_PER_MBIT)) as i64)
}

/// The debounce: report only when the new value strays more than
/// `threshold` points from the last value actually published.
pub fn should_report(new_value: i64, last_reported: i64, threshold: i64) -> bool {
    (new_value - last_reported).abs() > threshold
}
