//! Shared data model for the load monitor: raw counter samples and the
//! state the sampling loop carries between iterations.

pub mod load;

/// Cumulative CPU tick counters taken from the aggregate cpu line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    pub total: u64,
    pub idle: u64,
}

impl CpuSample {
    /// Builds a sample from the ten per-state tick fields: `total` is the
    /// inclusive sum of all ten, `idle` the fourth field.
    pub fn from_ticks(ticks: &[u64; 10]) -> Self {
        CpuSample {
            total: ticks.iter().sum(),
            idle: ticks[3],
        }
    }

    /// An all-zero sample stands for "no previous iteration yet".
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Cumulative byte counters for one network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl NetSample {
    /// The receive counter alone decides whether a previous sample exists;
    /// while it is zero, deltas are suppressed for both directions.
    pub fn is_empty(&self) -> bool {
        self.rx_bytes == 0
    }
}

/// Sentinel for "never reported": farther from any legal 0-100 percentage
/// than the gate threshold, so the first computed value always publishes.
pub const UNREPORTED: i64 = -100;

/// State carried across iterations: the previous samples and the last
/// percentage actually published for each tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    pub prev_cpu: CpuSample,
    pub prev_net: NetSample,
    pub reported_cpu: i64,
    pub reported_rx: i64,
    pub reported_tx: i64,
}

impl LoopState {
    pub fn new() -> Self {
        LoopState {
            prev_cpu: CpuSample::default(),
            prev_net: NetSample::default(),
            reported_cpu: UNREPORTED,
            reported_rx: UNREPORTED,
            reported_tx: UNREPORTED,
        }
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cpu_sample_sums_all_ten_fields() {
        let sample = CpuSample::from_ticks(&[100, 2, 30, 900, 4, 0, 5, 1, 0, 0]);
        assert_eq!(sample.total, 1042);
        assert_eq!(sample.idle, 900);
    }

    #[test]
    fn empty_samples_are_recognized() {
        assert!(CpuSample::default().is_empty());
        assert!(!CpuSample { total: 1, idle: 0 }.is_empty());

        assert!(NetSample::default().is_empty());
        // only the receive counter matters for the first-iteration test
        assert!(
            NetSample {
                rx_bytes: 0,
                tx_bytes: 7,
            }
            .is_empty()
        );
        assert!(
            !NetSample {
                rx_bytes: 1,
                tx_bytes: 0,
            }
            .is_empty()
        );
    }

    #[test]
    fn fresh_state_forces_first_reports() {
        let state = LoopState::new();
        assert!(state.prev_cpu.is_empty());
        assert!(state.prev_net.is_empty());
        for last in [state.reported_cpu, state.reported_rx, state.reported_tx] {
            assert_eq!(last, UNREPORTED);
            // any legal percentage clears the default gate from the sentinel
            assert!(load::should_report(0, last, load::REPORT_THRESHOLD));
        }
    }
}
