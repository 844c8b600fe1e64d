//! Raw counter reads from the kernel's statistics files.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serfload_core::{CpuSample, NetSample};

/// Per-state tick fields the cpu line must carry.
const CPU_TICK_FIELDS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed counters in {}", .path.display())]
    Malformed { path: PathBuf },
}

/// Reads cumulative CPU tick counters and per-interface byte counters.
/// Both roots are injectable so tests can run against a fabricated tree.
#[derive(Debug, Clone)]
pub struct ProcSampler {
    stat_path: PathBuf,
    net_root: PathBuf,
}

impl ProcSampler {
    pub fn new() -> Self {
        ProcSampler {
            stat_path: PathBuf::from("/proc/stat"),
            net_root: PathBuf::from("/sys/class/net"),
        }
    }

    pub fn with_roots(stat_path: impl Into<PathBuf>, net_root: impl Into<PathBuf>) -> Self {
        ProcSampler {
            stat_path: stat_path.into(),
            net_root: net_root.into(),
        }
    }

    /// One aggregate CPU sample: the label token is discarded, then exactly
    /// ten tick fields are taken from the first line.
    pub fn sample_cpu(&self) -> Result<CpuSample, SampleError> {
        let raw = fs::read_to_string(&self.stat_path).map_err(|source| SampleError::Unreadable {
            path: self.stat_path.clone(),
            source,
        })?;
        let line = raw.lines().next().unwrap_or("");
        let mut fields = line.split_whitespace().skip(1);
        let mut ticks = [0u64; CPU_TICK_FIELDS];
        for tick in ticks.iter_mut() {
            *tick = fields
                .next()
                .and_then(|token| token.parse().ok())
                .ok_or_else(|| SampleError::Malformed {
                    path: self.stat_path.clone(),
                })?;
        }
        Ok(CpuSample::from_ticks(&ticks))
    }

    /// Both byte counters for one interface, each from its own file.
    pub fn sample_net(&self, iface: &str) -> Result<NetSample, SampleError> {
        let statistics = self.net_root.join(iface).join("statistics");
        Ok(NetSample {
            rx_bytes: read_counter(&statistics.join("rx_bytes"))?,
            tx_bytes: read_counter(&statistics.join("tx_bytes"))?,
        })
    }
}

impl Default for ProcSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn read_counter(path: &Path) -> Result<u64, SampleError> {
    let raw = fs::read_to_string(path).map_err(|source| SampleError::Unreadable {
        path: path.to_owned(),
        source,
    })?;
    raw.trim().parse().map_err(|_| SampleError::Malformed {
        path: path.to_owned(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn sampler_in(dir: &Path) -> ProcSampler {
        ProcSampler::with_roots(dir.join("stat"), dir.join("net"))
    }

    fn write_stat(dir: &Path, line: &str) {
        // a realistic stat file carries per-core lines after the aggregate
        let body = format!("{line}\ncpu0 4705 356 584 3699 23 123 12 0 0 0\nintr 114930548\n");
        fs::write(dir.join("stat"), body).expect("write stat");
    }

    fn write_net(dir: &Path, iface: &str, rx: &str, tx: &str) {
        let statistics = dir.join("net").join(iface).join("statistics");
        fs::create_dir_all(&statistics).expect("create statistics dir");
        fs::write(statistics.join("rx_bytes"), rx).expect("write rx_bytes");
        fs::write(statistics.join("tx_bytes"), tx).expect("write tx_bytes");
    }

    #[test]
    fn cpu_sample_from_a_stat_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_stat(dir.path(), "cpu  9366 711 1168 7399 46 246 24 7 0 0");
        let sample = sampler_in(dir.path()).sample_cpu().expect("sample");
        assert_eq!(sample.total, 9366 + 711 + 1168 + 7399 + 46 + 246 + 24 + 7);
        assert_eq!(sample.idle, 7399);
    }

    #[test]
    fn cpu_sample_ignores_fields_past_the_tenth() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_stat(dir.path(), "cpu 1 1 1 1 1 1 1 1 1 1 999999");
        let sample = sampler_in(dir.path()).sample_cpu().expect("sample");
        assert_eq!(sample.total, 10);
        assert_eq!(sample.idle, 1);
    }

    #[test]
    fn cpu_sample_rejects_a_short_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_stat(dir.path(), "cpu 1 2 3 4 5 6 7");
        let err = sampler_in(dir.path()).sample_cpu().unwrap_err();
        assert!(matches!(err, SampleError::Malformed { .. }));
    }

    #[test]
    fn cpu_sample_rejects_garbage_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_stat(dir.path(), "cpu 1 2 3 four 5 6 7 8 9 10");
        let err = sampler_in(dir.path()).sample_cpu().unwrap_err();
        assert!(matches!(err, SampleError::Malformed { .. }));
    }

    #[test]
    fn cpu_sample_reports_a_missing_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = sampler_in(dir.path()).sample_cpu().unwrap_err();
        assert!(matches!(err, SampleError::Unreadable { .. }));
    }

    #[test]
    fn net_sample_reads_both_counters() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_net(dir.path(), "eth0", "2000000\n", " 512 \n");
        let sample = sampler_in(dir.path()).sample_net("eth0").expect("sample");
        assert_eq!(sample.rx_bytes, 2_000_000);
        assert_eq!(sample.tx_bytes, 512);
    }

    #[test]
    fn net_sample_fails_per_missing_interface() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_net(dir.path(), "eth0", "1\n", "1\n");
        let err = sampler_in(dir.path()).sample_net("wlan0").unwrap_err();
        assert!(matches!(err, SampleError::Unreadable { .. }));
    }

    #[test]
    fn net_sample_rejects_a_garbage_counter() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_net(dir.path(), "eth0", "not-a-number\n", "1\n");
        let err = sampler_in(dir.path()).sample_net("eth0").unwrap_err();
        assert!(matches!(err, SampleError::Malformed { .. }));
    }
}
