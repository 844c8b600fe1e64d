//! The sampling loop: every period, take samples, turn deltas into load
//! percentages, and push values through the report gate to serf.

use std::{fmt, time::Duration};

use log::{info, warn};
use serfload_core::{
    CpuSample, LoopState, NetSample,
    load::{cpu_load_percent, net_load_percent, should_report},
};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::{config::Config, publisher::Publisher, sampler::ProcSampler};

pub struct Driver<P> {
    sampler: ProcSampler,
    publisher: P,
    iface: String,
    period_secs: u64,
    netspeed_mbps: u64,
    threshold: i64,
}

impl<P: Publisher> Driver<P> {
    pub fn new(sampler: ProcSampler, publisher: P, config: &Config) -> Self {
        Driver {
            sampler,
            publisher,
            iface: config.iface.clone(),
            period_secs: config.period,
            netspeed_mbps: config.netspeed,
            threshold: config.threshold,
        }
    }

    /// Runs iterations until cancelled. Cancellation lands on the sleep, so
    /// an in-flight iteration always completes first.
    pub async fn run(&self, state: &mut LoopState, shutdown: CancellationToken) {
        loop {
            let started = Instant::now();
            self.tick(state).await;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutting down");
                    return;
                }
                _ = sleep_until(started + Duration::from_secs(self.period_secs)) => {}
            }
        }
    }

    /// One full iteration. The cpu and net pipelines are independent: a
    /// failure in either is logged and skipped without touching the other.
    pub async fn tick(&self, state: &mut LoopState) {
        let mut report = IterationReport::default();

        match self.sampler.sample_cpu() {
            Ok(cur) => {
                if !state.prev_cpu.is_empty() {
                    match cpu_load_percent(state.prev_cpu, cur) {
                        Ok(load) => {
                            report.cpu = Some(CpuReading {
                                delta_total: cur.total - state.prev_cpu.total,
                                delta_idle: cur.idle - state.prev_cpu.idle,
                                load,
                            });
                            self.report_metric("cpu", load, &mut state.reported_cpu)
                                .await;
                        }
                        Err(e) => warn!("cpu load skipped: {e}"),
                    }
                }
                state.prev_cpu = cur;
            }
            Err(e) => {
                warn!("cpu sample failed: {e}");
                // re-baseline on the next good sample
                state.prev_cpu = CpuSample::default();
            }
        }

        match self.sampler.sample_net(&self.iface) {
            Ok(cur) => {
                if !state.prev_net.is_empty() {
                    report.rx = self
                        .net_metric(
                            "rx",
                            state.prev_net.rx_bytes,
                            cur.rx_bytes,
                            &mut state.reported_rx,
                        )
                        .await;
                    report.tx = self
                        .net_metric(
                            "tx",
                            state.prev_net.tx_bytes,
                            cur.tx_bytes,
                            &mut state.reported_tx,
                        )
                        .await;
                }
                state.prev_net = cur;
            }
            Err(e) => {
                warn!("net sample failed: {e}");
                state.prev_net = NetSample::default();
            }
        }

        info!("{report}");
    }

    async fn net_metric(
        &self,
        tag: &str,
        prev_bytes: u64,
        cur_bytes: u64,
        last_reported: &mut i64,
    ) -> Option<NetReading> {
        match net_load_percent(prev_bytes, cur_bytes, self.period_secs, self.netspeed_mbps) {
            Ok(load) => {
                self.report_metric(tag, load, last_reported).await;
                Some(NetReading {
                    delta_bytes: cur_bytes - prev_bytes,
                    load,
                })
            }
            Err(e) => {
                warn!("{tag} load skipped: {e}");
                None
            }
        }
    }

    /// Gate and publish one metric. The baseline only moves when the tag
    /// was actually set, so a failed publish is retried by the next
    /// iteration for as long as the change persists.
    async fn report_metric(&self, tag: &str, load: i64, last_reported: &mut i64) {
        if !should_report(load, *last_reported, self.threshold) {
            return;
        }
        match self.publisher.publish(tag, load).await {
            Ok(()) => *last_reported = load,
            Err(e) => warn!("failed to set tag {tag}: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuReading {
    delta_total: u64,
    delta_idle: u64,
    load: i64,
}

#[derive(Debug, Clone, Copy)]
struct NetReading {
    delta_bytes: u64,
    load: i64,
}

/// What one iteration observed; metrics skipped this round render as `-`.
#[derive(Debug, Default, Clone, Copy)]
struct IterationReport {
    cpu: Option<CpuReading>,
    rx: Option<NetReading>,
    tx: Option<NetReading>,
}

impl fmt::Display for IterationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Field<T>(Option<T>);
        impl<T: fmt::Display> fmt::Display for Field<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match &self.0 {
                    Some(value) => write!(f, "{value}"),
                    None => f.write_str("-"),
                }
            }
        }

        write!(
            f,
            "dcputotal={}, dcpuidle={}, cpu={}%, drx_bytes={}, rxload={}%, dtx_bytes={}, txload={}%",
            Field(self.cpu.map(|r| r.delta_total)),
            Field(self.cpu.map(|r| r.delta_idle)),
            Field(self.cpu.map(|r| r.load)),
            Field(self.rx.map(|r| r.delta_bytes)),
            Field(self.rx.map(|r| r.load)),
            Field(self.tx.map(|r| r.delta_bytes)),
            Field(self.tx.map(|r| r.load)),
        )
    }
}
