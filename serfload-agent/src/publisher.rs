//! Tag publication through the serf CLI.

use std::{path::PathBuf, process::ExitStatus, time::Duration};

use log::info;
use tokio::{process::Command, time::timeout};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("cannot run {}: {source}", .bin.display())]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {}s", .limit.as_secs())]
    TimedOut { limit: Duration },
    #[error("serf failed ({status}): {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Anything that can push one tag assignment to the membership agent.
pub trait Publisher {
    async fn publish(&self, tag: &str, value: i64) -> Result<(), PublishError>;
}

/// Publishes by invoking `serf tags -rpc-auth=... -set tag=value`. The
/// invocation is bounded by a timeout so a hung CLI cannot stall the loop.
#[derive(Debug, Clone)]
pub struct SerfPublisher {
    serf_bin: PathBuf,
    rpc_auth: String,
    limit: Duration,
}

impl SerfPublisher {
    pub fn new(serf_bin: PathBuf, rpc_auth: String, limit: Duration) -> Self {
        SerfPublisher {
            serf_bin,
            rpc_auth,
            limit,
        }
    }
}

impl Publisher for SerfPublisher {
    async fn publish(&self, tag: &str, value: i64) -> Result<(), PublishError> {
        info!("setting serf tag {tag}={value}");
        let mut serf = Command::new(&self.serf_bin);
        serf.arg("tags")
            .arg(format!("-rpc-auth={}", self.rpc_auth))
            .arg("-set")
            .arg(format!("{tag}={value}"))
            .kill_on_drop(true);
        let output = timeout(self.limit, serf.output())
            .await
            .map_err(|_| PublishError::TimedOut { limit: self.limit })?
            .map_err(|source| PublishError::Spawn {
                bin: self.serf_bin.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(PublishError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
