#![forbid(unsafe_code)]

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use argh::FromArgs;
use serfload_core::LoopState;
use simple_logger::SimpleLogger;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{driver::Driver, publisher::SerfPublisher, sampler::ProcSampler};

mod config;
mod driver;
mod publisher;
mod sampler;

#[derive(FromArgs, Debug)]
#[argh(description = "Publish host cpu/rx/tx load levels as serf tags.")]
struct AgentArgs {
    #[argh(
        option,
        short = 'c',
        default = "config::DEFAULT_CONFIG_PATH.into()",
        description = "path of config file"
    )]
    pub config: PathBuf,
    #[argh(
        switch,
        description = "run a single sampling iteration and exit"
    )]
    pub once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new().env().init()?;

    let args: AgentArgs = argh::from_env();
    log::debug!("Agent args: {args:#?}");

    let config = config::load(&args.config)
        .with_context(|| format!("cannot load config from {}", args.config.display()))?;
    log::debug!("using config {config:?}");

    let publisher = SerfPublisher::new(
        config.serf_bin.clone(),
        config.rpc_auth.clone(),
        Duration::from_secs(config.publish_timeout),
    );
    let driver = Driver::new(ProcSampler::new(), publisher, &config);
    let mut state = LoopState::new();

    if args.once {
        driver.tick(&mut state).await;
        return Ok(());
    }

    log::info!(
        "monitoring {} cpus and {} at {} Mbit/s, sampling every {}s",
        config.cpus,
        config.iface,
        config.netspeed,
        config.period
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    driver.run(&mut state, shutdown).await;

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let _cancel_guard = token.drop_guard();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
