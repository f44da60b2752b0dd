use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use lcd_network_menu::{config::AppConfig, nmcli_client::NmcliClient, session::Session};
use log::{debug, error, info, warn};
use std::{io::Write, time::Duration};
use tokio::{
    signal::unix::{Signal, SignalKind, signal},
    time::sleep,
};

enum ShutdownReason {
    ConnectionLost,
    Shutdown,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::ConnectionLost => write!(f, "LCDd connection lost"),
            ShutdownReason::Shutdown => write!(f, "shutting down"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize()?;

    let config = AppConfig::get();
    let network = NmcliClient::new(&config.nmcli.binary_path);

    match network.version().await {
        Ok(version) => info!("nmcli version: {version}"),
        Err(e) => warn!("failed to get nmcli version: {e:#}"),
    }

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    loop {
        match run_until_shutdown(&network, &mut sigterm).await {
            Ok(ShutdownReason::Shutdown) => break,
            Ok(ShutdownReason::ConnectionLost) => {}
            Err(e) if config.lcdd.reconnect_delay.is_some() => {
                error!("LCDd session failed: {e:#}")
            }
            Err(e) => return Err(e),
        }

        let Some(delay) = config.lcdd.reconnect_delay else {
            info!("reconnecting is disabled");
            break;
        };

        if !wait_for_reconnect(delay, &mut sigterm).await {
            break;
        }
    }

    info!("shutdown complete");

    Ok(())
}

fn initialize() -> Result<()> {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!(
        "module version: {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHORT_REV")
    );

    let config = AppConfig::get();
    debug!("configuration: {config:?}");

    Ok(())
}

async fn run_until_shutdown(network: &NmcliClient, sigterm: &mut Signal) -> Result<ShutdownReason> {
    let config = AppConfig::get();

    let mut session = Session::connect(&config.lcdd.address, network.clone(), config.session())
        .await
        .context("failed to start LCDd session")?;

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
            ShutdownReason::Shutdown
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
            ShutdownReason::Shutdown
        },
        result = session.run() => {
            result.context("LCDd session aborted")?;
            ShutdownReason::ConnectionLost
        },
    };

    info!("{reason}");

    if matches!(reason, ShutdownReason::Shutdown) {
        if let Err(e) = session.close().await {
            error!("failed to close LCDd session: {e:#}");
        }
    }

    Ok(reason)
}

/// Wait before the next connection attempt; `false` if a shutdown was requested meanwhile
async fn wait_for_reconnect(delay: Duration, sigterm: &mut Signal) -> bool {
    info!("reconnecting in {}s", delay.as_secs());

    tokio::select! {
        _ = sleep(delay) => true,
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
            false
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
            false
        },
    }
}
