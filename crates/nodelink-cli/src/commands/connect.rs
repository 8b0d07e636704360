use anyhow::Result;
use colored::Colorize;
use nodelink_client::{AutoConnect, DaemonShutdown, Heartbeat, NodeStatus, Session};
use nodelink_config::ClientSettings;
use std::sync::Arc;
use tracing::info;

use crate::console::Output;

/// Run the startup sequence to a live session
pub async fn open_session(settings: ClientSettings, output: &Output) -> Result<Session> {
    let result = AutoConnect::new(settings, output.notifier())?.run().await;
    output.finish();
    Ok(result?)
}

/// Close the session, stopping the daemon only when asked to
pub async fn close_session(mut session: Session, stop: bool) {
    if stop {
        match session.shutdown_daemon().await {
            DaemonShutdown::NotManaged => {}
            DaemonShutdown::Daemonized => {
                println!("{}", "Stop requested; daemon runs detached".dimmed())
            }
            DaemonShutdown::Exited => println!("{}", "Daemon stopped".green()),
            DaemonShutdown::TimedOut => println!("{}", "Daemon did not exit in time".yellow()),
        }
        return;
    }

    session.channel().shutdown();
    if let Some(daemon) = session.take_daemon() {
        info!(pid = ?daemon.id(), "Leaving daemon running");
    }
}

pub async fn execute(
    settings: ClientSettings,
    output: &Output,
    watch: bool,
    stop: bool,
) -> Result<()> {
    let update_every = settings.intervals.update();
    let session = open_session(settings, output).await?;

    println!(
        "{} {}",
        "Connected to".green().bold(),
        session.channel().endpoint()
    );

    let heartbeat = Arc::new(Heartbeat::new(Arc::clone(session.channel())));
    if let Some(status) = heartbeat.beat().await {
        print_status(&status);
    }

    if watch {
        let beating = Arc::clone(&heartbeat).spawn(update_every, |status| print_status(&status));

        tokio::signal::ctrl_c().await?;
        beating.abort();
    }

    close_session(session, stop).await;
    Ok(())
}

fn print_status(status: &NodeStatus) {
    let network = if status.testnet { "testnet" } else { "mainnet" };
    let mut line = format!(
        "{} {}  {} {}  {} {}",
        "blocks".bold(),
        status.blocks,
        "peers".bold(),
        status.connections,
        "network".bold(),
        network
    );
    let behind = status.blocks_behind();
    if behind > 0 {
        line.push_str(&format!("  {}", format!("{behind} behind").yellow()));
    }
    if let Some(rate) = status.sol_rate {
        line.push_str(&format!("  {} {rate} Sol/s", "hashrate".bold()));
    }
    if let Some(version) = &status.subversion {
        line.push_str(&format!("  {}", version.dimmed()));
    }
    println!("{line}");
}
