//! The live connection handed out by the coordinator

use crate::channel::RpcChannel;
use crate::lifecycle::DaemonHandle;
use nodelink_config::DaemonConf;
use nodelink_protocol::RpcRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STOP_POLL_LIMIT: u32 = 30;

/// How [`Session::shutdown_daemon`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonShutdown {
    /// This session did not start the daemon
    NotManaged,
    /// `daemon=1`: the process we started is not the daemon, nothing to wait for
    Daemonized,
    Exited,
    /// Still running after the last poll
    TimedOut,
}

/// One established connection
///
/// Owns the channel everything else talks through and, when the daemon
/// was started locally, the only handle to that process.
#[derive(Debug)]
pub struct Session {
    channel: Arc<RpcChannel>,
    daemon: Option<DaemonHandle>,
    conf: DaemonConf,
}

impl Session {
    pub fn new(channel: Arc<RpcChannel>, daemon: Option<DaemonHandle>, conf: DaemonConf) -> Self {
        Self {
            channel,
            daemon,
            conf,
        }
    }

    pub fn channel(&self) -> &Arc<RpcChannel> {
        &self.channel
    }

    pub fn conf(&self) -> &DaemonConf {
        &self.conf
    }

    pub fn daemon(&self) -> Option<&DaemonHandle> {
        self.daemon.as_ref()
    }

    pub fn daemon_mut(&mut self) -> Option<&mut DaemonHandle> {
        self.daemon.as_mut()
    }

    /// Hand the daemon process to another owner
    pub fn take_daemon(&mut self) -> Option<DaemonHandle> {
        self.daemon.take()
    }

    /// Install `channel` and close the previous one, which is returned
    pub fn replace_channel(&mut self, channel: Arc<RpcChannel>) -> Arc<RpcChannel> {
        let previous = std::mem::replace(&mut self.channel, channel);
        previous.shutdown();
        previous
    }

    /// Stop the daemon this session started
    ///
    /// Sends `stop`, closes the channel, then polls once a second for the
    /// process to exit, giving up after thirty polls.
    pub async fn shutdown_daemon(&mut self) -> DaemonShutdown {
        let Some(daemon) = self.daemon.as_mut() else {
            self.channel.shutdown();
            return DaemonShutdown::NotManaged;
        };

        info!(pid = ?daemon.id(), "Stopping embedded daemon");
        if let Err(e) = self.channel.request(RpcRequest::new("stop")).await {
            warn!(error = %e, "stop request failed");
        }
        self.channel.shutdown();

        if self.conf.daemonized {
            debug!("Daemon runs detached, not waiting for it");
            return DaemonShutdown::Daemonized;
        }

        for attempt in 1..=STOP_POLL_LIMIT {
            if !daemon.is_running() {
                info!(attempt, "Embedded daemon exited");
                return DaemonShutdown::Exited;
            }
            debug!(attempt, "Waiting for daemon to exit");
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }

        if daemon.is_running() {
            warn!("Daemon still running after {STOP_POLL_LIMIT} polls");
            DaemonShutdown::TimedOut
        } else {
            DaemonShutdown::Exited
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeLauncher, ScriptedTransport};
    use nodelink_config::DaemonProfile;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn session_with(daemon: Option<DaemonHandle>, daemonized: bool) -> (Session, ScriptedCalls) {
        let transport = ScriptedTransport::new(|_, _| Ok(json!("stopping")));
        let calls = transport.calls();
        let channel = Arc::new(RpcChannel::new(Arc::new(transport)));
        let conf = DaemonConf {
            daemonized,
            ..DaemonConf::unconfigured(&DaemonProfile::default())
        };
        (Session::new(channel, daemon, conf), calls)
    }

    type ScriptedCalls = Arc<parking_lot::Mutex<Vec<(String, Vec<serde_json::Value>)>>>;

    #[tokio::test]
    async fn test_replace_channel_shuts_down_previous() {
        let (mut session, _) = session_with(None, false);
        let old = Arc::clone(session.channel());
        let fresh = Arc::new(RpcChannel::new(Arc::new(ScriptedTransport::new(|_, _| {
            Ok(json!(null))
        }))));

        let returned = session.replace_channel(fresh.clone());
        assert!(Arc::ptr_eq(&returned, &old));
        assert!(old.is_shut_down());
        assert!(!session.channel().is_shut_down());
        assert!(Arc::ptr_eq(session.channel(), &fresh));
    }

    #[tokio::test]
    async fn test_shutdown_without_daemon_only_closes_channel() {
        let (mut session, calls) = session_with(None, false);
        assert_eq!(session.shutdown_daemon().await, DaemonShutdown::NotManaged);
        assert!(session.channel().is_shut_down());
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_daemonized_skips_wait() {
        let (mut session, calls) = session_with(Some(FakeLauncher::handle(true, "")), true);
        assert_eq!(session.shutdown_daemon().await, DaemonShutdown::Daemonized);
        assert_eq!(calls.lock()[0].0, "stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_exit() {
        let running = Arc::new(AtomicBool::new(true));
        let handle = DaemonHandle::new(Box::new(crate::test_support::FakeProcess {
            running: running.clone(),
            stderr: String::new(),
        }));
        let (mut session, calls) = session_with(Some(handle), false);

        let flip = running.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            flip.store(false, Ordering::SeqCst);
        });

        assert_eq!(session.shutdown_daemon().await, DaemonShutdown::Exited);
        assert_eq!(calls.lock().len(), 1);
        assert!(session.channel().is_shut_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_after_thirty_polls() {
        let (mut session, _) = session_with(Some(FakeLauncher::handle(true, "")), false);
        let started = tokio::time::Instant::now();
        assert_eq!(session.shutdown_daemon().await, DaemonShutdown::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }
}
