//! Drives the client from "no connection" to a live [`Session`]
//!
//! ```text
//! VerifyingParams -> [Downloading -> VerifyingParams]
//!   -> ResolvingConfig -> [CreatingConfig | ManualFallback]
//!   -> Probing <-> {StartingDaemon, WaitingDaemonReady}
//!   -> Connected | Failed
//! ```
//!
//! Only the warm-up wait retries without bound. A refused connection starts
//! the local daemon (when allowed); two launch failures in a row are final.

use crate::channel::RpcChannel;
use crate::error::{ConnectError, FailureKind, LaunchError};
use crate::lifecycle::{DaemonHandle, DaemonLauncher, ProcessLauncher};
use crate::notify::{ConnectStatus, ErrorLatch, Notifier};
use crate::provision::ParameterProvisioner;
use crate::session::Session;
use crate::transport::{HttpTransportFactory, TransportFactory};
use nodelink_config::{ClientSettings, ConfigResolver, ConnectTimings, DaemonConf};
use nodelink_protocol::RpcRequest;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinator states, reported to the observer on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    VerifyingParams,
    Downloading,
    ResolvingConfig,
    CreatingConfig,
    ManualFallback,
    Probing,
    StartingDaemon,
    WaitingDaemonReady,
    Connected,
    Failed,
}

impl fmt::Display for ConnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

type StateObserver = Box<dyn Fn(ConnectState) + Send + Sync>;

/// Where the configuration being tried came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Found or created on disk; the local daemon may be started for it
    DaemonConf,
    /// Manual settings; never starts a daemon
    Manual,
}

pub struct AutoConnect {
    settings: ClientSettings,
    resolver: ConfigResolver,
    provisioner: ParameterProvisioner,
    transports: Arc<dyn TransportFactory>,
    launcher: Box<dyn DaemonLauncher>,
    notifier: Arc<dyn Notifier>,
    latch: Arc<ErrorLatch>,
    status: ConnectStatus,
    daemon: Option<DaemonHandle>,
    observer: Option<StateObserver>,
}

impl AutoConnect {
    /// Coordinator wired to the real HTTP transport, downloader and launcher
    pub fn new(settings: ClientSettings, notifier: Arc<dyn Notifier>) -> Result<Self, ConnectError> {
        let factory = HttpTransportFactory::new()
            .map_err(|e| ConnectError::UnknownTransport(e.message))?;
        let provisioner = ParameterProvisioner::new(factory.client().clone(), &settings.params);

        Ok(Self {
            resolver: ConfigResolver::from_settings(&settings),
            launcher: Box::new(ProcessLauncher::from_profile(&settings.daemon)),
            provisioner,
            transports: Arc::new(factory),
            notifier,
            latch: Arc::new(ErrorLatch::new()),
            status: ConnectStatus::new(),
            daemon: None,
            observer: None,
            settings,
        })
    }

    pub fn with_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_provisioner(mut self, provisioner: ParameterProvisioner) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn with_transports(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_launcher(mut self, launcher: Box<dyn DaemonLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Share the fatal-error latch with other reporters of this session
    pub fn with_latch(mut self, latch: Arc<ErrorLatch>) -> Self {
        self.latch = latch;
        self
    }

    /// Adopt a daemon started by an earlier attempt
    pub fn with_daemon(mut self, daemon: DaemonHandle) -> Self {
        self.daemon = Some(daemon);
        self
    }

    pub fn on_state<F>(mut self, observer: F) -> Self
    where
        F: Fn(ConnectState) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Run to completion, handing over the session or the reason it failed
    ///
    /// A failure is reported through the notifier once, guarded by the latch.
    pub async fn run(mut self) -> Result<Session, ConnectError> {
        match self.establish().await {
            Ok(session) => {
                self.enter(ConnectState::Connected);
                Ok(session)
            }
            Err(err) => {
                self.enter(ConnectState::Failed);
                if let Some(daemon) = self.daemon.take() {
                    warn!(pid = ?daemon.id(), "Releasing daemon handle after failed connect");
                }
                self.latch.report(self.notifier.as_ref(), &err.to_string());
                Err(err)
            }
        }
    }

    fn enter(&self, state: ConnectState) {
        info!(%state, "Connect state");
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    fn inform(&mut self, title: &str, detail: &str) {
        let (detail, log) = self.status.decorate(detail);
        if log {
            info!(detail = %detail, "{title}");
        }
        self.notifier.show_information(title, &detail);
    }

    fn timings(&self) -> &ConnectTimings {
        &self.settings.timings
    }

    async fn establish(&mut self) -> Result<Session, ConnectError> {
        self.ensure_params().await?;
        let (conf, origin) = self.resolve_config()?;
        self.connect_with(conf, origin).await
    }

    async fn ensure_params(&mut self) -> Result<(), ConnectError> {
        self.enter(ConnectState::VerifyingParams);
        if self.provisioner.locate_params().is_some() {
            return Ok(());
        }

        self.enter(ConnectState::Downloading);
        let notifier = Arc::clone(&self.notifier);
        self.provisioner
            .provision(|progress| notifier.show_information(&progress.title(), &progress.detail()))
            .await
            .map_err(ConnectError::DownloadFailed)?;
        self.inform("All Downloads Finished Successfully!", "");

        self.enter(ConnectState::VerifyingParams);
        if self.provisioner.locate_params().is_none() {
            return Err(ConnectError::ParamsMissing(self.provisioner.missing()));
        }
        Ok(())
    }

    fn resolve_config(&mut self) -> Result<(DaemonConf, Origin), ConnectError> {
        self.enter(ConnectState::ResolvingConfig);
        if let Some(conf) = self.resolver.locate() {
            return Ok((conf, Origin::DaemonConf));
        }

        if self.settings.use_embedded {
            self.enter(ConnectState::CreatingConfig);
            let conf = self
                .resolver
                .create(&self.settings.create)
                .map_err(ConnectError::ConfigWriteFailed)?;
            return Ok((conf, Origin::DaemonConf));
        }

        self.enter(ConnectState::ManualFallback);
        let conf = self
            .settings
            .manual
            .to_conf(&self.settings.daemon)
            .ok_or(ConnectError::ManualNotConfigured)?;
        Ok((conf, Origin::Manual))
    }

    async fn connect_with(&mut self, conf: DaemonConf, origin: Origin) -> Result<Session, ConnectError> {
        let transport = self
            .transports
            .build(&conf)
            .map_err(|e| ConnectError::UnknownTransport(e.message))?;
        let channel = Arc::new(RpcChannel::new(transport).with_notifier(Arc::clone(&self.notifier)));

        let mut try_launch = true;
        let mut last_launch_error: Option<LaunchError> = None;

        loop {
            self.enter(ConnectState::Probing);
            let failure = match channel.request(RpcRequest::new("getinfo")).await {
                Ok(_) => {
                    info!(endpoint = %channel.endpoint(), "Daemon is online");
                    if origin == Origin::DaemonConf {
                        self.clear_one_shot_flags(&conf);
                    }
                    return Ok(Session::new(channel, self.daemon.take(), conf));
                }
                Err(failure) => failure,
            };

            match failure.kind {
                FailureKind::ConnectionRefused => {
                    if origin == Origin::Manual {
                        return Err(ConnectError::ManualRefused { url: conf.url() });
                    }
                    if !self.settings.use_embedded {
                        return Err(ConnectError::EmbeddedDisabled { url: conf.url() });
                    }

                    self.enter(ConnectState::StartingDaemon);
                    if !try_launch {
                        return Err(ConnectError::DaemonLaunchFailed {
                            daemonized: conf.daemonized,
                            detail: last_launch_error.map(|e| e.to_string()),
                        });
                    }

                    self.inform("Starting embedded daemon", "");
                    match self.start_daemon(&conf) {
                        Ok(()) => {
                            debug!("Daemon started, retrying getinfo shortly");
                            tokio::time::sleep(self.timings().launch_settle()).await;
                        }
                        Err(e) => {
                            warn!(error = %e, daemonized = conf.daemonized, "Daemon launch failed");
                            try_launch = false;
                            let wait = if conf.daemonized {
                                self.inform("The daemon is set to run as daemon", "Waiting for it to start");
                                self.timings().daemonized_wait()
                            } else {
                                self.timings().launch_retry()
                            };
                            last_launch_error = Some(e);
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
                FailureKind::AuthFailed => return Err(ConnectError::AuthFailed),
                FailureKind::ServerError if failure.is_server_initializing() => {
                    self.enter(ConnectState::WaitingDaemonReady);
                    let message = failure.user_message();
                    let detail = self.status.rotate(&message);
                    self.inform("Your daemon is starting up. Please wait.", &detail);
                    tokio::time::sleep(self.timings().warmup_poll()).await;
                }
                _ => return Err(ConnectError::UnknownTransport(failure.user_message())),
            }
        }
    }

    /// `rescan` and `reindex` apply to one daemon start only
    fn clear_one_shot_flags(&self, conf: &DaemonConf) {
        let Some(path) = conf.path.as_deref() else {
            return;
        };
        if let Err(e) = self.resolver.remove_keys(path, &["rescan", "reindex"]) {
            warn!(error = %e, "Could not clear rescan/reindex from daemon conf");
        }
    }

    /// Start the daemon unless this coordinator already owns one
    ///
    /// An owned daemon that is still running counts as started; one that
    /// exited is a failure carrying its stderr.
    fn start_daemon(&mut self, conf: &DaemonConf) -> Result<(), LaunchError> {
        if let Some(daemon) = self.daemon.as_mut() {
            if daemon.is_running() {
                debug!(pid = ?daemon.id(), "Daemon already running");
                return Ok(());
            }
            return Err(LaunchError::Exited {
                stderr: daemon.stderr_output(),
            });
        }

        let handle = self.launcher.launch(conf)?;
        self.daemon = Some(handle);
        Ok(())
    }
}
