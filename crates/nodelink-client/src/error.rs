//! Error types for the connection layer

use nodelink_config::ConfigError;
use nodelink_protocol::RpcErrorBody;
use serde_json::Value;
use std::path::PathBuf;

/// Transport-level classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nothing listens on the daemon's RPC port
    ConnectionRefused,
    /// HTTP 401 or 403
    AuthFailed,
    /// HTTP 500; with a JSON body this is how the daemon reports RPC errors
    ServerError,
    /// Any other non-success HTTP status
    Http(u16),
    /// Connection reset, timeout, DNS, ...
    Network,
    /// Transport succeeded but the body was not a JSON object
    Malformed,
    /// The channel was shut down; never delivered to callbacks
    ShutDown,
}

/// A failed RPC call
///
/// `body` is the best-effort parse of whatever the daemon sent back, `None`
/// when it was empty, `null`, or not JSON.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RpcFailure {
    pub kind: FailureKind,
    pub message: String,
    pub body: Option<Value>,
}

impl RpcFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body.filter(|b| !b.is_null());
        self
    }

    pub fn unknown() -> Self {
        Self::new(FailureKind::Malformed, "Unknown error")
    }

    pub fn shut_down() -> Self {
        Self::new(FailureKind::ShutDown, "channel is shut down")
    }

    /// HTTP 500 carrying a non-null body: the daemon is up but still loading
    /// (or rejected the call with a structured error)
    pub fn is_server_initializing(&self) -> bool {
        self.kind == FailureKind::ServerError && self.body.is_some()
    }

    /// The daemon's structured `error` object, if it sent one
    pub fn error_body(&self) -> Option<RpcErrorBody> {
        let error = self.body.as_ref()?.get("error")?;
        serde_json::from_value(error.clone()).ok()
    }

    /// Daemon error message when present, transport message otherwise
    pub fn user_message(&self) -> String {
        self.error_body()
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.message.clone())
    }
}

/// Errors while downloading parameter files
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("could not create params directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloading {file} failed: {message}")]
    Download { file: String, message: String },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while starting the local daemon process
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("daemon binary not found at {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("could not determine the executable directory: {0}")]
    ExecutableDir(#[source] std::io::Error),

    #[error("could not start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A previously launched daemon is no longer running
    #[error("daemon said: {stderr}")]
    Exited { stderr: String },
}

/// Terminal outcome of the connection coordinator
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Could not create the daemon configuration: {0}")]
    ConfigWriteFailed(#[source] ConfigError),

    #[error("{0}. Please check the help site for more info")]
    DownloadFailed(#[source] ProvisionError),

    #[error("Required parameter files are still missing after download: {}", .0.join(", "))]
    ParamsMissing(Vec<String>),

    #[error(
        "Authentication failed. The username / password you specified was not accepted \
         by the daemon. Check rpcuser and rpcpassword in the daemon configuration."
    )]
    AuthFailed,

    /// The daemon could not be started twice in a row
    #[error("{}", launch_explanation(*daemonized, detail.as_deref()))]
    DaemonLaunchFailed {
        daemonized: bool,
        detail: Option<String>,
    },

    #[error("Unexpected error talking to the daemon: {0}")]
    UnknownTransport(String),

    #[error(
        "A manual connection was requested, but the settings are not configured.\n\n\
         Please set host, port, rpc_user and rpc_password in the [manual] section."
    )]
    ManualNotConfigured,

    #[error(
        "Could not connect to the daemon configured in settings ({url}).\n\n\
         Please check host, port, rpc_user and rpc_password in the [manual] section."
    )]
    ManualRefused { url: String },

    #[error(
        "Couldn't connect to the daemon configured at {url}.\n\n\
         Not starting the embedded daemon because use_embedded is off."
    )]
    EmbeddedDisabled { url: String },
}

fn launch_explanation(daemonized: bool, detail: Option<&str>) -> String {
    if daemonized {
        return "Your daemon is set to start as a daemon, which the wallet cannot supervise.\n\n\
                Please remove the line daemon=1 from the daemon configuration and restart."
            .to_string();
    }
    let mut text = "Couldn't start the embedded daemon.\n\n\
                    Please try restarting.\n\n\
                    If you previously started the daemon with custom arguments, you might need \
                    to reset its configuration.\n\n\
                    If all else fails, please run the daemon manually."
        .to_string();
    if let Some(detail) = detail {
        text.push_str("\n\nThe process returned:\n\n");
        text.push_str(detail);
    }
    text
}
