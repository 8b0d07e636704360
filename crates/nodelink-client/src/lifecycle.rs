//! Local daemon process supervision
//!
//! The daemon binary lives next to the current executable (or at an explicit
//! path). It is started without arguments from that directory; its stderr is
//! captured so a failed start can be explained to the user.

use crate::error::LaunchError;
use nodelink_config::{DaemonConf, DaemonProfile};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// A running (or formerly running) daemon process
pub trait DaemonProcess: Send + fmt::Debug {
    fn is_running(&mut self) -> bool;

    /// Everything the process wrote to stderr so far
    fn stderr_output(&self) -> String;

    fn id(&self) -> Option<u32>;
}

/// Owned handle to the daemon this client started
///
/// Dropping the handle does not stop the daemon; use
/// `Session::shutdown_daemon` for an orderly stop.
#[derive(Debug)]
pub struct DaemonHandle {
    process: Box<dyn DaemonProcess>,
}

impl DaemonHandle {
    pub fn new(process: Box<dyn DaemonProcess>) -> Self {
        Self { process }
    }

    pub fn is_running(&mut self) -> bool {
        self.process.is_running()
    }

    pub fn stderr_output(&self) -> String {
        self.process.stderr_output()
    }

    pub fn id(&self) -> Option<u32> {
        self.process.id()
    }
}

/// Starts the daemon for a connection configuration
pub trait DaemonLauncher: Send + Sync {
    fn launch(&self, conf: &DaemonConf) -> Result<DaemonHandle, LaunchError>;
}

/// Spawns the real daemon binary
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    binary_name: String,
    binary_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn from_profile(profile: &DaemonProfile) -> Self {
        Self {
            binary_name: profile.binary_file_name(),
            binary_path: profile.binary_path.clone(),
        }
    }

    /// Explicit path, or the binary next to the current executable
    pub fn resolve_binary(&self) -> Result<PathBuf, LaunchError> {
        let path = match &self.binary_path {
            Some(path) => path.clone(),
            None => {
                let exe = std::env::current_exe().map_err(LaunchError::ExecutableDir)?;
                let dir = exe.parent().ok_or_else(|| {
                    LaunchError::ExecutableDir(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "executable has no parent directory",
                    ))
                })?;
                dir.join(&self.binary_name)
            }
        };

        if !path.is_file() {
            debug!(path = %path.display(), "Daemon binary missing");
            return Err(LaunchError::BinaryNotFound(path));
        }
        info!(path = %path.display(), "Found daemon binary");
        Ok(path)
    }
}

impl DaemonLauncher for ProcessLauncher {
    fn launch(&self, conf: &DaemonConf) -> Result<DaemonHandle, LaunchError> {
        let binary = self.resolve_binary()?;
        let workdir = binary
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        debug!(
            binary = %binary.display(),
            conf = ?conf.path,
            "Spawning daemon"
        );

        let mut child = Command::new(&binary)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                path: binary.clone(),
                source,
            })?;

        let stderr = Arc::new(Mutex::new(String::new()));
        if let Some(pipe) = child.stderr.take() {
            let sink = Arc::clone(&stderr);
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "nodelink::daemon", "{line}");
                    let mut buf = sink.lock();
                    buf.push_str(&line);
                    buf.push('\n');
                }
            });
        }

        info!(pid = ?child.id(), "Embedded daemon started");
        Ok(DaemonHandle::new(Box::new(ChildProcess { child, stderr })))
    }
}

struct ChildProcess {
    child: Child,
    stderr: Arc<Mutex<String>>,
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

impl DaemonProcess for ChildProcess {
    fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(%status, "Daemon exited");
                false
            }
            Err(e) => {
                warn!(error = %e, "Could not poll daemon process");
                false
            }
        }
    }

    fn stderr_output(&self) -> String {
        self.stderr.lock().trim_end().to_string()
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}
