//! Locating and creating the daemon conf
//!
//! Lookup order:
//! 1. The path remembered in the client settings
//! 2. The platform-conventional location for the daemon profile
//!
//! The first existing file wins. When nothing is found the caller decides
//! between [`ConfigResolver::create`] and manual settings.

use crate::daemon_conf::{random_password, DaemonConf};
use crate::error::{ConfigError, ConfigResult};
use crate::settings::{ClientSettings, DaemonProfile};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// User choices applied to a freshly generated conf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfChoices {
    /// Custom chain data directory (`datadir=`)
    pub data_dir: Option<PathBuf>,
    /// Route peer traffic through a local Tor proxy
    pub use_tor: bool,
    pub fast_sync: bool,
}

/// Local Tor SOCKS endpoint written when `use_tor` is chosen
const TOR_PROXY: &str = "127.0.0.1:9050";

/// Request queue depth so batched wallet refreshes do not overflow the daemon
const RPC_WORK_QUEUE: u32 = 256;

#[derive(Debug, Clone)]
pub struct ConfigResolver {
    profile: DaemonProfile,
    remembered: Option<PathBuf>,
    default_paths: Vec<PathBuf>,
}

impl ConfigResolver {
    /// Resolver using the platform default location for `profile`
    pub fn new(profile: DaemonProfile) -> Self {
        let default_paths = profile.default_conf_path().into_iter().collect();
        Self {
            profile,
            remembered: None,
            default_paths,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        let mut resolver = Self::new(settings.daemon.clone());
        resolver.remembered = settings.conf_path.clone();
        resolver
    }

    pub fn with_remembered(mut self, path: impl Into<PathBuf>) -> Self {
        self.remembered = Some(path.into());
        self
    }

    /// Replace the platform default locations
    pub fn with_default_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.default_paths = paths;
        self
    }

    pub fn profile(&self) -> &DaemonProfile {
        &self.profile
    }

    /// Paths tried by [`locate`](Self::locate), in order
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::new();
        for path in self.remembered.iter().chain(self.default_paths.iter()) {
            if !out.contains(path) {
                out.push(path.clone());
            }
        }
        out
    }

    /// Parse the first existing candidate, `None` when there is none
    pub fn locate(&self) -> Option<DaemonConf> {
        for path in self.candidates() {
            if !path.is_file() {
                debug!(path = %path.display(), "No daemon conf here");
                continue;
            }
            // Lossy so a stray non-UTF-8 comment does not hide the whole file
            match std::fs::read(&path) {
                Ok(bytes) => {
                    info!(path = %path.display(), "Found daemon conf");
                    let text = String::from_utf8_lossy(&bytes);
                    return Some(DaemonConf::parse(&text, &self.profile, Some(&path)));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Daemon conf unreadable, skipping");
                }
            }
        }
        None
    }

    /// Where [`create`](Self::create) writes
    pub fn writable_location(&self) -> ConfigResult<PathBuf> {
        self.remembered
            .iter()
            .chain(self.default_paths.iter())
            .next()
            .cloned()
            .ok_or(ConfigError::NoDefaultLocation)
    }

    /// Render the text of a fresh conf with the given password
    pub fn render(&self, choices: &ConfChoices, password: &str) -> String {
        let mut text = format!("# Autogenerated by {}\n", env!("CARGO_PKG_NAME"));
        text.push_str("server=1\n");
        text.push_str(&format!("rpcuser={}\n", self.profile.rpc_user));
        text.push_str(&format!("rpcpassword={password}\n"));
        text.push_str(&format!("rpcport={}\n", self.profile.rpc_port));
        text.push_str(&format!("port={}\n", self.profile.p2p_port));
        text.push_str(&format!("rpcworkqueue={RPC_WORK_QUEUE}\n"));
        text.push_str("txindex=1\n");
        text.push_str("addressindex=1\n");

        if choices.fast_sync {
            text.push_str("fastsync=1\n");
        }
        if let Some(dir) = &choices.data_dir {
            text.push_str(&format!("datadir={}\n", dir.display()));
        }
        if choices.use_tor {
            text.push_str(&format!("proxy={TOR_PROXY}\n"));
        }
        text
    }

    /// Write a new conf with generated credentials and return it parsed
    ///
    /// Never touches an existing file: a conf already at the target is
    /// [`ConfigError::AlreadyExists`]. Any other failure to open or write
    /// the target is returned, never retried.
    pub fn create(&self, choices: &ConfChoices) -> ConfigResult<DaemonConf> {
        self.write_conf(choices, false)
    }

    /// Like [`create`](Self::create) but replaces whatever is at the target
    pub fn replace(&self, choices: &ConfChoices) -> ConfigResult<DaemonConf> {
        self.write_conf(choices, true)
    }

    fn write_conf(&self, choices: &ConfChoices, overwrite: bool) -> ConfigResult<DaemonConf> {
        let path = self.writable_location()?;
        let text = self.render(choices, &random_password());

        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "Daemon conf already exists, not overwriting");
                return Err(ConfigError::AlreadyExists { path: path.clone() });
            }
            Err(e) => return Err(write_err(e)),
        };
        file.write_all(text.as_bytes()).map_err(write_err)?;

        info!(path = %path.display(), "Created daemon conf");
        Ok(DaemonConf::parse(&text, &self.profile, Some(&path)))
    }

    /// Drop every `key=...` line for the given keys from the conf at `path`
    ///
    /// Other lines, including bytes that are not valid UTF-8, are written
    /// back unchanged. Returns whether anything was removed; the file is
    /// only rewritten in that case.
    pub fn remove_keys(&self, path: &Path, keys: &[&str]) -> ConfigResult<bool> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut kept = Vec::with_capacity(bytes.len());
        let mut removed = 0usize;
        for line in bytes.split_inclusive(|b| *b == b'\n') {
            if line_key_matches(line, keys) {
                removed += 1;
            } else {
                kept.extend_from_slice(line);
            }
        }
        if removed == 0 {
            return Ok(false);
        }

        std::fs::write(path, kept).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), removed, ?keys, "Removed one-shot keys from daemon conf");
        Ok(true)
    }
}

/// Whether `line` is a `key=value` line for one of `keys` (case-insensitive)
fn line_key_matches(line: &[u8], keys: &[&str]) -> bool {
    let Some(eq) = line.iter().position(|b| *b == b'=') else {
        return false;
    };
    let key = String::from_utf8_lossy(&line[..eq]);
    let key = key.trim();
    !key.starts_with('#') && keys.iter().any(|k| key.eq_ignore_ascii_case(k))
}
