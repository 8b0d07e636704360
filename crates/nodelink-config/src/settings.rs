//! Static client settings
//!
//! Read once at startup from `$XDG_CONFIG_HOME/nodelink/config.toml` (or the
//! path in `NODELINK_CONFIG`). Every field has a default, so a missing file
//! yields a usable configuration.
//!
//! ```toml
//! use_embedded = true
//!
//! [daemon]
//! binary = "safecoind"
//! rpc_port = 8771
//!
//! [manual]
//! host = "10.0.0.5"
//! port = 8771
//! rpc_user = "alice"
//! rpc_password = "secret"
//!
//! [intervals]
//! update_secs = 20
//! quick_update_secs = 5
//! ```

use crate::daemon_conf::{ConnectionKind, DaemonConf};
use crate::error::{ConfigError, ConfigResult};
use crate::resolver::ConfChoices;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "NODELINK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Start and manage a local daemon when none answers
    pub use_embedded: bool,
    /// Daemon conf path remembered from a previous run
    pub conf_path: Option<PathBuf>,
    /// No interactive surface; notifications only go to the log
    pub headless: bool,
    pub daemon: DaemonProfile,
    pub manual: ManualConnection,
    pub params: ParamsSettings,
    pub intervals: Intervals,
    pub timings: ConnectTimings,
    /// Choices applied when a fresh daemon conf is written
    pub create: ConfChoices,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            use_embedded: true,
            conf_path: None,
            headless: false,
            daemon: DaemonProfile::default(),
            manual: ManualConnection::default(),
            params: ParamsSettings::default(),
            intervals: Intervals::default(),
            timings: ConnectTimings::default(),
            create: ConfChoices::default(),
        }
    }
}

impl ClientSettings {
    /// Default settings path: `$XDG_CONFIG_HOME/nodelink/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join("nodelink")
            .join("config.toml")
    }

    /// Load settings from `path`, `$NODELINK_CONFIG`, or the default path
    ///
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os(SETTINGS_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(Self::default_path),
        };

        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        toml::from_str(content)
    }
}

/// Everything that identifies the daemon flavour being driven
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonProfile {
    /// Executable name looked up next to the current executable
    pub binary: String,
    /// Explicit executable path, wins over `binary`
    pub binary_path: Option<PathBuf>,
    pub conf_file: String,
    /// Conf directory relative to `$HOME` on Linux and other unixes
    pub conf_dir_unix: String,
    /// Conf directory relative to `$HOME` on macOS
    pub conf_dir_macos: String,
    /// Conf directory relative to the roaming app-data directory on Windows
    pub conf_dir_windows: String,
    pub host: String,
    pub rpc_port: u16,
    pub testnet_rpc_port: u16,
    pub p2p_port: u16,
    /// RPC user written into generated conf files
    pub rpc_user: String,
}

impl Default for DaemonProfile {
    fn default() -> Self {
        Self {
            binary: "safecoind".to_string(),
            binary_path: None,
            conf_file: "safecoin.conf".to_string(),
            conf_dir_unix: ".safecoin".to_string(),
            conf_dir_macos: "Library/Application Support/Safecoin".to_string(),
            conf_dir_windows: "Safecoin".to_string(),
            host: "127.0.0.1".to_string(),
            rpc_port: 8771,
            testnet_rpc_port: 18771,
            p2p_port: 8770,
            rpc_user: "safecoin".to_string(),
        }
    }
}

impl DaemonProfile {
    /// Platform-conventional location of the daemon conf
    pub fn default_conf_path(&self) -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            dirs::data_dir().map(|d| d.join(&self.conf_dir_windows).join(&self.conf_file))
        } else if cfg!(target_os = "macos") {
            dirs::home_dir().map(|h| h.join(&self.conf_dir_macos).join(&self.conf_file))
        } else {
            dirs::home_dir().map(|h| h.join(&self.conf_dir_unix).join(&self.conf_file))
        }
    }

    /// Executable file name with the platform suffix
    pub fn binary_file_name(&self) -> String {
        if cfg!(target_os = "windows") {
            format!("{}.exe", self.binary)
        } else {
            self.binary.clone()
        }
    }
}

/// Connection settings entered by hand for an external daemon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConnection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
}

impl ManualConnection {
    /// Build a connection config; `None` unless both user and password are set
    pub fn to_conf(&self, profile: &DaemonProfile) -> Option<DaemonConf> {
        let user = self.rpc_user.as_deref().filter(|u| !u.is_empty())?;
        let password = self.rpc_password.as_deref().filter(|p| !p.is_empty())?;

        Some(DaemonConf {
            host: self
                .host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| profile.host.clone()),
            port: self.port.unwrap_or(profile.rpc_port),
            rpc_user: user.to_string(),
            rpc_password: password.to_string(),
            kind: ConnectionKind::UiSettings,
            ..DaemonConf::unconfigured(profile)
        })
    }
}

/// Resource files the daemon needs before it can start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsSettings {
    /// Download destination; platform default when unset
    pub dir: Option<PathBuf>,
    /// Ordered download queue
    pub urls: Vec<String>,
    /// Files whose presence means the params are installed
    pub required: Vec<String>,
    /// Directories searched, in order, before the params directory
    pub search_dirs: Vec<PathBuf>,
}

impl Default for ParamsSettings {
    fn default() -> Self {
        Self {
            dir: None,
            urls: [
                "https://z.cash/downloads/sapling-output.params",
                "https://z.cash/downloads/sapling-spend.params",
                "https://z.cash/downloads/sprout-proving.key",
                "https://z.cash/downloads/sprout-verifying.key",
                "https://z.cash/downloads/sprout-groth16.params",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            required: vec![
                "sapling-output.params".to_string(),
                "sapling-spend.params".to_string(),
            ],
            search_dirs: vec![
                PathBuf::from("."),
                PathBuf::from(".."),
                PathBuf::from("../safecoin"),
            ],
        }
    }
}

impl ParamsSettings {
    pub fn params_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        let platform = if cfg!(target_os = "windows") {
            dirs::data_dir().map(|d| d.join("ZcashParams"))
        } else if cfg!(target_os = "macos") {
            dirs::home_dir().map(|h| h.join("Library/Application Support/ZcashParams"))
        } else {
            dirs::home_dir().map(|h| h.join(".zcash-params"))
        };
        platform.unwrap_or_else(|| PathBuf::from(".zcash-params"))
    }

    /// Search order: configured directories, then the params directory
    pub fn search_order(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::with_capacity(self.search_dirs.len() + 1);
        for dir in self.search_dirs.iter().cloned().chain([self.params_dir()]) {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }
}

/// Refresh cadence handed to the background pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervals {
    pub update_secs: u64,
    pub quick_update_secs: u64,
    pub price_refresh_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            update_secs: 20,
            quick_update_secs: 5,
            price_refresh_secs: 60 * 60,
        }
    }
}

impl Intervals {
    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn quick_update(&self) -> Duration {
        Duration::from_secs(self.quick_update_secs)
    }

    pub fn price_refresh(&self) -> Duration {
        Duration::from_secs(self.price_refresh_secs)
    }
}

/// Fixed delays used while establishing a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectTimings {
    /// Wait after a successful launch before trying getinfo again
    pub launch_settle_ms: u64,
    /// Wait after a failed launch when the conf has `daemon=1`
    pub daemonized_wait_ms: u64,
    /// Wait after a failed launch otherwise
    pub launch_retry_ms: u64,
    /// Retry interval while the daemon is warming up
    pub warmup_poll_ms: u64,
}

impl Default for ConnectTimings {
    fn default() -> Self {
        Self {
            launch_settle_ms: 1_000,
            daemonized_wait_ms: 5_000,
            launch_retry_ms: 2_000,
            warmup_poll_ms: 10_000,
        }
    }
}

impl ConnectTimings {
    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn daemonized_wait(&self) -> Duration {
        Duration::from_millis(self.daemonized_wait_ms)
    }

    pub fn launch_retry(&self) -> Duration {
        Duration::from_millis(self.launch_retry_ms)
    }

    pub fn warmup_poll(&self) -> Duration {
        Duration::from_millis(self.warmup_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = ClientSettings::load(Some(&tmp.path().join("nope.toml"))).unwrap();
        assert_eq!(settings, ClientSettings::default());
        assert!(settings.use_embedded);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = ClientSettings::from_toml_str(
            r#"
            use_embedded = false

            [intervals]
            quick_update_secs = 1

            [manual]
            host = "10.0.0.5"
            rpc_user = "alice"
            rpc_password = "secret"
            "#,
        )
        .unwrap();

        assert!(!settings.use_embedded);
        assert_eq!(settings.intervals.quick_update(), Duration::from_secs(1));
        assert_eq!(settings.intervals.update(), Duration::from_secs(20));
        assert_eq!(settings.daemon.rpc_port, 8771);
        assert_eq!(settings.manual.host.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "use_embedded = \"maybe\"").unwrap();

        let err = ClientSettings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_manual_connection_requires_credentials() {
        let profile = DaemonProfile::default();
        let mut manual = ManualConnection {
            host: Some("10.0.0.5".into()),
            port: Some(9000),
            rpc_user: Some("alice".into()),
            rpc_password: Some(String::new()),
        };
        assert!(manual.to_conf(&profile).is_none());

        manual.rpc_password = Some("secret".into());
        let conf = manual.to_conf(&profile).unwrap();
        assert_eq!(conf.host, "10.0.0.5");
        assert_eq!(conf.port, 9000);
        assert_eq!(conf.kind, ConnectionKind::UiSettings);
        assert!(conf.path.is_none());
    }

    #[test]
    fn test_manual_connection_falls_back_to_profile_host_and_port() {
        let profile = DaemonProfile::default();
        let manual = ManualConnection {
            host: None,
            port: None,
            rpc_user: Some("alice".into()),
            rpc_password: Some("secret".into()),
        };
        let conf = manual.to_conf(&profile).unwrap();
        assert_eq!(conf.host, "127.0.0.1");
        assert_eq!(conf.port, 8771);
    }

    #[test]
    fn test_search_order_ends_with_params_dir_without_duplicates() {
        let params = ParamsSettings {
            dir: Some(PathBuf::from("/srv/params")),
            search_dirs: vec![
                PathBuf::from("."),
                PathBuf::from("/srv/params"),
                PathBuf::from("."),
            ],
            ..ParamsSettings::default()
        };
        assert_eq!(
            params.search_order(),
            vec![PathBuf::from("."), PathBuf::from("/srv/params")]
        );
    }

    #[test]
    fn test_default_conf_path_uses_conf_file_name() {
        let profile = DaemonProfile::default();
        if let Some(path) = profile.default_conf_path() {
            assert!(path.ends_with("safecoin.conf"));
        }
    }
}
