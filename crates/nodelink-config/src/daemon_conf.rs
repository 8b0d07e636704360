//! The daemon's own `key=value` conf file

use crate::settings::DaemonProfile;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Length of generated RPC passwords
pub const PASSWORD_LENGTH: usize = 10;

const PASSWORD_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Where a connection configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Parsed from a conf file on disk
    DetectedConf,
    /// Entered by hand in the client settings
    UiSettings,
    Unconfigured,
}

/// Connection configuration for one daemon
///
/// Built once by the resolver (or from manual settings) and then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConf {
    pub host: String,
    pub port: u16,
    pub rpc_user: String,
    pub rpc_password: String,
    pub kind: ConnectionKind,
    /// `daemon=1`: the daemon forks itself into the background
    pub daemonized: bool,
    pub testnet: bool,
    pub fast_sync: bool,
    pub tx_index: bool,
    pub address_index: bool,
    pub spent_index: bool,
    pub timestamp_index: bool,
    pub data_dir: Option<PathBuf>,
    pub proxy: Option<String>,
    /// File this configuration was read from
    pub path: Option<PathBuf>,
}

impl DaemonConf {
    /// Empty configuration carrying the profile's default host and port
    pub fn unconfigured(profile: &DaemonProfile) -> Self {
        Self {
            host: profile.host.clone(),
            port: profile.rpc_port,
            rpc_user: String::new(),
            rpc_password: String::new(),
            kind: ConnectionKind::Unconfigured,
            daemonized: false,
            testnet: false,
            fast_sync: false,
            tx_index: false,
            address_index: false,
            spent_index: false,
            timestamp_index: false,
            data_dir: None,
            proxy: None,
            path: None,
        }
    }

    /// Parse conf text
    ///
    /// Keys are case-insensitive, later lines win, unknown keys and lines
    /// without `=` are ignored. `testnet=1` switches to the testnet RPC port
    /// unless a `rpcport` line came before it; a `rpcport` line after it
    /// still wins.
    pub fn parse(text: &str, profile: &DaemonProfile, path: Option<&Path>) -> Self {
        let mut conf = Self {
            kind: ConnectionKind::DetectedConf,
            path: path.map(Path::to_path_buf),
            ..Self::unconfigured(profile)
        };
        let mut port: Option<u16> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "rpcuser" => conf.rpc_user = value.to_string(),
                "rpcpassword" => conf.rpc_password = value.to_string(),
                "rpcport" => match value.parse() {
                    Ok(p) => port = Some(p),
                    Err(_) => trace!(value, "Ignoring unparseable rpcport"),
                },
                "testnet" => {
                    conf.testnet = value == "1";
                    if conf.testnet && port.is_none() {
                        port = Some(profile.testnet_rpc_port);
                    }
                }
                "daemon" => conf.daemonized = value == "1",
                "fastsync" => conf.fast_sync = value == "1",
                "txindex" => conf.tx_index = value == "1",
                "addressindex" => conf.address_index = value == "1",
                "spentindex" => conf.spent_index = value == "1",
                "timestampindex" => conf.timestamp_index = value == "1",
                "datadir" if !value.is_empty() => conf.data_dir = Some(PathBuf::from(value)),
                "proxy" if !value.is_empty() => conf.proxy = Some(value.to_string()),
                _ => {}
            }
        }

        conf.port = port.unwrap_or(profile.rpc_port);
        conf
    }

    /// `http://host:port/`
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Uniform random alphanumeric password of [`PASSWORD_LENGTH`] characters
pub fn random_password() -> String {
    // 248 is the largest multiple of the alphabet size that fits in a byte
    let limit = (u8::MAX as usize + 1) / PASSWORD_ALPHABET.len() * PASSWORD_ALPHABET.len();
    let mut password = String::with_capacity(PASSWORD_LENGTH);
    while password.len() < PASSWORD_LENGTH {
        let byte = rand::random::<u8>() as usize;
        if byte < limit {
            password.push(PASSWORD_ALPHABET[byte % PASSWORD_ALPHABET.len()] as char);
        }
    }
    password
}
