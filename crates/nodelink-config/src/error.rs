use std::path::PathBuf;

/// Errors from reading or writing configuration files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The daemon conf could not be created or written
    #[error("could not create {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `create` found a conf already in place and left it alone
    #[error("daemon conf already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// A configuration file exists but could not be read
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The client settings file is not valid TOML for [`crate::ClientSettings`]
    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No home directory to derive a default location from
    #[error("no default location for the daemon configuration (home directory unknown)")]
    NoDefaultLocation,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
