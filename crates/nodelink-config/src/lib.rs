//! # nodelink configuration
//!
//! Two sources of configuration feed the connection layer:
//!
//! - the daemon's own `key=value` conf file, located or synthesized by
//!   [`ConfigResolver`] and parsed into a [`DaemonConf`]
//! - the client's static [`ClientSettings`] (TOML), which carries refresh
//!   intervals, toggles, the manual connection fallback and the daemon
//!   profile (binary name, conf locations, default ports)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nodelink_config::{ClientSettings, ConfigResolver};
//!
//! let settings = ClientSettings::load(None)?;
//! let resolver = ConfigResolver::from_settings(&settings);
//! match resolver.locate() {
//!     Some(conf) => println!("daemon at {}:{}", conf.host, conf.port),
//!     None => println!("no daemon conf yet"),
//! }
//! # Ok::<(), nodelink_config::ConfigError>(())
//! ```

#![warn(clippy::all)]

mod daemon_conf;
mod error;
mod resolver;
mod settings;

pub use daemon_conf::{random_password, ConnectionKind, DaemonConf, PASSWORD_LENGTH};
pub use error::{ConfigError, ConfigResult};
pub use resolver::{ConfChoices, ConfigResolver};
pub use settings::{
    ClientSettings, ConnectTimings, DaemonProfile, Intervals, ManualConnection, ParamsSettings,
};
