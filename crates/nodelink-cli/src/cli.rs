use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "nodelink")]
#[command(about = "nodelink - connect to a local full-node daemon and talk JSON-RPC to it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, RUST_LOG is used, falling back to 'warn'
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file path (defaults to ~/.config/nodelink/config.toml)
    #[arg(short = 'C', long, global = true, env = "NODELINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report progress through the log only, without a spinner
    #[arg(long, global = true)]
    pub headless: bool,
}

impl Cli {
    /// Effective log filter from the flags; `None` defers to `RUST_LOG`
    pub fn log_filter(&self) -> Option<LevelFilter> {
        if self.verbose {
            return Some(LevelFilter::DEBUG);
        }
        self.log_level.map(LevelFilter::from)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the daemon, starting it if needed, and print its status
    Connect {
        /// Keep polling node status until interrupted
        #[arg(short, long)]
        watch: bool,

        /// Stop a daemon started by this command on exit
        #[arg(long)]
        stop: bool,
    },

    /// Send one RPC call and print the result
    ///
    /// Each parameter is parsed as JSON and sent as a string if that fails,
    /// so `nodelink call getblock 100` sends a number and
    /// `nodelink call z_listreceivedbyaddress zs1... 0` sends a string and a number.
    Call {
        /// RPC method name
        method: String,

        /// Positional parameters
        params: Vec<String>,
    },

    /// Download missing proving parameters
    Provision,

    /// Inspect or create the daemon conf file
    #[command(subcommand)]
    Conf(ConfCommands),

    /// Print the effective client settings as TOML
    Settings,
}

#[derive(Subcommand, Debug)]
pub enum ConfCommands {
    /// Show the daemon conf the client would use
    Show {
        /// Print the RPC password instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// Write a fresh daemon conf with generated credentials
    Create {
        /// Custom chain data directory
        #[arg(long)]
        datadir: Option<PathBuf>,

        /// Route peer traffic through a local Tor proxy
        #[arg(long)]
        tor: bool,

        /// Enable fast sync
        #[arg(long)]
        fast_sync: bool,

        /// Overwrite an existing conf
        #[arg(long)]
        force: bool,
    },
}
