//! Connection layer between a wallet front end and a local full-node daemon
//!
//! The pieces, bottom up:
//!
//! - [`Transport`] posts one JSON-RPC body over HTTP with basic auth and
//!   classifies failures ([`FailureKind`]).
//! - [`RpcChannel`] dispatches requests and owns the one-way shutdown gate.
//! - [`BatchCorrelator`] fans out keyed requests and joins the results.
//! - [`TxWatchPoller`] resolves submitted operations by polling
//!   `z_getoperationstatus`.
//! - [`AutoConnect`] drives startup: parameter files, daemon config,
//!   connecting, launching an embedded daemon, warm-up. It yields a [`Session`].
//! - [`flows`] chains batches into wallet refreshes: addresses, balances,
//!   transaction history, key export, and submitting a send.
//!
//! ```no_run
//! use nodelink_client::{AutoConnect, TracingNotifier};
//! use nodelink_config::ClientSettings;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ClientSettings::load(None)?;
//! let session = AutoConnect::new(settings, Arc::new(TracingNotifier))?.run().await?;
//! let info = session
//!     .channel()
//!     .request(nodelink_protocol::RpcRequest::new("getinfo"))
//!     .await?;
//! println!("{info}");
//! # Ok(())
//! # }
//! ```

mod batch;
mod channel;
mod coordinator;
mod error;
pub mod flows;
mod heartbeat;
pub mod lifecycle;
mod notify;
mod poller;
mod provision;
mod session;
mod transport;

#[cfg(test)]
mod test_support;

pub use batch::BatchCorrelator;
pub use channel::RpcChannel;
pub use coordinator::{AutoConnect, ConnectState};
pub use error::{ConnectError, FailureKind, LaunchError, ProvisionError, RpcFailure};
pub use heartbeat::{Heartbeat, NodeStatus};
pub use lifecycle::{DaemonHandle, DaemonLauncher, DaemonProcess, ProcessLauncher};
pub use notify::{ConnectStatus, ErrorLatch, Notifier, RecordingNotifier, TracingNotifier};
pub use poller::TxWatchPoller;
pub use provision::{DownloadProgress, ParameterProvisioner, ProvisionSummary};
pub use session::{DaemonShutdown, Session};
pub use transport::{HttpTransport, HttpTransportFactory, Transport, TransportFactory};
