//! Periodic `getinfo` with best-effort network statistics

use crate::batch::BatchCorrelator;
use crate::channel::RpcChannel;
use crate::error::FailureKind;
use nodelink_protocol::RpcRequest;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const STATS_METHODS: [&str; 3] = ["getnetworksolps", "getnetworkinfo", "getblockchaininfo"];

/// Node snapshot assembled from one heartbeat
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeStatus {
    pub blocks: i64,
    pub longest_chain: i64,
    pub connections: i64,
    pub version: i64,
    pub testnet: bool,
    pub notarized: i64,
    pub sol_rate: Option<i64>,
    pub subversion: Option<String>,
    pub chain: Option<String>,
    pub verification_progress: Option<f64>,
}

impl NodeStatus {
    fn from_getinfo(info: &Value) -> Self {
        Self {
            blocks: info["blocks"].as_i64().unwrap_or_default(),
            longest_chain: info["longestchain"].as_i64().unwrap_or_default(),
            connections: info["connections"].as_i64().unwrap_or_default(),
            version: info["version"].as_i64().unwrap_or_default(),
            testnet: info["testnet"].as_bool().unwrap_or_default(),
            notarized: info["notarized"].as_i64().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Blocks still to download, when the node knows a longer chain
    pub fn blocks_behind(&self) -> i64 {
        (self.longest_chain - self.blocks).max(0)
    }
}

pub struct Heartbeat {
    channel: Arc<RpcChannel>,
    batch: BatchCorrelator,
    /// Whether the previous `getinfo` succeeded; starts true so the first
    /// failure after connecting is reported
    healthy: AtomicBool,
}

impl Heartbeat {
    pub fn new(channel: Arc<RpcChannel>) -> Self {
        Self {
            batch: BatchCorrelator::new(Arc::clone(&channel)),
            channel,
            healthy: AtomicBool::new(true),
        }
    }

    /// One `getinfo` round plus statistics; `None` if the node did not answer
    ///
    /// A failure is reported through the channel's notifier only on the
    /// transition from healthy to failing.
    pub async fn beat(&self) -> Option<NodeStatus> {
        let info = match self.channel.request(RpcRequest::new("getinfo")).await {
            Ok(info) => {
                self.healthy.store(true, Ordering::SeqCst);
                info
            }
            Err(failure) if failure.kind == FailureKind::ShutDown => return None,
            Err(failure) => {
                if self.healthy.swap(false, Ordering::SeqCst) {
                    warn!(error = %failure, "Lost connection to daemon");
                    self.channel.notifier().show_error(&format!(
                        "There was an error connecting to the daemon. The error was\n\n{}",
                        failure.user_message()
                    ));
                } else {
                    debug!(error = %failure, "Daemon still unreachable");
                }
                return None;
            }
        };

        let mut status = NodeStatus::from_getinfo(&info);
        let keys: Vec<&'static str> = STATS_METHODS.to_vec();
        let stats = self
            .batch
            .collect(keys, |method| Some(RpcRequest::new(*method)))
            .await?;

        status.sol_rate = stats.get("getnetworksolps").and_then(Value::as_i64);
        if let Some(net) = stats.get("getnetworkinfo") {
            status.subversion = net["subversion"].as_str().map(String::from);
        }
        if let Some(chain) = stats.get("getblockchaininfo") {
            status.chain = chain["chain"].as_str().map(String::from);
            status.verification_progress = chain["verificationprogress"].as_f64();
        }
        Some(status)
    }

    /// Beat every `interval` and hand each snapshot to `sink` until the
    /// channel shuts down
    pub fn spawn<F>(self: Arc<Self>, interval: Duration, sink: F) -> JoinHandle<()>
    where
        F: Fn(NodeStatus) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            loop {
                if let Some(status) = self.beat().await {
                    sink(status);
                }
                if self.channel.is_shut_down() {
                    debug!("Heartbeat stopping");
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}
