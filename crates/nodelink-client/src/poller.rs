//! Tracking of asynchronous daemon operations until they resolve
//!
//! Operations submitted through `z_sendmany` and friends return an opid
//! right away and finish later. The poller asks `z_getoperationstatus` on a
//! timer and fires each operation's continuation exactly once: on
//! `success` with the resulting txid, on `failed` with the daemon's error
//! message. While anything is pending it polls at the quick interval,
//! otherwise at the idle interval.

use crate::channel::RpcChannel;
use nodelink_config::Intervals;
use nodelink_protocol::{OperationState, OperationStatus, RpcRequest};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Called with `(opid, txid)`
pub type OnComputed = Box<dyn FnOnce(String, String) + Send>;
/// Called with `(opid, error message)`
pub type OnFailed = Box<dyn FnOnce(String, String) + Send>;

struct WatchedOperation {
    payload: Value,
    on_success: OnComputed,
    on_failure: OnFailed,
}

pub struct TxWatchPoller {
    channel: Arc<RpcChannel>,
    pending: Mutex<HashMap<String, WatchedOperation>>,
    wake: Notify,
    quick: Duration,
    idle: Duration,
}

impl TxWatchPoller {
    pub fn new(channel: Arc<RpcChannel>, intervals: &Intervals) -> Self {
        Self {
            channel,
            pending: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            quick: intervals.quick_update(),
            idle: intervals.update(),
        }
    }

    /// Track `opid` and poll soon
    ///
    /// Watching an opid that is already pending replaces its continuations.
    pub fn watch<S, F>(&self, opid: impl Into<String>, payload: Value, on_success: S, on_failure: F)
    where
        S: FnOnce(String, String) + Send + 'static,
        F: FnOnce(String, String) + Send + 'static,
    {
        let opid = opid.into();
        debug!(opid = %opid, "Watching operation");
        let previous = self.pending.lock().insert(
            opid,
            WatchedOperation {
                payload,
                on_success: Box::new(on_success),
                on_failure: Box::new(on_failure),
            },
        );
        if previous.is_some() {
            warn!("Operation was already watched; continuations replaced");
        }
        self.wake.notify_one();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.lock().keys().cloned().collect()
    }

    /// Payload the operation was submitted with
    pub fn payload(&self, opid: &str) -> Option<Value> {
        self.pending.lock().get(opid).map(|op| op.payload.clone())
    }

    /// Delay until the next tick for the current pending set
    pub fn next_delay(&self) -> Duration {
        if self.pending_count() > 0 {
            self.quick
        } else {
            self.idle
        }
    }

    /// Query the daemon once and resolve whatever finished
    ///
    /// Best-effort: a failed query leaves everything pending.
    pub async fn tick(&self) -> Duration {
        if self.pending_count() > 0 {
            match self
                .channel
                .request(RpcRequest::new("z_getoperationstatus"))
                .await
            {
                Ok(statuses) => self.apply_statuses(&statuses),
                Err(e) => debug!(error = %e, "Operation status poll failed"),
            }
        }
        self.next_delay()
    }

    /// Resolve watched operations from a `z_getoperationstatus` result
    pub fn apply_statuses(&self, statuses: &Value) {
        for status in OperationStatus::parse_list(statuses) {
            let state = status.state();
            if state == OperationState::Pending {
                continue;
            }

            // Removing before calling out guarantees a single resolution
            let Some(op) = self.pending.lock().remove(&status.id) else {
                continue;
            };

            match state {
                OperationState::Success => {
                    let txid = status.txid();
                    info!(
                        opid = %status.id,
                        txid = %txid,
                        started = ?status.creation_time,
                        secs = ?status.execution_secs,
                        "Operation succeeded"
                    );
                    (op.on_success)(status.id, txid);
                }
                OperationState::Failed => {
                    let message = status.error_message();
                    warn!(opid = %status.id, error = %message, "Operation failed");
                    (op.on_failure)(status.id, message);
                }
                OperationState::Pending => {}
            }
        }
    }

    /// Run the adaptive polling loop until the channel shuts down
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut delay = poller.next_delay();
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = poller.wake.notified() => {}
                }
                if poller.channel.is_shut_down() {
                    debug!("Operation poller stopping");
                    return;
                }
                delay = poller.tick().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn poller_with(statuses: Value) -> (Arc<TxWatchPoller>, Arc<AtomicUsize>) {
        let transport = ScriptedTransport::new(move |method, _| {
            assert_eq!(method, "z_getoperationstatus");
            Ok(statuses.clone())
        });
        let calls = transport.call_count();
        let channel = Arc::new(RpcChannel::new(Arc::new(transport)));
        (
            Arc::new(TxWatchPoller::new(channel, &Intervals::default())),
            calls,
        )
    }

    type Log = Arc<parking_lot::Mutex<Vec<String>>>;

    fn watch_logged(poller: &TxWatchPoller, opid: &str, log: &Log) {
        let (ok, err) = (log.clone(), log.clone());
        poller.watch(
            opid,
            json!({"to": "zs1dest", "amount": 1.5}),
            move |opid, txid| ok.lock().push(format!("ok {opid} {txid}")),
            move |opid, msg| err.lock().push(format!("err {opid} {msg}")),
        );
    }

    #[tokio::test]
    async fn test_success_resolves_once() {
        let (poller, _) = poller_with(json!([
            {"id": "op1", "status": "success", "result": {"txid": "T"}}
        ]));
        let log: Log = Default::default();
        watch_logged(&poller, "op1", &log);
        assert_eq!(poller.payload("op1").unwrap()["amount"], 1.5);

        assert_eq!(poller.tick().await, Duration::from_secs(20));
        assert_eq!(*log.lock(), vec!["ok op1 T"]);

        // Same report again is a no-op
        poller.tick().await;
        poller.apply_statuses(&json!([{"id": "op1", "status": "success", "result": {"txid": "T"}}]));
        assert_eq!(log.lock().len(), 1);
        assert_eq!(poller.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_reports_in_one_poll() {
        let (poller, _) = poller_with(json!([
            {"id": "op1", "status": "failed", "error": {"code": -6, "message": "Insufficient funds"}},
            {"id": "op1", "status": "failed", "error": {"code": -6, "message": "Insufficient funds"}}
        ]));
        let log: Log = Default::default();
        watch_logged(&poller, "op1", &log);

        poller.tick().await;
        assert_eq!(*log.lock(), vec!["err op1 Insufficient funds"]);
    }

    #[tokio::test]
    async fn test_executing_stays_pending_at_quick_interval() {
        let (poller, _) = poller_with(json!([
            {"id": "op1", "status": "executing"},
            {"id": "unrelated", "status": "success", "result": {"txid": "X"}}
        ]));
        let log: Log = Default::default();
        watch_logged(&poller, "op1", &log);

        assert_eq!(poller.tick().await, Duration::from_secs(5));
        assert!(log.lock().is_empty());
        assert_eq!(poller.pending_ids(), vec!["op1"]);
    }

    #[tokio::test]
    async fn test_idle_tick_skips_the_query() {
        let (poller, calls) = poller_with(json!([]));
        assert_eq!(poller.tick().await, Duration::from_secs(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_resolves_watched_operation() {
        let (poller, _) = poller_with(json!([
            {"id": "op7", "status": "success", "result": {"txid": "abc"}}
        ]));
        let handle = poller.spawn();

        let (tx, rx) = tokio::sync::oneshot::channel();
        poller.watch("op7", Value::Null, move |_, txid| {
            let _ = tx.send(txid);
        }, |_, _| {});

        assert_eq!(rx.await.unwrap(), "abc");
        poller.channel.shutdown();
        poller.wake.notify_one();
        handle.await.unwrap();
    }
}
