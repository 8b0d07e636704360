//! Fan-out of independent requests joined into one result map

use crate::channel::RpcChannel;
use nodelink_protocol::RpcRequest;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Working set of one batch
///
/// Every key reports exactly once (success, error recorded as `Null`, or
/// filtered out without a request). The completion closure is taken when
/// the count reaches the number of keys, so it cannot run twice.
struct BatchJob<K, F> {
    state: Mutex<BatchState<K, F>>,
}

struct BatchState<K, F> {
    total: usize,
    done: usize,
    results: HashMap<K, Value>,
    on_complete: Option<F>,
}

impl<K, F> BatchJob<K, F>
where
    K: Eq + Hash,
    F: FnOnce(HashMap<K, Value>),
{
    fn new(total: usize, on_complete: F) -> Self {
        Self {
            state: Mutex::new(BatchState {
                total,
                done: 0,
                results: HashMap::new(),
                on_complete: Some(on_complete),
            }),
        }
    }

    /// Count one key; `None` means the key produced no entry
    fn record(&self, key: K, value: Option<Value>) {
        let ready = {
            let mut state = self.state.lock();
            if let Some(value) = value {
                state.results.insert(key, value);
            }
            state.done += 1;
            if state.done >= state.total {
                let results = std::mem::take(&mut state.results);
                state.on_complete.take().map(|f| (f, results))
            } else {
                None
            }
        };

        if let Some((on_complete, results)) = ready {
            on_complete(results);
        }
    }

    fn complete_empty(&self) {
        let on_complete = self.state.lock().on_complete.take();
        if let Some(on_complete) = on_complete {
            on_complete(HashMap::new());
        }
    }
}

/// Issues one request per key and delivers all responses together
#[derive(Clone)]
pub struct BatchCorrelator {
    channel: Arc<RpcChannel>,
}

impl BatchCorrelator {
    pub fn new(channel: Arc<RpcChannel>) -> Self {
        Self { channel }
    }

    /// Dispatch `builder(key)` for every key and call `on_all_complete` once
    ///
    /// Keys for which `builder` returns `None` are counted but get no map
    /// entry. Failed requests map to `Value::Null`. Duplicate keys are
    /// counted per occurrence and collapse to a single entry. An empty key
    /// list completes immediately. If the channel shuts down before every
    /// key reported, `on_all_complete` is dropped without being called.
    pub fn run_batch<K, B, F>(&self, keys: Vec<K>, builder: B, on_all_complete: F)
    where
        K: Eq + Hash + Clone + Send + 'static,
        B: Fn(&K) -> Option<RpcRequest>,
        F: FnOnce(HashMap<K, Value>) + Send + 'static,
    {
        let job = Arc::new(BatchJob::new(keys.len(), on_all_complete));
        if keys.is_empty() {
            job.complete_empty();
            return;
        }

        for key in keys {
            let Some(request) = builder(&key) else {
                job.record(key, None);
                continue;
            };

            let (ok_job, err_job) = (Arc::clone(&job), Arc::clone(&job));
            let err_key = key.clone();
            let method = request.method.clone();
            self.channel.call(
                request,
                move |value| ok_job.record(key, Some(value)),
                move |failure| {
                    debug!(method = %method, error = %failure, "Batch item failed");
                    err_job.record(err_key, Some(Value::Null));
                },
            );
        }
    }

    /// Async form of [`run_batch`](Self::run_batch)
    ///
    /// `None` when the channel shut down before the batch finished.
    pub async fn collect<K, B>(&self, keys: Vec<K>, builder: B) -> Option<HashMap<K, Value>>
    where
        K: Eq + Hash + Clone + Send + 'static,
        B: Fn(&K) -> Option<RpcRequest>,
    {
        let (tx, rx) = oneshot::channel();
        self.run_batch(keys, builder, move |results| {
            let _ = tx.send(results);
        });
        rx.await.ok()
    }
}
