//! Single-request RPC dispatch with a one-way shutdown gate

use crate::error::{FailureKind, RpcFailure};
use crate::notify::{Notifier, TracingNotifier};
use crate::transport::Transport;
use nodelink_protocol::{RpcRequest, RpcResponse};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// An established request target
///
/// Once [`shutdown`](Self::shutdown) is called the channel dispatches
/// nothing new and swallows the outcome of anything already in flight.
pub struct RpcChannel {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    shut_down: AtomicBool,
}

impl RpcChannel {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            notifier: Arc::new(TracingNotifier),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Where [`call_notify`](Self::call_notify) reports failures
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            info!(endpoint = %self.endpoint(), "RPC channel shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Send `request` and wait for its `result`
    ///
    /// Returns `FailureKind::ShutDown` if the gate was closed before
    /// dispatch or while the request was in flight.
    pub async fn request(&self, request: RpcRequest) -> Result<Value, RpcFailure> {
        if self.is_shut_down() {
            return Err(RpcFailure::shut_down());
        }

        debug!(method = %request.method, "RPC dispatch");
        let body = request
            .to_json_bytes()
            .map_err(|e| RpcFailure::new(FailureKind::Malformed, e.to_string()))?;

        let outcome = self.transport.post(body).await;

        if self.is_shut_down() {
            trace!(method = %request.method, "Dropping response after shutdown");
            return Err(RpcFailure::shut_down());
        }

        let bytes = outcome?;
        RpcResponse::parse(&bytes)
            .map(RpcResponse::into_result)
            .ok_or_else(RpcFailure::unknown)
    }

    /// Fire `request` and run exactly one of the continuations, unless the
    /// channel shuts down first
    pub fn call<S, E>(self: &Arc<Self>, request: RpcRequest, on_success: S, on_error: E)
    where
        S: FnOnce(Value) + Send + 'static,
        E: FnOnce(RpcFailure) + Send + 'static,
    {
        if self.is_shut_down() {
            trace!(method = %request.method, "Not dispatching on shut-down channel");
            return;
        }

        let channel = Arc::clone(self);
        tokio::spawn(async move {
            match channel.request(request).await {
                Ok(value) => on_success(value),
                Err(failure) if failure.kind == FailureKind::ShutDown => {}
                Err(failure) => on_error(failure),
            }
        });
    }

    /// [`call`](Self::call) reporting any failure through the notifier
    pub fn call_notify<S>(self: &Arc<Self>, request: RpcRequest, on_success: S)
    where
        S: FnOnce(Value) + Send + 'static,
    {
        let notifier = Arc::clone(&self.notifier);
        self.call(request, on_success, move |failure| {
            notifier.show_error(&failure.user_message());
        });
    }

    /// [`call`](Self::call) for best-effort polling; failures are only logged
    pub fn call_ignore_error<S>(self: &Arc<Self>, request: RpcRequest, on_success: S)
    where
        S: FnOnce(Value) + Send + 'static,
    {
        let method = request.method.clone();
        self.call(request, on_success, move |failure| {
            debug!(method = %method, error = %failure, "Ignoring RPC failure");
        });
    }
}

impl fmt::Debug for RpcChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChannel")
            .field("endpoint", &self.endpoint())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
