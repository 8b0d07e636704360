//! In-crate fakes for the transport and daemon launcher

use crate::error::{LaunchError, RpcFailure};
use crate::lifecycle::{DaemonHandle, DaemonLauncher, DaemonProcess};
use crate::transport::{Transport, TransportFactory};
use async_trait::async_trait;
use nodelink_config::DaemonConf;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

type Handler = dyn Fn(&str, &[Value]) -> Result<Vec<u8>, RpcFailure> + Send + Sync;

/// Transport answering from a closure keyed on method and params
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    count: Arc<AtomicUsize>,
    hold: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    /// `handler` returns the `result` value or a failure
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<Value, RpcFailure> + Send + Sync + 'static,
    {
        Self::from_handler(Box::new(move |method, params| {
            handler(method, params).map(|result| {
                serde_json::to_vec(&json!({"result": result, "error": null, "id": "test"}))
                    .unwrap()
            })
        }))
    }

    /// `handler` returns the raw response body
    pub fn raw<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, RpcFailure> + Send + Sync + 'static,
    {
        Self::from_handler(Box::new(move |method, _| handler(method)))
    }

    fn from_handler(handler: Box<Handler>) -> Self {
        Self {
            handler,
            calls: Arc::new(Mutex::new(Vec::new())),
            count: Arc::new(AtomicUsize::new(0)),
            hold: None,
        }
    }

    /// Block every response until the returned `Notify` is signalled
    pub fn held(mut self) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        self.hold = Some(Arc::clone(&notify));
        (self, notify)
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.count)
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<(String, Vec<Value>)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, RpcFailure> {
        let request: Value = serde_json::from_slice(&body).unwrap();
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"].as_array().cloned().unwrap_or_default();

        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push((method.clone(), params.clone()));

        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        (self.handler)(&method, &params)
    }

    fn endpoint(&self) -> String {
        "scripted://daemon".to_string()
    }
}

/// Hands out one shared transport and remembers every conf it saw
pub(crate) struct ScriptedFactory {
    pub transport: Arc<ScriptedTransport>,
    pub confs: Mutex<Vec<DaemonConf>>,
}

impl ScriptedFactory {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self {
            transport: Arc::new(transport),
            confs: Mutex::new(Vec::new()),
        }
    }
}

impl TransportFactory for ScriptedFactory {
    fn build(&self, conf: &DaemonConf) -> Result<Arc<dyn Transport>, RpcFailure> {
        self.confs.lock().push(conf.clone());
        Ok(self.transport.clone())
    }
}

#[derive(Debug)]
pub(crate) struct FakeProcess {
    pub running: Arc<AtomicBool>,
    pub stderr: String,
}

impl DaemonProcess for FakeProcess {
    fn is_running(&mut self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stderr_output(&self) -> String {
        self.stderr.clone()
    }

    fn id(&self) -> Option<u32> {
        Some(4242)
    }
}

/// Launcher that either hands out fake processes or always fails
pub(crate) struct FakeLauncher {
    pub launches: Arc<AtomicUsize>,
    pub running: Arc<AtomicBool>,
    pub stderr: String,
    fail: bool,
}

impl FakeLauncher {
    pub fn succeeding() -> Self {
        Self {
            launches: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(true)),
            stderr: String::new(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub fn handle(running: bool, stderr: &str) -> DaemonHandle {
        DaemonHandle::new(Box::new(FakeProcess {
            running: Arc::new(AtomicBool::new(running)),
            stderr: stderr.to_string(),
        }))
    }
}

impl DaemonLauncher for FakeLauncher {
    fn launch(&self, _conf: &DaemonConf) -> Result<DaemonHandle, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LaunchError::BinaryNotFound("/nonexistent/safecoind".into()));
        }
        Ok(DaemonHandle::new(Box::new(FakeProcess {
            running: Arc::clone(&self.running),
            stderr: self.stderr.clone(),
        })))
    }
}
