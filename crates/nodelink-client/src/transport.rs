//! HTTP transport to the daemon's RPC port

use crate::error::{FailureKind, RpcFailure};
use async_trait::async_trait;
use nodelink_config::DaemonConf;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Sends one serialized request and returns the raw success body
///
/// Failures come back already classified; `RpcFailure::body` carries the
/// best-effort parse of an error response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, RpcFailure>;

    /// Human-readable endpoint, for logs and error messages
    fn endpoint(&self) -> String;
}

/// Builds a transport for a connection configuration
pub trait TransportFactory: Send + Sync {
    fn build(&self, conf: &DaemonConf) -> Result<Arc<dyn Transport>, RpcFailure>;
}

/// `POST http://host:port/` with basic auth and a `text/plain` body
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    user: String,
    password: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, conf: &DaemonConf) -> Self {
        Self {
            client,
            url: conf.url(),
            user: conf.rpc_user.clone(),
            password: conf.rpc_password.clone(),
        }
    }

    /// Point at an arbitrary URL (used against mock servers)
    pub fn with_url(
        client: reqwest::Client,
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, RpcFailure> {
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(classify)?;
        trace!(status = status.as_u16(), len = bytes.len(), "RPC response");

        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let kind = match status.as_u16() {
            401 | 403 => FailureKind::AuthFailed,
            500 => FailureKind::ServerError,
            other => FailureKind::Http(other),
        };
        let parsed = serde_json::from_slice::<Value>(&bytes).ok();
        Err(RpcFailure::new(kind, format!("HTTP {status}")).with_body(parsed))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

fn classify(err: reqwest::Error) -> RpcFailure {
    let kind = if err.is_connect() {
        FailureKind::ConnectionRefused
    } else {
        FailureKind::Network
    };
    RpcFailure::new(kind, err.to_string())
}

/// Factory sharing one reqwest connection pool across transports
#[derive(Clone)]
pub struct HttpTransportFactory {
    client: reqwest::Client,
}

impl HttpTransportFactory {
    pub fn new() -> Result<Self, RpcFailure> {
        // Only the connect phase is bounded; a warming daemon may take long to answer
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RpcFailure::new(FailureKind::Network, e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl TransportFactory for HttpTransportFactory {
    fn build(&self, conf: &DaemonConf) -> Result<Arc<dyn Transport>, RpcFailure> {
        Ok(Arc::new(HttpTransport::new(self.client.clone(), conf)))
    }
}
