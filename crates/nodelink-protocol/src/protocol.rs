use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version string the daemon expects in every request
pub const RPC_VERSION: &str = "1.0";

/// Correlation id used when the caller does not pick one
pub const DEFAULT_REQUEST_ID: &str = "nodelink";

/// Request payload sent to the daemon
///
/// Serializes to `{"jsonrpc":"1.0","id":"…","method":"…","params":[…]}`.
/// Correlation happens through the continuation that issued the request, so
/// the id only matters for the daemon's own logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: RPC_VERSION,
            id: DEFAULT_REQUEST_ID.to_string(),
            method: method.into(),
            params: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Append one positional parameter
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Replace the parameter list
    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Response envelope returned by the daemon
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    /// Parse a raw body; `None` when it is not a JSON object
    pub fn parse(body: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(body).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// The `result` field, `Null` when absent
    pub fn into_result(self) -> Value {
        self.result.unwrap_or(Value::Null)
    }
}

/// Structured error object (`error: {code, message}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Daemon is still loading (block index, wallet rescan, ...)
pub const RPC_IN_WARMUP: i64 = -28;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;
