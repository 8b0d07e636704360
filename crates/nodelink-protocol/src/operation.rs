//! Status items returned by `z_getoperationstatus`

use crate::protocol::RpcErrorBody;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub execution_secs: Option<f64>,
}

/// Terminal classification of a status item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Success,
    Failed,
    /// queued, executing, or anything else the daemon reports
    Pending,
}

impl OperationStatus {
    pub fn state(&self) -> OperationState {
        match self.status.as_str() {
            "success" => OperationState::Success,
            "failed" | "failure" => OperationState::Failed,
            _ => OperationState::Pending,
        }
    }

    /// `result.txid`, empty when missing
    pub fn txid(&self) -> String {
        self.result
            .as_ref()
            .and_then(|r| r.get("txid"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// `error.message`, empty when missing
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    /// Parse a status array, skipping items without an id
    pub fn parse_list(value: &Value) -> Vec<OperationStatus> {
        value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_classification() {
        let mk = |s: &str| OperationStatus {
            id: "op".into(),
            status: s.into(),
            result: None,
            error: None,
            creation_time: None,
            execution_secs: None,
        };
        assert_eq!(mk("success").state(), OperationState::Success);
        assert_eq!(mk("failed").state(), OperationState::Failed);
        assert_eq!(mk("failure").state(), OperationState::Failed);
        assert_eq!(mk("executing").state(), OperationState::Pending);
        assert_eq!(mk("queued").state(), OperationState::Pending);
    }

    #[test]
    fn test_parse_list_extracts_txid_and_error() {
        let list = OperationStatus::parse_list(&json!([
            {"id": "op1", "status": "success", "result": {"txid": "T"}, "creation_time": 1515969376},
            {"id": "op2", "status": "failed", "error": {"code": -6, "message": "Insufficient funds"}},
            {"status": "success"}
        ]));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].txid(), "T");
        assert_eq!(list[0].creation_time, Some(1515969376));
        assert_eq!(list[1].error_message(), "Insufficient funds");
    }

    #[test]
    fn test_parse_list_non_array_is_empty() {
        assert!(OperationStatus::parse_list(&json!({"id": "op1"})).is_empty());
        assert!(OperationStatus::parse_list(&Value::Null).is_empty());
    }
}
