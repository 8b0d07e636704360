use anyhow::Result;
use nodelink_config::ClientSettings;
use nodelink_protocol::RpcRequest;
use serde_json::Value;

use crate::commands::connect::{close_session, open_session};
use crate::console::Output;

/// JSON when it parses, a plain string otherwise
pub fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn execute(
    settings: ClientSettings,
    output: &Output,
    method: String,
    params: Vec<String>,
) -> Result<()> {
    let session = open_session(settings, output).await?;

    let request = RpcRequest::new(method.as_str())
        .params(params.iter().map(|p| parse_param(p)).collect());
    let result = session.channel().request(request).await;
    close_session(session, false).await;

    let value = result
        .map_err(|failure| anyhow::anyhow!("{method} failed: {}", failure.user_message()))?;
    match value {
        Value::String(text) => println!("{text}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("100", json!(100))]
    #[test_case("true", json!(true))]
    #[test_case("[\"a\",1]", json!(["a", 1]))]
    #[test_case("zs1address", json!("zs1address"))]
    #[test_case("\"quoted\"", json!("quoted"))]
    fn test_parse_param(raw: &str, expected: Value) {
        assert_eq!(parse_param(raw), expected);
    }
}
