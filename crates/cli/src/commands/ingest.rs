//! Ingest-surface commands

use anyhow::Result;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::ApiClient;
use crate::output::print_success;

/// Problems with a `--field key=value` argument
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("expected key=value, got '{0}'")]
    MissingSeparator(String),

    #[error("field key must not be empty")]
    EmptyKey,

    #[error("'{0}' is set by the event type argument")]
    ReservedKey(String),
}

/// Parse `key=value`; the value is JSON when it parses, else a plain string
pub fn parse_field(raw: &str) -> Result<(String, Value), FieldError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| FieldError::MissingSeparator(raw.to_string()))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(FieldError::EmptyKey);
    }
    if key == "type" {
        return Err(FieldError::ReservedKey(key.to_string()));
    }

    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Assemble the event body
fn build_event(kind: &str, fields: Vec<(String, Value)>) -> Value {
    let mut body: Map<String, Value> = fields.into_iter().collect();
    body.insert("type".to_string(), Value::String(kind.to_string()));
    Value::Object(body)
}

/// Post one event to the collector
pub async fn emit_event(
    client: &ApiClient,
    kind: &str,
    fields: Vec<(String, Value)>,
) -> Result<()> {
    let event = build_event(kind, fields);
    client.post("events", &event).await?;
    print_success(&format!("Event '{}' accepted", kind));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_field_values() {
        assert_eq!(parse_field("victim_pid=42").unwrap(), ("victim_pid".into(), json!(42)));
        assert_eq!(parse_field("comm=java").unwrap(), ("comm".into(), json!("java")));
        assert_eq!(parse_field("ok=true").unwrap(), ("ok".into(), json!(true)));
        assert_eq!(
            parse_field("ts=2024-05-01T12:00:00Z").unwrap(),
            ("ts".into(), json!("2024-05-01T12:00:00Z"))
        );
        assert_eq!(parse_field("expr=a=b").unwrap(), ("expr".into(), json!("a=b")));
    }

    #[test]
    fn test_parse_field_errors() {
        assert_eq!(
            parse_field("novalue"),
            Err(FieldError::MissingSeparator("novalue".into()))
        );
        assert_eq!(parse_field("=1"), Err(FieldError::EmptyKey));
        assert_eq!(
            parse_field("type=oom"),
            Err(FieldError::ReservedKey("type".into()))
        );
    }

    #[test]
    fn test_build_event() {
        let event = build_event("oom_kill", vec![("victim_pid".into(), json!(7))]);
        assert_eq!(event, json!({"type": "oom_kill", "victim_pid": 7}));
    }

    #[tokio::test]
    async fn test_emit_posts_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .match_body(mockito::Matcher::Json(json!({"type": "oom", "victim_pid": 7})))
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        emit_event(&client, "oom", vec![("victim_pid".into(), json!(7))])
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
