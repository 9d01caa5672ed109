//! Query-surface commands: ping, history and stream

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::{Map, Value};
use tabled::Tabled;

use crate::client::{ApiClient, ResourceSample};
use crate::output::{
    color_cpu, format_bytes, format_timestamp, format_usage_mb, print_info, print_success,
    print_table, OutputFormat,
};
use crate::sse::FrameDecoder;
use crate::Scope;

/// Row for the stats history table
#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Swap")]
    swap: String,
    #[tabled(rename = "Faults/s")]
    faults: String,
    #[tabled(rename = "Swap In/Out")]
    swap_io: String,
    #[tabled(rename = "Disk R/W")]
    disk: String,
}

impl From<&ResourceSample> for SampleRow {
    fn from(s: &ResourceSample) -> Self {
        Self {
            timestamp: format_timestamp(&s.timestamp),
            cpu: color_cpu(s.cpu_percent),
            memory: format_usage_mb(s.mem_used_mb, s.mem_total_mb),
            swap: format_usage_mb(s.swap_used_mb, s.swap_total_mb),
            faults: format!("{} ({} major)", s.pgfault, s.pgmajfault),
            swap_io: format!("{}/{}", s.pswpin, s.pswpout),
            disk: format!(
                "{}/{}",
                format_bytes(s.disk_read_bytes),
                format_bytes(s.disk_write_bytes)
            ),
        }
    }
}

/// Row for the events history table
#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Fields")]
    fields: String,
}

impl From<&Value> for EventRow {
    fn from(event: &Value) -> Self {
        let timestamp = match event.get("ts") {
            Some(Value::String(ts)) => format_timestamp(ts),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let kind = match event.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let rest: Map<String, Value> = event
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(key, _)| key.as_str() != "ts" && key.as_str() != "type")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            timestamp,
            kind: kind.cyan().to_string(),
            fields: Value::Object(rest).to_string(),
        }
    }
}

/// Print the collector's liveness reply
pub async fn ping(client: &ApiClient) -> Result<()> {
    let reply = client.get_text("ping").await?;
    print_success(reply.trim());
    Ok(())
}

/// Keep only the newest `limit` entries
fn newest<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        let excess = items.len().saturating_sub(limit);
        items.drain(..excess);
    }
    items
}

/// Show the retained history for a scope, oldest first
pub async fn show_history(
    client: &ApiClient,
    scope: Scope,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("history?scope={}", scope.as_str());

    match scope {
        Scope::Stats => {
            let samples: Vec<ResourceSample> = newest(client.get(&path).await?, limit);
            let rows = samples.iter().map(SampleRow::from).collect();
            print_table(rows, &samples, format);
        }
        Scope::Events => {
            let events: Vec<Value> = newest(client.get(&path).await?, limit);
            let rows = events.iter().map(EventRow::from).collect();
            print_table(rows, &events, format);
        }
    }

    Ok(())
}

/// Print frames from the live stream until `count` frames or the stream ends
pub async fn follow_stream(
    client: &ApiClient,
    scope: Scope,
    count: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("stream?scope={}", scope.as_str());
    let mut response = client.open_stream(&path).await?;

    if matches!(format, OutputFormat::Table) {
        print_info(&format!("Following {} stream", scope.as_str()));
    }

    let mut decoder = FrameDecoder::new();
    let mut received = 0usize;

    while let Some(chunk) = response.chunk().await.context("Stream interrupted")? {
        for data in decoder.push(&chunk) {
            print_frame(scope, &data, format)?;
            received += 1;
            if count.is_some_and(|count| received >= count) {
                return Ok(());
            }
        }
    }

    Ok(())
}

fn print_frame(scope: Scope, data: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", data),
        OutputFormat::Table => match scope {
            Scope::Stats => {
                let sample: ResourceSample =
                    serde_json::from_str(data).context("Malformed stats frame")?;
                let row = SampleRow::from(&sample);
                println!(
                    "{}  cpu {}  mem {}  faults/s {}  disk {}",
                    row.timestamp, row.cpu, row.memory, row.faults, row.disk
                );
            }
            Scope::Events => {
                let event: Value = serde_json::from_str(data).context("Malformed event frame")?;
                let row = EventRow::from(&event);
                println!("{}  {}  {}", row.timestamp, row.kind, row.fields);
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_newest_keeps_tail() {
        assert_eq!(newest(vec![1, 2, 3, 4], Some(2)), vec![3, 4]);
        assert_eq!(newest(vec![1, 2], Some(5)), vec![1, 2]);
        assert_eq!(newest(vec![1, 2], None), vec![1, 2]);
        assert!(newest(vec![1, 2], Some(0)).is_empty());
    }

    #[test]
    fn test_event_row_splits_known_fields() {
        colored::control::set_override(false);
        let row = EventRow::from(&json!({
            "type": "oom_kill",
            "ts": "2024-05-01T12:00:00.000Z",
            "victim_pid": 42,
        }));

        assert_eq!(row.timestamp, "2024-05-01 12:00:00");
        assert_eq!(row.kind, "oom_kill");
        assert_eq!(row.fields, r#"{"victim_pid":42}"#);

        let numeric = EventRow::from(&json!({"type": 5, "ts": "x"}));
        assert_eq!(numeric.kind, "5");
    }

    #[tokio::test]
    async fn test_follow_stream_stops_after_count() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stream?scope=events")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: {\"type\":\"a\"}\n\ndata: {\"type\":\"b\"}\n\ndata: {\"type\":\"c\"}\n\n")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        follow_stream(&client, Scope::Events, Some(2), OutputFormat::Json)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_follow_stream_rejects_bad_scope_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stream?scope=stats")
            .with_status(400)
            .with_body(r#"{"error":"bad scope"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = follow_stream(&client, Scope::Stats, None, OutputFormat::Table)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad scope"));
    }
}
