//! Core data models for the node collector

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field naming the kind of an ingested event
pub const EVENT_TYPE_FIELD: &str = "type";

/// Field carrying an event's timestamp
pub const EVENT_TS_FIELD: &str = "ts";

/// One periodic snapshot of node resource usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub mem_used_mb: u64,
    pub mem_total_mb: u64,
    pub swap_used_mb: u64,
    pub swap_total_mb: u64,
    /// Pages swapped in per second
    pub pswpin: u64,
    /// Pages swapped out per second
    pub pswpout: u64,
    /// Page faults per second
    pub pgfault: u64,
    /// Major page faults per second
    pub pgmajfault: u64,
    /// Pages paged in per second
    pub pgpgin: u64,
    /// Pages paged out per second
    pub pgpgout: u64,
    /// Cumulative bytes read since boot, all block devices
    pub disk_read_bytes: u64,
    /// Cumulative bytes written since boot, all block devices
    pub disk_write_bytes: u64,
}

/// Reasons an ingested event body is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event body must be a JSON object")]
    NotAnObject,

    #[error("invalid node event ingestion: missing type")]
    MissingType,
}

/// A discrete event posted by an external producer (OOM kill, swap latency, ...)
///
/// Serialises back to the flat object the producer sent, plus `ts` when the
/// producer omitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Producer-supplied discriminant, kept as sent
    #[serde(rename = "type")]
    pub kind: Value,
    pub ts: Value,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Validate a decoded body, stamping it with `now` if it carries no `ts`
    pub fn from_value(body: Value, now: DateTime<Utc>) -> Result<Self, EventError> {
        let Value::Object(mut fields) = body else {
            return Err(EventError::NotAnObject);
        };

        let kind = fields
            .remove(EVENT_TYPE_FIELD)
            .ok_or(EventError::MissingType)?;

        let ts = fields
            .remove(EVENT_TS_FIELD)
            .unwrap_or_else(|| Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)));

        Ok(Self { kind, ts, fields })
    }

    /// The discriminant as text: strings verbatim, anything else as JSON
    pub fn kind_label(&self) -> String {
        match &self.kind {
            Value::String(kind) => kind.clone(),
            other => other.to_string(),
        }
    }

    /// Look up a free-form field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_event_without_ts_is_stamped() {
        let event = Event::from_value(json!({"type": "oom_kill"}), fixed_now()).unwrap();

        assert_eq!(event.kind, "oom_kill");
        assert_eq!(event.ts, json!("2024-05-01T12:00:00.000Z"));
        assert!(event.fields.is_empty());
    }

    #[test]
    fn test_event_keeps_producer_ts_and_fields() {
        let body = json!({
            "type": "oom",
            "ts": "2024-04-30T23:59:59+0000",
            "victim_pid": 4242,
            "victim_comm": "java",
        });

        let event = Event::from_value(body, fixed_now()).unwrap();

        assert_eq!(event.ts, json!("2024-04-30T23:59:59+0000"));
        assert_eq!(event.field("victim_pid"), Some(&json!(4242)));
        assert_eq!(event.field("victim_comm"), Some(&json!("java")));
    }

    #[test]
    fn test_event_missing_type_rejected() {
        let err = Event::from_value(json!({"foo": "bar"}), fixed_now()).unwrap_err();
        assert_eq!(err, EventError::MissingType);
    }

    #[test]
    fn test_event_any_present_type_accepted() {
        let numeric = Event::from_value(json!({"type": 7}), fixed_now()).unwrap();
        assert_eq!(numeric.kind, json!(7));
        assert_eq!(numeric.kind_label(), "7");

        let null = Event::from_value(json!({"type": null}), fixed_now()).unwrap();
        assert_eq!(null.kind, Value::Null);
        assert_eq!(null.kind_label(), "null");

        let empty = Event::from_value(json!({"type": ""}), fixed_now()).unwrap();
        assert_eq!(empty.kind_label(), "");

        let value = serde_json::to_value(&numeric).unwrap();
        assert_eq!(value["type"], 7);
    }

    #[test]
    fn test_event_non_object_rejected() {
        let err = Event::from_value(json!([1, 2, 3]), fixed_now()).unwrap_err();
        assert_eq!(err, EventError::NotAnObject);
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = Event::from_value(
            json!({"type": "swap_fault_latency", "latency_distribution_us": []}),
            fixed_now(),
        )
        .unwrap();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "swap_fault_latency");
        assert_eq!(value["ts"], "2024-05-01T12:00:00.000Z");
        assert_eq!(value["latency_distribution_us"], json!([]));
    }

    #[test]
    fn test_resource_sample_field_names() {
        let sample = ResourceSample {
            timestamp: fixed_now(),
            cpu_percent: 12.5,
            mem_used_mb: 2048,
            mem_total_mb: 8192,
            swap_used_mb: 0,
            swap_total_mb: 1024,
            pswpin: 1,
            pswpout: 2,
            pgfault: 3,
            pgmajfault: 4,
            pgpgin: 5,
            pgpgout: 6,
            disk_read_bytes: 7,
            disk_write_bytes: 8,
        };

        let value = serde_json::to_value(&sample).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "timestamp",
            "cpu_percent",
            "mem_used_mb",
            "mem_total_mb",
            "swap_used_mb",
            "swap_total_mb",
            "pswpin",
            "pswpout",
            "pgfault",
            "pgmajfault",
            "pgpgin",
            "pgpgout",
            "disk_read_bytes",
            "disk_write_bytes",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), 14);
    }
}
