//! Decoding of server-pushed messages into typed [`Event`]s.
//!
//! A message is a type tag (the SSE `event:` name) plus a JSON body.
//! When the stream uses unnamed messages, the tag is read from the
//! body's `event_type` field instead.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CoreError;
use crate::event::{Event, EventPayload, generate_event_id};
use crate::types::EventKind;

/// SSE name used for messages without an explicit `event:` field.
const DEFAULT_SSE_EVENT: &str = "message";

/// Numeric timestamps below this are Unix seconds, above it Unix millis.
const MILLIS_THRESHOLD: f64 = 1e11;

/// Decode one message.
///
/// Returns `Ok(None)` for unknown tags. Heartbeats decode normally; it
/// is up to the caller to keep them away from subscribers.
pub fn decode_message(
    tag: Option<&str>,
    data: &str,
    sse_id: Option<&str>,
    received_at: DateTime<Utc>,
) -> Result<Option<Event>, CoreError> {
    let named = tag.filter(|t| !t.is_empty() && *t != DEFAULT_SSE_EVENT);

    // Named message: resolve the kind before touching the body so an
    // unknown tag is never reported as malformed.
    if let Some(name) = named {
        let Some(kind) = EventKind::from_tag(name) else {
            return Ok(None);
        };
        if kind == EventKind::Heartbeat {
            return Ok(Some(heartbeat(data, sse_id, received_at)));
        }
        let body = parse_body(name, data)?;
        return build_event(kind, body, sse_id, received_at).map(Some);
    }

    let body = parse_body(DEFAULT_SSE_EVENT, data)?;
    let Some(kind) = body
        .get("event_type")
        .and_then(Value::as_str)
        .and_then(EventKind::from_tag)
    else {
        return Ok(None);
    };
    build_event(kind, body, sse_id, received_at).map(Some)
}

fn parse_body(tag: &str, data: &str) -> Result<Value, CoreError> {
    serde_json::from_str(data).map_err(|source| CoreError::MalformedPayload {
        tag: tag.to_string(),
        source,
    })
}

/// Heartbeat bodies carry nothing of interest, so an unparseable body
/// is tolerated.
fn heartbeat(data: &str, sse_id: Option<&str>, received_at: DateTime<Utc>) -> Event {
    let body: Value = serde_json::from_str(data).unwrap_or(Value::Null);
    let timestamp = body
        .get("timestamp")
        .and_then(|v| parse_timestamp(v, received_at).ok())
        .unwrap_or(received_at);
    Event::with_id(
        resolve_id(sse_id, &body, received_at),
        EventPayload::Heartbeat,
        timestamp,
    )
}

fn build_event(
    kind: EventKind,
    body: Value,
    sse_id: Option<&str>,
    received_at: DateTime<Utc>,
) -> Result<Event, CoreError> {
    let timestamp = match body.get("timestamp") {
        Some(v) => parse_timestamp(v, received_at)?,
        None => received_at,
    };
    let id = resolve_id(sse_id, &body, received_at);

    let payload = match kind {
        EventKind::Connected => EventPayload::Connected(payload(kind, body)?),
        EventKind::Heartbeat => EventPayload::Heartbeat,
        EventKind::WorkloadStatusUpdate => EventPayload::WorkloadStatusUpdate(payload(kind, body)?),
        EventKind::ProjectStatusUpdate => EventPayload::ProjectStatusUpdate(payload(kind, body)?),
        EventKind::ClusterStatusUpdate => EventPayload::ClusterStatusUpdate(payload(kind, body)?),
        EventKind::AddonStatusUpdate => EventPayload::AddonStatusUpdate(payload(kind, body)?),
        EventKind::BuildComplete => EventPayload::BuildComplete(payload(kind, body)?),
        EventKind::BuildFailed => EventPayload::BuildFailed(payload(kind, body)?),
        EventKind::ErrorReport => EventPayload::ErrorReport(payload(kind, body)?),
    };

    Ok(Event::with_id(id, payload, timestamp))
}

fn payload<T: DeserializeOwned>(kind: EventKind, body: Value) -> Result<T, CoreError> {
    serde_json::from_value(body).map_err(|source| CoreError::MalformedPayload {
        tag: kind.tag().to_string(),
        source,
    })
}

fn resolve_id(sse_id: Option<&str>, body: &Value, received_at: DateTime<Utc>) -> String {
    if let Some(id) = sse_id.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    match body.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => generate_event_id(received_at),
    }
}

/// Parse a wire timestamp: RFC 3339 (or naive ISO 8601, taken as UTC),
/// Unix seconds, or Unix milliseconds. `null` means "now".
pub fn parse_timestamp(value: &Value, received_at: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
    match value {
        Value::Null => Ok(received_at),
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| CoreError::InvalidTimestamp(s.clone()))
        }
        Value::Number(n) => {
            let raw = n
                .as_f64()
                .ok_or_else(|| CoreError::InvalidTimestamp(n.to_string()))?;
            let millis = if raw.abs() < MILLIS_THRESHOLD {
                raw * 1000.0
            } else {
                raw
            };
            DateTime::from_timestamp_millis(millis.round() as i64)
                .ok_or_else(|| CoreError::InvalidTimestamp(n.to_string()))
        }
        other => Err(CoreError::InvalidTimestamp(other.to_string())),
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterHealth, ProjectStatus, ResourceType, WorkloadStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn decode(tag: &str, data: &str) -> Result<Option<Event>, CoreError> {
        decode_message(Some(tag), data, None, now())
    }

    // ── Tag dispatch ────────────────────────────────────────────

    #[test]
    fn decodes_workload_status_update() {
        let data = r#"{"event_type":"workload_status_update","resource_type":"workload",
            "workload_id":"w1","project_id":"p1","status":"Deploying",
            "message":"rolling out","replicas":3,"available_replicas":1,
            "timestamp":1700000100}"#;
        let ev = decode("workload_status_update", data).unwrap().unwrap();
        let EventPayload::WorkloadStatusUpdate(p) = &ev.payload else {
            panic!("wrong payload: {:?}", ev.payload);
        };
        assert_eq!(p.status, WorkloadStatus::Deploying);
        assert_eq!(p.replicas, Some(3));
        assert_eq!(p.available_replicas, Some(1));
        assert_eq!(ev.project_id(), Some("p1"));
        assert_eq!(ev.timestamp, Utc.timestamp_opt(1_700_000_100, 0).unwrap());
    }

    #[test]
    fn decodes_project_and_cluster_updates() {
        let project = decode(
            "project_status_update",
            r#"{"project_id":"p1","cluster_id":"c1","status":"Ready","message":"ok"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(project.resource_type(), Some(ResourceType::Project));
        assert_eq!(project.cluster_id(), Some("c1"));
        assert_eq!(project.status_label(), Some(ProjectStatus::Ready.as_str()));

        let cluster = decode(
            "cluster_status_update",
            r#"{"cluster_id":"c1","status":"unhealthy","node_count":0}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(cluster.status_label(), Some(ClusterHealth::Unhealthy.as_str()));
    }

    #[test]
    fn decodes_build_and_error_events() {
        let done = decode(
            "build_complete",
            r#"{"build_id":"b1","workload_id":"w1","image_digest":"sha256:ab","build_duration":42.5,"message":"built"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(done.kind(), EventKind::BuildComplete);

        let failed = decode(
            "build_failed",
            r#"{"build_id":"b2","workload_id":"w1","error":"exit 1"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(failed.resource_id(), Some("b2"));

        let report = decode(
            "error_report",
            r#"{"error_type":"quota","message":"too many pods","resource_id":"w1"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(report.resource_type(), None);
        assert_eq!(report.resource_id(), Some("w1"));
    }

    #[test]
    fn addon_payload_keeps_unknown_fields() {
        let ev = decode(
            "addon_status_update",
            r#"{"instance_id":"a1","status":"Installing","chart":"redis"}"#,
        )
        .unwrap()
        .unwrap();
        let EventPayload::AddonStatusUpdate(p) = &ev.payload else {
            panic!("wrong payload");
        };
        assert_eq!(p.addon_id.as_deref(), Some("a1"));
        assert_eq!(p.fields.get("chart").and_then(Value::as_str), Some("redis"));
        assert_eq!(ev.resource_type(), Some(ResourceType::Addon));
    }

    #[test]
    fn connected_carries_connection_id() {
        let ev = decode("connected", r#"{"connection_id":"conn-7"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind(), EventKind::Connected);
        assert_eq!(ev.description(), "connected (conn-7)");
    }

    #[test]
    fn unnamed_message_uses_event_type_field() {
        let ev = decode_message(
            None,
            r#"{"event_type":"build_failed","build_id":"b","workload_id":"w","error":"x"}"#,
            None,
            now(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(ev.kind(), EventKind::BuildFailed);

        let ev = decode_message(
            Some("message"),
            r#"{"event_type":"heartbeat"}"#,
            None,
            now(),
        )
        .unwrap()
        .unwrap();
        assert!(ev.is_heartbeat());
    }

    // ── Forward compatibility & errors ──────────────────────────

    #[test]
    fn unknown_tag_is_ignored_even_with_garbage_body() {
        assert!(decode("pod_evicted", "not json").unwrap().is_none());
        assert!(
            decode_message(None, r#"{"event_type":"pod_evicted"}"#, None, now())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = decode("workload_status_update", "{not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedPayload { .. }));

        let err = decode("workload_status_update", r#"{"workload_id":"w1"}"#).unwrap_err();
        assert!(matches!(err, CoreError::MalformedPayload { ref tag, .. } if tag == "workload_status_update"));
    }

    #[test]
    fn heartbeat_tolerates_empty_body() {
        let ev = decode("heartbeat", "").unwrap().unwrap();
        assert!(ev.is_heartbeat());
        assert_eq!(ev.timestamp, now());
    }

    // ── Ids & timestamps ────────────────────────────────────────

    #[test]
    fn id_prefers_sse_id_then_body() {
        let ev = decode_message(
            Some("connected"),
            r#"{"connection_id":"c","id":"body-id"}"#,
            Some("sse-id"),
            now(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(ev.id, "sse-id");

        let ev = decode("connected", r#"{"connection_id":"c","id":"body-id"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(ev.id, "body-id");

        let ev = decode("connected", r#"{"connection_id":"c"}"#).unwrap().unwrap();
        assert!(ev.id.starts_with("1700000000000-"));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
        let received = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(
            parse_timestamp(&serde_json::json!(1_700_000_000.5), received).unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp(&serde_json::json!(1_700_000_000_500i64), received).unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp(&serde_json::json!("2023-11-14T22:13:20.5Z"), received).unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp(&serde_json::json!("2023-11-14T22:13:20.500"), received).unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp(&Value::Null, received).unwrap(),
            received
        );
        assert!(parse_timestamp(&serde_json::json!("yesterday"), received).is_err());
        assert!(parse_timestamp(&serde_json::json!(true), received).is_err());
    }

    #[test]
    fn invalid_timestamp_makes_message_malformed() {
        let err = decode(
            "project_status_update",
            r#"{"project_id":"p","status":"Ready","timestamp":"soon"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp(_)));
    }
}
