//! Terminal formatting for events and latest-status tables.

use std::sync::Arc;

use kubelive_core::{Event, ResourceKey};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// `2024-05-01T12:00:00Z  workload_status_update  workload w1 -> Running`
pub fn format_event_line(event: &Event) -> String {
    let description = event.description();
    let mut line = format!(
        "{}  {:<22}  {description}",
        event.timestamp.format(TIME_FORMAT),
        event.kind().tag(),
    );
    let extra = event
        .message()
        .filter(|m| !is_synthetic(m) && !description.contains(m));
    if let Some(message) = extra {
        line.push_str("  ");
        line.push_str(message);
    }
    line
}

/// Locally generated status messages repeat the description.
fn is_synthetic(message: &str) -> bool {
    message.contains(" status updated to ")
}

/// Column-aligned `TYPE ID STATUS UPDATED` table, one row per resource.
pub fn format_latest_table(latest: &[(ResourceKey, Arc<Event>)]) -> String {
    if latest.is_empty() {
        return "(no resource events received)\n".to_string();
    }

    let rows: Vec<[String; 4]> = latest
        .iter()
        .map(|(key, event)| {
            [
                key.resource_type.to_string(),
                key.resource_id.clone(),
                event.status_label().unwrap_or("-").to_string(),
                event.timestamp.format(TIME_FORMAT).to_string(),
            ]
        })
        .collect();
    let header = ["TYPE", "ID", "STATUS", "UPDATED"];

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header.map(str::to_string), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kubelive_core::{ClusterHealth, ResourceType, WorkloadStatus, decode_message};

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn event_line_includes_server_message() {
        let event = decode_message(
            Some("workload_status_update"),
            r#"{"workload_id":"w1","status":"Degraded","message":"1 pod crashlooping","timestamp":0}"#,
            None,
            at(0),
        )
        .unwrap()
        .unwrap();
        let line = format_event_line(&event);
        assert!(line.starts_with("1970-01-01T00:00:00Z  workload_status_update"));
        assert!(line.ends_with("workload w1 -> Degraded  1 pod crashlooping"), "{line}");
    }

    #[test]
    fn message_already_in_description_is_not_repeated() {
        let event = decode_message(
            Some("build_failed"),
            r#"{"build_id":"b1","workload_id":"w1","error":"oom","timestamp":0}"#,
            None,
            at(0),
        )
        .unwrap()
        .unwrap();
        assert!(format_event_line(&event).ends_with("build b1 for workload w1 failed: oom"));
    }

    #[test]
    fn synthetic_message_is_not_repeated() {
        let event = Event::workload_status("w1", WorkloadStatus::Running, None, at(0));
        let line = format_event_line(&event);
        assert!(line.ends_with("workload w1 -> Running"), "{line}");
    }

    #[test]
    fn latest_table_aligns_columns() {
        let latest = vec![
            (
                ResourceKey::new(ResourceType::Cluster, "prod-eu"),
                Arc::new(Event::cluster_status("prod-eu", ClusterHealth::Degraded, at(60))),
            ),
            (
                ResourceKey::new(ResourceType::Workload, "w1"),
                Arc::new(Event::workload_status("w1", WorkloadStatus::Running, None, at(0))),
            ),
        ];
        let table = format_latest_table(&latest);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "TYPE      ID       STATUS    UPDATED");
        assert_eq!(lines[1], "cluster   prod-eu  degraded  1970-01-01T00:01:00Z");
        assert_eq!(lines[2], "workload  w1       Running   1970-01-01T00:00:00Z");
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(format_latest_table(&[]), "(no resource events received)\n");
    }
}
