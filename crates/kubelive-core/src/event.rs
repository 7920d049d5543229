//! Typed events describing resource state changes.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{ClusterHealth, EventKind, ProjectStatus, ResourceType, WorkloadStatus};

// ─── Payloads ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadStatusPayload {
    pub workload_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub status: WorkloadStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub available_replicas: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatusPayload {
    pub project_id: String,
    #[serde(default)]
    pub cluster_id: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub phase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatusPayload {
    pub cluster_id: String,
    pub status: ClusterHealth,
    #[serde(default)]
    pub kubernetes_version: Option<String>,
    #[serde(default)]
    pub node_count: Option<u32>,
    #[serde(default)]
    pub message: String,
}

/// Addon updates have no fixed schema; the identifying fields are
/// lifted out and everything else is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonStatusPayload {
    #[serde(default, alias = "instance_id")]
    pub addon_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildCompletePayload {
    pub build_id: String,
    pub workload_id: String,
    pub image_digest: String,
    /// Build duration in seconds.
    #[serde(default)]
    pub build_duration: f64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildFailedPayload {
    pub build_id: String,
    pub workload_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReportPayload {
    pub error_type: String,
    pub message: String,
    #[serde(default)]
    pub resource_id: Option<String>,
}

/// Event body, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    Connected(ConnectedPayload),
    Heartbeat,
    WorkloadStatusUpdate(WorkloadStatusPayload),
    ProjectStatusUpdate(ProjectStatusPayload),
    ClusterStatusUpdate(ClusterStatusPayload),
    AddonStatusUpdate(AddonStatusPayload),
    BuildComplete(BuildCompletePayload),
    BuildFailed(BuildFailedPayload),
    ErrorReport(ErrorReportPayload),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected(_) => EventKind::Connected,
            Self::Heartbeat => EventKind::Heartbeat,
            Self::WorkloadStatusUpdate(_) => EventKind::WorkloadStatusUpdate,
            Self::ProjectStatusUpdate(_) => EventKind::ProjectStatusUpdate,
            Self::ClusterStatusUpdate(_) => EventKind::ClusterStatusUpdate,
            Self::AddonStatusUpdate(_) => EventKind::AddonStatusUpdate,
            Self::BuildComplete(_) => EventKind::BuildComplete,
            Self::BuildFailed(_) => EventKind::BuildFailed,
            Self::ErrorReport(_) => EventKind::ErrorReport,
        }
    }
}

// ─── Event ────────────────────────────────────────────────────────

/// One observed state change. Immutable once built; stores share it
/// behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Build an event with a locally generated id.
    pub fn new(payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: generate_event_id(Utc::now()),
            timestamp,
            payload,
        }
    }

    pub fn with_id(id: impl Into<String>, payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            payload,
        }
    }

    /// Synthetic workload status change, used for local updates.
    pub fn workload_status(
        workload_id: impl Into<String>,
        status: WorkloadStatus,
        phase: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let message = status_message(ResourceType::Workload, status.as_str(), phase);
        Self::new(
            EventPayload::WorkloadStatusUpdate(WorkloadStatusPayload {
                workload_id: workload_id.into(),
                project_id: None,
                status,
                message,
                phase: phase.map(str::to_owned),
                replicas: None,
                available_replicas: None,
            }),
            timestamp,
        )
    }

    pub fn project_status(
        project_id: impl Into<String>,
        status: ProjectStatus,
        phase: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let message = status_message(ResourceType::Project, status.as_str(), phase);
        Self::new(
            EventPayload::ProjectStatusUpdate(ProjectStatusPayload {
                project_id: project_id.into(),
                cluster_id: None,
                status,
                message,
                phase: phase.map(str::to_owned),
            }),
            timestamp,
        )
    }

    pub fn cluster_status(
        cluster_id: impl Into<String>,
        status: ClusterHealth,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let message = status_message(ResourceType::Cluster, status.as_str(), None);
        Self::new(
            EventPayload::ClusterStatusUpdate(ClusterStatusPayload {
                cluster_id: cluster_id.into(),
                status,
                kubernetes_version: None,
                node_count: None,
                message,
            }),
            timestamp,
        )
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.payload, EventPayload::Heartbeat)
    }

    /// Resource this event describes. `None` for connection-level events.
    pub fn resource_type(&self) -> Option<ResourceType> {
        match &self.payload {
            EventPayload::WorkloadStatusUpdate(_) => Some(ResourceType::Workload),
            EventPayload::ProjectStatusUpdate(_) => Some(ResourceType::Project),
            EventPayload::ClusterStatusUpdate(_) => Some(ResourceType::Cluster),
            EventPayload::AddonStatusUpdate(_) => Some(ResourceType::Addon),
            EventPayload::BuildComplete(_) | EventPayload::BuildFailed(_) => {
                Some(ResourceType::Build)
            }
            EventPayload::Connected(_) | EventPayload::Heartbeat | EventPayload::ErrorReport(_) => {
                None
            }
        }
    }

    pub fn resource_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::WorkloadStatusUpdate(p) => Some(&p.workload_id),
            EventPayload::ProjectStatusUpdate(p) => Some(&p.project_id),
            EventPayload::ClusterStatusUpdate(p) => Some(&p.cluster_id),
            EventPayload::AddonStatusUpdate(p) => p.addon_id.as_deref(),
            EventPayload::BuildComplete(p) => Some(&p.build_id),
            EventPayload::BuildFailed(p) => Some(&p.build_id),
            EventPayload::ErrorReport(p) => p.resource_id.as_deref(),
            EventPayload::Connected(_) | EventPayload::Heartbeat => None,
        }
    }

    /// Key into the latest-state index, present only when both the
    /// resource type and id are known.
    pub fn resource_key(&self) -> Option<ResourceKey> {
        Some(ResourceKey::new(self.resource_type()?, self.resource_id()?))
    }

    pub fn cluster_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::ClusterStatusUpdate(p) => Some(&p.cluster_id),
            EventPayload::ProjectStatusUpdate(p) => p.cluster_id.as_deref(),
            _ => None,
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::ProjectStatusUpdate(p) => Some(&p.project_id),
            EventPayload::WorkloadStatusUpdate(p) => p.project_id.as_deref(),
            EventPayload::AddonStatusUpdate(p) => p.project_id.as_deref(),
            _ => None,
        }
    }

    pub fn workload_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::WorkloadStatusUpdate(p) => Some(&p.workload_id),
            EventPayload::BuildComplete(p) => Some(&p.workload_id),
            EventPayload::BuildFailed(p) => Some(&p.workload_id),
            _ => None,
        }
    }

    /// Status or phase label carried by the event, if any.
    pub fn status_label(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::WorkloadStatusUpdate(p) => Some(p.status.as_str()),
            EventPayload::ProjectStatusUpdate(p) => Some(p.status.as_str()),
            EventPayload::ClusterStatusUpdate(p) => Some(p.status.as_str()),
            EventPayload::AddonStatusUpdate(p) => p.status.as_deref(),
            EventPayload::BuildComplete(_) => Some("Complete"),
            EventPayload::BuildFailed(_) => Some("Failed"),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        let msg = match &self.payload {
            EventPayload::WorkloadStatusUpdate(p) => p.message.as_str(),
            EventPayload::ProjectStatusUpdate(p) => p.message.as_str(),
            EventPayload::ClusterStatusUpdate(p) => p.message.as_str(),
            EventPayload::AddonStatusUpdate(p) => p.message.as_deref().unwrap_or(""),
            EventPayload::BuildComplete(p) => p.message.as_str(),
            EventPayload::BuildFailed(p) => p.error.as_str(),
            EventPayload::ErrorReport(p) => p.message.as_str(),
            EventPayload::Connected(_) | EventPayload::Heartbeat => "",
        };
        if msg.is_empty() { None } else { Some(msg) }
    }

    /// Short single-line description for logs and terminal output.
    pub fn description(&self) -> String {
        match &self.payload {
            EventPayload::Connected(p) => format!("connected ({})", p.connection_id),
            EventPayload::Heartbeat => "heartbeat".to_string(),
            EventPayload::WorkloadStatusUpdate(p) => match (p.available_replicas, p.replicas) {
                (Some(avail), Some(total)) => {
                    format!("workload {} -> {} ({avail}/{total})", p.workload_id, p.status)
                }
                _ => format!("workload {} -> {}", p.workload_id, p.status),
            },
            EventPayload::ProjectStatusUpdate(p) => {
                format!("project {} -> {}", p.project_id, p.status)
            }
            EventPayload::ClusterStatusUpdate(p) => match p.node_count {
                Some(nodes) => format!("cluster {} -> {} ({nodes} nodes)", p.cluster_id, p.status),
                None => format!("cluster {} -> {}", p.cluster_id, p.status),
            },
            EventPayload::AddonStatusUpdate(p) => format!(
                "addon {} -> {}",
                p.addon_id.as_deref().unwrap_or("?"),
                p.status.as_deref().unwrap_or("updated")
            ),
            EventPayload::BuildComplete(p) => format!(
                "build {} for workload {} completed in {:.1}s",
                p.build_id, p.workload_id, p.build_duration
            ),
            EventPayload::BuildFailed(p) => format!(
                "build {} for workload {} failed: {}",
                p.build_id, p.workload_id, p.error
            ),
            EventPayload::ErrorReport(p) => match &p.resource_id {
                Some(id) => format!("error [{}] on {id}: {}", p.error_type, p.message),
                None => format!("error [{}]: {}", p.error_type, p.message),
            },
        }
    }
}

// ─── Resource Key ─────────────────────────────────────────────────

/// `(resource type, resource id)` pair identifying one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}

// ─── Helpers ──────────────────────────────────────────────────────

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Locally generated id: `{unix millis}-{9 base36 chars}`.
pub fn generate_event_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{suffix}", now.timestamp_millis())
}

fn status_message(resource: ResourceType, status: &str, phase: Option<&str>) -> String {
    match phase {
        Some(phase) => format!("{resource} status updated to {status} ({phase})"),
        None => format!("{resource} status updated to {status}"),
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn generated_ids_have_millis_prefix_and_base36_suffix() {
        let now = at(1_700_000_000);
        let id = generate_event_id(now);
        let (prefix, suffix) = id.split_once('-').unwrap();
        assert_eq!(prefix, "1700000000000");
        assert_eq!(suffix.len(), 9);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
        assert_ne!(generate_event_id(now), generate_event_id(now));
    }

    #[test]
    fn workload_status_event_carries_resource_association() {
        let ev = Event::workload_status("w1", WorkloadStatus::Running, None, at(10));
        assert_eq!(ev.kind(), EventKind::WorkloadStatusUpdate);
        assert_eq!(ev.resource_type(), Some(ResourceType::Workload));
        assert_eq!(ev.resource_id(), Some("w1"));
        assert_eq!(ev.status_label(), Some("Running"));
        assert_eq!(ev.message(), Some("workload status updated to Running"));
        assert_eq!(
            ev.resource_key(),
            Some(ResourceKey::new(ResourceType::Workload, "w1"))
        );
    }

    #[test]
    fn status_message_includes_phase() {
        let ev = Event::project_status("p1", ProjectStatus::Creating, Some("namespace"), at(0));
        assert_eq!(
            ev.message(),
            Some("project status updated to Creating (namespace)")
        );
    }

    #[test]
    fn connection_level_events_have_no_resource_key() {
        let connected = Event::with_id(
            "c",
            EventPayload::Connected(ConnectedPayload {
                connection_id: "conn-1".into(),
            }),
            at(0),
        );
        assert_eq!(connected.resource_type(), None);
        assert_eq!(connected.resource_key(), None);

        let err = Event::with_id(
            "e",
            EventPayload::ErrorReport(ErrorReportPayload {
                error_type: "quota".into(),
                message: "quota exceeded".into(),
                resource_id: Some("w9".into()),
            }),
            at(0),
        );
        assert_eq!(err.resource_id(), Some("w9"));
        assert_eq!(err.resource_key(), None);
    }

    #[test]
    fn build_events_relate_to_their_workload() {
        let ev = Event::with_id(
            "b",
            EventPayload::BuildFailed(BuildFailedPayload {
                build_id: "b1".into(),
                workload_id: "w1".into(),
                error: "exit 1".into(),
            }),
            at(0),
        );
        assert_eq!(ev.resource_type(), Some(ResourceType::Build));
        assert_eq!(ev.resource_id(), Some("b1"));
        assert_eq!(ev.workload_id(), Some("w1"));
        assert_eq!(ev.message(), Some("exit 1"));
    }

    #[test]
    fn serialized_event_is_tagged_with_wire_name() {
        let ev = Event::with_id(
            "x",
            EventPayload::ClusterStatusUpdate(ClusterStatusPayload {
                cluster_id: "c1".into(),
                status: ClusterHealth::Healthy,
                kubernetes_version: Some("1.30".into()),
                node_count: Some(3),
                message: String::new(),
            }),
            at(0),
        );
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event_type"], "cluster_status_update");
        assert_eq!(json["cluster_id"], "c1");
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["id"], "x");
    }
}
