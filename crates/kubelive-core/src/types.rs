use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ─── Resource Type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Cluster,
    Project,
    Workload,
    Build,
    Addon,
}

impl ResourceType {
    pub const ALL: [Self; 5] = [
        Self::Cluster,
        Self::Project,
        Self::Workload,
        Self::Build,
        Self::Addon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Project => "project",
            Self::Workload => "workload",
            Self::Build => "build",
            Self::Addon => "addon",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "project" => Ok(Self::Project),
            "workload" => Ok(Self::Workload),
            "build" => Ok(Self::Build),
            "addon" => Ok(Self::Addon),
            _ => Err(CoreError::UnknownResourceType(s.to_string())),
        }
    }
}

// ─── Resource Status ──────────────────────────────────────────────

/// Workload lifecycle phase as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadStatus {
    Pending,
    Building,
    Deploying,
    Running,
    Degraded,
    Failed,
}

impl WorkloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Building => "Building",
            Self::Deploying => "Deploying",
            Self::Running => "Running",
            Self::Degraded => "Degraded",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "building" => Ok(Self::Building),
            "deploying" => Ok(Self::Deploying),
            "running" => Ok(Self::Running),
            "degraded" => Ok(Self::Degraded),
            "failed" => Ok(Self::Failed),
            _ => Err(CoreError::UnknownStatus {
                resource: "workload",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    Pending,
    Creating,
    Ready,
    Deleting,
    Error,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Creating => "Creating",
            Self::Ready => "Ready",
            Self::Deleting => "Deleting",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "creating" => Ok(Self::Creating),
            "ready" => Ok(Self::Ready),
            "deleting" => Ok(Self::Deleting),
            "error" => Ok(Self::Error),
            _ => Err(CoreError::UnknownStatus {
                resource: "project",
                value: s.to_string(),
            }),
        }
    }
}

/// Cluster health. The stream reports `healthy`/`unhealthy`; local
/// updates may also use `degraded` and `offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

impl ClusterHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for ClusterHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterHealth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "healthy" => Ok(Self::Healthy),
            "degraded" => Ok(Self::Degraded),
            "unhealthy" => Ok(Self::Unhealthy),
            "offline" => Ok(Self::Offline),
            _ => Err(CoreError::UnknownStatus {
                resource: "cluster",
                value: s.to_string(),
            }),
        }
    }
}

// ─── Event Kind ───────────────────────────────────────────────────

/// Closed set of event type tags understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connected,
    Heartbeat,
    WorkloadStatusUpdate,
    ProjectStatusUpdate,
    ClusterStatusUpdate,
    AddonStatusUpdate,
    BuildComplete,
    BuildFailed,
    ErrorReport,
}

impl EventKind {
    pub const ALL: [Self; 9] = [
        Self::Connected,
        Self::Heartbeat,
        Self::WorkloadStatusUpdate,
        Self::ProjectStatusUpdate,
        Self::ClusterStatusUpdate,
        Self::AddonStatusUpdate,
        Self::BuildComplete,
        Self::BuildFailed,
        Self::ErrorReport,
    ];

    /// Wire tag used as the SSE `event:` name.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Heartbeat => "heartbeat",
            Self::WorkloadStatusUpdate => "workload_status_update",
            Self::ProjectStatusUpdate => "project_status_update",
            Self::ClusterStatusUpdate => "cluster_status_update",
            Self::AddonStatusUpdate => "addon_status_update",
            Self::BuildComplete => "build_complete",
            Self::BuildFailed => "build_failed",
            Self::ErrorReport => "error_report",
        }
    }

    /// Resolve a wire tag. Unknown tags yield `None` so newer servers
    /// can introduce event kinds without breaking this client.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ─── Connection State ─────────────────────────────────────────────

/// Lifecycle of a stream connection. Owned by the connection driver;
/// observers only read it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Idle: not started, disabled, or gave up after too many failures.
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Tri-state indicator for UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionIndicator {
    Live,
    Reconnecting,
    Offline,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    pub fn indicator(self) -> ConnectionIndicator {
        match self {
            Self::Connected => ConnectionIndicator::Live,
            Self::Connecting | Self::Reconnecting => ConnectionIndicator::Reconnecting,
            Self::Disconnected => ConnectionIndicator::Offline,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tests ───────────────────────────────────────────────────────
