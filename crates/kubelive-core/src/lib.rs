//! kubelive-core: event data model for live cluster, project and workload
//! status. Shared by the stream client and the event store.

pub mod error;
pub mod event;
pub mod filter;
pub mod types;
pub mod wire;

pub use error::CoreError;
pub use event::{
    AddonStatusPayload, BuildCompletePayload, BuildFailedPayload, ClusterStatusPayload,
    ConnectedPayload, ErrorReportPayload, Event, EventPayload, ProjectStatusPayload, ResourceKey,
    WorkloadStatusPayload, generate_event_id,
};
pub use filter::{ResourceTypeFilter, SubscriptionFilter};
pub use types::{
    ClusterHealth, ConnectionIndicator, ConnectionState, EventKind, ProjectStatus, ResourceType,
    WorkloadStatus,
};
pub use wire::decode_message;
