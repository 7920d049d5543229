//! Subscription filter shared by the stream query string and the
//! client-side delivery check.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::event::Event;
use crate::types::ResourceType;

/// Resource-type selector as typed by a user: one of the resource types,
/// or `all` for no type constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceTypeFilter(pub Option<ResourceType>);

impl FromStr for ResourceTypeFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self(None));
        }
        s.parse().map(|rt| Self(Some(rt)))
    }
}

impl fmt::Display for ResourceTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rt) => f.write_str(rt.as_str()),
            None => f.write_str("all"),
        }
    }
}

impl From<ResourceType> for ResourceTypeFilter {
    fn from(resource_type: ResourceType) -> Self {
        Self(Some(resource_type))
    }
}

impl From<ResourceTypeFilter> for Option<ResourceType> {
    fn from(filter: ResourceTypeFilter) -> Self {
        filter.0
    }
}

fn deserialize_resource_type<'de, D>(deserializer: D) -> Result<Option<ResourceType>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    raw.parse::<ResourceTypeFilter>()
        .map(Into::into)
        .map_err(serde::de::Error::custom)
}

/// Constrains which events a subscriber receives. Unset fields are not
/// constraints; the default filter matches everything.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// `"all"` deserializes to `None`.
    #[serde(default, deserialize_with = "deserialize_resource_type")]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub workload_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn resource_type(mut self, resource_type: impl Into<ResourceTypeFilter>) -> Self {
        self.resource_type = resource_type.into().0;
        self
    }

    pub fn cluster(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn workload(mut self, workload_id: impl Into<String>) -> Self {
        self.workload_id = Some(workload_id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resource_type.is_none()
            && self.cluster_id.is_none()
            && self.project_id.is_none()
            && self.workload_id.is_none()
    }

    /// Query parameters understood by the stream endpoint, in a fixed
    /// order: `cluster_id`, `project_id`, `workload_id`, `resource_type`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.cluster_id {
            pairs.push(("cluster_id", id.clone()));
        }
        if let Some(id) = &self.project_id {
            pairs.push(("project_id", id.clone()));
        }
        if let Some(id) = &self.workload_id {
            pairs.push(("workload_id", id.clone()));
        }
        if let Some(rt) = self.resource_type {
            pairs.push(("resource_type", rt.as_str().to_string()));
        }
        pairs
    }

    /// Client-side check applied after decoding.
    ///
    /// Connection-level events always pass. An id criterion only
    /// excludes events that carry a *different* related id; events that
    /// carry no such id at all are left to the server's judgement.
    pub fn matches(&self, event: &Event) -> bool {
        let Some(event_type) = event.resource_type() else {
            return true;
        };
        if self.resource_type.is_some_and(|rt| rt != event_type) {
            return false;
        }
        id_matches(self.cluster_id.as_deref(), event.cluster_id())
            && id_matches(self.project_id.as_deref(), event.project_id())
            && id_matches(self.workload_id.as_deref(), event.workload_id())
    }
}

fn id_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

// ─── Tests ───────────────────────────────────────────────────────
