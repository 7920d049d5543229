//! EventStore: bounded, arrival-ordered event log plus a latest-event
//! index per resource.
//!
//! The store is plain data with `&mut self` mutation. Sharing across
//! tasks goes through [`crate::SharedEventStore`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use kubelive_core::{
    ClusterHealth, Event, EventKind, ProjectStatus, ResourceKey, ResourceType, WorkloadStatus,
};

// ─── Constants ───────────────────────────────────────────────────────

/// Default bound on the event log.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Number of events returned in [`EventStats::recent`].
const STATS_RECENT_LIMIT: usize = 10;

// ─── Query Types ─────────────────────────────────────────────────────

/// Conjunctive filter for [`EventStore::filtered_events`]. Unset fields
/// are not constraints. The time window is inclusive at both ends.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventFilter {
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<String>,
    pub kind: Option<EventKind>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl EventFilter {
    fn matches(&self, event: &Event) -> bool {
        if self
            .resource_type
            .is_some_and(|rt| event.resource_type() != Some(rt))
        {
            return false;
        }
        if let Some(id) = &self.resource_id {
            if event.resource_id() != Some(id.as_str()) {
                return false;
            }
        }
        if self.kind.is_some_and(|kind| event.kind() != kind) {
            return false;
        }
        if self.start_time.is_some_and(|start| event.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        true
    }
}

/// Events for one resource (or one resource type) plus its latest event.
#[derive(Debug, Clone, Default)]
pub struct ResourceEvents {
    pub events: Vec<Arc<Event>>,
    pub latest: Option<Arc<Event>>,
}

#[derive(Debug, Clone, Default)]
pub struct EventStats {
    pub total: usize,
    pub recent: Vec<Arc<Event>>,
    pub by_kind: BTreeMap<EventKind, usize>,
}

// ─── EventStore ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EventStore {
    /// Sliding window of the most recently received events, oldest first.
    events: VecDeque<Arc<Event>>,
    /// Newest event (by timestamp) per `(resource type, resource id)`.
    latest_by_resource: HashMap<ResourceKey, Arc<Event>>,
    /// Same rule keyed by id alone, for `latest_event(id)` lookups. Also
    /// covers events that name a resource id without a type.
    latest_by_id: HashMap<String, Arc<Event>>,
    max_history: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Create a store keeping at most `max_history` events (minimum 1).
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            events: VecDeque::new(),
            latest_by_resource: HashMap::new(),
            latest_by_id: HashMap::new(),
            max_history: max_history.max(1),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Append an event, evicting the oldest entries beyond the bound.
    ///
    /// The latest index is updated only for events with both a resource
    /// type and id, and only when the event is strictly newer than the
    /// current entry. Late arrivals never overwrite newer state.
    pub fn add_event(&mut self, event: Event) -> Arc<Event> {
        let event = Arc::new(event);
        self.events.push_back(Arc::clone(&event));
        while self.events.len() > self.max_history {
            self.events.pop_front();
        }
        self.index(&event);
        event
    }

    /// Batch form of [`Self::add_event`]; same end state as adding each
    /// event in order.
    pub fn add_events<I>(&mut self, events: I) -> Vec<Arc<Event>>
    where
        I: IntoIterator<Item = Event>,
    {
        events.into_iter().map(|ev| self.add_event(ev)).collect()
    }

    /// Empty the log and both indexes.
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.latest_by_resource.clear();
        self.latest_by_id.clear();
    }

    /// Drop every event older than `cutoff` and rebuild the latest index
    /// from the survivors.
    pub fn clear_old_events(&mut self, cutoff: DateTime<Utc>) {
        self.events.retain(|ev| ev.timestamp >= cutoff);
        self.rebuild_index();
    }

    /// Change the log bound, trimming the oldest entries if needed.
    /// The latest index is left as is.
    pub fn set_max_history_size(&mut self, size: usize) {
        self.max_history = size.max(1);
        while self.events.len() > self.max_history {
            self.events.pop_front();
        }
    }

    // ── Status Mutators ──────────────────────────────────────────────

    /// Record a local workload status change (e.g. an optimistic update
    /// after a mutation) as if it had arrived from the stream.
    pub fn update_workload_status(
        &mut self,
        workload_id: &str,
        status: WorkloadStatus,
        phase: Option<&str>,
    ) -> Arc<Event> {
        self.add_event(Event::workload_status(workload_id, status, phase, Utc::now()))
    }

    pub fn update_project_status(
        &mut self,
        project_id: &str,
        status: ProjectStatus,
        phase: Option<&str>,
    ) -> Arc<Event> {
        self.add_event(Event::project_status(project_id, status, phase, Utc::now()))
    }

    pub fn update_cluster_status(&mut self, cluster_id: &str, status: ClusterHealth) -> Arc<Event> {
        self.add_event(Event::cluster_status(cluster_id, status, Utc::now()))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Whole log, oldest first.
    pub fn events(&self) -> Vec<Arc<Event>> {
        self.events.iter().cloned().collect()
    }

    pub fn events_for(&self, resource_id: &str) -> Vec<Arc<Event>> {
        self.collect(|ev| ev.resource_id() == Some(resource_id))
    }

    pub fn events_by_type(&self, kind: EventKind) -> Vec<Arc<Event>> {
        self.collect(|ev| ev.kind() == kind)
    }

    pub fn events_by_resource_type(&self, resource_type: ResourceType) -> Vec<Arc<Event>> {
        self.collect(|ev| ev.resource_type() == Some(resource_type))
    }

    pub fn filtered_events(&self, filter: &EventFilter) -> Vec<Arc<Event>> {
        self.collect(|ev| filter.matches(ev))
    }

    /// Newest event ever seen for a resource id, including error reports
    /// that reference it. Agrees with the newest entry of
    /// [`events_for`](Self::events_for) while that entry is in the window.
    pub fn latest_event(&self, resource_id: &str) -> Option<Arc<Event>> {
        self.latest_by_id.get(resource_id).cloned()
    }

    /// Newest event for an exact `(type, id)` key.
    pub fn latest_for(&self, resource_type: ResourceType, resource_id: &str) -> Option<Arc<Event>> {
        self.latest_by_resource
            .get(&ResourceKey::new(resource_type, resource_id))
            .cloned()
    }

    /// Every indexed resource with its newest event, sorted by key.
    pub fn latest_by_resource(&self) -> Vec<(ResourceKey, Arc<Event>)> {
        let mut entries: Vec<_> = self
            .latest_by_resource
            .iter()
            .map(|(key, ev)| (key.clone(), Arc::clone(ev)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// The last `limit` events in arrival order.
    pub fn recent_events(&self, limit: usize) -> Vec<Arc<Event>> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn event_count_by_type(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|ev| ev.kind() == kind).count()
    }

    /// Events for a single resource when `resource_id` is given, otherwise
    /// all events of `resource_type` (with no single latest event).
    pub fn resource_events(
        &self,
        resource_type: ResourceType,
        resource_id: Option<&str>,
    ) -> ResourceEvents {
        match resource_id {
            Some(id) => ResourceEvents {
                events: self.collect(|ev| {
                    ev.resource_type() == Some(resource_type) && ev.resource_id() == Some(id)
                }),
                latest: self.latest_for(resource_type, id),
            },
            None => ResourceEvents {
                events: self.events_by_resource_type(resource_type),
                latest: None,
            },
        }
    }

    pub fn stats(&self) -> EventStats {
        let mut by_kind = BTreeMap::new();
        for ev in &self.events {
            *by_kind.entry(ev.kind()).or_insert(0) += 1;
        }
        EventStats {
            total: self.events.len(),
            recent: self.recent_events(STATS_RECENT_LIMIT),
            by_kind,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn collect(&self, pred: impl Fn(&Event) -> bool) -> Vec<Arc<Event>> {
        self.events.iter().filter(|ev| pred(ev)).cloned().collect()
    }

    fn index(&mut self, event: &Arc<Event>) {
        if let Some(id) = event.resource_id() {
            upsert_if_newer(&mut self.latest_by_id, id.to_string(), event);
        }
        if let Some(key) = event.resource_key() {
            upsert_if_newer(&mut self.latest_by_resource, key, event);
        }
    }

    fn rebuild_index(&mut self) {
        self.latest_by_resource.clear();
        self.latest_by_id.clear();
        let survivors: Vec<Arc<Event>> = self.events.iter().cloned().collect();
        for ev in &survivors {
            self.index(ev);
        }
    }
}

fn upsert_if_newer<K: std::hash::Hash + Eq>(
    map: &mut HashMap<K, Arc<Event>>,
    key: K,
    event: &Arc<Event>,
) {
    match map.get(&key) {
        Some(existing) if event.timestamp <= existing.timestamp => {}
        _ => {
            map.insert(key, Arc::clone(event));
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────
