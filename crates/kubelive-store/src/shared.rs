//! Cloneable handle to one process-wide [`EventStore`].
//!
//! Construct it once at startup and pass clones to every consumer. Each
//! mutation runs to completion under the write lock (never across an
//! `.await`), then bumps a revision counter that subscribers watch.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use kubelive_core::{ClusterHealth, Event, ProjectStatus, WorkloadStatus};

use crate::store::EventStore;

#[derive(Debug, Clone)]
pub struct SharedEventStore {
    inner: Arc<RwLock<EventStore>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for SharedEventStore {
    fn default() -> Self {
        Self::new(EventStore::new())
    }
}

impl SharedEventStore {
    pub fn new(store: EventStore) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(store)),
            revision: Arc::new(revision),
        }
    }

    /// Receiver that changes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Run a read-only query against the store.
    pub fn read<R>(&self, f: impl FnOnce(&EventStore) -> R) -> R {
        f(&self.read_guard())
    }

    /// Run a mutation and notify subscribers afterwards.
    pub fn write<R>(&self, f: impl FnOnce(&mut EventStore) -> R) -> R {
        let result = {
            let mut guard = self.write_guard();
            f(&mut guard)
        };
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
        result
    }

    pub fn add_event(&self, event: Event) -> Arc<Event> {
        self.write(|store| store.add_event(event))
    }

    pub fn add_events(&self, events: Vec<Event>) -> Vec<Arc<Event>> {
        self.write(|store| store.add_events(events))
    }

    pub fn clear_events(&self) {
        tracing::debug!("event store cleared");
        self.write(EventStore::clear_events);
    }

    pub fn clear_old_events(&self, cutoff: DateTime<Utc>) {
        let removed = self.write(|store| {
            let before = store.event_count();
            store.clear_old_events(cutoff);
            before - store.event_count()
        });
        tracing::debug!(removed, %cutoff, "event store pruned");
    }

    pub fn update_workload_status(
        &self,
        workload_id: &str,
        status: WorkloadStatus,
        phase: Option<&str>,
    ) -> Arc<Event> {
        self.write(|store| store.update_workload_status(workload_id, status, phase))
    }

    pub fn update_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
        phase: Option<&str>,
    ) -> Arc<Event> {
        self.write(|store| store.update_project_status(project_id, status, phase))
    }

    pub fn update_cluster_status(&self, cluster_id: &str, status: ClusterHealth) -> Arc<Event> {
        self.write(|store| store.update_cluster_status(cluster_id, status))
    }

    pub fn latest_event(&self, resource_id: &str) -> Option<Arc<Event>> {
        self.read(|store| store.latest_event(resource_id))
    }

    pub fn recent_events(&self, limit: usize) -> Vec<Arc<Event>> {
        self.read(|store| store.recent_events(limit))
    }

    pub fn event_count(&self) -> usize {
        self.read(EventStore::event_count)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, EventStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, EventStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use kubelive_core::ResourceType;

    #[test]
    fn clones_share_state() {
        let store = SharedEventStore::default();
        let other = store.clone();
        store.update_workload_status("w1", WorkloadStatus::Failed, None);
        assert_eq!(other.event_count(), 1);
        assert_eq!(
            other.latest_event("w1").unwrap().resource_type(),
            Some(ResourceType::Workload)
        );
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let store = SharedEventStore::default();
        assert_eq!(store.revision(), 0);
        store.update_cluster_status("c1", ClusterHealth::Healthy);
        store.clear_old_events(Utc::now() - chrono::Duration::hours(1));
        store.clear_events();
        assert_eq!(store.revision(), 3);
    }

    #[tokio::test]
    async fn subscribers_are_notified() {
        let store = SharedEventStore::default();
        let mut rx = store.subscribe();
        let writer = store.clone();
        tokio::spawn(async move {
            writer.update_project_status("p1", ProjectStatus::Ready, None);
        });
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(store.latest_event("p1").unwrap().status_label(), Some("Ready"));
    }
}
