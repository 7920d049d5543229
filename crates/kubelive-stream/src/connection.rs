//! One persistent, self-healing subscription to the event stream.
//!
//! [`StreamConnection`] is a handle; all connection state is owned by a
//! single driver task. The handle talks to the driver through a `watch`
//! control channel and observes it through a `watch` snapshot, so at most
//! one transport and one backoff timer exist per connection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use kubelive_core::{
    ConnectionIndicator, ConnectionState, Event, EventPayload, SubscriptionFilter, decode_message,
};
use kubelive_store::SharedEventStore;

use crate::auth::{TokenPlacement, TokenProvider, same_token};
use crate::config::{StreamConfig, with_query_token};
use crate::error::{ConnectionError, TransportError};
use crate::policy::{ReconnectDecision, ReconnectTracker};
use crate::sse::SseFrame;
use crate::transport::{StreamRequest, Transport};

const MIN_TOKEN_POLL: Duration = Duration::from_millis(10);

// ─── Observable state ────────────────────────────────────────────

/// Point-in-time view of a connection, published by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub state: ConnectionState,
    /// Set when the connection gave up or cannot be configured.
    pub error: Option<ConnectionError>,
    /// Connection id announced by the server's `connected` event.
    pub subscription_id: Option<String>,
    /// 1-based number of the reconnect attempt in progress, 0 otherwise.
    pub retry_attempt: u32,
}

impl StreamSnapshot {
    pub fn indicator(&self) -> ConnectionIndicator {
        self.state.indicator()
    }
}

/// What the consumer asked for. Any change restarts the connection.
#[derive(Debug, Clone, PartialEq)]
struct Control {
    filter: SubscriptionFilter,
    enabled: bool,
    /// Bumped by [`StreamConnection::reconnect`] to force a fresh attempt.
    generation: u64,
}

#[derive(Debug)]
struct LocalEvents {
    events: VecDeque<Arc<Event>>,
    last: Option<Arc<Event>>,
    max: usize,
}

impl LocalEvents {
    fn new(max: usize) -> Self {
        Self {
            events: VecDeque::new(),
            last: None,
            max: max.max(1),
        }
    }

    fn push(&mut self, event: Arc<Event>) {
        self.last = Some(Arc::clone(&event));
        self.events.push_back(event);
        while self.events.len() > self.max {
            self.events.pop_front();
        }
    }

    fn clear(&mut self) {
        self.events.clear();
        self.last = None;
    }
}

fn lock(local: &Mutex<LocalEvents>) -> MutexGuard<'_, LocalEvents> {
    local.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Handle ──────────────────────────────────────────────────────

/// Consumer-side handle. Dropping it tears the connection down.
pub struct StreamConnection {
    control: watch::Sender<Control>,
    snapshot: watch::Receiver<StreamSnapshot>,
    local: Arc<Mutex<LocalEvents>>,
    feed: broadcast::Sender<Arc<Event>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamConnection {
    /// Spawn the driver for one subscription. Must be called from within a
    /// tokio runtime.
    ///
    /// Nothing is attempted while `enabled` is false or `tokens` yields no
    /// token. Decoded events go to the local list, the live feed and, when
    /// given, `store`.
    pub fn open<T: Transport>(
        transport: Arc<T>,
        tokens: Arc<dyn TokenProvider>,
        config: StreamConfig,
        filter: SubscriptionFilter,
        enabled: bool,
        store: Option<SharedEventStore>,
    ) -> Self {
        let (control_tx, control_rx) = watch::channel(Control {
            filter,
            enabled,
            generation: 0,
        });
        let (snapshot_tx, snapshot_rx) = watch::channel(StreamSnapshot::default());
        let local = Arc::new(Mutex::new(LocalEvents::new(config.max_local_events)));
        let (feed, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let cancel = CancellationToken::new();

        let driver = Driver {
            tracker: ReconnectTracker::new(config.policy.clone()),
            token: TokenWatch::new(tokens, config.token_poll_interval),
            transport,
            config,
            control: control_rx,
            snapshot: snapshot_tx,
            local: Arc::clone(&local),
            feed: feed.clone(),
            store,
            cancel: cancel.clone(),
            last_event_id: None,
        };
        let task = tokio::spawn(driver.run());

        Self {
            control: control_tx,
            snapshot: snapshot_rx,
            local,
            feed,
            cancel,
            task: Some(task),
        }
    }

    /// Events received on this connection, oldest first, bounded.
    pub fn events(&self) -> Vec<Arc<Event>> {
        lock(&self.local).events.iter().cloned().collect()
    }

    pub fn last_event(&self) -> Option<Arc<Event>> {
        lock(&self.local).last.clone()
    }

    pub fn clear_local_events(&self) {
        lock(&self.local).clear();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    pub fn error(&self) -> Option<ConnectionError> {
        self.snapshot.borrow().error.clone()
    }

    pub fn subscription_id(&self) -> Option<String> {
        self.snapshot.borrow().subscription_id.clone()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that changes on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<StreamSnapshot> {
        self.snapshot.clone()
    }

    /// Live feed of delivered events. Lagging receivers skip ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.feed.subscribe()
    }

    pub fn filter(&self) -> SubscriptionFilter {
        self.control.borrow().filter.clone()
    }

    /// Replace the filter: closes the current transport and opens a new
    /// one. No-op when the filter is unchanged.
    pub fn set_filter(&self, filter: SubscriptionFilter) {
        self.control.send_if_modified(|c| {
            if c.filter == filter {
                return false;
            }
            c.filter = filter;
            true
        });
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.control.send_if_modified(|c| {
            if c.enabled == enabled {
                return false;
            }
            c.enabled = enabled;
            true
        });
    }

    /// Close the transport and cancel any pending retry. Not a failure:
    /// the retry counter starts over.
    pub fn disconnect(&self) {
        self.set_enabled(false);
    }

    /// Manual retry, e.g. after the connection gave up. Re-enables the
    /// connection and starts from the initial delay.
    pub fn reconnect(&self) {
        self.control.send_modify(|c| {
            c.enabled = true;
            c.generation = c.generation.wrapping_add(1);
        });
    }

    /// Stop the driver and wait for it to release the transport.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─── Driver ──────────────────────────────────────────────────────

enum Step {
    /// Re-read the control value and decide what to do.
    Evaluate,
    Connect,
    Backoff(Duration),
    /// Wait for a control change.
    Idle,
    Stop,
}

/// What woke a suspended step.
enum Wake<T> {
    Cancelled,
    Control { alive: bool },
    Ready(T),
}

/// Tracks the token the driver last acted on. Providers with a change feed
/// are watched; the rest are polled.
struct TokenWatch {
    provider: Arc<dyn TokenProvider>,
    changes: Option<watch::Receiver<u64>>,
    seen: Option<SecretString>,
    poll: Duration,
}

impl TokenWatch {
    fn new(provider: Arc<dyn TokenProvider>, poll: Duration) -> Self {
        Self {
            changes: provider.changes(),
            seen: provider.token(),
            poll: poll.max(MIN_TOKEN_POLL),
            provider,
        }
    }

    /// Reads the token for a connect attempt and remembers it.
    fn current(&mut self) -> Option<SecretString> {
        self.mark_seen();
        self.seen.as_ref().map(|t| SecretString::from(t.expose_secret()))
    }

    fn mark_seen(&mut self) {
        if let Some(changes) = &mut self.changes {
            changes.borrow_and_update();
        }
        self.seen = self.provider.token();
    }

    async fn changed(&mut self) {
        if let Some(changes) = &mut self.changes {
            if changes.changed().await.is_ok() {
                return;
            }
            // Feed closed; fall back to polling.
            self.changes = None;
        }
        self.polled_change().await
    }

    async fn polled_change(&self) {
        loop {
            tokio::time::sleep(self.poll).await;
            if !same_token(self.provider.token().as_ref(), self.seen.as_ref()) {
                return;
            }
        }
    }
}

/// Resolves when the control state or the auth token changes. `false`
/// means the handle is gone.
async fn control_or_token_changed(
    control: &mut watch::Receiver<Control>,
    token: &mut TokenWatch,
) -> bool {
    tokio::select! {
        changed = control.changed() => changed.is_ok(),
        () = token.changed() => {
            info!("auth token changed, restarting event stream");
            true
        }
    }
}

struct Driver<T> {
    transport: Arc<T>,
    token: TokenWatch,
    config: StreamConfig,
    control: watch::Receiver<Control>,
    snapshot: watch::Sender<StreamSnapshot>,
    local: Arc<Mutex<LocalEvents>>,
    feed: broadcast::Sender<Arc<Event>>,
    store: Option<SharedEventStore>,
    cancel: CancellationToken,
    tracker: ReconnectTracker,
    /// Last SSE `id:` seen, replayed as `Last-Event-ID`.
    last_event_id: Option<String>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut step = Step::Evaluate;
        loop {
            step = match step {
                Step::Evaluate => self.evaluate(),
                Step::Connect => self.connect().await,
                Step::Backoff(delay) => self.backoff(delay).await,
                Step::Idle => self.idle().await,
                Step::Stop => break,
            };
        }
        debug!("event stream driver stopped");
    }

    fn evaluate(&mut self) -> Step {
        let enabled = self.control.borrow_and_update().enabled;
        if !enabled {
            self.publish(|s| s.state = ConnectionState::Disconnected);
            return Step::Idle;
        }
        Step::Connect
    }

    async fn connect(&mut self) -> Step {
        let Some(token) = self.token.current() else {
            debug!("no auth token, event stream stays idle");
            self.tracker.reset();
            self.publish(|s| {
                s.state = ConnectionState::Disconnected;
                s.subscription_id = None;
                s.retry_attempt = 0;
            });
            return Step::Idle;
        };

        let url = {
            let control = self.control.borrow();
            self.config.stream_url(&control.filter)
        };
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "cannot build event stream url");
                self.publish(|s| {
                    s.state = ConnectionState::Disconnected;
                    s.error = Some(e);
                });
                return Step::Idle;
            }
        };

        let request = match self.config.token_placement {
            TokenPlacement::Header => StreamRequest {
                url: url.clone(),
                bearer: Some(token),
                last_event_id: self.last_event_id.clone(),
            },
            TokenPlacement::Query => StreamRequest {
                url: with_query_token(url.clone(), &token),
                bearer: None,
                last_event_id: self.last_event_id.clone(),
            },
        };

        let retrying = self.tracker.attempts() > 0;
        self.publish(|s| {
            if !retrying {
                s.state = ConnectionState::Connecting;
            }
        });
        debug!(url = %url, attempt = self.tracker.attempts(), "opening event stream");

        let wake = tokio::select! {
            _ = self.cancel.cancelled() => Wake::Cancelled,
            alive = control_or_token_changed(&mut self.control, &mut self.token) => {
                Wake::Control { alive }
            }
            opened = self.transport.open(&request) => Wake::Ready(opened),
        };
        let mut frames = match wake {
            Wake::Cancelled => return Step::Stop,
            Wake::Control { alive } => return self.restart(alive),
            Wake::Ready(Ok(frames)) => frames,
            Wake::Ready(Err(e)) => return self.schedule_retry(&e),
        };

        info!(url = %url, "event stream connected");
        self.tracker.record_success();
        self.publish(|s| {
            s.state = ConnectionState::Connected;
            s.error = None;
            s.retry_attempt = 0;
        });

        let failure = loop {
            let wake = tokio::select! {
                _ = self.cancel.cancelled() => Wake::Cancelled,
                alive = control_or_token_changed(&mut self.control, &mut self.token) => {
                    Wake::Control { alive }
                }
                frame = frames.next() => Wake::Ready(frame),
            };
            match wake {
                Wake::Cancelled => return Step::Stop,
                Wake::Control { alive } => {
                    drop(frames);
                    return self.restart(alive);
                }
                Wake::Ready(Some(Ok(frame))) => self.handle_frame(frame),
                Wake::Ready(Some(Err(e))) => break e,
                Wake::Ready(None) => break TransportError::Closed,
            }
        };
        drop(frames);
        self.schedule_retry(&failure)
    }

    async fn backoff(&mut self, delay: Duration) -> Step {
        let wake = tokio::select! {
            _ = self.cancel.cancelled() => Wake::Cancelled,
            alive = control_or_token_changed(&mut self.control, &mut self.token) => {
                Wake::Control { alive }
            }
            _ = tokio::time::sleep(delay) => Wake::Ready(()),
        };
        match wake {
            Wake::Cancelled => Step::Stop,
            Wake::Control { alive } => self.restart(alive),
            Wake::Ready(()) => Step::Connect,
        }
    }

    async fn idle(&mut self) -> Step {
        let wake = tokio::select! {
            _ = self.cancel.cancelled() => Wake::Cancelled,
            alive = control_or_token_changed(&mut self.control, &mut self.token) => {
                Wake::Control { alive }
            }
        };
        match wake {
            Wake::Control { alive } => self.restart(alive),
            Wake::Cancelled | Wake::Ready(()) => Step::Stop,
        }
    }

    /// Control or token changed: forget the previous subscription and start
    /// over.
    fn restart(&mut self, alive: bool) -> Step {
        if !alive {
            return Step::Stop;
        }
        self.token.mark_seen();
        self.tracker.reset();
        self.last_event_id = None;
        self.publish(|s| {
            s.error = None;
            s.subscription_id = None;
            s.retry_attempt = 0;
        });
        Step::Evaluate
    }

    fn schedule_retry(&mut self, failure: &TransportError) -> Step {
        match self.tracker.record_failure() {
            ReconnectDecision::Retry { attempt, delay_ms } => {
                let delay_ms = self.tracker.policy().jittered(delay_ms);
                warn!(attempt, delay_ms, error = %failure, "event stream lost, reconnecting");
                self.publish(|s| {
                    s.state = ConnectionState::Reconnecting;
                    s.subscription_id = None;
                    s.retry_attempt = attempt + 1;
                });
                Step::Backoff(Duration::from_millis(delay_ms))
            }
            ReconnectDecision::GiveUp { attempts } => {
                error!(attempts, error = %failure, "event stream gave up reconnecting");
                self.publish(|s| {
                    s.state = ConnectionState::Disconnected;
                    s.subscription_id = None;
                    s.retry_attempt = 0;
                    s.error = Some(ConnectionError::MaxRetriesExceeded {
                        attempts,
                        last_error: failure.to_string(),
                    });
                });
                Step::Idle
            }
        }
    }

    fn handle_frame(&mut self, frame: SseFrame) {
        if let Some(id) = &frame.id {
            self.last_event_id = Some(id.clone());
        }
        let tag = frame.event.as_deref();
        let event = match decode_message(tag, &frame.data, frame.id.as_deref(), Utc::now()) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(tag = tag.unwrap_or("message"), "ignoring unknown event type");
                return;
            }
            Err(e) => {
                warn!(tag = tag.unwrap_or("message"), error = %e, "dropping malformed event");
                return;
            }
        };

        if event.is_heartbeat() {
            trace!("heartbeat");
            return;
        }
        if let EventPayload::Connected(connected) = &event.payload {
            let id = connected.connection_id.clone();
            info!(subscription_id = %id, "event stream subscribed");
            self.publish(|s| s.subscription_id = Some(id));
        }
        if !self.control.borrow().filter.matches(&event) {
            trace!(event_id = %event.id, "event outside filter");
            return;
        }
        self.deliver(event);
    }

    fn deliver(&self, event: Event) {
        let event = match &self.store {
            Some(store) => store.add_event(event),
            None => Arc::new(event),
        };
        lock(&self.local).push(Arc::clone(&event));
        // No receivers is fine.
        let _ = self.feed.send(event);
    }

    fn publish(&self, update: impl FnOnce(&mut StreamSnapshot)) {
        self.snapshot.send_if_modified(|snapshot| {
            let before = snapshot.state;
            let previous = snapshot.clone();
            update(snapshot);
            if snapshot.state != before {
                info!(state = %snapshot.state, "event stream state changed");
            }
            *snapshot != previous
        });
    }
}

// ─── Tests ───────────────────────────────────────────────────────
