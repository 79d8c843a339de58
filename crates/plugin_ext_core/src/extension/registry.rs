//! Reactive extension registry.
//!
//! # Responsibility
//! - Accept registration batches from plugins and keep valid declarations.
//! - Publish an immutable snapshot keyed by extension point after each batch.
//! - Replay the latest snapshot to every new subscriber.
//!
//! # Invariants
//! - A published snapshot is never mutated; each publication is a new `Arc`.
//! - Entries per extension point keep call order, then declaration order.
//! - An error-marked batch contributes nothing and publishes nothing.
//! - `register` never fails and never lets a subscriber panic escape.
//!
//! Snapshots are handed out through a FIFO delivery queue drained by whichever
//! caller finds it idle. Callbacks may register, subscribe or unsubscribe;
//! nested calls only enqueue and are delivered once the running callback
//! returns. When another thread is already draining, `register` returns as
//! soon as the snapshot is swapped in and that thread delivers it.

use crate::config::RegistryOptions;
use crate::extension::config::ExtensionConfig;
use crate::extension::validate::validate_extension_config;
use crate::logging::sanitize_message;
use log::{debug, error, warn};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Failure reported by the plugin host for a whole plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLoadError {
    message: String,
}

impl PluginLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for PluginLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "plugin failed to load: {}", self.message)
    }
}

impl Error for PluginLoadError {}

/// Declarations submitted by one plugin at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationBatch {
    pub plugin_id: String,
    pub extension_configs: Vec<ExtensionConfig>,
    /// When set, the whole batch is ignored.
    pub error: Option<PluginLoadError>,
}

impl RegistrationBatch {
    pub fn new(plugin_id: impl Into<String>, extension_configs: Vec<ExtensionConfig>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            extension_configs,
            error: None,
        }
    }

    /// Batch for a plugin the host could not load.
    pub fn failed(plugin_id: impl Into<String>, error: PluginLoadError) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            extension_configs: Vec::new(),
            error: Some(error),
        }
    }

    pub fn with_error(mut self, error: PluginLoadError) -> Self {
        self.error = Some(error);
        self
    }
}

/// One validated declaration as published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub plugin_id: String,
    pub config: ExtensionConfig,
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegistrySnapshot {
    points: BTreeMap<String, Vec<RegistryEntry>>,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for one extension point, empty when none were registered.
    pub fn get(&self, extension_point_id: &str) -> &[RegistryEntry] {
        self.points
            .get(extension_point_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sorted extension point ids with at least one entry.
    pub fn extension_point_ids(&self) -> Vec<&str> {
        self.points.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RegistryEntry])> {
        self.points
            .iter()
            .map(|(id, entries)| (id.as_str(), entries.as_slice()))
    }

    /// Number of extension points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of entries across all extension points.
    pub fn entry_count(&self) -> usize {
        self.points.values().map(Vec::len).sum()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<RegistryEntry>> {
        &self.points
    }

    fn with_entries(&self, entries: Vec<RegistryEntry>) -> Self {
        let mut points = self.points.clone();
        for entry in entries {
            points
                .entry(entry.config.extension_point_id.clone())
                .or_default()
                .push(entry);
        }
        Self { points }
    }
}

type SnapshotCallback = Arc<dyn Fn(&Arc<RegistrySnapshot>) + Send + Sync + 'static>;

#[derive(Clone)]
enum SubscriberSink {
    Callback(SnapshotCallback),
    Channel(Sender<Arc<RegistrySnapshot>>),
}

struct Subscriber {
    id: u64,
    sink: SubscriberSink,
}

// Snapshot waiting to be handed to the subscribers that were live when it
// was queued.
struct PendingDelivery {
    snapshot: Arc<RegistrySnapshot>,
    targets: Vec<u64>,
}

struct RegistryState {
    current: Arc<RegistrySnapshot>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    pending: VecDeque<PendingDelivery>,
    // Set while one caller is draining `pending`; others only enqueue.
    draining: bool,
}

struct RegistryInner {
    options: RegistryOptions,
    state: Mutex<RegistryState>,
}

// The state lock is never held while user callbacks run, and every field is
// updated in single assignments, so a poisoned lock still guards consistent
// data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RegistryInner {
    fn current(&self) -> Arc<RegistrySnapshot> {
        lock(&self.state).current.clone()
    }

    fn add_subscriber(self: &Arc<Self>, sink: SubscriberSink) -> Subscription {
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_subscriber_id;
            state.next_subscriber_id += 1;
            state.subscribers.push(Subscriber { id, sink });
            let snapshot = state.current.clone();
            state.pending.push_back(PendingDelivery {
                snapshot,
                targets: vec![id],
            });
            id
        };
        debug!("event=subscribe module=registry status=ok subscriber_id={id}");

        self.drain();
        Subscription {
            id,
            inner: Arc::downgrade(self),
        }
    }

    fn publish(&self, entries: Vec<RegistryEntry>) {
        {
            let mut state = lock(&self.state);
            let next = Arc::new(state.current.with_entries(entries));
            state.current = next.clone();
            let targets = state
                .subscribers
                .iter()
                .map(|subscriber| subscriber.id)
                .collect();
            state.pending.push_back(PendingDelivery {
                snapshot: next,
                targets,
            });
        }
        self.drain();
    }

    // Hands queued snapshots to subscribers in queue order. Nested or
    // concurrent callers find `draining` set and leave their deliveries to
    // the caller already draining.
    fn drain(&self) {
        {
            let mut state = lock(&self.state);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let (snapshot, sinks) = {
                let mut state = lock(&self.state);
                let Some(pending) = state.pending.pop_front() else {
                    state.draining = false;
                    return;
                };
                let sinks = state
                    .subscribers
                    .iter()
                    .filter(|subscriber| pending.targets.contains(&subscriber.id))
                    .map(|subscriber| (subscriber.id, subscriber.sink.clone()))
                    .collect::<Vec<_>>();
                (pending.snapshot, sinks)
            };

            let closed = sinks
                .iter()
                .filter(|(id, sink)| !deliver(*id, sink, &snapshot))
                .map(|(id, _)| *id)
                .collect::<Vec<_>>();
            if !closed.is_empty() {
                self.remove_subscribers(&closed);
            }
        }
    }

    fn remove_subscribers(&self, ids: &[u64]) -> usize {
        let mut state = lock(&self.state);
        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|subscriber| !ids.contains(&subscriber.id));
        before - state.subscribers.len()
    }
}

// Returns false when the sink can no longer receive values.
fn deliver(id: u64, sink: &SubscriberSink, snapshot: &Arc<RegistrySnapshot>) -> bool {
    match sink {
        SubscriberSink::Callback(callback) => {
            if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                error!(
                    "event=deliver module=registry status=error subscriber_id={id} reason=callback_panicked"
                );
            }
            true
        }
        SubscriberSink::Channel(sender) => {
            if sender.send(snapshot.clone()).is_err() {
                debug!(
                    "event=deliver module=registry status=closed subscriber_id={id} reason=receiver_dropped"
                );
                return false;
            }
            true
        }
    }
}

/// Registry of plugin extension declarations with a replaying snapshot stream.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct ReactiveExtensionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for ReactiveExtensionRegistry {
    fn default() -> Self {
        Self::with_options(RegistryOptions::default())
    }
}

impl ReactiveExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                options,
                state: Mutex::new(RegistryState {
                    current: Arc::new(RegistrySnapshot::new()),
                    subscribers: Vec::new(),
                    next_subscriber_id: 0,
                    pending: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.inner.options
    }

    /// Validates and merges one batch, then publishes the new snapshot.
    ///
    /// Invalid declarations are dropped and logged. A batch carrying an error
    /// is ignored entirely and existing subscribers hear nothing.
    pub fn register(&self, batch: RegistrationBatch) {
        let RegistrationBatch {
            plugin_id,
            extension_configs,
            error,
        } = batch;

        if let Some(err) = error {
            warn!(
                "event=register module=registry status=skipped plugin_id={} reason=plugin_error error={}",
                plugin_id,
                sanitize_message(err.message(), MAX_LOGGED_ERROR_CHARS)
            );
            return;
        }

        let declared = extension_configs.len();
        let accepted = extension_configs
            .into_iter()
            .filter(|config| {
                match validate_extension_config(&plugin_id, config, &self.inner.options) {
                    Ok(()) => true,
                    Err(reason) => {
                        warn!(
                            "event=register module=registry status=dropped plugin_id={} extension_point_id={} reason={}",
                            plugin_id,
                            config.extension_point_id,
                            reason
                        );
                        false
                    }
                }
            })
            .map(|config| RegistryEntry {
                plugin_id: plugin_id.clone(),
                config,
            })
            .collect::<Vec<_>>();

        debug!(
            "event=register module=registry status=ok plugin_id={} declared={} accepted={}",
            plugin_id,
            declared,
            accepted.len()
        );

        self.inner.publish(accepted);
    }

    /// Stream handle over snapshots. Cheap to create.
    pub fn as_observable(&self) -> SnapshotObservable {
        SnapshotObservable {
            inner: self.inner.clone(),
        }
    }

    /// Current snapshot; same value a new subscriber would see first.
    pub fn get_registry(&self) -> Arc<RegistrySnapshot> {
        self.inner.current()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state).subscribers.len()
    }
}

/// Multicast stream of registry snapshots with latest-value replay.
///
/// Never completes on its own.
#[derive(Clone)]
pub struct SnapshotObservable {
    inner: Arc<RegistryInner>,
}

impl SnapshotObservable {
    /// Calls `callback` with the current snapshot now, then on every publish.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Arc<RegistrySnapshot>) + Send + Sync + 'static,
    {
        self.inner
            .add_subscriber(SubscriberSink::Callback(Arc::new(callback)))
    }

    /// Channel form of `subscribe` for consumers on other threads.
    ///
    /// The receiver already holds the current snapshot. Dropping it ends the
    /// subscription at the next publish.
    pub fn subscribe_channel(&self) -> Receiver<Arc<RegistrySnapshot>> {
        let (sender, receiver) = mpsc::channel();
        // Dropping the handle keeps the subscription; the receiver owns its lifetime.
        let _ = self.inner.add_subscriber(SubscriberSink::Channel(sender));
        receiver
    }

    /// First value a subscriber would receive.
    pub fn first_value(&self) -> Arc<RegistrySnapshot> {
        self.inner.current()
    }
}

/// Handle for one live subscription.
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<RegistryInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops delivery. Returns false when it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let removed = inner.remove_subscribers(&[self.id]) > 0;
        if removed {
            debug!(
                "event=unsubscribe module=registry status=ok subscriber_id={}",
                self.id
            );
        }
        removed
    }
}
