//! Notification Bus for lifecycle events
//!
//! The NotificationBus provides an in-process pub/sub mechanism so agents,
//! memory stores and the workflow engine can report what they are doing
//! without knowing who is listening. Listeners subscribe either to one event
//! name (`"memoryUpdated"`) or to a wildcard (`"*"`, `"mem*"`); the two kinds
//! of subscription live in separate tables.
//!
//! Every listener runs inside its own failure boundary: a listener returning
//! an error or panicking is logged and counted, and the remaining listeners
//! still run.

mod event;

pub use event::{Event, EventKind};

use sdk::errors::EngineError;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};

/// Callback invoked for every matching event
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Subscription pattern, parsed from the string passed to `subscribe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Exactly one event kind
    Exact(EventKind),
    /// Every event whose name starts with the prefix (`""` matches all)
    Prefix(String),
}

impl Topic {
    /// Parse `name`, `prefix*` or `*`
    pub fn parse(pattern: &str) -> Result<Self, EngineError> {
        match pattern.strip_suffix('*') {
            Some(prefix) => Ok(Topic::Prefix(prefix.to_string())),
            None => pattern.parse::<EventKind>().map(Topic::Exact),
        }
    }

    fn matches(&self, kind: EventKind) -> bool {
        match self {
            Topic::Exact(k) => *k == kind,
            Topic::Prefix(prefix) => kind.as_str().starts_with(prefix.as_str()),
        }
    }
}

/// Outcome of one emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

struct Entry {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    exact: HashMap<EventKind, Vec<Entry>>,
    wildcard: Vec<(Topic, Entry)>,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert(&mut self, topic: &Topic, entry: Entry) {
        match topic {
            Topic::Exact(kind) => self.exact.entry(*kind).or_default().push(entry),
            Topic::Prefix(_) => self.wildcard.push((topic.clone(), entry)),
        }
    }

    fn remove(&mut self, topic: &Topic, id: u64) -> bool {
        match topic {
            Topic::Exact(kind) => match self.exact.get_mut(kind) {
                Some(entries) => {
                    let before = entries.len();
                    entries.retain(|e| e.id != id);
                    before != entries.len()
                }
                None => false,
            },
            Topic::Prefix(_) => {
                let before = self.wildcard.len();
                self.wildcard.retain(|(_, e)| e.id != id);
                before != self.wildcard.len()
            }
        }
    }

    /// Exact listeners first, then wildcard listeners, each in registration order
    fn listeners_for(&self, kind: EventKind) -> Vec<Listener> {
        let exact = self
            .exact
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|e| Arc::clone(&e.listener));

        let wildcard = self
            .wildcard
            .iter()
            .filter(|(topic, _)| topic.matches(kind))
            .map(|(_, e)| Arc::clone(&e.listener));

        exact.chain(wildcard).collect()
    }
}

/// Handle returned by `subscribe`, used to remove the listener again
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<RwLock<Registry>>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        remove_listener(&self.registry, &self.topic, self.id)
    }

    /// The pattern this subscription was registered with
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

fn remove_listener(registry: &Weak<RwLock<Registry>>, topic: &Topic, id: u64) -> bool {
    match registry.upgrade() {
        Some(registry) => match registry.write() {
            Ok(mut guard) => guard.remove(topic, id),
            Err(poisoned) => poisoned.into_inner().remove(topic, id),
        },
        None => false,
    }
}

/// In-process publish/subscribe bus
///
/// Cloning the bus is cheap; clones share the same listener tables.
#[derive(Clone, Default)]
pub struct NotificationBus {
    registry: Arc<RwLock<Registry>>,
}

impl NotificationBus {
    /// Create a new NotificationBus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an event name or wildcard pattern
    ///
    /// # Errors
    /// Returns `EngineError::UnknownEvent` if `pattern` is neither a known
    /// event name nor a wildcard.
    pub fn subscribe<F>(&self, pattern: &str, listener: F) -> Result<Subscription, EngineError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let topic = Topic::parse(pattern)?;
        let id = self.write(|r| {
            let id = r.allocate_id();
            r.insert(
                &topic,
                Entry {
                    id,
                    listener: Arc::new(listener),
                },
            );
            id
        });

        debug!("Subscribed listener {} to '{}'", id, pattern);
        Ok(Subscription {
            registry: Arc::downgrade(&self.registry),
            topic,
            id,
        })
    }

    /// Subscribe a listener that removes itself after its first invocation
    pub fn once<F>(&self, pattern: &str, listener: F) -> Result<Subscription, EngineError>
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let topic = Topic::parse(pattern)?;
        let weak = Arc::downgrade(&self.registry);
        let fired = AtomicBool::new(false);

        let id = self.write(|r| {
            let id = r.allocate_id();
            let own_topic = topic.clone();
            let wrapped = move |event: &Event| {
                if fired.swap(true, Ordering::SeqCst) {
                    return Ok(());
                }
                remove_listener(&weak, &own_topic, id);
                listener(event)
            };
            r.insert(
                &topic,
                Entry {
                    id,
                    listener: Arc::new(wrapped),
                },
            );
            id
        });

        Ok(Subscription {
            registry: Arc::downgrade(&self.registry),
            topic,
            id,
        })
    }

    /// Number of listeners an event of `kind` would reach
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.read(|r| r.listeners_for(kind).len())
    }

    /// Emit an event synchronously
    ///
    /// Runs exact-name listeners, then matching wildcard listeners. Listener
    /// failures are isolated and reported in the returned `EmitReport`.
    pub fn emit(&self, event: Event) -> EmitReport {
        let kind = event.kind();
        let listeners = self.read(|r| r.listeners_for(kind));
        let mut report = EmitReport::default();

        for listener in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Listener for '{}' failed: {:#}", kind, e);
                    report.failed += 1;
                }
                Err(_) => {
                    warn!("Listener for '{}' panicked", kind);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Emit an event to all matching listeners concurrently
    ///
    /// Each listener runs on the blocking pool. The returned future resolves
    /// only after every listener has settled, successfully or not.
    pub async fn emit_async(&self, event: Event) -> EmitReport {
        let kind = event.kind();
        let listeners = self.read(|r| r.listeners_for(kind));
        let event = Arc::new(event);

        let handles = listeners.into_iter().map(|listener| {
            let event = Arc::clone(&event);
            tokio::task::spawn_blocking(move || listener(&event))
        });

        let mut report = EmitReport::default();
        for outcome in futures::future::join_all(handles).await {
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Async listener for '{}' failed: {:#}", kind, e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Async listener for '{}' did not complete: {}", kind, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        match self.registry.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        match self.registry.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus").finish_non_exhaustive()
    }
}
