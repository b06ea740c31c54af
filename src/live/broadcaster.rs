//! Fan-out of channel events to any number of in-process consumers.
//!
//! One broadcaster is owned by the application root and shared by `Arc`.
//! It keeps the ordered history of every event received since it was
//! created, and serves two kinds of subscribers:
//!
//! - history subscribers get the full history each time it grows;
//! - message subscribers get each new event on its own.
//!
//! Message subscribers only see events published after they subscribe.
//! Consumers that need the earlier events can read [`EventBroadcaster::history`].

use crate::live::channel::{ChannelConnection, HandlerId};
use crate::live::models::PollEvent;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{error, trace};

pub type HistoryHandler = Arc<dyn Fn(&EventHistory) + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&PollEvent) + Send + Sync>;

/// Immutable view of the first `len` events of the broadcaster's log.
///
/// The log is append-only, so a snapshot never changes once taken and
/// appending does not copy earlier events. Each append yields a new
/// snapshot that is not [`same_as`](EventHistory::same_as) the previous one.
#[derive(Clone)]
pub struct EventHistory {
    log: Arc<RwLock<Vec<PollEvent>>>,
    len: usize,
}

impl EventHistory {
    fn empty() -> Self {
        EventHistory {
            log: Arc::new(RwLock::new(Vec::new())),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<PollEvent> {
        if index >= self.len {
            return None;
        }
        self.log.read().get(index).cloned()
    }

    pub fn last(&self) -> Option<PollEvent> {
        self.len.checked_sub(1).and_then(|index| self.get(index))
    }

    /// Events at positions `start..len`, oldest first.
    pub fn events_from(&self, start: usize) -> Vec<PollEvent> {
        if start >= self.len {
            return Vec::new();
        }
        self.log.read()[start..self.len].to_vec()
    }

    pub fn to_vec(&self) -> Vec<PollEvent> {
        self.events_from(0)
    }

    pub fn same_as(&self, other: &EventHistory) -> bool {
        Arc::ptr_eq(&self.log, &other.log) && self.len == other.len
    }

    fn append(&self, event: PollEvent) -> EventHistory {
        let mut log = self.log.write();
        // Snapshots only ever hand out the newest one as a base.
        debug_assert_eq!(log.len(), self.len);
        log.push(event);
        EventHistory {
            log: Arc::clone(&self.log),
            len: log.len(),
        }
    }
}

impl std::fmt::Debug for EventHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry {
    history: EventHistory,
    history_subscribers: Vec<(SubscriptionId, HistoryHandler)>,
    message_subscribers: Vec<(SubscriptionId, MessageHandler)>,
    pending: VecDeque<PollEvent>,
    dispatching: bool,
}

/// Clears the dispatching flag if the dispatch loop unwinds.
struct DispatchGuard<'a>(&'a Mutex<Registry>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().dispatching = false;
        }
    }
}

pub struct EventBroadcaster {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        EventBroadcaster {
            registry: Mutex::new(Registry {
                history: EventHistory::empty(),
                history_subscribers: Vec::new(),
                message_subscribers: Vec::new(),
                pending: VecDeque::new(),
                dispatching: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Forwards every decoded event of `channel` into this broadcaster.
    pub fn attach(self: &Arc<Self>, channel: &ChannelConnection) -> HandlerId {
        let weak: Weak<Self> = Arc::downgrade(self);
        channel.on_message(move |event| {
            if let Some(broadcaster) = weak.upgrade() {
                broadcaster.publish(event.clone());
            }
        })
    }

    /// Appends `event` to the history and notifies subscribers in
    /// registration order. Events published from inside a notification are
    /// queued and dispatched after the current one, so every subscriber
    /// observes the same order. A panicking subscriber is logged and
    /// skipped; the others still get the event.
    pub fn publish(&self, event: PollEvent) {
        {
            let mut registry = self.registry.lock();
            registry.pending.push_back(event);
            if registry.dispatching {
                return;
            }
            registry.dispatching = true;
        }
        let _guard = DispatchGuard(&self.registry);

        loop {
            let (event, history, history_subscribers, message_subscribers) = {
                let mut registry = self.registry.lock();
                let Some(event) = registry.pending.pop_front() else {
                    registry.dispatching = false;
                    return;
                };

                registry.history = registry.history.append(event.clone());

                (
                    event,
                    registry.history.clone(),
                    registry.history_subscribers.clone(),
                    registry.message_subscribers.clone(),
                )
            };

            trace!(
                "Dispatching {} event to {} history and {} message subscribers",
                event.kind(),
                history_subscribers.len(),
                message_subscribers.len()
            );

            for (id, handler) in &history_subscribers {
                notify(*id, &event, || handler(&history));
            }
            for (id, handler) in &message_subscribers {
                notify(*id, &event, || handler(&event));
            }
        }
    }

    /// Registers `handler` and returns the history as of registration.
    ///
    /// Every event is either in the returned snapshot or delivered to
    /// `handler` later, never both and never neither.
    pub fn subscribe_history<F>(&self, handler: F) -> (SubscriptionId, EventHistory)
    where
        F: Fn(&EventHistory) + Send + Sync + 'static,
    {
        let id = self.next_subscription_id();
        let mut registry = self.registry.lock();
        registry.history_subscribers.push((id, Arc::new(handler)));
        (id, registry.history.clone())
    }

    pub fn subscribe_messages<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PollEvent) + Send + Sync + 'static,
    {
        let id = self.next_subscription_id();
        self.registry
            .lock()
            .message_subscribers
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.history_subscribers.len() + registry.message_subscribers.len();
        registry.history_subscribers.retain(|(sid, _)| *sid != id);
        registry.message_subscribers.retain(|(sid, _)| *sid != id);
        before != registry.history_subscribers.len() + registry.message_subscribers.len()
    }

    pub fn history(&self) -> EventHistory {
        self.registry.lock().history.clone()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        let registry = self.registry.lock();
        registry.history_subscribers.len() + registry.message_subscribers.len()
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn notify<F: FnOnce()>(id: SubscriptionId, event: &PollEvent, call: F) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!(
            "Subscriber {:?} panicked while handling {} event",
            id,
            event.kind()
        );
    }
}
