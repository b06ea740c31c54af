//! Reconciled, newest-first poll list for the view layer.
//!
//! A store is mounted against a shared [`EventBroadcaster`] and a
//! [`PollSource`]. It starts in `loading`, issues the bulk fetch once, and
//! applies every broadcast event through [`reduce`] for as long as it stays
//! mounted, including events that arrive before the fetch finishes.

use crate::api::models::Poll;
use crate::error::ApiError;
use crate::live::broadcaster::{EventBroadcaster, SubscriptionId};
use crate::live::models::PollEvent;
use crate::live::reducer::{PollList, empty_list, reduce};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub const LOAD_ERROR_MESSAGE: &str = "Could not load polls. Please try again.";

/// Bulk loader used once per mount.
pub trait PollSource: Send + Sync + 'static {
    fn fetch_polls(&self) -> BoxFuture<'_, Result<Vec<Poll>, ApiError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    Loading,
    Ready,
    Errored(String),
}

#[derive(Debug, Clone)]
pub struct PollsView {
    pub polls: PollList,
    pub loading: bool,
    pub error: Option<String>,
}

impl PollsView {
    fn initial() -> Self {
        PollsView {
            polls: empty_list(),
            loading: true,
            error: None,
        }
    }

    pub fn phase(&self) -> LoadPhase {
        match (&self.error, self.loading) {
            (Some(message), _) => LoadPhase::Errored(message.clone()),
            (None, true) => LoadPhase::Loading,
            (None, false) => LoadPhase::Ready,
        }
    }
}

struct StoreShared {
    view: watch::Sender<PollsView>,
    alive: AtomicBool,
}

impl StoreShared {
    fn apply(&self, event: &PollEvent) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }

        let changed = self.view.send_if_modified(|view| {
            let next = reduce(&view.polls, event);
            if Arc::ptr_eq(&next, &view.polls) {
                return false;
            }
            view.polls = next;
            true
        });

        if !changed {
            debug!("{} event for poll {:?} left the list unchanged", event.kind(), event.poll_id());
        }
    }

    fn install(&self, result: Result<Vec<Poll>, ApiError>) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }

        match result {
            Ok(fetched) => {
                info!("Loaded {} polls", fetched.len());
                self.view.send_modify(|view| {
                    view.polls = merge_loaded(&view.polls, fetched);
                    view.loading = false;
                    view.error = None;
                });
            }
            Err(e) => {
                error!("Failed to fetch polls: {}", e);
                self.view.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(LOAD_ERROR_MESSAGE.to_string());
                });
            }
        }
    }
}

/// Builds the list installed when the bulk load completes.
///
/// `fetched` is in service order (oldest first) and is flipped to
/// newest-first with duplicate ids dropped. Polls already in `current`
/// that the fetch does not know about were created live while it was in
/// flight; they stay in front.
pub fn merge_loaded(current: &PollList, fetched: Vec<Poll>) -> PollList {
    let mut seen = HashSet::with_capacity(fetched.len());
    let loaded: Vec<Arc<Poll>> = fetched
        .into_iter()
        .rev()
        .filter(|poll| seen.insert(poll.id))
        .map(Arc::new)
        .collect();

    let mut merged: Vec<Arc<Poll>> = current
        .iter()
        .filter(|poll| !seen.contains(&poll.id))
        .cloned()
        .collect();
    merged.extend(loaded);
    Arc::new(merged)
}

pub struct PollStore {
    shared: Arc<StoreShared>,
    broadcaster: Arc<EventBroadcaster>,
    subscription: Option<SubscriptionId>,
    load: Option<JoinHandle<()>>,
}

impl PollStore {
    /// Subscribes to `broadcaster` and starts the bulk load.
    ///
    /// Outside a tokio runtime the load cannot be spawned; the store then
    /// settles straight into the errored phase but keeps applying events.
    pub fn mount(broadcaster: Arc<EventBroadcaster>, source: Arc<dyn PollSource>) -> Self {
        let (view, _) = watch::channel(PollsView::initial());
        let shared = Arc::new(StoreShared {
            view,
            alive: AtomicBool::new(true),
        });

        let events = Arc::clone(&shared);
        let subscription = broadcaster.subscribe_messages(move |event| events.apply(event));

        let load = match Handle::try_current() {
            Ok(runtime) => {
                let loader = Arc::clone(&shared);
                Some(runtime.spawn(async move {
                    let result = source.fetch_polls().await;
                    loader.install(result);
                }))
            }
            Err(e) => {
                error!("Cannot load polls without a tokio runtime: {}", e);
                shared.view.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(LOAD_ERROR_MESSAGE.to_string());
                });
                None
            }
        };

        PollStore {
            shared,
            broadcaster,
            subscription: Some(subscription),
            load,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollsView> {
        self.shared.view.subscribe()
    }

    pub fn snapshot(&self) -> PollsView {
        self.shared.view.borrow().clone()
    }

    pub fn polls(&self) -> PollList {
        Arc::clone(&self.shared.view.borrow().polls)
    }

    /// Resolves once the bulk load has succeeded or failed.
    pub async fn wait_until_loaded(&self) -> PollsView {
        let mut rx = self.subscribe();
        match rx.wait_for(|view| !view.loading).await {
            Ok(view) => view.clone(),
            Err(_) => self.snapshot(),
        }
    }

    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for PollStore {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        if let Some(id) = self.subscription.take() {
            self.broadcaster.unsubscribe(id);
        }
        if let Some(load) = self.load.take() {
            load.abort();
        }
        debug!("Poll store unmounted");
    }
}
