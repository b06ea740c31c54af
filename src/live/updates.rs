use crate::api::models::Poll;
use crate::live::broadcaster::{EventBroadcaster, EventHistory, SubscriptionId};
use crate::live::models::{LikeUpdate, PollEvent, VoteUpdate};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// The most recent event of each kind seen on the channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestUpdates {
    pub newest_poll: Option<Poll>,
    pub latest_vote: Option<VoteUpdate>,
    pub latest_like: Option<LikeUpdate>,
}

impl LatestUpdates {
    /// Returns `true` if `event` changed a slot.
    pub fn record(&mut self, event: &PollEvent) -> bool {
        match event {
            PollEvent::PollCreated(poll) => replace(&mut self.newest_poll, poll.clone()),
            PollEvent::Vote(update) => replace(&mut self.latest_vote, *update),
            PollEvent::Like(update) => replace(&mut self.latest_like, *update),
            PollEvent::Unknown { kind, .. } => {
                info!("Unhandled channel message type: {}", kind);
                false
            }
        }
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

struct TrackerFeed {
    view: watch::Sender<LatestUpdates>,
    // Number of history events already folded into `view`.
    applied: Mutex<usize>,
}

impl TrackerFeed {
    fn catch_up(&self, history: &EventHistory) {
        let mut applied = self.applied.lock();
        if history.len() <= *applied {
            return;
        }
        let fresh = history.events_from(*applied);
        *applied = history.len();
        self.view.send_if_modified(|updates| {
            let mut changed = false;
            for event in &fresh {
                changed |= updates.record(event);
            }
            changed
        });
    }
}

/// Keeps a [`LatestUpdates`] current from the broadcaster's history feed.
pub struct LatestUpdatesTracker {
    feed: Arc<TrackerFeed>,
    broadcaster: Arc<EventBroadcaster>,
    subscription: Option<SubscriptionId>,
}

impl LatestUpdatesTracker {
    /// Starts from whatever history the broadcaster already holds.
    pub fn mount(broadcaster: Arc<EventBroadcaster>) -> Self {
        let (view, _) = watch::channel(LatestUpdates::default());
        let feed = Arc::new(TrackerFeed {
            view,
            applied: Mutex::new(0),
        });

        let sink = Arc::clone(&feed);
        let (subscription, seed) =
            broadcaster.subscribe_history(move |history| sink.catch_up(history));
        feed.catch_up(&seed);

        LatestUpdatesTracker {
            feed,
            broadcaster,
            subscription: Some(subscription),
        }
    }

    pub fn current(&self) -> LatestUpdates {
        self.feed.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LatestUpdates> {
        self.feed.view.subscribe()
    }

    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for LatestUpdatesTracker {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.broadcaster.unsubscribe(id);
        }
    }
}
