use crate::api::{ApiClient, init_client};
use crate::config::Settings;
use crate::error::ApiError;
use crate::identity::IdentityStore;
use crate::live::{ChannelConnection, EventBroadcaster, LatestUpdatesTracker, PollStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};
use tracing::{info, warn};

/// Application root. Owns the single channel and broadcaster; every
/// consumer gets them from here.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub api: ApiClient,
    pub channel: Arc<ChannelConnection>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub identity: IdentityStore,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        let api = init_client(&settings)?;
        let channel = Arc::new(ChannelConnection::new(
            settings.ws_url.clone(),
            settings.reconnect_delay,
        ));
        let broadcaster = Arc::new(EventBroadcaster::new());
        broadcaster.attach(&channel);
        let identity = IdentityStore::new(settings.identity_path.clone());

        Ok(AppState {
            settings: Arc::new(settings),
            api,
            channel,
            broadcaster,
            identity,
        })
    }

    pub fn connect(&self) {
        info!("Connecting to {}", self.channel.url());
        self.channel.connect();
    }

    pub fn mount_poll_store(&self) -> PollStore {
        PollStore::mount(Arc::clone(&self.broadcaster), Arc::new(self.api.clone()))
    }

    pub fn mount_updates(&self) -> LatestUpdatesTracker {
        LatestUpdatesTracker::mount(Arc::clone(&self.broadcaster))
    }

    /// Periodically reports when the push channel is down.
    pub fn spawn_liveness_monitor(&self, period: Duration) -> JoinHandle<()> {
        let channel = Arc::clone(&self.channel);
        tokio::spawn(async move {
            let mut interval = interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if !channel.is_open() {
                    warn!("Push channel is not connected, live updates paused");
                }
            }
        })
    }
}
