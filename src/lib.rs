//! Live poll client.
//!
//! Keeps a reconciled, newest-first view of a poll service's polls by
//! combining one bulk fetch with the service's WebSocket push channel.
//!
//! - `live`: channel connection, event broadcaster, reducer and poll store
//! - `api`: HTTP request layer
//! - `identity`: local user handle
//! - `startup`: application root wiring the above together

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod live;
pub mod startup;

pub use api::{ApiClient, Poll, PollOption};
pub use config::Settings;
pub use error::{ApiError, ChannelError, ConfigError, IdentityError};
pub use identity::{IdentityStore, UserIdentity};
pub use live::{
    ChannelConnection, EventBroadcaster, LatestUpdates, LatestUpdatesTracker, LikeUpdate,
    LoadPhase, PollEvent, PollList, PollSource, PollStore, PollsView, VoteUpdate,
};
pub use startup::AppState;
