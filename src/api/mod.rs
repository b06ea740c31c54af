pub mod client;
pub mod models;
pub mod repositories;

pub use client::*;
pub use models::*;
pub use repositories::*;

use crate::error::ApiError;
use crate::live::PollSource;
use futures::future::BoxFuture;

impl PollSource for ApiClient {
    fn fetch_polls(&self) -> BoxFuture<'_, Result<Vec<Poll>, ApiError>> {
        Box::pin(repositories::fetch_polls(self))
    }
}
