use crate::api::client::{ApiClient, send_json};
use crate::api::models::{
    CastVoteRequest, CreatePollRequest, LikeReceipt, NewOption, Poll, ToggleLikeRequest,
    VoteReceipt,
};
use crate::error::ApiError;

/// Lists every poll in the service's storage order (oldest first).
pub async fn fetch_polls(client: &ApiClient) -> Result<Vec<Poll>, ApiError> {
    send_json(client.get("/polls/list_polls")?).await
}

pub async fn create_poll(
    client: &ApiClient,
    question: &str,
    options: &[String],
    created_by: Option<&str>,
) -> Result<Poll, ApiError> {
    let payload = CreatePollRequest {
        question: question.to_string(),
        options: options
            .iter()
            .map(|text| NewOption { text: text.clone() })
            .collect(),
        created_by: created_by.map(str::to_string),
    };

    send_json(client.post("/polls/create_poll")?.json(&payload)).await
}

pub async fn cast_vote(
    client: &ApiClient,
    poll_id: i64,
    option_id: i64,
    voter: Option<&str>,
) -> Result<VoteReceipt, ApiError> {
    let payload = CastVoteRequest {
        option_id,
        voter: voter.map(str::to_string),
    };

    send_json(client.post(&format!("/polls/{poll_id}/vote"))?.json(&payload)).await
}

pub async fn toggle_like(
    client: &ApiClient,
    poll_id: i64,
    user_identifier: Option<&str>,
) -> Result<LikeReceipt, ApiError> {
    let payload = ToggleLikeRequest {
        user_identifier: user_identifier.map(str::to_string),
    };

    send_json(client.post(&format!("/polls/{poll_id}/like"))?.json(&payload)).await
}
