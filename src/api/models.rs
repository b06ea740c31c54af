use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub votes_count: u64,
}

impl Poll {
    pub fn option(&self, option_id: i64) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes_count).sum()
    }
}

// Request/Response DTOs
#[derive(Debug, Serialize)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<NewOption>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewOption {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CastVoteRequest {
    pub option_id: i64,
    pub voter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeRequest {
    pub user_identifier: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteReceipt {
    pub message: String,
    pub option_id: i64,
    pub votes_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeReceipt {
    pub message: String,
    pub likes_count: u64,
}

#[derive(Debug, Serialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserResponse {
    pub status: UserStatus,
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
