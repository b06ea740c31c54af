use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Server responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Unable to encode event: {0}")]
    Encode(String),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt identity file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(error: serde_json::Error) -> Self {
        ChannelError::Malformed(error.to_string())
    }
}
