use crate::api::client::{ApiClient, send_json};
use crate::api::models::{CreateUserRequest, CreateUserResponse};
use crate::error::ApiError;

pub async fn create_user(
    client: &ApiClient,
    email: &str,
    name: Option<&str>,
) -> Result<CreateUserResponse, ApiError> {
    let payload = CreateUserRequest {
        email: email.to_string(),
        name: name.map(str::to_string),
    };

    send_json(client.post("/users/create_user")?.json(&payload)).await
}
