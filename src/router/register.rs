//! Account registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{NewUser, User};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub password: String,
    #[validate(custom(
        function = "crate::user::validate_phone",
        message = "Phone number must be 10 digits."
    ))]
    pub phone: String,
}

/// Handler to create user.
///
/// The plaintext password is hashed exactly once, here, before the store
/// ever sees the record.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<User>)> {
    let password = state.crypto.hash_password(&body.password)?;

    let user = state
        .store
        .create(NewUser {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            password,
            phone: body.phone,
        })
        .await?;

    tracing::info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}
