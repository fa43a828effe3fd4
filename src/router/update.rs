//! Partial profile updates.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{CurrentSession, Valid};
use crate::user::{ProfileService, User, UserUpdate};

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct PersonalInfo {
    #[validate(length(min = 1, message = "First name is required."))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name is required."))]
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ContactInfo {
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    #[validate(custom(
        function = "crate::user::validate_phone",
        message = "Phone number must be 10 digits."
    ))]
    pub phone: Option<String>,
}

/// Handler for `PUT /user/edit-personal-info/:ID`.
pub async fn personal_info(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(session): Extension<CurrentSession>,
    Valid(body): Valid<PersonalInfo>,
) -> Result<Json<User>> {
    let fields = UserUpdate {
        first_name: body.first_name,
        last_name: body.last_name,
        ..Default::default()
    };

    let user = ProfileService::new(&state.store, &state.sessions)
        .update_profile(&session.id, &user_id, fields)
        .await?;

    Ok(Json(user))
}

/// Handler for `PUT /user/edit-contact-info/:ID`.
pub async fn contact_info(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(session): Extension<CurrentSession>,
    Valid(body): Valid<ContactInfo>,
) -> Result<Json<User>> {
    let fields = UserUpdate {
        email: body.email,
        phone: body.phone,
        ..Default::default()
    };

    let user = ProfileService::new(&state.store, &state.sessions)
        .update_profile(&session.id, &user_id, fields)
        .await?;

    Ok(Json(user))
}
