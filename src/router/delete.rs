//! Permanent account deletion.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::router::CurrentSession;
use crate::user::ProfileService;

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

/// Handler for `DELETE /user/delete-profile/:ID`.
///
/// Removes the record, then terminates the caller's session. The two steps
/// are not atomic; a session surviving a crash in between simply expires.
pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Response>> {
    ProfileService::new(&state.store, &state.sessions)
        .delete_profile(&session.id, &user_id)
        .await?;

    tracing::info!(user_id, "user deleted");
    Ok(Json(Response {
        message: "User deleted successfully.".to_owned(),
    }))
}
