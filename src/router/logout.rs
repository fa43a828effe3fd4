//! Session termination.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::router::session_id;

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

/// Handler to close the presented session.
///
/// Terminating an absent or already-closed session is not an error, so no
/// auth middleware gates this route.
pub async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Response> {
    if let Some(id) = session_id(&headers) {
        state.sessions.terminate(&id).await;
    }

    Json(Response {
        message: "Logged out.".to_owned(),
    })
}
