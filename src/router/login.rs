//! Credential verification and session opening.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    email: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token_type: String,
    /// Signed token handed to the caller; no route here consumes it back.
    pub token: String,
    pub expires_in: u64,
    /// Opaque identifier for the server-side session.
    pub session_id: String,
}

/// Handler to verify credentials and open a session.
///
/// Unknown addresses and wrong passwords answer differently, matching the
/// historical behavior of this surface.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let Some(user) = state.store.find_by_email(&body.email).await? else {
        return Err(ServerError::NotFound);
    };

    if !state.crypto.verify_password(&body.password, &user.password) {
        return Err(ServerError::InvalidCredential);
    }

    let token = state.token.create(&user.id)?;
    let session_id = state.sessions.start(user).await;

    Ok(Json(Response {
        token_type: TOKEN_TYPE.to_owned(),
        token,
        expires_in: crate::token::EXPIRATION_TIME,
        session_id,
    }))
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::TOKEN_TYPE;
    use crate::router::testing::{self, PASSWORD};
    use crate::{app, make_request};

    #[tokio::test]
    async fn test_login_handler() {
        let state = testing::state();
        let app = app(state.clone());
        let user = testing::register(app.clone(), "test@example.org").await;

        let body = testing::login(app, "test@example.org").await;
        assert_eq!(body.token_type, TOKEN_TYPE);
        assert_eq!(body.expires_in, crate::token::EXPIRATION_TIME);
        assert!(body.session_id.is_ascii());

        // The issued token names the authenticated user.
        let claims = state.token.decode(&body.token).unwrap();
        assert_eq!(claims.sub, user.id);

        // The session snapshot matches the stored record.
        let snapshot = state.sessions.read(&body.session_id).await.unwrap();
        assert_eq!(snapshot.email, "test@example.org");
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let app = app(testing::state());

        let response = make_request(
            app,
            Method::POST,
            "/user/login",
            None,
            "application/json",
            json!({ "email": "nobody@example.org", "password": PASSWORD })
                .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let app = app(testing::state());
        testing::register(app.clone(), "test@example.org").await;

        let response = make_request(
            app,
            Method::POST,
            "/user/login",
            None,
            "application/json",
            json!({ "email": "test@example.org", "password": "Wr0ng-P4ssword" })
                .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
