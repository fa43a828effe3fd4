//! Session snapshot reads.

use axum::{Extension, Json};

use crate::router::CurrentSession;
use crate::user::User;

/// Handler serving `/profile` and `/dashboard`.
///
/// Answers straight from the session snapshot; the credential store is
/// never consulted here, staleness is repaired by mutation flows.
pub async fn handler(
    Extension(session): Extension<CurrentSession>,
) -> Json<User> {
    Json(session.user)
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    use crate::router::testing;
    use crate::user::User;
    use crate::{app, make_request};

    #[tokio::test]
    async fn test_profile_returns_snapshot() {
        let app = app(testing::state());
        testing::register(app.clone(), "test@example.org").await;
        let login = testing::login(app.clone(), "test@example.org").await;

        for path in ["/user/profile", "/user/dashboard"] {
            let response = make_request(
                app.clone(),
                Method::GET,
                path,
                Some(&login.session_id),
                "application/json",
                String::default(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let user: User = serde_json::from_slice(&body).unwrap();
            assert_eq!(user.email, "test@example.org");
        }
    }

    #[tokio::test]
    async fn test_profile_rejects_unauthenticated() {
        let app = app(testing::state());

        let response = make_request(
            app.clone(),
            Method::GET,
            "/user/profile",
            None,
            "application/json",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = make_request(
            app,
            Method::GET,
            "/user/profile",
            Some("forged-session-id"),
            "application/json",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
