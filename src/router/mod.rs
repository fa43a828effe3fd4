//! HTTP surface of the account backend.

pub mod delete;
pub mod login;
pub mod logout;
pub mod picture;
pub mod profile;
pub mod register;
pub mod update;

use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware;
use axum::response::Response;
use axum::routing::{delete as http_delete, get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::user::User;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// JSON extractor running the declarative field rules before the handler.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Session resolved by the [`auth`] middleware.
#[derive(Clone, Debug)]
pub struct CurrentSession {
    /// Opaque session identifier, distinct from the user identity.
    pub id: String,
    /// Snapshot cached at the last refresh.
    pub user: User,
}

/// Session identifier presented on the `Authorization` header.
pub(crate) fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .map(|token| token.replace(BEARER, ""))
}

/// Custom middleware for authentification.
///
/// Resolves the session snapshot before any other work; no credential store
/// read happens here.
async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let Some(id) = session_id(req.headers()) else {
        return Err(ServerError::Unauthorized);
    };
    let Some(user) = state.sessions.read(&id).await else {
        return Err(ServerError::Unauthorized);
    };

    req.extensions_mut().insert(CurrentSession { id, user });
    Ok(next.run(req).await)
}

/// Routes nested under `/user`.
pub fn router(state: AppState) -> Router<AppState> {
    // Multipart framing adds overhead on top of the asset itself; the hard
    // transport limit stays above the policy ceiling so oversized uploads
    // get a proper 413 from the policy instead of a closed connection.
    let upload_limit = state.uploads.max_bytes() * 2 + 1024;

    let authenticated = Router::new()
        // `GET /user/profile` and `/user/dashboard` read the snapshot.
        .route("/profile", get(profile::handler))
        .route("/dashboard", get(profile::handler))
        // `PUT /user/edit-personal-info/:ID` goes to `update`.
        .route("/edit-personal-info/{user_id}", put(update::personal_info))
        // `PUT /user/edit-contact-info/:ID` goes to `update`.
        .route("/edit-contact-info/{user_id}", put(update::contact_info))
        // `PUT /user/edit-profile-pic/:ID` goes to `picture`.
        .route(
            "/edit-profile-pic/{user_id}",
            put(picture::handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // `DELETE /user/delete-profile/:ID` goes to `delete`.
        .route("/delete-profile/{user_id}", http_delete(delete::handler))
        .route_layer(middleware::from_fn_with_state(state, auth));

    Router::new()
        // `POST /user/register` goes to `register`.
        .route("/register", post(register::handler))
        // `POST /user/login` goes to `login`.
        .route("/login", post(login::handler))
        // `GET /user/logout` goes to `logout`.
        .route("/logout", get(logout::handler))
        .merge(authenticated)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use rand::RngCore;
    use serde_json::json;

    use crate::config::{Argon2, Configuration};
    use crate::crypto::PasswordManager;
    use crate::session::SessionManager;
    use crate::token::TokenManager;
    use crate::upload::UploadPolicy;
    use crate::user::{User, UserStore};
    use crate::{AppState, make_request};

    pub(crate) const PASSWORD: &str = "P$soW%920$n&";

    pub(crate) fn state() -> AppState {
        let mut bytes = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let upload_dir = std::env::temp_dir()
            .join(format!("campus-test-{}", hex::encode(bytes)));

        // Cheap argon2 parameters, test only.
        let crypto = PasswordManager::new(Some(Argon2 {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        }))
        .expect("argon2 parameters");

        AppState {
            config: Arc::new(Configuration::default()),
            store: Arc::new(UserStore::memory()),
            sessions: SessionManager::new(Duration::from_secs(3600)),
            crypto: Arc::new(crypto),
            token: TokenManager::new("campus-tests", "test-secret"),
            uploads: UploadPolicy::new(upload_dir, 5 * 1024 * 1024),
        }
    }

    pub(crate) async fn register(app: Router, email: &str) -> User {
        let response = make_request(
            app,
            Method::POST,
            "/user/register",
            None,
            "application/json",
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": email,
                "password": PASSWORD,
                "phone": "9876543210",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    pub(crate) async fn login(app: Router, email: &str) -> super::login::Response {
        let response = make_request(
            app,
            Method::POST,
            "/user/login",
            None,
            "application/json",
            json!({ "email": email, "password": PASSWORD }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }
}
