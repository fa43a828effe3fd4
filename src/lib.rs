//! Campus is a lightweight learning-platform backend centered on account
//! and session management.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod crypto;
pub mod error;
mod router;
mod session;
mod token;
mod upload;
mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, header};
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

pub use error::ServerError;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    session_id: Option<&str>,
    content_type: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, content_type);

    if let Some(session_id) = session_id {
        request = request
            .header(header::AUTHORIZATION, format!("Bearer {session_id}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub store: Arc<user::UserStore>,
    pub sessions: session::SessionManager,
    pub crypto: Arc<crypto::PasswordManager>,
    pub token: token::TokenManager,
    pub uploads: upload::UploadPolicy,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        .route("/status.json", get(|| async { "{\"status\":\"ok\"}" }))
        .nest("/user", router::router(state.clone()))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let store = match config.postgres {
        Some(ref postgres) => {
            user::UserStore::postgres(
                &postgres.address,
                &postgres
                    .username
                    .clone()
                    .unwrap_or(user::DEFAULT_CREDENTIALS.into()),
                &postgres
                    .password
                    .clone()
                    .unwrap_or(user::DEFAULT_CREDENTIALS.into()),
                &postgres
                    .database
                    .clone()
                    .unwrap_or(user::DEFAULT_DATABASE_NAME.into()),
                postgres.pool_size.unwrap_or(user::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            // Records will not survive a restart.
            tracing::warn!(
                "missing `postgres` entry on `config.yaml` file; \
                 falling back to the in-memory store"
            );
            user::UserStore::memory()
        },
    };

    let crypto = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);

    // handle jwt.
    let secret = config
        .token
        .as_ref()
        .and_then(|t| t.secret.clone())
        .or_else(|| std::env::var("JWT_SECRET").ok());
    let Some(secret) = secret else {
        tracing::warn!(
            "missing `token.secret` on `config.yaml` file \
             and `JWT_SECRET` environment variable"
        );
        std::process::exit(0);
    };
    let token = token::TokenManager::new(&config.url, &secret);

    let ttl = config.session.clone().unwrap_or_default().ttl_seconds;
    let sessions = session::SessionManager::new(Duration::from_secs(ttl));

    let uploads_config = config.uploads.clone().unwrap_or_default();
    let uploads = upload::UploadPolicy::new(
        uploads_config
            .directory
            .unwrap_or(upload::DEFAULT_DIRECTORY.into()),
        uploads_config.max_bytes.unwrap_or(upload::DEFAULT_MAX_BYTES),
    );

    Ok(AppState {
        config,
        store: Arc::new(store),
        sessions,
        crypto,
        token,
        uploads,
    })
}
