//! Profile picture upload.

use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::CurrentSession;
use crate::user::ProfileService;

const FIELD: &str = "profile_pic";

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    /// Generated asset name now referenced by the user record.
    pub file: String,
}

fn missing_file() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        FIELD,
        ValidationError::new("missing_file")
            .with_message("No file uploaded.".into()),
    );
    errors
}

/// Handler for `PUT /user/edit-profile-pic/:ID`.
///
/// The attachment goes through the upload policy first; only its generated
/// name is written to the credential store. A policy rejection therefore
/// never touches the store, and a store failure leaves the file orphaned on
/// purpose.
pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(session): Extension<CurrentSession>,
    mut multipart: Multipart,
) -> Result<Json<Response>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::ParsingForm(Box::new(err)))?
    {
        if field.name() != Some(FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().unwrap_or_default().to_owned();
        let data = field
            .bytes()
            .await
            .map_err(|err| ServerError::ParsingForm(Box::new(err)))?;

        let asset = state.uploads.store(&file_name, &content_type, &data).await?;

        ProfileService::new(&state.store, &state.sessions)
            .update_picture(&session.id, &user_id, asset.clone())
            .await?;

        return Ok(Json(Response {
            message: "Profile picture has been uploaded successfully."
                .to_owned(),
            file: asset,
        }));
    }

    Err(missing_file().into())
}
