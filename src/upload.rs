//! Profile picture upload policy.
//!
//! Gatekeeper between the HTTP layer and the asset store: enforces the
//! image-only allow-list and the size ceiling, then writes the attachment
//! under a generated name. Persisting the reference on the user record is
//! the mutation service's job, so a rejected upload never touches the
//! credential store.

use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::error::{Result, ServerError};

/// Accepted extension/content-type pairs.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
];

pub const DEFAULT_DIRECTORY: &str = "uploads/profile_pics";
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024; // 5 MiB.

/// Type and size policy applied to one binary attachment.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    directory: PathBuf,
    max_bytes: usize,
}

impl UploadPolicy {
    /// Create a new [`UploadPolicy`] writing under `directory`.
    pub fn new(directory: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            directory: directory.into(),
            max_bytes,
        }
    }

    /// Size ceiling in bytes for one attachment.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate the attachment and write it to the content store.
    ///
    /// Returns the generated asset name. The name preserves the original
    /// extension but nothing else from the caller, which rules out both
    /// collisions between concurrent uploads and path traversal.
    pub async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String> {
        let extension = checked_extension(file_name, content_type)?;

        if data.len() > self.max_bytes {
            return Err(ServerError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let asset = format!("{}.{extension}", hex::encode(bytes));

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| storage_error("cannot create upload directory", err))?;
        tokio::fs::write(self.directory.join(&asset), data)
            .await
            .map_err(|err| storage_error("cannot write asset", err))?;

        tracing::debug!(%asset, size_bytes = data.len(), "asset stored");
        Ok(asset)
    }
}

fn storage_error(details: &str, err: std::io::Error) -> ServerError {
    ServerError::Storage {
        details: details.to_owned(),
        source: Some(Box::new(err)),
    }
}

/// Check the extension and the declared content-type against the allow-list.
///
/// Both must match an image format; either one alone is not enough.
fn checked_extension(
    file_name: &str,
    content_type: &str,
) -> Result<&'static str> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or(ServerError::UnsupportedType)?;

    ALLOWED_TYPES
        .iter()
        .find(|(ext, mime)| *ext == extension && *mime == content_type)
        .map(|(ext, _)| *ext)
        .ok_or(ServerError::UnsupportedType)
}
