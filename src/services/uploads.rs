//! Image checks and file-store helpers shared by the upload paths.

use tracing::warn;

use crate::{error::ServiceError, state::SharedState};

/// Image extensions accepted on upload.
const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// A file received from a client, before it reaches the file store.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name sent by the client; only its extension is kept.
    pub file_name: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Wrap a received file.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Reject files that are empty, too large or not a supported image type.
pub fn check_image(field: &str, file: &UploadedFile, max_bytes: usize) -> Result<(), ServiceError> {
    let extension = file
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    if !extension.is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())) {
        return Err(ServiceError::InvalidInput(format!(
            "{field}: only image files are allowed (jpeg, jpg, png, gif, webp)"
        )));
    }
    if file.bytes.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field}: file is empty")));
    }
    if file.bytes.len() > max_bytes {
        return Err(ServiceError::InvalidInput(format!(
            "{field}: file exceeds {max_bytes} bytes"
        )));
    }
    Ok(())
}

/// Persist `file` and return its public reference.
pub async fn store_file(state: &SharedState, file: UploadedFile) -> Result<String, ServiceError> {
    Ok(state
        .file_store()
        .store(file.file_name, file.bytes)
        .await?)
}

/// Best-effort removal of stored files; failures are only logged.
pub async fn discard_files(state: &SharedState, references: Vec<String>) {
    for reference in references {
        if let Err(err) = state.file_store().remove(reference.clone()).await {
            warn!(%reference, error = %err, "failed to remove stored upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: usize) -> UploadedFile {
        UploadedFile::new(name, vec![0; size])
    }

    #[test]
    fn accepts_supported_images_only() {
        assert!(check_image("image1", &file("cover.JPG", 10), 100).is_ok());
        assert!(check_image("image1", &file("cover.webp", 10), 100).is_ok());
        assert!(check_image("image1", &file("cover.svg", 10), 100).is_err());
        assert!(check_image("image1", &file("cover", 10), 100).is_err());
    }

    #[test]
    fn enforces_size_bounds() {
        assert!(check_image("image", &file("a.png", 0), 100).is_err());
        assert!(check_image("image", &file("a.png", 100), 100).is_ok());
        assert!(check_image("image", &file("a.png", 101), 100).is_err());
    }
}
