use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    constants::{IMAGE_DIRECTORY, IMAGE_EXTENSIONS},
    database::error::TypeError,
    error::{Error, HtmlError},
};

/*
Images arrive inline in the JSON payload as data URIs:

data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABAQMAAAAl21bKAAAAA1BMVEUAAACnej3aAAAAAXRSTlMAQObYZgAAAApJREFUCNdjYAAAAAIAAeIhvDMAAAAASUVORK5CYII=
*/

#[derive(Debug, Clone, PartialEq)]
pub struct Base64Image {
    pub extension: &'static str,
    pub data: Vec<u8>,
}

impl TryFrom<&str> for Base64Image {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (header, payload) = value
            .split_once(',')
            .ok_or_else(|| TypeError::new("Invalid image; Expected a base64 data URI"))?;

        let media_type = header
            .strip_prefix("data:")
            .and_then(|header| header.strip_suffix(";base64"))
            .ok_or_else(|| TypeError::new("Invalid image; Expected a base64 data URI"))?;

        let extension = media_type
            .strip_prefix("image/")
            .and_then(|subtype| {
                IMAGE_EXTENSIONS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(subtype))
                    .map(|(_, extension)| *extension)
            })
            .ok_or_else(|| TypeError::new("Invalid image; Unsupported image type"))?;

        let data = STANDARD
            .decode(payload.trim())
            .map_err(|_| TypeError::new("Invalid image; Malformed base64 data"))?;

        if data.is_empty() {
            return Err(TypeError::new("Invalid image; Image is empty"));
        }

        Ok(Self { extension, data })
    }
}

impl Base64Image {
    /// Writes the image under `media_root` and returns its path relative to it.
    pub async fn save(&self, media_root: &Path) -> Result<String, Error> {
        let relative = format!(
            "{IMAGE_DIRECTORY}/{}.{}",
            uuid::Uuid::new_v4().simple(),
            self.extension
        );
        let path = media_root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                log::error!("Failed to create {}: {e}", parent.display());
                HtmlError::InternalServerError.default()
            })?;
        }

        tokio::fs::write(&path, &self.data).await.map_err(|e| {
            log::error!("Failed to write {}: {e}", path.display());
            HtmlError::InternalServerError.default()
        })?;

        log::debug!("Stored image {relative}");
        Ok(relative)
    }
}

pub fn media_path(media_root: &Path, relative: &str) -> PathBuf {
    media_root.join(relative)
}

/// Removes a stored image, a missing file is not an error.
pub async fn delete_image(media_root: &Path, relative: &str) {
    if relative.is_empty() {
        return;
    }

    let path = media_path(media_root, relative);
    match tokio::fs::remove_file(&path).await {
        Ok(_) => log::debug!("Removed image {relative}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
    }
}

pub fn absolute_url(media_url: &str, relative: &str) -> String {
    if relative.is_empty() {
        return String::new();
    }

    format!(
        "{}/{}",
        media_url.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
