//! Image download and storage
//!
//! Images are stored next to the output document in a directory named
//! `<document stem>_images`, one file per source URL. File names are derived
//! from a SHA-256 of the URL so the same image is stored once even when
//! several pages reference it.

use crate::config::ContentFilter;
use crate::pipeline::fetcher::fetch_bytes;
use crate::ImageError;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// Hex characters of the URL hash used in file names
const NAME_HASH_LEN: usize = 16;

/// Writes downloaded images into one directory, honoring the content filter
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    filter: ContentFilter,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, filter: ContentFilter) -> Self {
        Self {
            dir: dir.into(),
            filter,
        }
    }

    /// The image directory belonging to a document path
    ///
    /// `out/site.md` stores its images in `out/site_images/`.
    pub fn dir_for_document(document: &Path) -> PathBuf {
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        document.with_file_name(format!("{}_images", stem))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Downloads an image and writes it into the image directory
    ///
    /// The type is taken from the URL's extension when it has a known one,
    /// otherwise from the response Content-Type. Types the filter does not
    /// allow are rejected, before the download when the URL already says
    /// what it is.
    pub async fn store(&self, client: &Client, url: &Url) -> Result<PathBuf, ImageError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ImageError::InvalidReference(url.to_string()));
        }

        let declared = kind_from_path(url.path());
        if let Some(kind) = &declared {
            self.check_allowed(url, kind)?;
        }

        let (content_type, bytes) = fetch_bytes(client, url).await.map_err(|e| {
            ImageError::Download {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let kind = match declared {
            Some(kind) => kind,
            None => {
                let kind = content_type
                    .as_deref()
                    .and_then(kind_from_content_type)
                    .ok_or_else(|| ImageError::TypeNotAllowed {
                        url: url.to_string(),
                        kind: content_type.clone().unwrap_or_else(|| "unknown".to_string()),
                    })?;
                self.check_allowed(url, &kind)?;
                kind
            }
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name(url, &kind));
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!("Stored image {} as {}", url, path.display());
        Ok(path)
    }

    fn check_allowed(&self, url: &Url, kind: &str) -> Result<(), ImageError> {
        if self.filter.allows_image_type(kind) {
            Ok(())
        } else {
            Err(ImageError::TypeNotAllowed {
                url: url.to_string(),
                kind: kind.to_string(),
            })
        }
    }
}

/// File name for an image: hash prefix of the URL plus the type extension
pub fn file_name(url: &Url, kind: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    format!("{}.{}", &digest[..NAME_HASH_LEN], kind)
}

/// Image type from a known extension at the end of a URL path
pub fn kind_from_path(path: &str) -> Option<String> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ContentFilter::KNOWN_IMAGE_TYPES.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

/// Image type from an `image/*` Content-Type
pub fn kind_from_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let kind = match mime.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        _ => return None,
    };
    Some(kind.to_string())
}
