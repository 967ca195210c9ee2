//! Image download and storage.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::AssetRef;
use crate::error::{Error, Result};

/// Largest image accepted for download.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Trait for storing remote images locally.
pub trait ImageStore: Send + Sync {
    /// Download `url` and store it, returning a reference to the asset.
    fn store_image(&self, url: &str) -> impl std::future::Future<Output = Result<AssetRef>> + Send;
}

/// Downloads images over HTTP into a content-addressed directory.
///
/// Files are named `<sha256>.<ext>`, so the same image fetched twice is
/// written once.
#[derive(Debug, Clone)]
pub struct HttpImageStore {
    client: reqwest::Client,
    assets_dir: PathBuf,
}

impl HttpImageStore {
    /// Create a store writing into `assets_dir` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the HTTP client cannot be built.
    pub fn new(assets_dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, assets_dir })
    }
}

impl ImageStore for HttpImageStore {
    async fn store_image(&self, url: &str) -> Result<AssetRef> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("Invalid image URL {url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidArgument(format!("Unsupported image URL scheme: {url}")));
        }

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Image download from {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("Image download from {url} returned {status}")));
        }
        if response.content_length().is_some_and(|len| len > MAX_IMAGE_BYTES) {
            return Err(Error::Sink(format!("Image at {url} exceeds {MAX_IMAGE_BYTES} bytes")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase());
        if let Some(ct) = content_type.as_deref() {
            if !ct.starts_with("image/") {
                return Err(Error::Sink(format!("{url} is not an image ({ct})")));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("Image download from {url} failed: {e}")))?;
        if bytes.is_empty() {
            return Err(Error::Sink(format!("Image at {url} is empty")));
        }
        if bytes.len() as u64 > MAX_IMAGE_BYTES {
            return Err(Error::Sink(format!("Image at {url} exceeds {MAX_IMAGE_BYTES} bytes")));
        }

        let id = format!("{:x}", Sha256::digest(&bytes));
        let ext = extension(content_type.as_deref(), &parsed);
        let file_path = self.assets_dir.join(format!("{id}.{ext}"));

        if file_path.exists() {
            debug!(path = %file_path.display(), "Image already stored");
        } else {
            fs::create_dir_all(&self.assets_dir)?;
            let tmp = file_path.with_extension(format!("{ext}.tmp"));
            fs::write(&tmp, &bytes)?;
            fs::rename(&tmp, &file_path)?;
            debug!(path = %file_path.display(), bytes = bytes.len(), "Stored image");
        }

        Ok(AssetRef {
            id,
            source_url: url.to_string(),
            file_path,
        })
    }
}

/// File extension from the content type, falling back to the URL path.
fn extension(content_type: Option<&str>, url: &reqwest::Url) -> String {
    let from_type = match content_type {
        Some("image/jpeg" | "image/jpg") => Some("jpg"),
        Some("image/png") => Some("png"),
        Some("image/gif") => Some("gif"),
        Some("image/webp") => Some("webp"),
        Some("image/svg+xml") => Some("svg"),
        _ => None,
    };
    if let Some(ext) = from_type {
        return ext.to_string();
    }

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "img".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    #[tokio::test]
    async fn test_store_image_writes_content_addressed_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_BYTES, "image/png"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = HttpImageStore::new(dir.path().join("assets"), Duration::from_secs(5)).unwrap();
        let url = format!("{}/logo.png", server.uri());

        let asset = store.store_image(&url).await.unwrap();
        assert_eq!(asset.id.len(), 64);
        assert_eq!(asset.source_url, url);
        assert_eq!(asset.file_path.extension().unwrap(), "png");
        assert_eq!(fs::read(&asset.file_path).unwrap(), PNG_BYTES);

        let again = store.store_image(&url).await.unwrap();
        assert_eq!(again, asset);
    }

    #[tokio::test]
    async fn test_store_image_rejects_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = HttpImageStore::new(dir.path().to_path_buf(), Duration::from_secs(5)).unwrap();

        let err = store
            .store_image(&format!("{}/missing.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        let err = store
            .store_image(&format!("{}/page", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));

        let err = store.store_image("ftp://cdn.test/x.png").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_extension_fallbacks() {
        let url = reqwest::Url::parse("https://cdn.test/a/photo.JPEG?size=s").unwrap();
        assert_eq!(extension(Some("image/png"), &url), "png");
        assert_eq!(extension(None, &url), "jpeg");

        let bare = reqwest::Url::parse("https://cdn.test/logo").unwrap();
        assert_eq!(extension(Some("image/x-icon"), &bare), "img");
    }
}
