//! Download step of the load pipeline
//!
//! Remote models are fetched into the download directory. Local paths and
//! `file://` URLs are used where they are, but only beneath the configured
//! local model root; without one they are refused.

use holodraft_core::LoadError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    download_dir: PathBuf,
    local_root: Option<PathBuf>,
}

impl Downloader {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir: download_dir.into(),
            local_root: None,
        }
    }

    /// Allow local model files beneath `root`; relative paths resolve against it
    pub fn with_local_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_root = root;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Resolve `url` to a local file, downloading it when remote.
    ///
    /// `extension` names the file written for remote downloads; when empty
    /// it is taken from the URL path.
    pub async fn fetch(&self, file_id: &str, url: &str, extension: &str) -> Result<PathBuf, LoadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(LoadError::DownloadFailed("empty download url".to_string()));
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return self.download(file_id, url, extension).await;
        }

        self.resolve_local(file_id, url.strip_prefix("file://").unwrap_or(url)).await
    }

    /// Missing, outside-root and non-file paths fail identically so a host
    /// cannot tell them apart.
    async fn resolve_local(&self, file_id: &str, location: &str) -> Result<PathBuf, LoadError> {
        let denied = || LoadError::DownloadFailed(format!("{} is not an available model file", location));

        let Some(root) = &self.local_root else {
            warn!(file = %file_id, path = %location, "Local model paths are disabled");
            return Err(denied());
        };
        let root = tokio::fs::canonicalize(root).await.map_err(|_| denied())?;
        let resolved = tokio::fs::canonicalize(root.join(location))
            .await
            .map_err(|_| denied())?;

        if !resolved.starts_with(&root) {
            warn!(file = %file_id, path = %location, "Local model path escapes the model root");
            return Err(denied());
        }
        match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => {
                debug!(file = %file_id, path = %resolved.display(), "Using local model file");
                Ok(resolved)
            }
            _ => Err(denied()),
        }
    }

    async fn download(&self, file_id: &str, url: &str, extension: &str) -> Result<PathBuf, LoadError> {
        info!(file = %file_id, url = %url, "Downloading model");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            warn!(file = %file_id, url = %url, status = %response.status(), "Model download failed");
            return Err(LoadError::DownloadFailed(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::DownloadFailed(e.to_string()))?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| LoadError::DownloadFailed(format!("{}: {}", self.download_dir.display(), e)))?;

        let path = self.target_path(file_id, url, extension);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| LoadError::DownloadFailed(format!("{}: {}", path.display(), e)))?;

        info!(file = %file_id, path = %path.display(), size = bytes.len(), "Model downloaded");
        Ok(path)
    }

    /// Where a remote download for `file_id` is stored
    pub fn target_path(&self, file_id: &str, url: &str, extension: &str) -> PathBuf {
        let ext = if extension.trim().is_empty() {
            url_extension(url)
        } else {
            extension.trim().trim_start_matches('.').to_ascii_lowercase()
        };
        let stem = sanitize(file_id);
        if ext.is_empty() {
            self.download_dir.join(stem)
        } else {
            self.download_dir.join(format!("{}.{}", stem, ext))
        }
    }
}

/// Extension of the last path segment of a URL, ignoring query and fragment
fn url_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    Path::new(segment)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Keep ids from escaping the download directory
fn sanitize(file_id: &str) -> String {
    let cleaned: String = file_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "model".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_path() {
        let d = Downloader::new("/tmp/dl");
        assert_eq!(
            d.target_path("f1", "https://x/y/model.STL?sig=abc", ""),
            PathBuf::from("/tmp/dl/f1.stl")
        );
        assert_eq!(d.target_path("f1", "https://x/y/blob", "OBJ"), PathBuf::from("/tmp/dl/f1.obj"));
        assert_eq!(d.target_path("../etc/passwd", "https://x/a", ""), PathBuf::from("/tmp/dl/___etc_passwd"));
    }

    #[tokio::test]
    async fn test_local_paths_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("part.obj");
        std::fs::write(&file, "v 0 0 0\n").unwrap();

        let d = Downloader::new(dir.path().join("downloads")).with_local_root(Some(dir.path().to_path_buf()));
        let expected = file.canonicalize().unwrap();
        let resolved = d.fetch("f1", file.to_str().unwrap(), "obj").await.unwrap();
        assert_eq!(resolved, expected);

        let url = format!("file://{}", file.display());
        assert_eq!(d.fetch("f1", &url, "").await.unwrap(), expected);
        assert_eq!(d.fetch("f1", "part.obj", "").await.unwrap(), expected);
        assert!(!dir.path().join("downloads").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let d = Downloader::new(dir.path()).with_local_root(Some(dir.path().to_path_buf()));
        let missing = dir.path().join("nope.stl");
        let err = d.fetch("f1", missing.to_str().unwrap(), "stl").await.unwrap_err();
        assert_eq!(err.code(), "download_failed");
        assert_eq!(d.fetch("f1", "  ", "stl").await.unwrap_err().code(), "download_failed");
    }

    #[tokio::test]
    async fn test_local_paths_confined_to_root() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.obj");
        std::fs::write(&secret, "v 0 0 0\n").unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("models")).unwrap();

        let d = Downloader::new(root.path()).with_local_root(Some(root.path().join("models")));
        let existing = d.fetch("f1", secret.to_str().unwrap(), "obj").await.unwrap_err();
        let missing = d
            .fetch("f1", outside.path().join("absent.obj").to_str().unwrap(), "obj")
            .await
            .unwrap_err();
        let escaped = d.fetch("f1", "../../etc/passwd", "").await.unwrap_err();

        // Existing and missing files outside the root look the same
        assert_eq!(existing.code(), "download_failed");
        assert_eq!(missing.code(), "download_failed");
        assert_eq!(escaped.code(), "download_failed");

        // No root configured: every local path is refused
        let closed = Downloader::new(root.path());
        assert_eq!(
            closed.fetch("f1", secret.to_str().unwrap(), "obj").await.unwrap_err().code(),
            "download_failed"
        );
    }
}
