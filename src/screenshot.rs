use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Whether the request the screenshot belongs to succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotStatus {
    Success,
    Error,
}

impl ScreenshotStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScreenshotMetadata {
    pub request_id: String,
    pub handler: String,
    pub status: ScreenshotStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedScreenshot {
    pub url: String,
    pub key: String,
}

/// Storage seam for final-page screenshots. Persistence is best-effort:
/// callers log failures and carry on.
#[async_trait]
pub trait ScreenshotStore: Send + Sync {
    async fn save(&self, png: &[u8], metadata: &ScreenshotMetadata) -> Result<SavedScreenshot>;
}

fn object_key(metadata: &ScreenshotMetadata, now: DateTime<Utc>) -> String {
    format!(
        "screenshots/{}/{}/{}/{}_{}.png",
        now.format("%Y-%m-%d"),
        metadata.handler,
        metadata.request_id,
        metadata.status.as_str(),
        now.timestamp_millis(),
    )
}

/// Filesystem-backed store rooted at a configured directory. An
/// S3-compatible object store can slot in behind the same trait.
pub struct FsScreenshotStore {
    root: PathBuf,
}

impl FsScreenshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ScreenshotStore for FsScreenshotStore {
    async fn save(&self, png: &[u8], metadata: &ScreenshotMetadata) -> Result<SavedScreenshot> {
        let key = object_key(metadata, Utc::now());
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, png).await?;
        Ok(SavedScreenshot {
            url: format!("file://{}", path.display()),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn object_key_layout() {
        let metadata = ScreenshotMetadata {
            request_id: "req-1".into(),
            handler: "webform".into(),
            status: ScreenshotStatus::Success,
        };
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        let key = object_key(&metadata, now);
        assert_eq!(
            key,
            format!("screenshots/2026-08-30/webform/req-1/success_{}.png", now.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn fs_store_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScreenshotStore::new(dir.path());
        let metadata = ScreenshotMetadata {
            request_id: "req-2".into(),
            handler: "webform-agent".into(),
            status: ScreenshotStatus::Error,
        };

        let saved = store.save(b"\x89PNG fake", &metadata).await.unwrap();
        assert!(saved.key.contains("webform-agent/req-2/error_"));

        let on_disk = tokio::fs::read(dir.path().join(&saved.key)).await.unwrap();
        assert_eq!(on_disk, b"\x89PNG fake");
        assert!(saved.url.starts_with("file://"));
    }
}
