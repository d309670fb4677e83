//! Local media: newest-image lookup for uploads and a cache for downloads

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, WechatError};
use crate::types::MediaKind;
use crate::wechat_api::WechatApiClient;

/// Maximum file size for cached media (20MB - WeChat media limit)
pub const MAX_FILE_SIZE: usize = 20 * 1024 * 1024;

/// Newest file in `dir` (by modification time) with extension `ext`
pub async fn latest_file(dir: &Path, ext: &str) -> Result<PathBuf> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WechatError::NotFound(format!("directory {:?}", dir)));
        }
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if !matches_ext {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| WechatError::NotFound(format!("no .{} file in {:?}", ext, dir)))
}

// =============================================================================
// Media Source
// =============================================================================

/// Supplies a `media_id` for the "latest image" reply
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn latest_image_media_id(&self) -> Result<String>;
}

/// Uploads the newest `.png` from a local directory
pub struct LocalImageSource {
    dir: PathBuf,
    api: Arc<WechatApiClient>,
}

impl LocalImageSource {
    pub fn new(dir: impl Into<PathBuf>, api: Arc<WechatApiClient>) -> Self {
        Self {
            dir: dir.into(),
            api,
        }
    }
}

#[async_trait]
impl MediaSource for LocalImageSource {
    async fn latest_image_media_id(&self) -> Result<String> {
        let path = latest_file(&self.dir, "png").await?;
        debug!("Latest local image: {:?}", path);
        self.api.upload_media(&path, MediaKind::Image).await
    }
}

// =============================================================================
// Media Cache
// =============================================================================

/// Stores media downloaded from WeChat
#[derive(Debug, Clone)]
pub struct MediaCache {
    cache_dir: PathBuf,
}

impl MediaCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Generate a file path for a media ID
    fn get_path(&self, media_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.png", media_id))
    }

    /// Save media data to cache
    pub async fn save(&self, media_id: &str, data: &[u8]) -> Result<PathBuf> {
        if media_id.is_empty() || media_id.contains(['/', '\\']) || media_id.contains("..") {
            return Err(WechatError::NotFound(format!(
                "invalid media id {:?}",
                media_id
            )));
        }

        if data.len() > MAX_FILE_SIZE {
            return Err(WechatError::Upstream(format!(
                "Media file too large: {} bytes (max: {})",
                data.len(),
                MAX_FILE_SIZE
            )));
        }

        fs::create_dir_all(&self.cache_dir).await?;

        let path = self.get_path(media_id);
        fs::write(&path, data).await?;

        debug!(
            "Saved media {} to {:?} ({} bytes)",
            media_id,
            path,
            data.len()
        );
        Ok(path)
    }

    /// Download `media_id` from WeChat into the cache
    pub async fn fetch(&self, api: &WechatApiClient, media_id: &str) -> Result<PathBuf> {
        let data = api.download_media(media_id).await?;
        self.save(media_id, &data).await
    }
}
