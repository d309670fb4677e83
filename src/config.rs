//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wechat_api::DEFAULT_API_BASE;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // =========================================================================
    // WeChat Official Account (公众号) Configuration
    // =========================================================================
    /// WeChat token for signature verification
    pub wechat_token: String,

    /// WeChat AppID
    pub wechat_app_id: String,

    /// WeChat AppSecret (for access token refresh)
    pub wechat_app_secret: String,

    /// Platform API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Webhook server bind address (receives from WeChat OA)
    #[serde(default = "default_webhook_addr")]
    pub webhook_addr: String,

    // =========================================================================
    // Local State
    // =========================================================================
    /// JSON file holding the last access token
    #[serde(default = "default_token_store_path")]
    pub token_store_path: PathBuf,

    /// Directory searched for the newest `.png` to reply with
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Directory downloaded media is cached in
    #[serde(default = "default_image_dir")]
    pub media_cache_dir: PathBuf,

    /// Custom menu definition (JSON)
    #[serde(default)]
    pub menu_path: Option<PathBuf>,

    /// Push the menu to WeChat at startup
    #[serde(default)]
    pub create_menu_on_start: bool,

    /// Enable debug mode (log raw messages)
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_webhook_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_token_store_path() -> PathBuf {
    PathBuf::from("access_token.json")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("public/imgs")
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let wechat_token = std::env::var("WECHAT_TOKEN").context("WECHAT_TOKEN is required")?;
        let wechat_app_id = std::env::var("WECHAT_APP_ID").context("WECHAT_APP_ID is required")?;
        let wechat_app_secret =
            std::env::var("WECHAT_APP_SECRET").context("WECHAT_APP_SECRET is required")?;

        Ok(Self {
            wechat_token,
            wechat_app_id,
            wechat_app_secret,
            api_base: std::env::var("WECHAT_API_BASE").unwrap_or_else(|_| default_api_base()),
            webhook_addr: std::env::var("WEBHOOK_ADDR").unwrap_or_else(|_| default_webhook_addr()),

            token_store_path: std::env::var("TOKEN_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_token_store_path()),
            image_dir: std::env::var("IMAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_image_dir()),
            media_cache_dir: std::env::var("MEDIA_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_image_dir()),
            menu_path: std::env::var("MENU_PATH").ok().map(PathBuf::from),
            create_menu_on_start: std::env::var("CREATE_MENU_ON_START").is_ok(),
            debug_mode: std::env::var("DEBUG_MODE").is_ok(),
        })
    }

    /// Read and parse the configured menu file
    pub fn load_menu(&self) -> Result<Option<serde_json::Value>> {
        let Some(path) = &self.menu_path else {
            return Ok(None);
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read menu file: {:?}", path))?;
        let menu = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse menu file: {:?}", path))?;
        Ok(Some(menu))
    }
}
