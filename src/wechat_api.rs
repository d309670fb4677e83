//! WeChat API Client for Official Account
//!
//! Handles:
//! - Access Token management (through [`TokenCache`])
//! - Custom menu creation
//! - Temporary media upload and download
//! - JS-SDK `jsapi_ticket` fetching

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, WechatError};
use crate::token::{AccessToken, Clock, Credentials, TokenCache, TokenStore};
use crate::types::MediaKind;

// =============================================================================
// API Endpoints
// =============================================================================

/// Production API host
pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";

const MENU_CREATE_PATH: &str = "/cgi-bin/menu/create";
const MEDIA_UPLOAD_PATH: &str = "/cgi-bin/media/upload";
const MEDIA_GET_PATH: &str = "/cgi-bin/media/get";
const TICKET_PATH: &str = "/cgi-bin/ticket/getticket";

/// Generic `{errcode, errmsg}` result
#[derive(Debug, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub errcode: Option<i64>,
    #[serde(default)]
    pub errmsg: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    #[serde(default)]
    ticket: Option<String>,
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

// =============================================================================
// WeChat API Client
// =============================================================================

/// WeChat Official Account API client
pub struct WechatApiClient {
    app_id: String,
    api_base: String,
    http_client: Client,
    tokens: TokenCache,
}

impl WechatApiClient {
    /// Create a new WeChat API client
    pub fn new(
        credentials: Credentials,
        api_base: &str,
        store: Option<TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WechatError::upstream("Failed to build HTTP client", e))?;

        let api_base = api_base.trim_end_matches('/').to_string();
        let app_id = credentials.app_id.clone();
        let mut tokens = TokenCache::new(credentials, &api_base, http_client.clone(), clock);
        if let Some(store) = store {
            tokens = tokens.with_store(store);
        }

        Ok(Self {
            app_id,
            api_base,
            http_client,
            tokens,
        })
    }

    /// Seed the token cache from its store
    pub async fn load_persisted_token(mut self) -> Self {
        self.tokens = self.tokens.load_persisted().await;
        self
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Get a valid access token (refreshes if expired)
    pub async fn access_token(&self) -> Result<AccessToken> {
        self.tokens.get_valid_token().await
    }

    /// Create the custom menu from a menu tree
    pub async fn create_menu(&self, menu: &serde_json::Value) -> Result<ApiStatus> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, MENU_CREATE_PATH);

        let status: ApiStatus = self
            .http_client
            .post(&url)
            .query(&[("access_token", token.value.as_str())])
            .json(menu)
            .send()
            .await
            .map_err(|e| WechatError::upstream("Failed to send menu create request", e))?
            .json()
            .await
            .map_err(|e| WechatError::upstream("Failed to parse menu create response", e))?;

        match status.errcode {
            Some(0) => {}
            Some(code) => {
                warn!("Menu create error: {} - {}", code, status.errmsg);
                return Err(WechatError::Upstream(format!(
                    "menu create failed: {} - {}",
                    code, status.errmsg
                )));
            }
            None => {
                return Err(WechatError::Upstream(
                    "menu create response has no errcode".to_string(),
                ));
            }
        }

        info!("Custom menu created");
        Ok(status)
    }

    /// Upload a local file as temporary media, returning its `media_id`
    pub async fn upload_media(&self, local_path: &Path, kind: MediaKind) -> Result<String> {
        let data = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, MEDIA_UPLOAD_PATH);

        debug!(
            "Uploading {} ({} bytes) as {}",
            file_name,
            data.len(),
            kind.as_str()
        );

        let part = Part::bytes(data).file_name(file_name);
        let form = Form::new().part("media", part);

        let result: MediaUploadResponse = self
            .http_client
            .post(&url)
            .query(&[("access_token", token.value.as_str()), ("type", kind.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| WechatError::upstream("Failed to send media upload request", e))?
            .json()
            .await
            .map_err(|e| WechatError::upstream("Failed to parse media upload response", e))?;

        match result.media_id {
            Some(media_id) if !media_id.is_empty() => {
                info!("Uploaded media {:?} as {}", local_path, media_id);
                Ok(media_id)
            }
            _ => Err(WechatError::Upstream(format!(
                "media upload returned no media_id: {} - {}",
                result.errcode.unwrap_or_default(),
                result.errmsg.unwrap_or_default()
            ))),
        }
    }

    /// Download temporary media by `media_id`
    pub async fn download_media(&self, media_id: &str) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, MEDIA_GET_PATH);

        let response = self
            .http_client
            .get(&url)
            .query(&[("access_token", token.value.as_str()), ("media_id", media_id)])
            .send()
            .await
            .map_err(|e| WechatError::upstream("Failed to send media get request", e))?;

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json") || v.starts_with("text/plain"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WechatError::upstream("Failed to read media body", e))?;

        // Errors come back as a JSON body instead of the media stream
        if is_json {
            return Err(WechatError::Upstream(format!(
                "media get failed: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        debug!("Downloaded media {} ({} bytes)", media_id, bytes.len());
        Ok(bytes.to_vec())
    }

    /// Fetch a fresh `jsapi_ticket`
    pub async fn jsapi_ticket(&self) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, TICKET_PATH);

        let result: TicketResponse = self
            .http_client
            .get(&url)
            .query(&[("access_token", token.value.as_str()), ("type", "jsapi")])
            .send()
            .await
            .map_err(|e| WechatError::upstream("Failed to send ticket request", e))?
            .json()
            .await
            .map_err(|e| WechatError::upstream("Failed to parse ticket response", e))?;

        match result.ticket {
            Some(ticket) if !ticket.is_empty() => Ok(ticket),
            _ => Err(WechatError::Upstream(format!(
                "ticket fetch returned no ticket: {} - {}",
                result.errcode.unwrap_or_default(),
                result.errmsg.unwrap_or_default()
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
