//! JS-SDK `wx.config` signing
//!
//! signature = SHA1("jsapi_ticket=T&noncestr=N&timestamp=S&url=U"), fields in
//! that order, values unescaped. The page URL must not include the `#` part.

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::sync::Arc;
use tracing::debug;

use crate::crypto::sha1_hex;
use crate::error::Result;
use crate::types::JsSdkSignature;
use crate::wechat_api::WechatApiClient;

/// Length of the generated `nonceStr`
pub const NONCE_LEN: usize = 16;

/// Random alphanumeric nonce
pub fn nonce_str() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// Signature over fixed inputs
pub fn signature_for(ticket: &str, nonce_str: &str, timestamp: i64, page_url: &str) -> String {
    let string1 = format!(
        "jsapi_ticket={}&noncestr={}&timestamp={}&url={}",
        ticket, nonce_str, timestamp, page_url
    );
    sha1_hex(&string1)
}

/// Produces per-request JS-SDK signatures; tickets are fetched every time
pub struct JsSdkSigner {
    api: Arc<WechatApiClient>,
}

impl JsSdkSigner {
    pub fn new(api: Arc<WechatApiClient>) -> Self {
        Self { api }
    }

    /// Sign `page_url` for `wx.config`
    pub async fn sign(&self, page_url: &str) -> Result<JsSdkSignature> {
        let ticket = self.api.jsapi_ticket().await?;
        let nonce = nonce_str();
        let timestamp = Utc::now().timestamp_millis();

        debug!("Signing JS-SDK config for {}", page_url);

        Ok(JsSdkSignature {
            app_id: self.api.app_id().to_string(),
            timestamp,
            signature: signature_for(&ticket, &nonce, timestamp, page_url),
            nonce_str: nonce,
        })
    }
}
