//! Message types for the WeChat Official Account webhook and API

use serde::{Deserialize, Serialize};

// =============================================================================
// Webhook Query Parameters
// =============================================================================

/// WeChat webhook verification parameters (GET request)
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyParams {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub echostr: String,
}

/// Signature parameters sent with every message push (POST request)
#[derive(Debug, Clone, Deserialize)]
pub struct SignedParams {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
}

/// JS-SDK signing request
#[derive(Debug, Clone, Deserialize)]
pub struct JsSdkParams {
    /// Page URL without the `#` fragment
    pub url: String,
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Message type for event pushes
pub const MSG_TYPE_EVENT: &str = "event";
/// Message type for user text messages
pub const MSG_TYPE_TEXT: &str = "text";

/// Parsed inbound message, scoped to a single request
///
/// `msg_type` and `event` are lower-cased during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Official account ID (the reply's sender)
    pub to_user: String,
    /// Subscriber OpenID (the reply's recipient)
    pub from_user: String,
    pub msg_type: String,
    /// Only set for `event` messages
    pub event: Option<String>,
    /// Only set for `event` messages
    pub event_key: Option<String>,
    /// Only set for `text` messages
    pub content: Option<String>,
}

impl InboundEvent {
    pub fn is_event(&self) -> bool {
        self.msg_type == MSG_TYPE_EVENT
    }

    pub fn is_text(&self) -> bool {
        self.msg_type == MSG_TYPE_TEXT
    }
}

// =============================================================================
// Outbound Messages
// =============================================================================

/// A single news (graphic) article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub pic_url: String,
    pub url: String,
}

impl Article {
    pub fn new(title: &str, description: &str, pic_url: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            pic_url: pic_url.to_string(),
            url: url.to_string(),
        }
    }
}

/// Passive reply payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Text { content: String },
    Image { media_id: String },
    News { articles: Vec<Article> },
}

/// Passive reply sent back in the webhook response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to_user: String,
    pub from_user: String,
    /// Unix timestamp in seconds
    pub create_time: i64,
    pub body: ReplyBody,
}

// =============================================================================
// Platform Types
// =============================================================================

/// Persisted access token record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    /// Absolute expiry, Unix milliseconds
    pub expires_time: i64,
}

/// JS-SDK `wx.config` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsSdkSignature {
    pub app_id: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub nonce_str: String,
    pub signature: String,
}

/// Media types accepted by the temporary media upload API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Voice,
    Video,
    Thumb,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Thumb => "thumb",
        }
    }
}
