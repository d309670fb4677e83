//! WeChat Official Account backend
//!
//! Receives webhook pushes from the WeChat Official Account platform, replies
//! with passive XML messages and signs JS-SDK configs for front-end pages.
//!
//! # Architecture
//!
//! ```text
//! WeChat Server ──HTTPS──▶ webhook (GET: handshake, POST: message)
//!                            │
//!                            ├── message::parse ──▶ EventRouter ──▶ OutboundMessage::to_xml
//!                            │                         │
//!                            │                         └── MediaSource (latest image upload)
//!                            │
//!                            └── JsSdkSigner ──▶ WechatApiClient ──▶ TokenCache
//! ```
//!
//! # Usage
//!
//! ```bash
//! export WECHAT_TOKEN=your_token
//! export WECHAT_APP_ID=wx1234567890abcdef
//! export WECHAT_APP_SECRET=your_secret
//! export MENU_PATH=menu.json            # optional
//!
//! wechat-oa-backend
//! ```

pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod jssdk;
pub mod media;
pub mod message;
pub mod router;
pub mod token;
pub mod types;
pub mod webhook;
pub mod wechat_api;

pub use config::AppConfig;
pub use crypto::WechatCrypto;
pub use error::{Result, WechatError};
pub use jssdk::JsSdkSigner;
pub use router::EventRouter;
pub use token::TokenCache;
pub use types::*;
pub use wechat_api::WechatApiClient;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::crypto::WechatCrypto;
    pub use crate::error::{Result, WechatError};
    pub use crate::jssdk::JsSdkSigner;
    pub use crate::router::{EventRouter, Reply};
    pub use crate::token::{AccessToken, TokenCache};
    pub use crate::types::*;
    pub use crate::wechat_api::WechatApiClient;
}
