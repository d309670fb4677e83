//! Error taxonomy shared by the token cache, codec, router and API client

/// Errors raised while talking to WeChat or handling its payloads
#[derive(Debug, thiserror::Error)]
pub enum WechatError {
    /// Token refresh returned no access token; carries the raw response body
    #[error("WeChat auth error: {0}")]
    Auth(String),

    /// Inbound XML is malformed or incomplete
    #[error("Malformed inbound message: {0}")]
    Parse(String),

    /// A platform call failed or returned an unexpected shape
    #[error("WeChat upstream error: {0}")]
    Upstream(String),

    /// No matching local file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Outbound message violates its own invariants (e.g. news without articles)
    #[error("Invalid outbound message: {0}")]
    InvalidMessage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WechatError {
    pub(crate) fn upstream(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Upstream(format!("{}: {}", context, err))
    }
}

/// Result type for WeChat operations
pub type Result<T> = std::result::Result<T, WechatError>;
