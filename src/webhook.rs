//! WeChat webhook HTTP handlers

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::crypto::WechatCrypto;
use crate::jssdk::JsSdkSigner;
use crate::media::{MediaCache, MediaSource};
use crate::message;
use crate::router::EventRouter;
use crate::types::*;
use crate::wechat_api::WechatApiClient;

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub config: Arc<AppConfig>,
    pub api: Arc<WechatApiClient>,
    pub router: Arc<EventRouter>,
    pub signer: Arc<JsSdkSigner>,
    pub media_cache: MediaCache,
}

impl WebhookState {
    pub fn new(config: AppConfig, api: Arc<WechatApiClient>, media: Arc<dyn MediaSource>) -> Self {
        let media_cache = MediaCache::new(&config.media_cache_dir);
        Self {
            router: Arc::new(EventRouter::new(media)),
            signer: Arc::new(JsSdkSigner::new(api.clone())),
            config: Arc::new(config),
            api,
            media_cache,
        }
    }
}

/// Build the HTTP router
pub fn app(state: WebhookState) -> Router {
    Router::new()
        // WeChat webhook endpoint
        .route("/wechat", get(verify).post(handle_message))
        .route("/wechat/jssdk", get(jssdk_config))
        .route("/wechat/menu", post(create_menu))
        .route("/wechat/media/{media_id}", get(cache_media))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Run the webhook HTTP server
pub async fn run_server(addr: SocketAddr, state: WebhookState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("🌐 HTTP {} {}", method, path);

    let response = next.run(req).await;

    info!("📤 Response status: {}", response.status());

    response
}

/// Webhook verification (GET request from WeChat)
async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> Result<String, StatusCode> {
    info!(
        "📥 Received verification request from WeChat: timestamp={}, nonce={}",
        params.timestamp, params.nonce
    );

    if !WechatCrypto::verify(
        &state.config.wechat_token,
        &params.timestamp,
        &params.nonce,
        &params.signature,
    ) {
        warn!("Invalid signature in verification request");
        return Err(StatusCode::FORBIDDEN);
    }

    info!("Webhook verification successful");
    Ok(params.echostr)
}

/// Handle incoming message (POST request from WeChat)
async fn handle_message(
    State(state): State<WebhookState>,
    Query(params): Query<SignedParams>,
    body: Bytes,
) -> Result<String, StatusCode> {
    debug!("Request body length: {} bytes", body.len());

    if !WechatCrypto::verify(
        &state.config.wechat_token,
        &params.timestamp,
        &params.nonce,
        &params.signature,
    ) {
        warn!("Invalid signature in message request");
        return Err(StatusCode::FORBIDDEN);
    }

    if state.config.debug_mode {
        debug!("Raw XML content: {}", String::from_utf8_lossy(&body));
    }

    let event = match message::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            error!("Failed to parse message XML: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    info!(
        "Received {} message from user {}",
        event.msg_type, event.from_user
    );

    match state.router.respond(&event).await {
        Some(reply) => Ok(reply.to_xml()),
        None => Ok(String::new()),
    }
}

/// JS-SDK `wx.config` parameters for a page
async fn jssdk_config(
    State(state): State<WebhookState>,
    Query(params): Query<JsSdkParams>,
) -> Result<Json<JsSdkSignature>, StatusCode> {
    match state.signer.sign(&params.url).await {
        Ok(signature) => Ok(Json(signature)),
        Err(e) => {
            error!("Failed to sign JS-SDK config: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// Push the configured custom menu to WeChat
async fn create_menu(
    State(state): State<WebhookState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let menu = match state.config.load_menu() {
        Ok(Some(menu)) => menu,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to load menu: {:#}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match state.api.create_menu(&menu).await {
        Ok(status) => Ok(Json(serde_json::json!({
            "errcode": status.errcode,
            "errmsg": status.errmsg,
        }))),
        Err(e) => {
            error!("Failed to create menu: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// Download a user-sent media file into the local cache
async fn cache_media(
    State(state): State<WebhookState>,
    Path(media_id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.media_cache.fetch(&state.api, &media_id).await {
        Ok(path) => Ok(Json(serde_json::json!({ "path": path }))),
        Err(e) => {
            error!("Failed to cache media {}: {}", media_id, e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}
