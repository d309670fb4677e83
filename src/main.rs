//! WeChat Official Account backend - Main Entry Point
//!
//! 1. Loads configuration and the persisted access token
//! 2. Optionally pushes the custom menu to WeChat
//! 3. Serves the webhook, JS-SDK and media endpoints

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wechat_oa::config::AppConfig;
use wechat_oa::media::LocalImageSource;
use wechat_oa::token::{Credentials, SystemClock, TokenStore};
use wechat_oa::webhook::{self, WebhookState};
use wechat_oa::wechat_api::WechatApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,wechat_oa=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 WeChat OA backend starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("📋 Configuration loaded");

    let api = WechatApiClient::new(
        Credentials {
            app_id: config.wechat_app_id.clone(),
            app_secret: config.wechat_app_secret.clone(),
        },
        &config.api_base,
        Some(TokenStore::new(&config.token_store_path)),
        Arc::new(SystemClock),
    )
    .context("Failed to create WeChat API client")?
    .load_persisted_token()
    .await;
    let api = Arc::new(api);

    if config.create_menu_on_start {
        match config.load_menu() {
            Ok(Some(menu)) => {
                if let Err(e) = api.create_menu(&menu).await {
                    error!("Failed to create custom menu: {}", e);
                }
            }
            Ok(None) => warn!("CREATE_MENU_ON_START set but MENU_PATH is not"),
            Err(e) => error!("{:#}", e),
        }
    }

    let media = Arc::new(LocalImageSource::new(&config.image_dir, api.clone()));
    let webhook_addr: SocketAddr = config.webhook_addr.parse()?;
    let state = WebhookState::new(config, api, media);

    let server = tokio::spawn(async move {
        if let Err(e) = webhook::run_server(webhook_addr, state).await {
            error!("Webhook server error: {}", e);
        }
    });

    info!("🌐 WeChat webhook server listening on {}", webhook_addr);

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => info!("📢 Shutdown signal received"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }

    info!("🛑 Shutting down server...");
    server.abort();

    info!("✅ WeChat OA backend stopped");
    Ok(())
}
