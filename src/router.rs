//! Inbound event routing
//!
//! Maps a parsed [`InboundEvent`] to a reply recipe through two explicit
//! tables (text content and menu click keys) plus a fallback, then executes
//! the recipe. Only the latest-image recipe touches the outside world.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::content;
use crate::media::MediaSource;
use crate::types::{Article, InboundEvent, OutboundMessage};

const EVENT_SUBSCRIBE: &str = "subscribe";
const EVENT_CLICK: &str = "click";

/// Reply recipe chosen for an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    News(Vec<Article>),
    /// Upload the newest local image and reply with it
    LatestImage,
}

/// Dispatches inbound events to replies
pub struct EventRouter {
    welcome: String,
    fallback: String,
    text_routes: HashMap<String, Reply>,
    click_routes: HashMap<String, Reply>,
    media: Arc<dyn MediaSource>,
}

impl EventRouter {
    /// Router with empty tables
    pub fn empty(welcome: &str, fallback: &str, media: Arc<dyn MediaSource>) -> Self {
        Self {
            welcome: welcome.to_string(),
            fallback: fallback.to_string(),
            text_routes: HashMap::new(),
            click_routes: HashMap::new(),
            media,
        }
    }

    /// Router with the account's canned replies
    pub fn new(media: Arc<dyn MediaSource>) -> Self {
        Self::empty(content::WELCOME_TEXT, content::FALLBACK_TEXT, media)
            .with_text_route(content::LATEST_IMAGE_KEYWORD, Reply::LatestImage)
            .with_text_route(
                content::HOW_TO_DEVELOP_KEYWORD,
                Reply::News(content::how_to_develop()),
            )
            .with_click_route(
                content::LATEST_ARTICLES_KEY,
                Reply::News(content::latest_articles()),
            )
    }

    /// Register an exact-match text reply; the first registration of a key wins
    pub fn with_text_route(mut self, content: &str, reply: Reply) -> Self {
        self.text_routes
            .entry(content.to_string())
            .or_insert(reply);
        self
    }

    /// Register a menu click reply; the first registration of a key wins
    pub fn with_click_route(mut self, key: &str, reply: Reply) -> Self {
        self.click_routes.entry(key.to_string()).or_insert(reply);
        self
    }

    /// Pick the reply recipe; `None` means no reply
    pub fn decide(&self, event: &InboundEvent) -> Option<Reply> {
        if event.is_event() {
            return match event.event.as_deref() {
                Some(EVENT_SUBSCRIBE) => Some(Reply::Text(self.welcome.clone())),
                Some(EVENT_CLICK) => event
                    .event_key
                    .as_deref()
                    .and_then(|key| self.click_routes.get(key))
                    .cloned(),
                _ => None,
            };
        }

        if event.is_text() {
            let content = event.content.as_deref().unwrap_or_default();
            return Some(
                self.text_routes
                    .get(content)
                    .cloned()
                    .unwrap_or_else(|| Reply::Text(self.fallback.clone())),
            );
        }

        None
    }

    /// Build the reply for `event`; platform failures degrade to the fallback text
    pub async fn respond(&self, event: &InboundEvent) -> Option<OutboundMessage> {
        let Some(reply) = self.decide(event) else {
            debug!(
                "No reply for msg_type={} event={:?}",
                event.msg_type, event.event
            );
            return None;
        };

        // Replies go back to the sender
        let to = event.from_user.as_str();
        let from = event.to_user.as_str();

        let message = match reply {
            Reply::Text(text) => OutboundMessage::text(to, from, &text),
            Reply::News(articles) => match OutboundMessage::news(to, from, articles) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping news reply: {}", e);
                    OutboundMessage::text(to, from, &self.fallback)
                }
            },
            Reply::LatestImage => match self.media.latest_image_media_id().await {
                Ok(media_id) => {
                    info!("Replying with latest image {}", media_id);
                    OutboundMessage::image(to, from, &media_id)
                }
                Err(e) => {
                    warn!("Latest image unavailable: {}", e);
                    OutboundMessage::text(to, from, &self.fallback)
                }
            },
        };

        Some(message)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Result, WechatError};
    use crate::types::ReplyBody;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Media source returning a fixed outcome
    pub(crate) struct StubMedia {
        pub media_id: Option<String>,
        pub calls: AtomicUsize,
    }

    impl StubMedia {
        pub(crate) fn found(media_id: &str) -> Arc<Self> {
            Arc::new(Self {
                media_id: Some(media_id.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn missing() -> Arc<Self> {
            Arc::new(Self {
                media_id: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MediaSource for StubMedia {
        async fn latest_image_media_id(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.media_id
                .clone()
                .ok_or_else(|| WechatError::NotFound("no .png file".to_string()))
        }
    }

    fn event(msg_type: &str, ev: Option<&str>, key: Option<&str>) -> InboundEvent {
        InboundEvent {
            to_user: "gh_account".to_string(),
            from_user: "user_openid".to_string(),
            msg_type: msg_type.to_string(),
            event: ev.map(str::to_string),
            event_key: key.map(str::to_string),
            content: None,
        }
    }

    fn text(content: &str) -> InboundEvent {
        InboundEvent {
            content: Some(content.to_string()),
            ..event("text", None, None)
        }
    }

    #[tokio::test]
    async fn test_subscribe_welcome() {
        let router = EventRouter::new(StubMedia::missing());
        let reply = router
            .respond(&event("event", Some("subscribe"), None))
            .await
            .unwrap();

        assert_eq!(reply.to_user, "user_openid");
        assert_eq!(reply.from_user, "gh_account");
        assert_eq!(
            reply.body,
            ReplyBody::Text {
                content: content::WELCOME_TEXT.to_string()
            }
        );
    }

    #[test]
    fn test_click_known_key() {
        let router = EventRouter::new(StubMedia::missing());
        let reply = router.decide(&event("event", Some("click"), Some(content::LATEST_ARTICLES_KEY)));
        assert_eq!(reply, Some(Reply::News(content::latest_articles())));
    }

    #[test]
    fn test_click_unknown_key_and_other_events() {
        let router = EventRouter::new(StubMedia::missing());
        assert_eq!(router.decide(&event("event", Some("click"), Some("nope"))), None);
        assert_eq!(router.decide(&event("event", Some("click"), None)), None);
        assert_eq!(router.decide(&event("event", Some("unsubscribe"), None)), None);
        assert_eq!(router.decide(&event("event", None, None)), None);
    }

    #[test]
    fn test_other_msg_types_no_reply() {
        let router = EventRouter::new(StubMedia::missing());
        assert_eq!(router.decide(&event("image", None, None)), None);
        assert_eq!(router.decide(&event("voice", None, None)), None);
    }

    #[test]
    fn test_text_table() {
        let router = EventRouter::new(StubMedia::missing());
        assert_eq!(
            router.decide(&text(content::HOW_TO_DEVELOP_KEYWORD)),
            Some(Reply::News(content::how_to_develop()))
        );
        assert_eq!(
            router.decide(&text(content::LATEST_IMAGE_KEYWORD)),
            Some(Reply::LatestImage)
        );
    }

    #[tokio::test]
    async fn test_unmapped_text_fallback() {
        let router = EventRouter::new(StubMedia::missing());
        for input in ["hello", "1", "2", "", " 最新图片"] {
            let reply = router.respond(&text(input)).await.unwrap();
            assert_eq!(
                reply.body,
                ReplyBody::Text {
                    content: content::FALLBACK_TEXT.to_string()
                },
                "input {:?}",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_latest_image_found() {
        let media = StubMedia::found("MEDIA_1");
        let router = EventRouter::new(media.clone());

        let reply = router
            .respond(&text(content::LATEST_IMAGE_KEYWORD))
            .await
            .unwrap();
        assert_eq!(
            reply.body,
            ReplyBody::Image {
                media_id: "MEDIA_1".to_string()
            }
        );
        assert_eq!(media.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_latest_image_missing_falls_back() {
        let media = StubMedia::missing();
        let router = EventRouter::new(media.clone());

        let reply = router
            .respond(&text(content::LATEST_IMAGE_KEYWORD))
            .await
            .unwrap();
        assert_eq!(
            reply.body,
            ReplyBody::Text {
                content: content::FALLBACK_TEXT.to_string()
            }
        );
        assert_eq!(media.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_news_route_falls_back() {
        let router = EventRouter::empty("hi", "fallback", StubMedia::missing())
            .with_text_route("empty", Reply::News(Vec::new()));

        let reply = router.respond(&text("empty")).await.unwrap();
        assert_eq!(
            reply.body,
            ReplyBody::Text {
                content: "fallback".to_string()
            }
        );
    }

    #[test]
    fn test_first_registration_wins() {
        let router = EventRouter::empty("hi", "fallback", StubMedia::missing())
            .with_text_route("ping", Reply::Text("first".to_string()))
            .with_text_route("ping", Reply::Text("second".to_string()))
            .with_click_route("k", Reply::Text("first".to_string()))
            .with_click_route("k", Reply::Text("second".to_string()));

        assert_eq!(
            router.decide(&text("ping")),
            Some(Reply::Text("first".to_string()))
        );
        assert_eq!(
            router.decide(&event("event", Some("click"), Some("k"))),
            Some(Reply::Text("first".to_string()))
        );
    }

    #[test]
    fn test_no_media_call_when_deciding() {
        let media = StubMedia::found("MEDIA_1");
        let router = EventRouter::new(media.clone());
        router.decide(&text(content::LATEST_IMAGE_KEYWORD));
        assert_eq!(media.calls.load(Ordering::SeqCst), 0);
    }
}
