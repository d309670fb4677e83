//! Passive reply XML builders and inbound XML parsing

use chrono::Utc;
use serde::Deserialize;
use xml::reader::{EventReader, XmlEvent};

use crate::error::{Result, WechatError};
use crate::types::{Article, InboundEvent, OutboundMessage, ReplyBody};

/// Wire shape of an inbound push; everything optional so missing fields
/// surface as our own parse errors.
#[derive(Debug, Deserialize)]
#[serde(rename = "xml")]
struct RawInbound {
    #[serde(rename = "ToUserName", default)]
    to_user_name: Option<String>,
    #[serde(rename = "FromUserName", default)]
    from_user_name: Option<String>,
    #[serde(rename = "MsgType", default)]
    msg_type: Option<String>,
    #[serde(rename = "Event", default)]
    event: Option<String>,
    #[serde(rename = "EventKey", default)]
    event_key: Option<String>,
    #[serde(rename = "Content", default)]
    content: Option<String>,
}

/// Parse a raw inbound push body
pub fn parse(raw: &[u8]) -> Result<InboundEvent> {
    let xml = std::str::from_utf8(raw)
        .map_err(|e| WechatError::Parse(format!("body is not UTF-8: {}", e)))?;

    let root = root_element_name(xml)?;
    if root != "xml" {
        return Err(WechatError::Parse(format!(
            "expected <xml> root element, got <{}>",
            root
        )));
    }

    let raw: RawInbound =
        serde_xml_rs::from_str(xml).map_err(|e| WechatError::Parse(e.to_string()))?;

    let msg_type = raw
        .msg_type
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| WechatError::Parse("missing MsgType".to_string()))?;

    let mut event = InboundEvent {
        to_user: raw.to_user_name.unwrap_or_default(),
        from_user: raw.from_user_name.unwrap_or_default(),
        msg_type,
        event: None,
        event_key: None,
        content: None,
    };

    if event.is_event() {
        event.event = raw.event.map(|e| e.trim().to_lowercase());
        event.event_key = raw.event_key.filter(|k| !k.is_empty());
    } else if event.is_text() {
        event.content = raw.content;
    }

    Ok(event)
}

/// Local name of the first element in the document
fn root_element_name(xml: &str) -> Result<String> {
    for event in EventReader::from_str(xml) {
        if let XmlEvent::StartElement { name, .. } =
            event.map_err(|e| WechatError::Parse(e.to_string()))?
        {
            return Ok(name.local_name);
        }
    }
    Err(WechatError::Parse("missing <xml> root element".to_string()))
}

// =============================================================================
// Reply Builders
// =============================================================================

fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Build a text reply
pub fn build_text(to_user: &str, from_user: &str, content: &str) -> String {
    OutboundMessage::text(to_user, from_user, content).to_xml()
}

/// Build an image reply
pub fn build_image(to_user: &str, from_user: &str, media_id: &str) -> String {
    OutboundMessage::image(to_user, from_user, media_id).to_xml()
}

/// Build a news (graphic) reply; at least one article is required
pub fn build_news(to_user: &str, from_user: &str, articles: &[Article]) -> Result<String> {
    Ok(OutboundMessage::news(to_user, from_user, articles.to_vec())?.to_xml())
}

impl OutboundMessage {
    pub fn text(to_user: &str, from_user: &str, content: &str) -> Self {
        Self::with_body(
            to_user,
            from_user,
            ReplyBody::Text {
                content: content.to_string(),
            },
        )
    }

    pub fn image(to_user: &str, from_user: &str, media_id: &str) -> Self {
        Self::with_body(
            to_user,
            from_user,
            ReplyBody::Image {
                media_id: media_id.to_string(),
            },
        )
    }

    pub fn news(to_user: &str, from_user: &str, articles: Vec<Article>) -> Result<Self> {
        if articles.is_empty() {
            return Err(WechatError::InvalidMessage(
                "news reply needs at least one article".to_string(),
            ));
        }
        Ok(Self::with_body(to_user, from_user, ReplyBody::News { articles }))
    }

    fn with_body(to_user: &str, from_user: &str, body: ReplyBody) -> Self {
        Self {
            to_user: to_user.to_string(),
            from_user: from_user.to_string(),
            create_time: now_secs(),
            body,
        }
    }

    /// Serialize to the passive reply XML format
    ///
    /// Values are wrapped in CDATA verbatim; callers must keep `]]>` out of them.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256);
        xml.push_str("<xml>");
        push_cdata(&mut xml, "ToUserName", &self.to_user);
        push_cdata(&mut xml, "FromUserName", &self.from_user);
        xml.push_str(&format!("<CreateTime>{}</CreateTime>", self.create_time));

        match &self.body {
            ReplyBody::Text { content } => {
                push_cdata(&mut xml, "MsgType", "text");
                push_cdata(&mut xml, "Content", content);
            }
            ReplyBody::Image { media_id } => {
                push_cdata(&mut xml, "MsgType", "image");
                xml.push_str("<Image>");
                push_cdata(&mut xml, "MediaId", media_id);
                xml.push_str("</Image>");
            }
            ReplyBody::News { articles } => {
                push_cdata(&mut xml, "MsgType", "news");
                xml.push_str(&format!("<ArticleCount>{}</ArticleCount>", articles.len()));
                xml.push_str("<Articles>");
                for article in articles {
                    xml.push_str("<item>");
                    push_cdata(&mut xml, "Title", &article.title);
                    push_cdata(&mut xml, "Description", &article.description);
                    push_cdata(&mut xml, "PicUrl", &article.pic_url);
                    push_cdata(&mut xml, "Url", &article.url);
                    xml.push_str("</item>");
                }
                xml.push_str("</Articles>");
            }
        }

        xml.push_str("</xml>");
        xml
    }
}

fn push_cdata(xml: &mut String, tag: &str, value: &str) {
    xml.push_str(&format!("<{tag}><![CDATA[{value}]]></{tag}>"));
}
