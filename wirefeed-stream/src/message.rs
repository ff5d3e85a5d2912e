//! Stream frame classification.
//!
//! Frames carry no guaranteed type tag. Each frame is classified exactly
//! once, when it is read, into a [`StreamMessage`]; everything downstream
//! matches on the variant instead of probing fields.

use serde_json::{Map, Value};

/// Field names that mark a social post.
const BODY_FIELDS: &[&str] = &["body", "text", "content"];

/// Field names that mark a news article.
const SOURCE_FIELDS: &[&str] = &["source", "source_name", "sourceName"];

/// `type` values of expiry warnings.
const EXPIRY_TYPES: &[&str] = &[
    "session_expiring",
    "session_expiry_warning",
    "expiry_warning",
    "token_expiring",
    "expiring",
];

/// `type` values of renewal acknowledgements.
const RENEWAL_TYPES: &[&str] = &[
    "session_renewed",
    "session_extended",
    "renewed",
    "renewal_ack",
    "token_updated",
];

/// `type` values of status messages.
const STATUS_TYPES: &[&str] = &["status", "connected", "welcome", "info", "ping", "pong"];

/// Wording of plain-text expiry notices.
const EXPIRY_WORDING: &[&str] = &["expir", "session ending", "renew your session"];

/// A classified stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Connection status notice.
    Status(Value),
    /// The session is about to expire.
    ExpiryWarning {
        /// Seconds left, when the server says.
        seconds_remaining: Option<u64>,
    },
    /// The server acknowledged a renewed session.
    RenewalAck(Value),
    /// A social post: has a body-like field.
    Post(Value),
    /// A news article: has a source-like field.
    Article(Value),
    /// JSON of no recognised shape.
    Unknown(Value),
    /// Non-JSON text without expiry wording.
    Text(String),
}

impl StreamMessage {
    /// Classifies a text frame.
    #[must_use]
    pub fn classify(frame: &str) -> Self {
        match serde_json::from_str::<Value>(frame) {
            Ok(value) => Self::from_json(value),
            Err(_) if mentions_expiry(frame) => Self::ExpiryWarning {
                seconds_remaining: None,
            },
            Err(_) => Self::Text(frame.to_owned()),
        }
    }

    /// Classifies a parsed JSON frame.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        let Value::Object(object) = &value else {
            return Self::Unknown(value);
        };

        let kind = object
            .get("type")
            .or_else(|| object.get("event"))
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase);
        if let Some(kind) = kind.as_deref() {
            if EXPIRY_TYPES.contains(&kind) {
                return Self::ExpiryWarning {
                    seconds_remaining: seconds_remaining(object),
                };
            }
            if RENEWAL_TYPES.contains(&kind) {
                return Self::RenewalAck(value);
            }
            if STATUS_TYPES.contains(&kind) {
                return Self::Status(value);
            }
        }

        if has_any(object, BODY_FIELDS) {
            Self::Post(value)
        } else if has_any(object, SOURCE_FIELDS) {
            Self::Article(value)
        } else {
            Self::Unknown(value)
        }
    }

    /// Returns `true` for posts and articles.
    #[must_use]
    pub const fn is_content(&self) -> bool {
        matches!(self, Self::Post(_) | Self::Article(_))
    }

    /// Short variant name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::ExpiryWarning { .. } => "expiry_warning",
            Self::RenewalAck(_) => "renewal_ack",
            Self::Post(_) => "post",
            Self::Article(_) => "article",
            Self::Unknown(_) => "unknown",
            Self::Text(_) => "text",
        }
    }

    /// The JSON payload of content and control messages.
    #[must_use]
    pub const fn json(&self) -> Option<&Value> {
        match self {
            Self::Status(v)
            | Self::RenewalAck(v)
            | Self::Post(v)
            | Self::Article(v)
            | Self::Unknown(v) => Some(v),
            Self::ExpiryWarning { .. } | Self::Text(_) => None,
        }
    }

    /// First non-empty string among `names`, searched in the JSON payload.
    #[must_use]
    pub fn field(&self, names: &[&str]) -> Option<&str> {
        let object = self.json()?.as_object()?;
        names
            .iter()
            .filter_map(|name| object.get(*name)?.as_str())
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// Headline of a content message.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.field(&["title", "headline"])
    }

    /// Body text of a content message.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.field(&["body", "text", "content", "description", "summary"])
    }

    /// Link to the original item.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.field(&["url", "link"])
    }

    /// Publisher of an article.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.field(SOURCE_FIELDS)
    }

    /// Author of a post.
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.field(&["author", "username", "user", "handle"])
    }

    /// Publication time as sent, when it is text.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.field(&["timestamp", "time", "published_at", "publishedAt", "created_at", "createdAt"])
    }
}

fn has_any(object: &Map<String, Value>, names: &[&str]) -> bool {
    names
        .iter()
        .any(|name| object.get(*name).is_some_and(|v| !v.is_null()))
}

fn seconds_remaining(object: &Map<String, Value>) -> Option<u64> {
    ["seconds_remaining", "secondsRemaining", "expires_in", "expiresIn"]
        .iter()
        .filter_map(|name| object.get(*name))
        .find_map(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()))
}

fn mentions_expiry(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    EXPIRY_WORDING.iter().any(|w| lower.contains(w))
}
