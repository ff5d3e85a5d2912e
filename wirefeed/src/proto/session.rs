//! The access session bought with a `connect` or `extend` payment.

use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::UnixTimestamp;

/// A time-bounded stream access token.
///
/// Sessions are replaced wholesale on renewal. There is no setter for the
/// token: code that captured the old session keeps using the old token and
/// fails cleanly instead of silently switching context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    access_token: String,
    /// Expiry as sent by the server (ISO 8601 text or epoch number).
    #[serde(deserialize_with = "string_or_number")]
    expires_at: String,
    /// Minutes bought, when the caller knows them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_minutes: Option<u64>,
    /// Local time the session was obtained.
    #[serde(default = "UnixTimestamp::now")]
    obtained_at: UnixTimestamp,
}

impl Session {
    /// Creates a session obtained now.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: expires_at.into(),
            duration_minutes: None,
            obtained_at: UnixTimestamp::now(),
        }
    }

    /// Records the number of minutes bought.
    #[must_use]
    pub const fn with_duration_minutes(mut self, minutes: u64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    /// The opaque access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Server-reported expiry.
    #[must_use]
    pub fn expires_at(&self) -> &str {
        &self.expires_at
    }

    /// Minutes bought, if known.
    #[must_use]
    pub const fn duration_minutes(&self) -> Option<u64> {
        self.duration_minutes
    }

    /// Local time the session was obtained.
    #[must_use]
    pub const fn obtained_at(&self) -> UnixTimestamp {
        self.obtained_at
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expires_at must be a string or a number, got {other}"
        ))),
    }
}
