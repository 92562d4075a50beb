//! Core message types shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Chat platform an update arrived from (or a reply goes to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Whatsapp,
}

impl Platform {
    /// The opposite platform. Forward commands relay a message from the
    /// platform it arrived on to the other one.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Telegram => Self::Whatsapp,
            Self::Whatsapp => Self::Telegram,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::Whatsapp),
            other => Err(crate::Error::message(format!("unknown platform: {other}"))),
        }
    }
}

/// One authenticated inbound event, normalized across platforms.
///
/// Immutable once constructed; `(platform, external_id)` is the
/// deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundUpdate {
    pub platform: Platform,
    /// Platform-assigned update/message identifier.
    pub external_id: String,
    /// Platform user identifier of the sender.
    pub sender_id: String,
    /// Chat/thread the update arrived in (equals `sender_id` for DMs).
    pub chat_id: String,
    /// Raw message text. Empty for status-only callbacks.
    pub text: String,
    /// Unix epoch seconds at receipt.
    pub received_at: i64,
    /// Display name reported by the platform, if any.
    pub sender_name: Option<String>,
}

/// Current Unix time in epoch seconds.
#[must_use]
pub fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_platform_flips() {
        assert_eq!(Platform::Telegram.other(), Platform::Whatsapp);
        assert_eq!(Platform::Whatsapp.other(), Platform::Telegram);
    }

    #[test]
    fn platform_roundtrips_through_str() {
        for p in [Platform::Telegram, Platform::Whatsapp] {
            assert_eq!(p.as_str().parse::<Platform>().ok(), Some(p));
        }
    }

    #[test]
    fn platform_serde_is_lowercase() {
        let json = serde_json::to_string(&Platform::Whatsapp).ok();
        assert_eq!(json.as_deref(), Some("\"whatsapp\""));
    }
}
