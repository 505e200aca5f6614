use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::FlashConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCategory {
    Success,
    Danger,
    Info,
    Warning,
}

impl fmt::Display for FlashCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlashCategory::Success => "success",
            FlashCategory::Danger => "danger",
            FlashCategory::Info => "info",
            FlashCategory::Warning => "warning",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlashMessage {
    pub id: Uuid,
    pub category: FlashCategory,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl FlashMessage {
    pub fn new(category: FlashCategory, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Past the display time the message fades; it is gone once the fade ends.
    pub fn is_fading(&self, now: DateTime<Utc>, cfg: &FlashConfig) -> bool {
        now - self.created_at >= chrono_ms(cfg.display_ms)
    }

    fn is_expired(&self, now: DateTime<Utc>, cfg: &FlashConfig) -> bool {
        now - self.created_at >= chrono_ms(cfg.display_ms.saturating_add(cfg.fade_ms))
    }
}

fn chrono_ms(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX / 1_000))
}

/// The flash container: messages in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flashes {
    messages: Vec<FlashMessage>,
}

impl Flashes {
    pub fn push(&mut self, message: FlashMessage) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Closes one message early, like its close button.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        before != self.messages.len()
    }

    /// Drops every message whose display and fade time have both elapsed.
    pub fn prune(&mut self, now: DateTime<Utc>, cfg: &FlashConfig) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !m.is_expired(now, cfg));
        before - self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlashMessage> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&FlashMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
