//! Router output and operator availability.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What the transport should do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Send nothing.
    Drop,
    Reply { text: String },
    /// A reply with interactive options for transports that can render buttons.
    ReplyWithOptions { text: String, options: Vec<String> },
}

impl OutboundAction {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply { text: text.into() }
    }

    pub fn with_options(text: impl Into<String>, options: &[&str]) -> Self {
        Self::ReplyWithOptions {
            text: text.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop)
    }

    /// Plain-text rendering; options become a bulleted list after the text.
    /// `None` for [`OutboundAction::Drop`].
    pub fn render_text(&self) -> Option<String> {
        match self {
            Self::Drop => None,
            Self::Reply { text } => Some(text.clone()),
            Self::ReplyWithOptions { text, options } => {
                let bullets: Vec<String> = options.iter().map(|o| format!("• {o}")).collect();
                Some(format!("{text}\n\n{}", bullets.join("\n")))
            }
        }
    }
}

/// Operator presence shown in the status menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAvailability {
    #[default]
    Offline,
    Busy,
    Online,
}

impl FromStr for OperatorAvailability {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "busy" => Ok(Self::Busy),
            "online" => Ok(Self::Online),
            other => Err(ConfigError::InvalidValue {
                key: "availability".into(),
                message: format!("expected offline, busy or online, got '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for OperatorAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Offline => "offline",
            Self::Busy => "busy",
            Self::Online => "online",
        };
        write!(f, "{s}")
    }
}
