//! Canned reply text.

use super::action::OperatorAvailability;
use crate::error::CommandError;
use crate::grants::GrantSpec;

pub const START_OPTION: &str = "🤖 Start AI Chat";
pub const STOP_OPTION: &str = "❌ Stop AI Chat";

pub const STOP_REMINDER: &str = "💡 Type \"stop ai chat\" to end the AI conversation.";

pub const FAREWELL: &str = "AI chat has been stopped. ✅\n\n\
    Thanks for chatting! If you need the owner, they'll reply when available.";

pub const FALLBACK: &str = "Thanks for your message! I can't give a proper answer right now, \
    but the owner will see it and get back to you.";

pub const APPROVED_ACK: &str = "✅ You're approved to chat directly. \
    Go ahead and write freely; the owner will read your messages.";

pub const APOLOGY: &str = "Sorry, something went wrong on my side. Please try again later.";

pub const USAGE: &str = "Usage: /approve <duration|forever|stop|Nmessage> [+phone]\n\
    Examples: /approve 1hour, /approve 2days +15551234567, /approve 3messages, /approve stop";

pub fn welcome(name: &str) -> String {
    format!(
        "Hi {name}! 🤖\n\nAI chat is now active. I can help with questions, \
         information, and general conversation.\n\nWhat would you like to know?"
    )
}

pub fn status(availability: OperatorAvailability) -> String {
    let presence = match availability {
        OperatorAvailability::Online => "The owner is online and will reply shortly.",
        OperatorAvailability::Busy => "The owner is busy right now and will reply when free.",
        OperatorAvailability::Offline => "The owner is offline at the moment and will reply later.",
    };
    format!(
        "👋 Thanks for your message!\n\n{presence}\n\n\
         Want an answer now? Start a chat with the AI assistant by sending \"start ai chat\"."
    )
}

pub fn usage(err: &CommandError) -> String {
    format!("⚠️ {err}\n\n{USAGE}")
}

pub fn granted(target: &str, spec: &GrantSpec) -> String {
    match spec {
        GrantSpec::Forever => format!("✅ Approved {target} permanently."),
        GrantSpec::Duration { .. } => format!("✅ Approved {target} for {spec}."),
        GrantSpec::Messages { .. } => format!("✅ Approved {target} for the next {spec}."),
    }
}

pub fn revoked(target: &str, existed: bool) -> String {
    if existed {
        format!("🚫 Approval revoked for {target}.")
    } else {
        format!("ℹ️ {target} had no approval to revoke.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::DurationUnit;

    #[test]
    fn status_wording_follows_availability() {
        assert!(status(OperatorAvailability::Online).contains("online"));
        assert!(status(OperatorAvailability::Busy).contains("busy"));
        assert!(status(OperatorAvailability::Offline).contains("offline"));
    }

    #[test]
    fn grant_confirmations() {
        let spec = GrantSpec::Duration {
            unit: DurationUnit::Day,
            amount: 2,
        };
        assert_eq!(granted("123@c.us", &spec), "✅ Approved 123@c.us for 2 days.");
        assert_eq!(
            granted("123@c.us", &GrantSpec::Messages { count: 3 }),
            "✅ Approved 123@c.us for the next 3 messages."
        );
        assert!(usage(&CommandError::ZeroAmount).ends_with(USAGE));
    }
}
