//! Command grammar: operator `/approve` commands and session start/stop.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CommandError;
use crate::grants::{DurationUnit, GrantSpec};

/// Suffix of a direct-chat correspondent key.
pub const DIRECT_KEY_SUFFIX: &str = "@c.us";

static AMOUNT_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([a-z]+)$").unwrap());

/// What an `/approve` command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveAction {
    Grant(GrantSpec),
    Revoke,
}

/// A parsed `/approve` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCommand {
    pub action: ApproveAction,
    /// Correspondent key from an explicit `+<phone>` argument.
    pub target: Option<String>,
}

impl AdminCommand {
    /// Explicit phone wins; otherwise the sender of the quoted message.
    pub fn resolve_target(&self, quoted_sender: Option<&str>) -> Result<String, CommandError> {
        self.target
            .clone()
            .or_else(|| quoted_sender.map(str::to_string))
            .ok_or(CommandError::MissingTarget)
    }
}

/// Session-control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
}

/// Parse an operator command.
///
/// `None` when the text isn't an `/approve` command at all; `Some(Err(_))`
/// when it is one but malformed.
pub fn parse_admin(text: &str) -> Option<Result<AdminCommand, CommandError>> {
    let lower = text.trim().to_lowercase();
    let rest = lower.strip_prefix("/approve")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(parse_approve_args(rest))
}

fn parse_approve_args(rest: &str) -> Result<AdminCommand, CommandError> {
    let mut args: Vec<&str> = rest.split_whitespace().collect();

    let target = match args.last() {
        Some(last) if last.starts_with('+') => {
            let key = phone_to_key(last)?;
            args.pop();
            Some(key)
        }
        _ => None,
    };

    // "1 hour" and "1hour" are the same argument.
    let arg = args.concat();
    let action = match arg.as_str() {
        "" => return Err(CommandError::MissingArgument),
        "forever" | "permanent" => ApproveAction::Grant(GrantSpec::Forever),
        "stop" | "revoke" => ApproveAction::Revoke,
        _ => ApproveAction::Grant(parse_amount_unit(&arg)?),
    };

    Ok(AdminCommand { action, target })
}

fn parse_amount_unit(arg: &str) -> Result<GrantSpec, CommandError> {
    let caps = AMOUNT_UNIT
        .captures(arg)
        .ok_or_else(|| CommandError::InvalidFormat(arg.to_string()))?;
    let amount: u32 = caps[1]
        .parse()
        .map_err(|_| CommandError::InvalidFormat(arg.to_string()))?;
    let unit = &caps[2];

    match unit {
        "message" | "messages" | "msg" | "msgs" => Ok(GrantSpec::Messages { count: amount }),
        _ => Ok(GrantSpec::Duration {
            unit: unit.parse::<DurationUnit>()?,
            amount,
        }),
    }
}

/// `+15551234567` → `15551234567@c.us`.
pub fn phone_to_key(phone: &str) -> Result<String, CommandError> {
    let digits: String = phone
        .trim_start_matches('+')
        .chars()
        .filter(|c| *c != '-')
        .collect();
    if !(6..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CommandError::InvalidPhone(phone.to_string()));
    }
    Ok(format!("{digits}{DIRECT_KEY_SUFFIX}"))
}

/// Recognize session start/stop in slash, button-label, or plain-word form.
pub fn parse_session(text: &str) -> Option<SessionCommand> {
    let lower = text.to_lowercase().replace('_', " ");
    let core = lower.trim_matches(|c: char| !c.is_alphanumeric());
    let normalized = core.split_whitespace().collect::<Vec<_>>().join(" ");

    match normalized.as_str() {
        "start ai chat" | "start ai" | "startai" | "start" | "ai start" | "start chat" => {
            Some(SessionCommand::Start)
        }
        "stop ai chat" | "stop ai" | "stopai" | "stop" | "ai stop" | "stop chat"
        | "end ai chat" => Some(SessionCommand::Stop),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(text: &str) -> Result<AdminCommand, CommandError> {
        parse_admin(text).expect("should be an /approve command")
    }

    #[test]
    fn approve_duration_with_phone() {
        let cmd = admin("/approve 1hour +15551234567").unwrap();
        assert_eq!(
            cmd.action,
            ApproveAction::Grant(GrantSpec::Duration {
                unit: DurationUnit::Hour,
                amount: 1
            })
        );
        assert_eq!(cmd.target.as_deref(), Some("15551234567@c.us"));
    }

    #[test]
    fn approve_accepts_plural_and_spaced_forms() {
        let spaced = admin("/APPROVE 2 days").unwrap();
        let joined = admin("/approve 2days").unwrap();
        assert_eq!(spaced, joined);
        assert_eq!(spaced.target, None);
    }

    #[test]
    fn approve_message_counts() {
        for text in ["/approve 3message", "/approve 3messages", "/approve 3 msgs"] {
            assert_eq!(
                admin(text).unwrap().action,
                ApproveAction::Grant(GrantSpec::Messages { count: 3 })
            );
        }
    }

    #[test]
    fn approve_forever_and_stop() {
        assert_eq!(
            admin("/approve forever").unwrap().action,
            ApproveAction::Grant(GrantSpec::Forever)
        );
        let stop = admin("/approve stop +4915112345678").unwrap();
        assert_eq!(stop.action, ApproveAction::Revoke);
        assert_eq!(stop.target.as_deref(), Some("4915112345678@c.us"));
    }

    #[test]
    fn malformed_approve_is_validation_error() {
        assert_eq!(admin("/approve"), Err(CommandError::MissingArgument));
        assert_eq!(
            admin("/approve 5fortnights"),
            Err(CommandError::UnknownUnit("fortnights".into()))
        );
        assert_eq!(
            admin("/approve soon"),
            Err(CommandError::InvalidFormat("soon".into()))
        );
        assert_eq!(
            admin("/approve 1hour +12ab"),
            Err(CommandError::InvalidPhone("+12ab".into()))
        );
    }

    #[test]
    fn non_commands_are_not_admin() {
        assert!(parse_admin("hello").is_none());
        assert!(parse_admin("/approved already").is_none());
        assert!(parse_admin("please /approve 1hour").is_none());
    }

    #[test]
    fn target_falls_back_to_quoted_sender() {
        let cmd = admin("/approve 3message").unwrap();
        assert_eq!(cmd.resolve_target(Some("111@c.us")).unwrap(), "111@c.us");
        assert_eq!(cmd.resolve_target(None), Err(CommandError::MissingTarget));

        let explicit = admin("/approve 3message +15550001111").unwrap();
        assert_eq!(
            explicit.resolve_target(Some("111@c.us")).unwrap(),
            "15550001111@c.us"
        );
    }

    #[test]
    fn session_commands_in_all_forms() {
        for text in ["start ai chat", "/start", "🤖 Start AI Chat", "start_ai_chat", "  START AI  "] {
            assert_eq!(parse_session(text), Some(SessionCommand::Start), "{text}");
        }
        for text in ["stop ai chat", "/stop", "❌ Stop AI Chat", "stop_ai_chat", "/stopai"] {
            assert_eq!(parse_session(text), Some(SessionCommand::Stop), "{text}");
        }
        assert_eq!(parse_session("can you start the car?"), None);
        assert_eq!(parse_session("hello"), None);
    }
}
