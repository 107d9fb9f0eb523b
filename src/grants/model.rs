//! Grant data model: kinds, issuance specs, and duration units.

use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Calendar-naive duration unit. Months are 30 days, years 365.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl DurationUnit {
    /// Length of one unit in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 7 * 86_400,
            Self::Month => 30 * 86_400,
            Self::Year => 365 * 86_400,
        }
    }

    /// `amount` units as a time delta, or `None` past what chrono can represent.
    pub fn times(&self, amount: u32) -> Option<TimeDelta> {
        self.seconds()
            .checked_mul(i64::from(amount))
            .and_then(TimeDelta::try_seconds)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for DurationUnit {
    type Err = CommandError;

    /// Accepts the singular name with an optional trailing `s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let singular = lower.strip_suffix('s').unwrap_or(&lower);
        match singular {
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(CommandError::UnknownUnit(s.to_string())),
        }
    }
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantSpec {
    Forever,
    Duration { unit: DurationUnit, amount: u32 },
    Messages { count: u32 },
}

impl GrantSpec {
    /// Resolve into a concrete grant kind at `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<GrantKind, CommandError> {
        match *self {
            Self::Forever => Ok(GrantKind::Permanent),
            Self::Duration { amount: 0, .. } | Self::Messages { count: 0 } => {
                Err(CommandError::ZeroAmount)
            }
            Self::Duration { unit, amount } => unit
                .times(amount)
                .and_then(|delta| now.checked_add_signed(delta))
                .map(GrantKind::ExpiresAt)
                .ok_or(CommandError::AmountTooLarge),
            Self::Messages { count } => Ok(GrantKind::RemainingUses(count)),
        }
    }
}

impl std::fmt::Display for GrantSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forever => write!(f, "forever"),
            Self::Duration { unit, amount: 1 } => write!(f, "1 {unit}"),
            Self::Duration { unit, amount } => write!(f, "{amount} {unit}s"),
            Self::Messages { count: 1 } => write!(f, "1 message"),
            Self::Messages { count } => write!(f, "{count} messages"),
        }
    }
}

/// How a grant expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GrantKind {
    Permanent,
    ExpiresAt(DateTime<Utc>),
    /// Strictly positive while the grant exists.
    RemainingUses(u32),
}

/// An access grant for one correspondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub kind: GrantKind,
    pub granted_at: DateTime<Utc>,
}
