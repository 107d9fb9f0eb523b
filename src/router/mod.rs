//! Inbound message router.
//!
//! Decides, for every inbound message, whether to drop it, answer an operator
//! command, toggle an assisted-conversation session, forward it to the
//! responder, acknowledge an approved correspondent, or send the status menu.
//!
//! Precedence, first match wins:
//! 1. rate limiter refuses → drop
//! 2. operator `/approve ...` → grant/revoke
//! 3. session start/stop
//! 4. active session → responder
//! 5. authorized by a grant → acknowledgment
//! 6. status menu
//!
//! Group and broadcast messages are dropped before step 1. Every non-drop
//! outcome is recorded against the sender's rate budget.

pub mod action;
pub mod command;
pub mod replies;

pub use action::{OperatorAvailability, OutboundAction};
pub use command::{AdminCommand, ApproveAction, SessionCommand};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CommandError, StoreError};
use crate::grants::{GrantError, GrantRegistry};
use crate::limiter::{LimiterStats, RateLimiter};
use crate::observability::ObservabilitySink;
use crate::responder::{ConversationResponder, SenderInfo};
use crate::session::SessionTracker;

/// Pseudo-sender used by status broadcasts.
pub const BROADCAST_SENDER: &str = "status@broadcast";

/// One message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: Uuid,
    pub sender: String,
    pub text: String,
    pub is_group: bool,
    pub from_operator: bool,
    /// Sender of the message this one replies to, if any.
    pub quoted_sender: Option<String>,
    pub display_name: Option<String>,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            text: text.into(),
            is_group: false,
            from_operator: false,
            quoted_sender: None,
            display_name: None,
        }
    }

    pub fn in_group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn from_operator(mut self) -> Self {
        self.from_operator = true;
        self
    }

    pub fn quoting(mut self, sender: impl Into<String>) -> Self {
        self.quoted_sender = Some(sender.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Snapshot of the router's traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficCounters {
    pub received: u64,
    pub replied: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    replied: AtomicU64,
    dropped: AtomicU64,
}

/// Collaborators the router is built from.
pub struct RouterDeps {
    pub limiter: Arc<RateLimiter>,
    pub grants: Arc<GrantRegistry>,
    pub sessions: Arc<SessionTracker>,
    pub responder: Arc<dyn ConversationResponder>,
    pub sink: Arc<dyn ObservabilitySink>,
}

pub struct Router {
    deps: RouterDeps,
    availability: RwLock<OperatorAvailability>,
    counters: Counters,
}

impl Router {
    pub fn new(deps: RouterDeps, availability: OperatorAvailability) -> Self {
        Self {
            deps,
            availability: RwLock::new(availability),
            counters: Counters::default(),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.deps.limiter
    }

    pub fn grants(&self) -> &Arc<GrantRegistry> {
        &self.deps.grants
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.deps.sessions
    }

    pub fn set_operator_availability(&self, state: OperatorAvailability) {
        *self
            .availability
            .write()
            .unwrap_or_else(|e| e.into_inner()) = state;
        self.deps
            .sink
            .info(&format!("Operator availability set to {state}"));
    }

    pub fn operator_availability(&self) -> OperatorAvailability {
        *self.availability.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Rate limiter introspection.
    pub fn stats(&self) -> Result<LimiterStats, StoreError> {
        self.deps.limiter.stats()
    }

    pub fn counters(&self) -> TrafficCounters {
        TrafficCounters {
            received: self.counters.received.load(Ordering::Relaxed),
            replied: self.counters.replied.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Decide what to do with one inbound message.
    ///
    /// Never fails: store faults degrade to an apology reply and responder
    /// failures to a canned answer.
    pub async fn process_inbound(&self, msg: &InboundMessage) -> OutboundAction {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if msg.is_group || msg.sender == BROADCAST_SENDER {
            debug!(sender = %msg.sender, "Ignoring group/broadcast message");
            return self.dropped();
        }

        if !self.deps.limiter.admit(&msg.sender) {
            warn!(sender = %msg.sender, message_id = %msg.id, "Rate limited message dropped");
            return self.dropped();
        }

        let action = match self.route(msg).await {
            Ok(action) => action,
            Err(e) => {
                error!(sender = %msg.sender, error = %e, "Routing failed");
                OutboundAction::reply(replies::APOLOGY)
            }
        };

        if action.is_drop() {
            return self.dropped();
        }
        self.deps.limiter.record(&msg.sender);
        self.counters.replied.fetch_add(1, Ordering::Relaxed);
        action
    }

    fn dropped(&self) -> OutboundAction {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        OutboundAction::Drop
    }

    async fn route(&self, msg: &InboundMessage) -> Result<OutboundAction, StoreError> {
        if msg.from_operator
            && let Some(parsed) = command::parse_admin(&msg.text)
        {
            return self.execute_admin(parsed, msg.quoted_sender.as_deref());
        }

        if let Some(cmd) = command::parse_session(&msg.text) {
            return self.toggle_session(cmd, msg);
        }

        if self.deps.sessions.is_active(&msg.sender)? {
            return Ok(self.assisted_reply(msg).await);
        }

        // Consumes a use on message-count grants; checked once per message.
        if self.deps.grants.is_authorized(&msg.sender)? {
            return Ok(OutboundAction::reply(replies::APPROVED_ACK));
        }

        Ok(OutboundAction::with_options(
            replies::status(self.operator_availability()),
            &[replies::START_OPTION],
        ))
    }

    fn execute_admin(
        &self,
        parsed: Result<AdminCommand, CommandError>,
        quoted_sender: Option<&str>,
    ) -> Result<OutboundAction, StoreError> {
        let resolved = parsed.and_then(|cmd| {
            let target = cmd.resolve_target(quoted_sender)?;
            Ok((cmd.action, target))
        });
        let (action, target) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(error = %e, "Rejected operator command");
                return Ok(OutboundAction::reply(replies::usage(&e)));
            }
        };

        match action {
            ApproveAction::Grant(spec) => match self.deps.grants.grant(&target, spec) {
                Ok(_) => {
                    info!(target_key = %target, spec = %spec, "Operator approved correspondent");
                    Ok(OutboundAction::reply(replies::granted(&target, &spec)))
                }
                Err(GrantError::Invalid(e)) => Ok(OutboundAction::reply(replies::usage(&e))),
                Err(GrantError::Store(e)) => Err(e),
            },
            ApproveAction::Revoke => {
                let existed = self.deps.grants.revoke(&target)?;
                info!(target_key = %target, existed, "Operator revoked approval");
                Ok(OutboundAction::reply(replies::revoked(&target, existed)))
            }
        }
    }

    fn toggle_session(
        &self,
        cmd: SessionCommand,
        msg: &InboundMessage,
    ) -> Result<OutboundAction, StoreError> {
        match cmd {
            SessionCommand::Start => {
                let name = msg
                    .display_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or("there");
                self.deps.sessions.start(&msg.sender, name)?;
                Ok(OutboundAction::with_options(
                    replies::welcome(name),
                    &[replies::STOP_OPTION],
                ))
            }
            SessionCommand::Stop => {
                self.deps.sessions.stop(&msg.sender)?;
                Ok(OutboundAction::reply(replies::FAREWELL))
            }
        }
    }

    /// Forward to the responder. No store lock is held across the await.
    async fn assisted_reply(&self, msg: &InboundMessage) -> OutboundAction {
        let sender = SenderInfo::new(msg.sender.clone(), msg.display_name.clone());
        let body = match self.deps.responder.respond(&msg.text, &sender).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    responder = self.deps.responder.name(),
                    error = %e,
                    "Responder unavailable, using fallback"
                );
                replies::FALLBACK.to_string()
            }
        };
        OutboundAction::reply(format!("{body}\n\n{}", replies::STOP_REMINDER))
    }
}
