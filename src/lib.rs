//! Chat Gate: inbound message gating core.
//!
//! Decides, per inbound message, whether to drop it, run an operator command,
//! toggle an assisted-chat session, forward it to the responder, acknowledge
//! an approved correspondent, or answer with the status menu.

pub mod channels;
pub mod clock;
pub mod config;
pub mod error;
pub mod grants;
pub mod limiter;
pub mod observability;
pub mod responder;
pub mod router;
pub mod session;
pub mod sweeper;

pub use error::{Error, Result};
