//! Access grants issued by the operator.

pub mod model;
pub mod registry;

pub use model::{DurationUnit, Grant, GrantKind, GrantSpec};
pub use registry::{GrantError, GrantRegistry};
