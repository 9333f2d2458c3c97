//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Publishers stamp every payload with wall-clock epoch seconds (`ts`, f64)
//! - Readings are kept in arrival order; `ts` is carried for display and diagnostics

mod blueprint;
mod error;
mod message;
mod message_source;
mod reading;
mod router;
mod stream;

pub use blueprint::*;
pub use error::*;
pub use message::{is_valid_filter, topic_matches, BusMessage, ConnectionState};
pub use message_source::{LocalMessageSource, MessageCallback, MessageSource};
pub use reading::Reading;
pub use router::{DropReason, MessageRouter, RouteOutcome};
pub use stream::{FieldSpec, StreamKind, UnknownStream};
