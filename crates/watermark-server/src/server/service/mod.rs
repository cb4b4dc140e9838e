//! Ticket workflow service.
//!
//! ## Structure
//!
//! - [`workflow`] - [`WorkflowService`], the ticket state machine and the
//!   four document operations plus the status probe.
//! - [`locks`] - Per-ticket mutual exclusion.

pub mod locks;
pub mod workflow;

pub use workflow::{ServiceHealth, WorkflowService};
