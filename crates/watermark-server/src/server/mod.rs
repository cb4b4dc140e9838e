//! Server internals.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env configuration.
//! - [`telemetry`] - Log subscriber and optional OpenTelemetry metrics.
//! - [`store`] - The document store interface and an in-memory store.
//! - [`service`] - The ticket workflow.
//! - [`endpoint`] - Transport-agnostic endpoints and their middleware.
//! - [`transport`] - HTTP and gRPC adapters.
//! - [`lifecycle`] - Actor supervision and shutdown.

pub mod config;
pub mod endpoint;
pub mod lifecycle;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod transport;
