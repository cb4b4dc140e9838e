//! Shared types and error definitions used across the watermark service.
//!
//! ## Submodules
//!
//! - [`error`] - Classified service error and its gRPC mapping.
//! - [`types`] - Documents, ticket status and filters.
//! - [`api`] - One request/response pair per operation, shared by both
//!   transports.
//! - [`context`] - Per-request cancellation and trace context.
//! - [`proto`] - Generated protobuf messages and the `Watermark` service.

pub mod api;
pub mod context;
mod convert;
pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};

pub mod proto {
    tonic::include_proto!("watermark");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("watermark_descriptor");
}
