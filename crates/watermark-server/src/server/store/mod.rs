//! Document store collaborator.
//!
//! The workflow service persists tickets through [`DocumentStore`] and is its
//! only caller. The store keeps documents, statuses and watermarks by ticket
//! ID but does not interpret them: transition rules live in the service.
//!
//! ## Submodules
//!
//! - [`memory`] - In-process store used by the binary and the tests.

pub mod memory;

use async_trait::async_trait;
use watermark_core::types::{Document, Filter, TicketStatus};

pub use memory::InMemoryStore;

/// Failures reported by a store implementation. These never cross the
/// workflow service boundary as-is.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no entry for ticket {ticket_id}")]
    NotFound { ticket_id: String },

    #[error("ticket {ticket_id} already exists")]
    AlreadyExists { ticket_id: String },

    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Stores a new document under `ticket_id`. Existing IDs are rejected.
    async fn put(&self, ticket_id: &str, document: Document) -> Result<(), StoreError>;

    /// Deletes everything held for `ticket_id`. Removing an absent ticket is
    /// not an error.
    async fn remove(&self, ticket_id: &str) -> Result<(), StoreError>;

    /// Returns every document matching all `filters`.
    async fn get(&self, filters: &[Filter]) -> Result<Vec<Document>, StoreError>;

    async fn put_status(&self, ticket_id: &str, status: TicketStatus) -> Result<(), StoreError>;

    async fn get_status(&self, ticket_id: &str) -> Result<TicketStatus, StoreError>;

    async fn put_watermark(&self, ticket_id: &str, mark: &str) -> Result<(), StoreError>;

    async fn get_watermark(&self, ticket_id: &str) -> Result<Option<String>, StoreError>;

    /// Cheap reachability probe used by the service status check.
    async fn ping(&self) -> Result<(), StoreError>;
}
