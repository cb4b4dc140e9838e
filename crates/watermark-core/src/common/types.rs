//! # Ticket Domain Types
//!
//! - [`Document`] - The submitted payload and its metadata.
//! - [`TicketStatus`] - The monotonic ticket lifecycle.
//! - [`Filter`] / [`FilterKey`] - Predicates accepted by `get`.
//!
//! ## Lifecycle
//!
//! ```text
//! Created -> InProgress -> Started -> Finished
//! ```
//!
//! A ticket starts in [`TicketStatus::Created`]. Watermarking is only
//! accepted from that state and walks the ticket forward to
//! [`TicketStatus::Finished`], which is terminal.

use crate::Error;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Numeric outcome reported by a successful watermark call.
pub const WATERMARK_OK: i32 = 200;

/// Service status code for a healthy process.
pub const SERVICE_HEALTHY: i32 = 200;

/// Service status code when a dependency (the store) cannot be reached.
pub const SERVICE_DEGRADED: i32 = 503;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Document {
    pub content: String,
    pub title: String,
    pub author: String,
    pub topic: String,
}

impl Document {
    /// Checks the fields a document cannot be stored without.
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::invalid_argument("document title is required"));
        }
        if self.author.trim().is_empty() {
            return Err(Error::invalid_argument("document author is required"));
        }
        Ok(())
    }

    pub fn field(&self, key: FilterKey) -> Option<&str> {
        match key {
            FilterKey::Content => Some(&self.content),
            FilterKey::Title => Some(&self.title),
            FilterKey::Author => Some(&self.author),
            FilterKey::Topic => Some(&self.topic),
            FilterKey::TicketId => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TicketStatus {
    Created,
    InProgress,
    Started,
    Finished,
}

impl TicketStatus {
    pub const INITIAL: Self = Self::Created;

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InProgress => "inProgress",
            Self::Started => "started",
            Self::Finished => "finished",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Whether a watermark may still be applied from this state.
    pub const fn accepts_watermark(self) -> bool {
        !matches!(self, Self::InProgress | Self::Started | Self::Finished)
    }

    /// Transitions only ever move forward.
    pub fn can_advance_to(self, next: Self) -> bool {
        next > self
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys `get` accepts. Anything else is rejected as an invalid argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKey {
    TicketId,
    Content,
    Title,
    Author,
    Topic,
}

impl FilterKey {
    pub const ALL: [Self; 5] = [
        Self::TicketId,
        Self::Content,
        Self::Title,
        Self::Author,
        Self::Topic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TicketId => "ticketID",
            Self::Content => "content",
            Self::Title => "title",
            Self::Author => "author",
            Self::Topic => "topic",
        }
    }
}

impl FromStr for FilterKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unrecognized filter key `{s}`")))
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-match predicate over one document field (or the ticket ID).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub key: FilterKey,
    pub value: String,
}

impl Filter {
    pub fn new(key: FilterKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Parses a wire key/value pair.
    pub fn parse(key: &str, value: impl Into<String>) -> crate::Result<Self> {
        Ok(Self::new(key.parse()?, value))
    }

    pub fn matches(&self, ticket_id: &str, doc: &Document) -> bool {
        match self.key {
            FilterKey::TicketId => self.value == ticket_id,
            key => doc.field(key) == Some(self.value.as_str()),
        }
    }
}
