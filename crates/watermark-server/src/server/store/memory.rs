use super::{DocumentStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use watermark_core::types::{Document, Filter, TicketStatus};

#[derive(Debug)]
struct Record {
    document: Document,
    status: Option<TicketStatus>,
    watermark: Option<String>,
}

/// In-process [`DocumentStore`] backed by a `BTreeMap` behind a
/// `parking_lot::RwLock`.
///
/// Locks are never held across an await point. The store can be switched
/// offline to simulate an unreachable dependency.
#[derive(Debug)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, Record>>,
    online: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "in-memory store is offline".to_string(),
            })
        }
    }

    fn with_record<T>(
        &self,
        ticket_id: &str,
        f: impl FnOnce(&mut Record) -> T,
    ) -> Result<T, StoreError> {
        self.check_online()?;
        let mut records = self.records.write();
        let record = records.get_mut(ticket_id).ok_or_else(|| StoreError::NotFound {
            ticket_id: ticket_id.to_string(),
        })?;
        Ok(f(record))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn put(&self, ticket_id: &str, document: Document) -> Result<(), StoreError> {
        self.check_online()?;
        let mut records = self.records.write();
        if records.contains_key(ticket_id) {
            return Err(StoreError::AlreadyExists {
                ticket_id: ticket_id.to_string(),
            });
        }
        records.insert(
            ticket_id.to_string(),
            Record {
                document,
                status: None,
                watermark: None,
            },
        );
        Ok(())
    }

    async fn remove(&self, ticket_id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.records.write().remove(ticket_id);
        Ok(())
    }

    async fn get(&self, filters: &[Filter]) -> Result<Vec<Document>, StoreError> {
        self.check_online()?;
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|(id, record)| filters.iter().all(|f| f.matches(id, &record.document)))
            .map(|(_, record)| record.document.clone())
            .collect())
    }

    async fn put_status(&self, ticket_id: &str, status: TicketStatus) -> Result<(), StoreError> {
        self.with_record(ticket_id, |record| record.status = Some(status))
    }

    async fn get_status(&self, ticket_id: &str) -> Result<TicketStatus, StoreError> {
        self.with_record(ticket_id, |record| record.status)?
            .ok_or_else(|| StoreError::NotFound {
                ticket_id: ticket_id.to_string(),
            })
    }

    async fn put_watermark(&self, ticket_id: &str, mark: &str) -> Result<(), StoreError> {
        self.with_record(ticket_id, |record| record.watermark = Some(mark.to_string()))
    }

    async fn get_watermark(&self, ticket_id: &str) -> Result<Option<String>, StoreError> {
        self.with_record(ticket_id, |record| record.watermark.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}
