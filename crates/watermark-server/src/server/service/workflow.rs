use super::locks::TicketLocks;
use crate::server::store::{DocumentStore, StoreError};
use std::sync::Arc;
use tracing::Span;
use uuid::Uuid;
use watermark_core::{
    Error, Result,
    context::RequestContext,
    types::{Document, Filter, SERVICE_DEGRADED, SERVICE_HEALTHY, TicketStatus, WATERMARK_OK},
};

/// Attempts at minting a ticket ID before giving up on collisions.
const MINT_ATTEMPTS: usize = 3;

/// Result of the service status probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy,
    Degraded { reason: String },
}

impl ServiceHealth {
    pub const fn code(&self) -> i32 {
        match self {
            Self::Healthy => SERVICE_HEALTHY,
            Self::Degraded { .. } => SERVICE_DEGRADED,
        }
    }
}

/// Owner of the ticket state machine.
///
/// The service is the only caller of the [`DocumentStore`]. Every read or
/// write of a ticket's status and watermark happens under that ticket's
/// lock, so a concurrent `status` never observes a half-applied
/// `watermark`.
pub struct WorkflowService {
    store: Arc<dyn DocumentStore>,
    locks: TicketLocks,
    logger: Span,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn DocumentStore>, logger: Span) -> Self {
        Self {
            store,
            locks: TicketLocks::new(),
            logger,
        }
    }

    /// Validates and persists `document`, returning its new ticket ID. The
    /// ticket starts in [`TicketStatus::INITIAL`].
    pub async fn add_document(&self, ctx: &RequestContext, document: Document) -> Result<String> {
        ctx.ensure_active()?;
        document.validate()?;

        for _ in 0..MINT_ATTEMPTS {
            let ticket_id = Uuid::new_v4().simple().to_string();
            let _guard = self.locks.lock(&ticket_id).await;

            match self.store.put(&ticket_id, document.clone()).await {
                Ok(()) => {}
                Err(StoreError::AlreadyExists { .. }) => {
                    tracing::warn!(parent: &self.logger, %ticket_id, "ticket id collision, minting another");
                    continue;
                }
                Err(e) => return Err(self.store_error("put", e)),
            }
            if let Err(e) = self.store.put_status(&ticket_id, TicketStatus::INITIAL).await {
                self.discard(&ticket_id).await;
                return Err(self.store_error("put_status", e));
            }

            tracing::info!(
                parent: &self.logger,
                %ticket_id,
                title = %document.title,
                author = %document.author,
                "document submitted"
            );
            return Ok(ticket_id);
        }

        Err(self.internal(format!(
            "could not mint a unique ticket id after {MINT_ATTEMPTS} attempts"
        )))
    }

    /// Returns the documents matching every filter. An empty match is a
    /// valid answer; an empty filter list is rejected.
    pub async fn get(&self, ctx: &RequestContext, filters: &[Filter]) -> Result<Vec<Document>> {
        ctx.ensure_active()?;
        if filters.is_empty() {
            return Err(Error::invalid_argument("at least one filter is required"));
        }

        let documents = self
            .store
            .get(filters)
            .await
            .map_err(|e| self.store_error("get", e))?;

        tracing::debug!(
            parent: &self.logger,
            filters = filters.len(),
            matches = documents.len(),
            "documents queried"
        );
        Ok(documents)
    }

    pub async fn status(&self, ctx: &RequestContext, ticket_id: &str) -> Result<TicketStatus> {
        ctx.ensure_active()?;
        require("ticketID", ticket_id)?;

        let _guard = self.locks.lock(ticket_id).await;
        self.store
            .get_status(ticket_id)
            .await
            .map_err(|e| self.store_error("get_status", e))
    }

    /// Applies `mark` to a ticket that has not started watermarking yet and
    /// drives it to [`TicketStatus::Finished`].
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a blank ID or mark, or when the ticket is
    ///   already `InProgress`, `Started` or `Finished`. The recorded
    ///   watermark is left untouched.
    /// - `Unknown` when the ticket does not exist.
    pub async fn watermark(&self, ctx: &RequestContext, ticket_id: &str, mark: &str) -> Result<i32> {
        ctx.ensure_active()?;
        require("ticketID", ticket_id)?;
        require("mark", mark)?;

        let _guard = self.locks.lock(ticket_id).await;
        let current = self
            .store
            .get_status(ticket_id)
            .await
            .map_err(|e| self.store_error("get_status", e))?;

        if !current.accepts_watermark() {
            tracing::info!(parent: &self.logger, %ticket_id, status = %current, "watermark rejected");
            return Err(Error::invalid_argument(format!(
                "ticket {ticket_id} is already {current}"
            )));
        }

        if let Err(err) = self.apply(ticket_id, current, mark).await {
            self.restore(ticket_id, current).await;
            return Err(err);
        }

        tracing::info!(parent: &self.logger, %ticket_id, "watermark applied");
        Ok(WATERMARK_OK)
    }

    /// Liveness probe. A store that cannot be reached degrades the result
    /// instead of failing the call.
    pub async fn service_status(&self, ctx: &RequestContext) -> Result<ServiceHealth> {
        ctx.ensure_active()?;
        match self.store.ping().await {
            Ok(()) => Ok(ServiceHealth::Healthy),
            Err(e) => {
                tracing::warn!(parent: &self.logger, error = %e, "service degraded");
                Ok(ServiceHealth::Degraded {
                    reason: "document store unreachable".to_string(),
                })
            }
        }
    }

    async fn apply(&self, ticket_id: &str, from: TicketStatus, mark: &str) -> Result<()> {
        let mut status = from;
        for next in [TicketStatus::InProgress, TicketStatus::Started] {
            status = self.advance(ticket_id, status, next).await?;
        }
        self.store
            .put_watermark(ticket_id, mark)
            .await
            .map_err(|e| self.store_error("put_watermark", e))?;
        self.advance(ticket_id, status, TicketStatus::Finished).await?;
        Ok(())
    }

    /// Puts a ticket back to `status` after a watermark failed partway, so a
    /// retry is judged on the status it had before.
    async fn restore(&self, ticket_id: &str, status: TicketStatus) {
        match self.store.put_status(ticket_id, status).await {
            Ok(()) => {
                tracing::warn!(parent: &self.logger, %ticket_id, %status, "watermark rolled back");
            }
            Err(e) => tracing::error!(
                parent: &self.logger,
                %ticket_id,
                %status,
                error = %e,
                "could not roll back ticket status"
            ),
        }
    }

    /// Drops a document whose ticket could not be recorded.
    async fn discard(&self, ticket_id: &str) {
        if let Err(e) = self.store.remove(ticket_id).await {
            tracing::error!(
                parent: &self.logger,
                %ticket_id,
                error = %e,
                "could not discard partial submission"
            );
        }
    }

    async fn advance(
        &self,
        ticket_id: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<TicketStatus> {
        if !from.can_advance_to(to) {
            return Err(self.internal(format!(
                "illegal transition {from} -> {to} for ticket {ticket_id}"
            )));
        }
        self.store
            .put_status(ticket_id, to)
            .await
            .map_err(|e| self.store_error("put_status", e))?;
        tracing::debug!(parent: &self.logger, %ticket_id, %from, %to, "ticket advanced");
        Ok(to)
    }

    fn store_error(&self, op: &'static str, err: StoreError) -> Error {
        match err {
            StoreError::NotFound { ticket_id } => {
                Error::unknown(format!("ticket {ticket_id} not found"))
            }
            StoreError::Unavailable { .. } => {
                tracing::warn!(parent: &self.logger, op, error = %err, "store unavailable");
                Error::unknown("document store unavailable")
            }
            StoreError::AlreadyExists { .. } => self.internal(format!("store {op}: {err}")),
        }
    }

    fn internal(&self, context: String) -> Error {
        tracing::error!(parent: &self.logger, %context, "internal error");
        Error::internal(context)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_argument(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::InMemoryStore;
    use watermark_core::ErrorKind;
    use watermark_core::types::FilterKey;

    fn service() -> (WorkflowService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let svc = WorkflowService::new(store.clone(), Span::none());
        (svc, store)
    }

    fn doc() -> Document {
        Document {
            title: "T".into(),
            author: "A".into(),
            ..Document::default()
        }
    }

    #[tokio::test]
    async fn submitted_document_starts_created_and_is_queryable() {
        let (svc, _) = service();
        let ctx = RequestContext::default();

        let id = svc.add_document(&ctx, doc()).await.unwrap();
        assert_eq!(svc.status(&ctx, &id).await.unwrap(), TicketStatus::Created);

        let found = svc
            .get(&ctx, &[Filter::new(FilterKey::Title, "T")])
            .await
            .unwrap();
        assert_eq!(found, vec![doc()]);

        let by_id = svc
            .get(&ctx, &[Filter::new(FilterKey::TicketId, id.clone())])
            .await
            .unwrap();
        assert_eq!(by_id, vec![doc()]);
    }

    #[tokio::test]
    async fn ticket_ids_are_unique() {
        let (svc, store) = service();
        let ctx = RequestContext::default();
        let a = svc.add_document(&ctx, doc()).await.unwrap();
        let b = svc.add_document(&ctx, doc()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn malformed_document_is_rejected() {
        let (svc, store) = service();
        let err = svc
            .add_document(&RequestContext::default(), Document::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn watermark_once_then_reject() {
        let (svc, store) = service();
        let ctx = RequestContext::default();
        let id = svc.add_document(&ctx, doc()).await.unwrap();

        assert_eq!(svc.watermark(&ctx, &id, "mark1").await.unwrap(), WATERMARK_OK);
        assert_eq!(svc.status(&ctx, &id).await.unwrap(), TicketStatus::Finished);

        let err = svc.watermark(&ctx, &id, "mark2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            store.get_watermark(&id).await.unwrap().as_deref(),
            Some("mark1")
        );
    }

    #[tokio::test]
    async fn watermark_rejected_mid_flow() {
        let (svc, store) = service();
        let ctx = RequestContext::default();
        let id = svc.add_document(&ctx, doc()).await.unwrap();

        for status in [TicketStatus::InProgress, TicketStatus::Started] {
            store.put_status(&id, status).await.unwrap();
            let err = svc.watermark(&ctx, &id, "m").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert_eq!(store.get_watermark(&id).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn unknown_ticket_is_unknown() {
        let (svc, _) = service();
        let ctx = RequestContext::default();
        assert_eq!(
            svc.status(&ctx, "does-not-exist").await.unwrap_err().kind(),
            ErrorKind::Unknown
        );
        assert_eq!(
            svc.watermark(&ctx, "does-not-exist", "m")
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::Unknown
        );
    }

    #[tokio::test]
    async fn blank_arguments_are_invalid() {
        let (svc, _) = service();
        let ctx = RequestContext::default();
        assert_eq!(
            svc.status(&ctx, "").await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        let id = svc.add_document(&ctx, doc()).await.unwrap();
        assert_eq!(
            svc.watermark(&ctx, &id, " ").await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            svc.get(&ctx, &[]).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn empty_match_is_not_an_error() {
        let (svc, _) = service();
        let found = svc
            .get(
                &RequestContext::default(),
                &[Filter::new(FilterKey::Author, "nobody")],
            )
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn offline_store_degrades_health_and_reads_are_unknown() {
        let (svc, store) = service();
        let ctx = RequestContext::default();
        assert_eq!(svc.service_status(&ctx).await.unwrap(), ServiceHealth::Healthy);

        store.set_online(false);
        let health = svc.service_status(&ctx).await.unwrap();
        assert_eq!(health.code(), SERVICE_DEGRADED);
        assert_eq!(
            svc.add_document(&ctx, doc()).await.unwrap_err(),
            Error::unknown("document store unavailable")
        );
    }

    #[tokio::test]
    async fn cancelled_context_is_refused() {
        let (svc, store) = service();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::new(token);
        assert_eq!(
            svc.add_document(&ctx, doc()).await.unwrap_err(),
            Error::Cancelled
        );
        assert!(store.is_empty());
    }

    /// Wraps [`InMemoryStore`] and fails the next call of an armed write.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        armed: parking_lot::Mutex<Option<&'static str>>,
    }

    impl FlakyStore {
        fn fail_next(&self, op: &'static str) {
            *self.armed.lock() = Some(op);
        }

        fn trip(&self, op: &'static str) -> std::result::Result<(), StoreError> {
            let mut armed = self.armed.lock();
            if *armed == Some(op) {
                *armed = None;
                return Err(StoreError::Unavailable {
                    reason: format!("{op} failed"),
                });
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for FlakyStore {
        async fn put(&self, id: &str, document: Document) -> std::result::Result<(), StoreError> {
            self.trip("put")?;
            self.inner.put(id, document).await
        }

        async fn remove(&self, id: &str) -> std::result::Result<(), StoreError> {
            self.inner.remove(id).await
        }

        async fn get(&self, filters: &[Filter]) -> std::result::Result<Vec<Document>, StoreError> {
            self.inner.get(filters).await
        }

        async fn put_status(
            &self,
            id: &str,
            status: TicketStatus,
        ) -> std::result::Result<(), StoreError> {
            self.trip("put_status")?;
            self.inner.put_status(id, status).await
        }

        async fn get_status(&self, id: &str) -> std::result::Result<TicketStatus, StoreError> {
            self.inner.get_status(id).await
        }

        async fn put_watermark(&self, id: &str, mark: &str) -> std::result::Result<(), StoreError> {
            self.trip("put_watermark")?;
            self.inner.put_watermark(id, mark).await
        }

        async fn get_watermark(&self, id: &str) -> std::result::Result<Option<String>, StoreError> {
            self.inner.get_watermark(id).await
        }

        async fn ping(&self) -> std::result::Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    fn flaky_service() -> (WorkflowService, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::default());
        let svc = WorkflowService::new(store.clone(), Span::none());
        (svc, store)
    }

    #[tokio::test]
    async fn failed_watermark_write_rolls_back_and_can_be_retried() {
        let (svc, store) = flaky_service();
        let ctx = RequestContext::default();
        let id = svc.add_document(&ctx, doc()).await.unwrap();

        store.fail_next("put_watermark");
        let err = svc.watermark(&ctx, &id, "mark1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(svc.status(&ctx, &id).await.unwrap(), TicketStatus::Created);
        assert_eq!(store.get_watermark(&id).await.unwrap(), None);

        assert_eq!(svc.watermark(&ctx, &id, "mark2").await.unwrap(), WATERMARK_OK);
        assert_eq!(svc.status(&ctx, &id).await.unwrap(), TicketStatus::Finished);
        assert_eq!(
            store.get_watermark(&id).await.unwrap().as_deref(),
            Some("mark2")
        );
    }

    #[tokio::test]
    async fn failed_status_transition_rolls_back() {
        let (svc, store) = flaky_service();
        let ctx = RequestContext::default();
        let id = svc.add_document(&ctx, doc()).await.unwrap();

        // The first write of a watermark is the move to in-progress.
        store.fail_next("put_status");
        assert!(svc.watermark(&ctx, &id, "mark1").await.is_err());
        assert_eq!(svc.status(&ctx, &id).await.unwrap(), TicketStatus::Created);
        assert!(svc.watermark(&ctx, &id, "mark1").await.is_ok());
    }

    #[tokio::test]
    async fn failed_ticket_write_discards_the_document() {
        let (svc, store) = flaky_service();
        let ctx = RequestContext::default();

        store.fail_next("put_status");
        let err = svc.add_document(&ctx, doc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(store.inner.is_empty());

        let found = svc
            .get(&ctx, &[Filter::new(FilterKey::Title, "T")])
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn status_never_observes_a_partial_watermark() {
        let (svc, _) = service();
        let svc = Arc::new(svc);
        let id = svc
            .add_document(&RequestContext::default(), doc())
            .await
            .unwrap();

        let readers: Vec<_> = (0..64)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let id = id.clone();
                tokio::spawn(async move { svc.status(&RequestContext::default(), &id).await })
            })
            .collect();
        let writer = {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            tokio::spawn(async move {
                svc.watermark(&RequestContext::default(), &id, "mark1")
                    .await
            })
        };

        for reader in readers {
            let seen = reader.await.unwrap().unwrap();
            assert!(
                matches!(seen, TicketStatus::Created | TicketStatus::Finished),
                "observed {seen}"
            );
        }
        assert_eq!(writer.await.unwrap().unwrap(), WATERMARK_OK);
        assert_eq!(
            svc.status(&RequestContext::default(), &id).await.unwrap(),
            TicketStatus::Finished
        );
    }

    #[tokio::test]
    async fn concurrent_watermarks_apply_exactly_once() {
        let (svc, store) = service();
        let svc = Arc::new(svc);
        let ctx = RequestContext::default();
        let id = svc.add_document(&ctx, doc()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                svc.watermark(&RequestContext::default(), &id, &format!("mark{i}"))
                    .await
            }));
        }

        let mut applied = Vec::new();
        for (i, handle) in handles.into_iter().enumerate() {
            if handle.await.unwrap().is_ok() {
                applied.push(format!("mark{i}"));
            }
        }
        assert_eq!(applied.len(), 1);
        assert_eq!(store.get_watermark(&id).await.unwrap(), applied.pop());
    }
}
