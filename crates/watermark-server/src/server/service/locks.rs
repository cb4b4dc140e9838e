use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of per-ticket async mutexes.
///
/// Operations on the same ticket serialize on its mutex; unrelated tickets
/// never contend beyond the short, synchronous table lookup. Entries are
/// dropped once the last holder or waiter goes away, including waiters that
/// are cancelled before they acquire.
#[derive(Debug, Default)]
pub struct TicketLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TicketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `ticket_id`.
    pub async fn lock(&self, ticket_id: &str) -> TicketGuard<'_> {
        // Declared before the wait so a cancelled waiter still prunes: the
        // pending acquire, and the `Arc` it owns, drops first.
        let entry = Entry {
            locks: self,
            ticket_id: ticket_id.to_string(),
        };
        let mutex = Arc::clone(self.table.lock().entry(ticket_id.to_string()).or_default());
        let guard = mutex.lock_owned().await;
        TicketGuard {
            _guard: guard,
            _entry: entry,
        }
    }

    /// Number of tickets with a live lock entry.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

/// Exclusive access to one ticket. Releasing it prunes the table entry when
/// nobody else holds or waits on it.
pub struct TicketGuard<'a> {
    // Field order matters: the mutex is released before the entry prunes.
    _guard: OwnedMutexGuard<()>,
    _entry: Entry<'a>,
}

struct Entry<'a> {
    locks: &'a TicketLocks,
    ticket_id: String,
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        // Clones are only taken under the table lock, so a count of one means
        // the table holds the last reference.
        let mut table = self.locks.table.lock();
        if table
            .get(&self.ticket_id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            table.remove(&self.ticket_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    #[tokio::test]
    async fn same_ticket_is_exclusive() {
        let locks = Arc::new(TicketLocks::new());
        let guard = locks.lock("t1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock("t1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn different_tickets_do_not_block() {
        let locks = TicketLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn waiter_dropped_after_release_still_prunes() {
        let locks = TicketLocks::new();
        let held = locks.lock("t1").await;

        let mut waiter = Box::pin(locks.lock("t1"));
        assert!((&mut waiter).now_or_never().is_none());

        // The holder sees a live waiter and leaves the entry in place.
        drop(held);
        assert_eq!(locks.active(), 1);

        drop(waiter);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn timed_out_waiter_leaves_no_entry() {
        let locks = TicketLocks::new();
        let held = locks.lock("t1").await;
        let waited = tokio::time::timeout(Duration::from_millis(20), locks.lock("t1")).await;
        assert!(waited.is_err());

        drop(held);
        assert_eq!(locks.active(), 0);
        assert!(locks.lock("t1").now_or_never().is_some());
    }
}
