use super::ShutdownError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tracing::Span;

pub type ActorResult = Result<(), ShutdownError>;

type Interrupt = Box<dyn FnOnce(&ActorResult) + Send>;

struct Actor {
    name: String,
    execute: BoxFuture<'static, ActorResult>,
    interrupt: Interrupt,
}

/// Runs a set of actors until the first one returns, then interrupts the
/// rest and waits for them.
///
/// An actor is an `execute` future plus an `interrupt` function that must
/// make `execute` return promptly. Interrupts are called exactly once each,
/// with the result of the actor that returned first.
pub struct Group {
    actors: Vec<Actor>,
    logger: Span,
}

impl Group {
    pub fn new(logger: Span) -> Self {
        Self {
            actors: Vec::new(),
            logger,
        }
    }

    pub fn add<F, I>(&mut self, name: impl Into<String>, execute: F, interrupt: I)
    where
        F: Future<Output = ActorResult> + Send + 'static,
        I: FnOnce(&ActorResult) + Send + 'static,
    {
        self.actors.push(Actor {
            name: name.into(),
            execute: execute.boxed(),
            interrupt: Box::new(interrupt),
        });
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Returns the result of the first actor to finish. A panicking actor
    /// finishes with [`ShutdownError::ActorPanicked`].
    pub async fn run(self) -> ActorResult {
        let Self { actors, logger } = self;
        if actors.is_empty() {
            return Ok(());
        }

        let mut set = JoinSet::new();
        let mut interrupts = Vec::with_capacity(actors.len());
        for Actor {
            name,
            execute,
            interrupt,
        } in actors
        {
            interrupts.push(interrupt);
            set.spawn(async move {
                let result = AssertUnwindSafe(execute)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(ShutdownError::ActorPanicked(name.clone())));
                (name, result)
            });
        }

        let (name, first) = match set.join_next().await {
            Some(joined) => joined_result(joined),
            None => return Ok(()),
        };
        match &first {
            Ok(()) => tracing::info!(parent: &logger, actor = %name, "actor finished, shutting down"),
            Err(err) => tracing::info!(
                parent: &logger,
                actor = %name,
                transport = err.transport(),
                error = %err,
                "actor finished, shutting down"
            ),
        }

        for interrupt in interrupts {
            interrupt(&first);
        }

        while let Some(joined) = set.join_next().await {
            let (name, result) = joined_result(joined);
            match result {
                Ok(()) => tracing::debug!(parent: &logger, actor = %name, "actor stopped"),
                Err(err) => tracing::warn!(
                    parent: &logger,
                    actor = %name,
                    transport = err.transport(),
                    during = "shutdown",
                    error = %err,
                    "actor stopped with error"
                ),
            }
        }

        first
    }
}

fn joined_result(
    joined: Result<(String, ActorResult), tokio::task::JoinError>,
) -> (String, ActorResult) {
    joined.unwrap_or_else(|err| {
        let name = format!("unnamed ({err})");
        (name.clone(), Err(ShutdownError::ActorPanicked(name)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn waiting_actor(
        group: &mut Group,
        name: &str,
        interrupted: &Arc<AtomicUsize>,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let stop = token.clone();
        let interrupted = Arc::clone(interrupted);
        group.add(
            name,
            async move {
                stop.cancelled().await;
                Ok(())
            },
            {
                let token = token.clone();
                move |_: &ActorResult| {
                    interrupted.fetch_add(1, Ordering::SeqCst);
                    token.cancel();
                }
            },
        );
        token
    }

    #[tokio::test]
    async fn empty_group_returns_immediately() {
        assert!(Group::new(Span::none()).run().await.is_ok());
    }

    #[tokio::test]
    async fn first_exit_interrupts_the_rest_and_wins() {
        let interrupted = Arc::new(AtomicUsize::new(0));
        let mut group = Group::new(Span::none());
        let a = waiting_actor(&mut group, "a", &interrupted);
        let b = waiting_actor(&mut group, "b", &interrupted);
        group.add(
            "signal",
            async { Err(ShutdownError::Signal("SIGTERM".into())) },
            |_: &ActorResult| {},
        );
        assert_eq!(group.len(), 3);

        let result = group.run().await;
        assert!(matches!(result, Err(ShutdownError::Signal(ref s)) if s == "SIGTERM"));
        assert_eq!(interrupted.load(Ordering::SeqCst), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[tokio::test]
    async fn interrupts_see_the_first_result() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let mut group = Group::new(Span::none());
        let token = CancellationToken::new();
        let stop = token.clone();
        group.add(
            "waiter",
            async move {
                stop.cancelled().await;
                Ok(())
            },
            {
                let seen = Arc::clone(&seen);
                move |first: &ActorResult| {
                    *seen.lock() = Some(first.as_ref().err().map(ToString::to_string));
                    token.cancel();
                }
            },
        );
        group.add(
            "quitter",
            async { Err(ShutdownError::Signal("SIGINT".into())) },
            |_: &ActorResult| {},
        );

        group.run().await.unwrap_err();
        assert_eq!(*seen.lock(), Some(Some("received SIGINT".to_string())));
    }

    async fn explode() -> ActorResult {
        panic!("actor blew up")
    }

    #[tokio::test]
    async fn panicking_actor_is_reported() {
        let interrupted = Arc::new(AtomicUsize::new(0));
        let mut group = Group::new(Span::none());
        waiting_actor(&mut group, "waiter", &interrupted);
        group.add("boom", explode(), |_: &ActorResult| {});

        let result = group.run().await;
        assert!(matches!(result, Err(ShutdownError::ActorPanicked(ref name)) if name == "boom"));
        assert_eq!(interrupted.load(Ordering::SeqCst), 1);
    }
}
