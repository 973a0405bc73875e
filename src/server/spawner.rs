//! Session spawning
//!
//! The listener hands each accepted connection to a `SessionSpawner`, so
//! the runtime and any admission policy stay outside the accept loop.

use std::future::Future;
use std::pin::Pin;

use log::debug;

pub type SessionFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait SessionSpawner: Send + Sync {
    fn spawn(&self, session: SessionFuture);
}

/// Runs every session as its own tokio task, without limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl SessionSpawner for TokioSpawner {
    fn spawn(&self, session: SessionFuture) {
        tokio::spawn(session);
        debug!("Spawned session task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn tokio_spawner_runs_the_session() {
        let ran = Arc::new(AtomicBool::new(false));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let flag = Arc::clone(&ran);

        TokioSpawner.spawn(Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        }));

        rx.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
