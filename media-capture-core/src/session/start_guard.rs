use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type Pending<T> = Shared<BoxFuture<'static, T>>;

/// One-shot in-flight operation guard.
///
/// `run_or_join` starts the operation only when none is pending; every caller
/// that arrives while it runs awaits the same future and receives a clone of
/// its output. The slot clears itself when the operation settles.
pub struct StartGuard<T: Clone + Send + Sync + 'static> {
    slot: Arc<Mutex<Option<Pending<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> StartGuard<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// The pending operation, if any.
    pub fn pending(&self) -> Option<impl Future<Output = T>> {
        self.slot.lock().clone()
    }

    /// Join the pending operation, or start `start()` when there is none.
    ///
    /// `start` is only invoked when no operation is pending, and is never
    /// invoked while another caller's operation is in flight. Returning
    /// `None` from `start` means there is nothing to do; no guard is held.
    pub fn run_or_join<F, Fut>(&self, start: F) -> Option<impl Future<Output = T>>
    where
        F: FnOnce() -> Option<Fut>,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(pending) = slot.as_ref() {
            return Some(pending.clone());
        }

        let operation = start()?;
        let clear = Arc::clone(&self.slot);
        let pending = async move {
            let output = operation.await;
            clear.lock().take();
            output
        }
        .boxed()
        .shared();

        *slot = Some(pending.clone());
        Some(pending)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for StartGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}
