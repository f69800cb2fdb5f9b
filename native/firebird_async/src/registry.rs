/// Shutdown-safety service for blocking handles
///
/// When a connection or cursor is closed while the process is finalizing, or
/// after its scheduler loop has shut down, closing the blocking handle from
/// the current thread is unsafe. The adapters park such handles here instead,
/// and so do their destructors when a handle is dropped without a close.
///
/// The registry is append-only and never drained: parked handles live until
/// the process exits. That bounded leak is the price for never crashing
/// during teardown.
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::constants::ZOMBIE_REGISTRY;
use crate::models::HandleKind;

/// A blocking handle that was deliberately left open.
pub struct Zombie {
    pub kind: HandleKind,
    /// Id of the adapter that owned the handle.
    pub owner: Uuid,
    handle: Box<dyn Any + Send>,
}

impl Zombie {
    /// Borrow the parked handle as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.handle.downcast_ref::<T>()
    }
}

impl fmt::Debug for Zombie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zombie")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct ZombieRegistry {
    finalizing: AtomicBool,
    zombies: Mutex<Vec<Zombie>>,
}

impl ZombieRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        Arc::clone(&ZOMBIE_REGISTRY)
    }

    /// Record that the process is tearing down. From now on every close
    /// parks its handle instead of releasing it.
    pub fn begin_finalization(&self) {
        self.finalizing.store(true, Ordering::SeqCst);
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing.load(Ordering::SeqCst)
    }

    pub(crate) fn park<T: Any + Send>(&self, kind: HandleKind, owner: Uuid, handle: T) {
        tracing::warn!(?kind, %owner, "parking blocking handle instead of closing it");
        self.lock().push(Zombie {
            kind,
            owner,
            handle: Box::new(handle),
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn count(&self, kind: HandleKind) -> usize {
        self.lock().iter().filter(|z| z.kind == kind).count()
    }

    /// Run `f` over the parked handles.
    pub fn inspect<R>(&self, f: impl FnOnce(&[Zombie]) -> R) -> R {
        f(&self.lock())
    }

    // Teardown must not fail on a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, Vec<Zombie>> {
        self.zombies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
