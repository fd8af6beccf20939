//! # Reentrant async lock keyed by logical task identity.
//!
//! [`ReentrantLock`] grants exclusive ownership to one unit of work at a time. The
//! owner may acquire again without suspending (depth grows); it must release as many
//! times as it acquired before anyone else gets in.
//!
//! Ownership is a [`TaskId`], never an OS thread: under tokio many units share a
//! thread, and one unit may hop threads between polls.
//!
//! ## States
//! ```text
//! Free ──acquire(T)──► Held(T, 1) ──acquire(T)──► Held(T, 2) ...
//!   ▲                      │
//!   └──── release(T) ──────┘   (depth 1 → 0 wakes one waiter)
//!
//! acquire(U ≠ T) while Held(T, _)  → suspends until Free
//! release(U ≠ T) or release on Free → LockError::NotOwner
//! ```
//!
//! ## Rules
//! - Waiters are admitted through a single-permit tokio semaphore, so wake order is
//!   FIFO. Only exclusion and reentrancy are part of the contract.
//! - Dropping a pending `acquire` leaves the lock untouched.
//! - A guard whose level was already released by hand logs the `NotOwner` error
//!   at error level when dropped; [`ReentrantGuard::unlock`] returns it instead.
//! - State mutations are short synchronous sections; no lock is held across `.await`.
//!
//! ## Example
//! ```rust
//! use taskgate::{ReentrantLock, TaskId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), taskgate::LockError> {
//! let lock = ReentrantLock::new();
//!
//! TaskId::next()
//!     .scope(async {
//!         let outer = lock.lock().await?;
//!         let inner = lock.lock().await?;
//!         assert_eq!(lock.depth(), 2);
//!         drop(inner);
//!         drop(outer);
//!         Ok::<_, taskgate::LockError>(())
//!     })
//!     .await?;
//!
//! assert!(!lock.is_locked());
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;

use crate::error::LockError;
use crate::tasks::TaskId;

#[derive(Debug, Default)]
struct Holder {
    owner: Option<TaskId>,
    depth: usize,
}

/// Reentrant mutual-exclusion lock for async units of work.
#[derive(Debug)]
pub struct ReentrantLock {
    holder: Mutex<Holder>,
    gate: Semaphore,
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReentrantLock {
    /// Creates a free lock.
    pub fn new() -> Self {
        Self {
            holder: Mutex::new(Holder::default()),
            gate: Semaphore::new(1),
        }
    }

    /// Acquires on behalf of the current unit (see [`TaskId::current`]).
    pub async fn acquire(&self) -> Result<(), LockError> {
        let me = TaskId::current().ok_or(LockError::NoTaskIdentity)?;
        self.acquire_as(me).await;
        Ok(())
    }

    /// Acquires on behalf of `owner`.
    ///
    /// Returns immediately if `owner` already holds the lock.
    pub async fn acquire_as(&self, owner: TaskId) {
        {
            let mut h = self.holder();
            if h.owner == Some(owner) {
                h.depth += 1;
                return;
            }
        }

        // The gate is never closed, so this only ends by obtaining the permit.
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        let mut h = self.holder();
        h.owner = Some(owner);
        h.depth = 1;
    }

    /// Releases one level held by the current unit.
    pub fn release(&self) -> Result<(), LockError> {
        let me = TaskId::current().ok_or(LockError::NoTaskIdentity)?;
        self.release_as(me)
    }

    /// Releases one level held by `owner`.
    ///
    /// Fails with [`LockError::NotOwner`] if `owner` does not hold the lock.
    pub fn release_as(&self, owner: TaskId) -> Result<(), LockError> {
        let mut h = self.holder();
        if h.owner != Some(owner) {
            return Err(LockError::NotOwner {
                caller: owner,
                owner: h.owner,
            });
        }

        h.depth -= 1;
        if h.depth == 0 {
            h.owner = None;
            self.gate.add_permits(1);
        }
        Ok(())
    }

    /// Acquires for the current unit and returns a guard that releases on drop.
    pub async fn lock(&self) -> Result<ReentrantGuard<'_>, LockError> {
        let me = TaskId::current().ok_or(LockError::NoTaskIdentity)?;
        Ok(self.lock_as(me).await)
    }

    /// Acquires for `owner` and returns a guard that releases on drop.
    pub async fn lock_as(&self, owner: TaskId) -> ReentrantGuard<'_> {
        self.acquire_as(owner).await;
        ReentrantGuard { lock: self, owner }
    }

    /// Returns `true` while some unit holds the lock.
    pub fn is_locked(&self) -> bool {
        self.holder().owner.is_some()
    }

    /// The current owner, if any.
    pub fn owner(&self) -> Option<TaskId> {
        self.holder().owner
    }

    /// Reentrancy depth (`0` when free).
    pub fn depth(&self) -> usize {
        self.holder().depth
    }

    /// Returns `true` if the current unit holds the lock.
    pub fn is_held_by_current(&self) -> bool {
        match TaskId::current() {
            Some(me) => self.holder().owner == Some(me),
            None => false,
        }
    }

    fn holder(&self) -> MutexGuard<'_, Holder> {
        self.holder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped ownership of a [`ReentrantLock`]; releases one level on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
    owner: TaskId,
}

impl ReentrantGuard<'_> {
    /// The unit this guard acquired for.
    pub fn owner(&self) -> TaskId {
        self.owner
    }

    /// Releases the level now and reports misuse as a value.
    pub fn unlock(self) -> Result<(), LockError> {
        let this = ManuallyDrop::new(self);
        this.lock.release_as(this.owner)
    }
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release_as(self.owner) {
            tracing::error!(
                owner = %self.owner,
                label = e.as_label(),
                error = %e,
                "reentrant guard dropped without holding the lock"
            );
        }
    }
}
