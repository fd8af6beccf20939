//! Completion hooks for pooled units.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::TaskError;

type OnSuccess<T> = Box<dyn FnOnce(&T) + Send>;
type OnFailure = Box<dyn FnOnce(&TaskError) + Send>;

/// Hooks invoked when a pooled unit finishes.
///
/// `on_success` sees the value, `on_failure` sees the error. Neither runs for a
/// cancelled unit. A panicking hook turns the unit's outcome into
/// [`TaskError::Panicked`].
///
/// ```rust
/// use taskgate::{Callbacks, TaskError};
///
/// let callbacks = Callbacks::<u32>::new()
///     .on_success(|n| println!("indexed {n} items"))
///     .on_failure(|e: &TaskError| eprintln!("indexing failed: {e}"));
/// # drop(callbacks);
/// ```
pub struct Callbacks<T> {
    on_success: Option<OnSuccess<T>>,
    on_failure: Option<OnFailure>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_failure: None,
        }
    }
}

impl<T> fmt::Debug for Callbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

impl<T> Callbacks<T> {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook run with the unit's value.
    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Sets the hook run with the unit's error.
    pub fn on_failure(mut self, f: impl FnOnce(&TaskError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Runs the matching hook for `res` and returns the final outcome.
    pub(crate) fn dispatch(self, res: Result<T, TaskError>) -> Result<T, TaskError> {
        let hook = match &res {
            Ok(value) => self
                .on_success
                .map(|f| catch_unwind(AssertUnwindSafe(|| f(value)))),
            Err(e) if e.is_cancellation() => None,
            Err(e) => self
                .on_failure
                .map(|f| catch_unwind(AssertUnwindSafe(|| f(e)))),
        };

        match hook {
            Some(Err(panic)) => Err(TaskError::from_panic(panic)),
            _ => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn only_the_matching_hook_runs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (ok_hits, err_hits) = (hits.clone(), hits.clone());
        let callbacks = || {
            let (ok_hits, err_hits) = (ok_hits.clone(), err_hits.clone());
            Callbacks::<u8>::new()
                .on_success(move |_| {
                    ok_hits.fetch_add(1, Ordering::SeqCst);
                })
                .on_failure(move |_| {
                    err_hits.fetch_add(10, Ordering::SeqCst);
                })
        };

        assert_eq!(callbacks().dispatch(Ok(1)), Ok(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(callbacks().dispatch(Err(TaskError::fail("x"))).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        assert_eq!(
            callbacks().dispatch(Err(TaskError::Canceled)),
            Err(TaskError::Canceled)
        );
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn panicking_hook_becomes_failure() {
        let callbacks = Callbacks::<u8>::new().on_success(|_| panic!("hook exploded"));
        assert_eq!(
            callbacks.dispatch(Ok(3)),
            Err(TaskError::Panicked {
                reason: "hook exploded".into()
            })
        );
    }
}
