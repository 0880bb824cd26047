//! Thread-safe access to one machine.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use crate::console::{CancelToken, Launcher};
use crate::error::{Error, Result};
use crate::machine::Apple2;

/// Shared handle that serializes commands to one machine.
///
/// The cancel token lives outside the lock so another thread can abort the
/// command in flight.
pub struct Apple2Handle<L: Launcher> {
    inner: Arc<Mutex<Apple2<L>>>,
    cancel: CancelToken,
}

impl<L: Launcher> Clone for Apple2Handle<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel: self.cancel.clone(),
        }
    }
}

impl<L: Launcher> Apple2Handle<L> {
    #[must_use]
    pub fn new(machine: Apple2<L>) -> Self {
        let cancel = machine.cancel_token();
        Self {
            inner: Arc::new(Mutex::new(machine)),
            cancel,
        }
    }

    /// Run `f` once any command already in flight has finished.
    pub fn run<T>(&self, f: impl FnOnce(&mut Apple2<L>) -> Result<T>) -> Result<T> {
        // A panic mid-command leaves the session in a state the FSM still
        // describes, so a poisoned lock is usable.
        let mut machine = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut machine)
    }

    /// Run `f` only if no other command is in flight.
    pub fn try_run<T>(&self, f: impl FnOnce(&mut Apple2<L>) -> Result<T>) -> Result<T> {
        match self.inner.try_lock() {
            Ok(mut machine) => f(&mut machine),
            Err(TryLockError::Poisoned(poisoned)) => f(&mut poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(Error::SessionBusy),
        }
    }

    /// Abort the command in flight. The session crashes and needs a reboot.
    pub fn cancel(&self) {
        log::warn!("cancel requested");
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
