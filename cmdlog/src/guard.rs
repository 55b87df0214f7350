//! Access guard with interruptible acquisition
//!
//! A mutual-exclusion lock whose blocking acquisition can be abandoned when
//! the caller's [`Signal`] is raised. An interrupted caller never touches the
//! guarded state and gets [`Interrupted`], meaning "retry the whole call".
//!
//! # How a blocked caller gets woken
//!
//! Ownership of the guard is a `busy` flag behind a small gate mutex, with a
//! condition variable for waiters. A waiter that has to sleep parks the
//! gate on its signal first, then checks the signal, then sleeps:
//!
//! ```ignore
//! let mut busy = gate.busy.lock();
//! signal.park(&gate);
//! while *busy {
//!     if signal.is_raised() { return Err(Interrupted) }
//!     gate.released.wait(&mut busy);
//! }
//! ```
//!
//! A signal may be shared by several waiters, possibly on different guards,
//! so it keeps one parked gate per waiter. `Signal::raise` sets the flag
//! first and then takes each parked gate's mutex before notifying. Since the waiter holds the gate mutex between its check and
//! its sleep, the notification cannot fall into that gap.
//!
//! Like `mutex_lock_interruptible`, a free guard is taken even if the signal
//! is already raised; only a caller that would block is interrupted.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A blocked acquisition was cancelled by the caller's signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interrupted while waiting for the device lock")
    }
}

impl std::error::Error for Interrupted {}

struct Gate {
    busy: Mutex<bool>,
    released: Condvar,
}

struct SignalInner {
    raised: AtomicBool,
    parked_on: Mutex<Vec<Arc<Gate>>>,
}

/// Cancellation token for one caller
///
/// Clones share the same flag, so another thread can keep a clone and
/// raise it while the owner is blocked.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                raised: AtomicBool::new(false),
                parked_on: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Raise the signal and wake every caller blocked on a guard with it
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        let parked = self.inner.parked_on.lock().clone();
        for gate in parked {
            let _busy = gate.busy.lock();
            gate.released.notify_all();
        }
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Clear a raised signal so the caller can retry
    pub fn clear(&self) {
        self.inner.raised.store(false, Ordering::SeqCst);
    }

    fn park(&self, gate: &Arc<Gate>) {
        self.inner.parked_on.lock().push(Arc::clone(gate));
    }

    /// Forget one parking on `gate`; other waiters on it stay parked
    fn unpark(&self, gate: &Arc<Gate>) {
        let mut parked = self.inner.parked_on.lock();
        if let Some(i) = parked.iter().position(|g| Arc::ptr_eq(g, gate)) {
            parked.swap_remove(i);
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal(raised={})", self.is_raised())
    }
}

/// Mutual exclusion around `T` with interruptible acquisition
pub struct AccessGuard<T> {
    gate: Arc<Gate>,
    data: Mutex<T>,
}

impl<T> AccessGuard<T> {
    #[must_use]
    pub fn new(data: T) -> Self {
        Self {
            gate: Arc::new(Gate {
                busy: Mutex::new(false),
                released: Condvar::new(),
            }),
            data: Mutex::new(data),
        }
    }

    /// Acquire, giving up if `signal` is raised while blocked
    ///
    /// # Errors
    /// Returns `Interrupted` if the caller had to wait and its signal was raised.
    pub fn lock_interruptible(
        &self,
        signal: &Signal,
    ) -> Result<ExclusiveAccess<'_, T>, Interrupted> {
        let mut busy = self.gate.busy.lock();
        if *busy {
            let raised_before = signal.is_raised();
            signal.park(&self.gate);
            while *busy {
                if signal.is_raised() {
                    signal.unpark(&self.gate);
                    if raised_before {
                        log::warn!("guard: waited with a signal that was already raised");
                    }
                    log::debug!("guard: acquisition interrupted");
                    return Err(Interrupted);
                }
                self.gate.released.wait(&mut busy);
            }
            signal.unpark(&self.gate);
        }
        *busy = true;
        drop(busy);
        Ok(self.enter())
    }

    /// Acquire without the possibility of interruption
    pub fn lock(&self) -> ExclusiveAccess<'_, T> {
        let mut busy = self.gate.busy.lock();
        while *busy {
            self.gate.released.wait(&mut busy);
        }
        *busy = true;
        drop(busy);
        self.enter()
    }

    /// Run `op` with exclusive access to the guarded state
    ///
    /// # Errors
    /// Returns `Interrupted` if the caller had to wait and its signal was raised.
    pub fn with_exclusive_access<R>(
        &self,
        signal: &Signal,
        op: impl FnOnce(&mut T) -> R,
    ) -> Result<R, Interrupted> {
        let mut access = self.lock_interruptible(signal)?;
        Ok(op(&mut access))
    }

    /// Access the state through a unique reference, no locking needed
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn enter(&self) -> ExclusiveAccess<'_, T> {
        // Only the holder of the gate locks `data`, so this never blocks
        ExclusiveAccess {
            data: Some(self.data.lock()),
            gate: &self.gate,
        }
    }
}

impl<T: Default> Default for AccessGuard<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for AccessGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessGuard(busy={})", *self.gate.busy.lock())
    }
}

/// Exclusive access to the guarded state
///
/// The guard is released when this value is dropped.
pub struct ExclusiveAccess<'a, T> {
    data: Option<MutexGuard<'a, T>>,
    gate: &'a Gate,
}

impl<T> Deref for ExclusiveAccess<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.data {
            Some(data) => &**data,
            None => unreachable!("data is only taken in drop"),
        }
    }
}

impl<T> DerefMut for ExclusiveAccess<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.data {
            Some(data) => &mut **data,
            None => unreachable!("data is only taken in drop"),
        }
    }
}

impl<T> Drop for ExclusiveAccess<'_, T> {
    fn drop(&mut self) {
        drop(self.data.take());
        let mut busy = self.gate.busy.lock();
        *busy = false;
        // An interrupted waiter may eat a single wakeup
        self.gate.released.notify_all();
        drop(busy);
    }
}
