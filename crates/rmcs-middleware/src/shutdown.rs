//! Process-wide stop signal.
//!
//! A [`Shutdown`] is cloned into every long-running loop. Triggering it:
//!
//! * flips an atomic flag checked by polling loops,
//! * disconnects an internal signal channel so that `crossbeam::select!`
//!   waits and [`Shutdown::sleep`] return immediately,
//! * interrupts every registered [`Interruptible`] (typically a
//!   [`Mailbox`](crate::Mailbox) blocked in `take`).
//!
//! Triggering is idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

/// Anything blocked in a wait that the shutdown signal must be able to break.
pub trait Interruptible: Send + Sync {
    fn interrupt(&self);
}

struct Inner {
    triggered: AtomicBool,
    // Dropped on trigger; receivers then observe disconnection.
    signal_tx: Mutex<Option<Sender<()>>>,
    signal_rx: Receiver<()>,
    watched: Mutex<Vec<Arc<dyn Interruptible>>>,
}

/// Cloneable handle to the shared stop signal.
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                signal_tx: Mutex::new(Some(tx)),
                signal_rx: rx,
                watched: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Request a stop. Every registered [`Interruptible`] is interrupted.
    pub fn trigger(&self) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("shutdown triggered");
        self.inner
            .signal_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let watched = std::mem::take(
            &mut *self
                .inner
                .watched
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for target in watched {
            target.interrupt();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Register a blocking wait to be interrupted on trigger. When the
    /// signal already fired the target is interrupted right away.
    pub fn watch(&self, target: Arc<dyn Interruptible>) {
        if self.is_triggered() {
            target.interrupt();
            return;
        }
        self.inner
            .watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
        // A trigger may have drained the list between the check and the push.
        if self.is_triggered() {
            let pending = std::mem::take(
                &mut *self
                    .inner
                    .watched
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            for target in pending {
                target.interrupt();
            }
        }
    }

    /// Receiver that becomes ready (disconnected) once the signal fires.
    /// Intended for use inside `crossbeam::select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal_rx
    }

    /// Sleep for `period` or until triggered. Returns `true` when the loop
    /// should stop.
    pub fn sleep(&self, period: Duration) -> bool {
        match self.inner.signal_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
            _ => true,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct CountingTarget(AtomicUsize);

    impl Interruptible for CountingTarget {
        fn interrupt(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn trigger_is_idempotent_and_interrupts_once() {
        let shutdown = Shutdown::new();
        let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
        shutdown.watch(target.clone());

        shutdown.trigger();
        shutdown.trigger();

        assert!(shutdown.is_triggered());
        assert_eq!(target.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watch_after_trigger_interrupts_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
        shutdown.watch(target.clone());
        assert_eq!(target.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sleep_times_out_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.sleep(Duration::from_millis(5)));
    }

    #[test]
    fn sleep_wakes_on_trigger_from_another_thread() {
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        let started = Instant::now();
        assert!(shutdown.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
