//! Single-slot notification with a timed wait
//!
//! Wraps an `embassy_sync` [`Signal`] so threads can block on it with a
//! deadline. A notification raised while nobody waits is kept (one slot)
//! and consumed by the next wait.
//!
//! The wait races the signal against an `embassy_time` timer (host time
//! driver) and parks the calling thread until one of them wakes it.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::Duration;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;

pub struct Notify {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for Notify {
    fn default() -> Self {
        Self::new()
    }
}

impl Notify {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Raise the notification
    pub fn notify(&self) {
        self.signal.signal(());
    }

    /// Drop a pending notification, if any
    pub fn clear(&self) {
        self.signal.reset();
    }

    /// Wait up to `timeout` for a notification
    ///
    /// Returns true if one was consumed, false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let micros = u64::try_from(timeout.as_micros()).unwrap_or(u32::MAX as u64);
        let timer = Timer::after(embassy_time::Duration::from_micros(micros));

        match park_on(select(self.signal.wait(), timer)) {
            Either::First(()) => true,
            Either::Second(()) => false,
        }
    }
}

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Drive `fut` to completion on the calling thread, parked between polls
fn park_on<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);

    loop {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
        // Spurious unparks just cost another poll
        thread::park();
    }
}
