//! Transfer watchdog
//!
//! One timer thread per armed session. The thread waits on a reset signal
//! with the packet timeout; every reset restarts the window. A window that
//! passes without a reset runs the timeout action once and ends the thread.
//! Disarming never joins: it raises the stop flag and wakes the thread,
//! which then exits without firing.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::notify::Notify;

struct Arm {
    reset: Arc<Notify>,
    stop: Arc<AtomicBool>,
}

impl Arm {
    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.reset.notify();
    }
}

pub struct TransferWatchdog {
    timeout: Duration,
    current: Mutex<Option<Arm>>,
}

impl TransferWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            current: Mutex::new(None),
        }
    }

    /// Start a new timer, replacing any previous one
    pub fn arm<F>(&self, on_timeout: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = current.take() {
            old.stop();
        }

        let reset = Arc::new(Notify::new());
        let stop = Arc::new(AtomicBool::new(false));
        let timeout = self.timeout;

        {
            let reset = reset.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("transfer-watchdog".into())
                .spawn(move || watch(&reset, &stop, timeout, on_timeout))?;
        }

        *current = Some(Arm { reset, stop });
        debug!("Watchdog armed ({} ms)", timeout.as_millis());
        Ok(())
    }

    /// Record forward progress
    pub fn reset(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(arm) = current.as_ref() {
            arm.reset.notify();
        }
    }

    /// Stop the timer without firing
    pub fn disarm(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(arm) = current.take() {
            arm.stop();
            debug!("Watchdog disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .is_some_and(|arm| !arm.stop.load(Ordering::SeqCst))
    }
}

impl Drop for TransferWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn watch<F: FnOnce()>(reset: &Notify, stop: &AtomicBool, timeout: Duration, on_timeout: F) {
    loop {
        let progressed = reset.wait_timeout(timeout);
        if stop.load(Ordering::SeqCst) {
            return;
        }
        if !progressed {
            break;
        }
    }

    stop.store(true, Ordering::SeqCst);
    warn!("Transfer watchdog expired after {} ms", timeout.as_millis());
    on_timeout();
}
