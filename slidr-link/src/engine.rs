//! Engine wiring
//!
//! Builds the shared link, transfer state machine and health record, then
//! runs the receiver on its own thread. The watchdog and the download
//! sender are spawned on demand by the transfer state machine.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info};
use slidr_protocol::Framer;

use crate::config::LinkConfig;
use crate::dispatcher::{CommandHandler, Dispatcher};
use crate::health::LinkHealth;
use crate::link::Link;
use crate::receiver::Receiver;
use crate::transfer::FileTransfer;
use crate::transport::{UartRx, UartTx};

pub struct Engine {
    link: Link,
    transfer: FileTransfer,
    health: Arc<LinkHealth>,
    stop: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
}

impl Engine {
    /// Start the engine on a transport pair
    pub fn start<R, T, H>(config: &LinkConfig, rx: R, tx: T, handler: H) -> io::Result<Self>
    where
        R: UartRx + Send + 'static,
        T: UartTx + Send + 'static,
        H: CommandHandler + 'static,
    {
        fs::create_dir_all(&config.storage_root)?;

        let link = Link::new(tx);
        let transfer = FileTransfer::new(link.clone(), config);
        let health = Arc::new(LinkHealth::new());
        let stop = Arc::new(AtomicBool::new(false));

        let receiver = Receiver::new(
            rx,
            Framer::with_timeout(config.packet_timeout_ms),
            Dispatcher::new(transfer.clone(), link.clone(), handler),
            health.clone(),
        );

        let interval = config.poll_interval();
        let handle = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("link-rx".into())
                .spawn(move || receiver.run(&stop, interval))?
        };

        info!(
            "Engine started (storage: {})",
            config.storage_root.display()
        );

        Ok(Self {
            link,
            transfer,
            health,
            stop,
            receiver: Some(handle),
        })
    }

    /// Outbound link, for unsolicited packets such as `SLIDER_VALUE`
    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn transfer(&self) -> &FileTransfer {
        &self.transfer
    }

    pub fn is_transfer_active(&self) -> bool {
        self.transfer.is_active()
    }

    pub fn health(&self) -> Arc<LinkHealth> {
        self.health.clone()
    }

    /// Time since the last checksum-valid packet
    pub fn last_packet_elapsed(&self) -> Duration {
        self.health.last_packet_elapsed()
    }

    pub fn last_packet_ms(&self) -> u64 {
        self.health.last_packet_ms()
    }

    /// Stop the receiver and cancel any active transfer
    pub fn shutdown(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.receiver.take() {
            if handle.join().is_err() {
                error!("Receiver thread panicked");
            }
            if self.transfer.cancel_transfer() {
                info!("Active transfer cancelled on shutdown");
            }
            info!("Engine stopped");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
