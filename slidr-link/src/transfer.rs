//! File transfer state machine
//!
//! Claims the image transfer commands ahead of the device handler:
//! - `UPLOAD_IMAGE_START` / `_DATA` / `_END` (host → device), written to a
//!   temp file and moved into place on a size-checked end
//! - `DOWNLOAD_IMAGE_START` (device → host), streamed by a sender thread
//!   that waits for the host's `ACK` after every chunk
//! - `ACK`, but only while a session is active
//!
//! At most one session exists at a time. The session lives behind one
//! mutex shared by the receiver, the sender and the watchdog; each session
//! carries an id and a cancellation flag so a late watchdog or a sender
//! that outlived its session never touches a newer one.

use std::cmp;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, trace, warn};
use slidr_protocol::{Command, DownloadStart, Packet, UploadStart};

use crate::config::LinkConfig;
use crate::error::{ResourceOp, TransferError};
use crate::link::Link;
use crate::notify::Notify;
use crate::storage::Storage;
use crate::watchdog::TransferWatchdog;

/// Outcome of offering a packet to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// Not a transfer packet; the caller handles it
    Unclaimed,
    /// Fully handled, replies already sent
    Claimed,
    /// Handled, and an upload was stored at this path
    FileReceived(PathBuf),
}

impl Claim {
    pub fn is_claimed(&self) -> bool {
        !matches!(self, Claim::Unclaimed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Snapshot of the active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub direction: Direction,
    pub target_path: PathBuf,
    pub total_size: u32,
    pub bytes_transferred: u32,
}

struct Session {
    id: u64,
    direction: Direction,
    target_path: PathBuf,
    total_size: u32,
    bytes_transferred: u32,
    /// Upload temp file; the sender owns the file during a download
    file: Option<File>,
    cancelled: Arc<AtomicBool>,
}

type Slot = Option<Session>;

struct Inner {
    storage: Storage,
    link: Link,
    session: Mutex<Slot>,
    watchdog: TransferWatchdog,
    /// Raised by `ACK` during a download
    ack: Notify,
    chunk_size: usize,
    ack_timeout: Duration,
    next_id: AtomicU64,
}

/// Shared handle to the transfer state machine
#[derive(Clone)]
pub struct FileTransfer {
    inner: Arc<Inner>,
}

impl FileTransfer {
    pub fn new(link: Link, config: &LinkConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage: Storage::new(config.storage_root.clone()),
                link,
                session: Mutex::new(None),
                watchdog: TransferWatchdog::new(config.packet_timeout()),
                ack: Notify::new(),
                chunk_size: config.effective_chunk_size(),
                ack_timeout: config.packet_timeout(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Handle `packet` if it belongs to the transfer protocol
    pub fn try_handle(&self, packet: &Packet) -> Claim {
        let inner = &self.inner;
        let result = match packet.command() {
            Some(Command::UploadImageStart) => inner.start_upload(&packet.payload),
            Some(Command::UploadImageData) => inner.receive_chunk(&packet.payload),
            Some(Command::UploadImageEnd) => match inner.finish_upload() {
                Ok(path) => return Claim::FileReceived(path),
                Err(e) => Err(e),
            },
            Some(Command::DownloadImageStart) => inner.start_download(&packet.payload),
            Some(Command::Ack) if self.is_active() => {
                trace!("Transfer ACK");
                inner.ack.notify();
                Ok(())
            }
            _ => return Claim::Unclaimed,
        };

        if let Err(e) = result {
            inner.report(&e);
        }
        Claim::Claimed
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.inner.lock().as_ref().map(|s| SessionInfo {
            direction: s.direction,
            target_path: s.target_path.clone(),
            total_size: s.total_size,
            bytes_transferred: s.bytes_transferred,
        })
    }

    /// Abort the active session, if any
    ///
    /// Returns true when a session was cancelled.
    pub fn cancel_transfer(&self) -> bool {
        let mut slot = self.inner.lock();
        self.inner.cancel_locked(&mut slot)
    }

    pub fn is_watchdog_armed(&self) -> bool {
        self.inner.watchdog.is_armed()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, err: &TransferError) {
        warn!("{}", err);
        self.link.send_log(&err.to_string());
        self.link.send_error(err.code());
    }

    fn arm_watchdog(self: &Arc<Self>, id: u64) -> Result<(), TransferError> {
        let weak = Arc::downgrade(self);
        self.watchdog
            .arm(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_watchdog_timeout(id);
                }
            })
            .map_err(TransferError::resource(ResourceOp::Spawn))
    }

    fn start_upload(self: &Arc<Self>, payload: &[u8]) -> Result<(), TransferError> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(TransferError::InProgress);
        }

        let msg = UploadStart::from_payload(payload).map_err(|_| TransferError::InvalidPayload)?;
        let file = self.storage.create_temp()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.arm_watchdog(id) {
            drop(file);
            if let Err(rm) = self.storage.remove_temp() {
                warn!("{}", rm);
            }
            return Err(e);
        }

        let target_path = self.storage.image_path(msg.segment);
        info!(
            "Upload started: segment {}, {} bytes",
            msg.segment, msg.total_size
        );
        *slot = Some(Session {
            id,
            direction: Direction::Upload,
            target_path,
            total_size: msg.total_size,
            bytes_transferred: 0,
            file: Some(file),
            cancelled: Arc::new(AtomicBool::new(false)),
        });
        drop(slot);

        self.link.send_ack();
        Ok(())
    }

    fn receive_chunk(&self, chunk: &[u8]) -> Result<(), TransferError> {
        let mut slot = self.lock();

        let written = match slot.as_mut() {
            Some(Session {
                direction: Direction::Upload,
                file: Some(file),
                bytes_transferred,
                ..
            }) => {
                self.watchdog.reset();
                file.write_all(chunk).map(|()| {
                    *bytes_transferred = bytes_transferred.saturating_add(chunk.len() as u32);
                    *bytes_transferred
                })
            }
            _ => return Err(TransferError::NotActive),
        };

        match written {
            Ok(total) => {
                trace!("Chunk of {} bytes, {} so far", chunk.len(), total);
                drop(slot);
                self.link.send_ack();
                Ok(())
            }
            Err(e) => {
                self.cancel_locked(&mut slot);
                Err(TransferError::resource(ResourceOp::Write)(e))
            }
        }
    }

    fn finish_upload(&self) -> Result<PathBuf, TransferError> {
        let mut slot = self.lock();

        let (received, expected) = match slot.as_ref() {
            Some(s) if s.direction == Direction::Upload => (s.bytes_transferred, s.total_size),
            _ => return Err(TransferError::NotActive),
        };

        if received != expected {
            self.cancel_locked(&mut slot);
            return Err(TransferError::SizeMismatch { received, expected });
        }

        let Some(mut session) = slot.take() else {
            return Err(TransferError::NotActive);
        };
        self.watchdog.disarm();
        drop(session.file.take());

        if let Err(e) = self.storage.replace(&session.target_path) {
            if let Err(rm) = self.storage.remove_temp() {
                warn!("{}", rm);
            }
            return Err(e);
        }
        drop(slot);

        info!(
            "Upload complete: {} bytes -> {}",
            received,
            session.target_path.display()
        );
        self.link.send_ack();
        Ok(session.target_path)
    }

    fn start_download(self: &Arc<Self>, payload: &[u8]) -> Result<(), TransferError> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(TransferError::InProgress);
        }

        let msg = DownloadStart::from_payload(payload).map_err(|_| TransferError::InvalidPayload)?;
        let file = self.storage.open_image(msg.segment)?;
        let len = file
            .metadata()
            .map_err(TransferError::resource(ResourceOp::Read))?
            .len();
        let total_size = u32::try_from(len).unwrap_or(u32::MAX);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));

        self.ack.clear();
        self.arm_watchdog(id)?;

        info!(
            "Download started: segment {}, {} bytes",
            msg.segment, total_size
        );
        *slot = Some(Session {
            id,
            direction: Direction::Download,
            target_path: self.storage.image_path(msg.segment),
            total_size,
            bytes_transferred: 0,
            file: None,
            cancelled: cancelled.clone(),
        });
        drop(slot);

        self.link.send_ack();

        let inner = self.clone();
        let spawned = thread::Builder::new()
            .name("image-sender".into())
            .spawn(move || inner.send_image(file, id, total_size, &cancelled));

        if let Err(e) = spawned {
            let mut slot = self.lock();
            if slot.as_ref().is_some_and(|s| s.id == id) {
                self.cancel_locked(&mut slot);
            }
            return Err(TransferError::resource(ResourceOp::Spawn)(e));
        }
        Ok(())
    }

    /// Download sender loop
    fn send_image(&self, mut file: File, id: u64, total_size: u32, cancelled: &AtomicBool) {
        let mut buf = vec![0u8; self.chunk_size];
        let mut sent: u32 = 0;

        while sent < total_size {
            if cancelled.load(Ordering::SeqCst) {
                debug!("Download cancelled after {} bytes", sent);
                return;
            }

            let n = cmp::min(self.chunk_size, (total_size - sent) as usize);
            if let Err(e) = file.read_exact(&mut buf[..n]) {
                self.abort_download(id, TransferError::resource(ResourceOp::Read)(e));
                return;
            }

            if cancelled.load(Ordering::SeqCst) {
                debug!("Download cancelled after {} bytes", sent);
                return;
            }

            let packet = match Packet::new(Command::DownloadImageData, &buf[..n]) {
                Ok(packet) => packet,
                Err(_) => {
                    self.abort_download(id, TransferError::InvalidPayload);
                    return;
                }
            };
            if let Err(e) = self.link.send(&packet) {
                self.abort_download(id, TransferError::resource(ResourceOp::Send)(e));
                return;
            }

            sent += n as u32;
            if let Some(session) = self.lock().as_mut().filter(|s| s.id == id) {
                session.bytes_transferred = sent;
            }
            trace!("Sent chunk of {} bytes, {}/{}", n, sent, total_size);

            if self.ack.wait_timeout(self.ack_timeout) {
                // Session lock held so a newer session's timer is never reset
                let slot = self.lock();
                if slot.as_ref().is_some_and(|s| s.id == id) {
                    self.watchdog.reset();
                }
            } else {
                debug!("No ACK for chunk at {}, continuing", sent);
            }
        }
        drop(file);

        {
            let mut slot = self.lock();
            if !slot.as_ref().is_some_and(|s| s.id == id) {
                return;
            }
            *slot = None;
            self.watchdog.disarm();
        }

        info!("Download complete: {} bytes", sent);
        self.link.send_packet(Command::DownloadImageEnd, &[]);
    }

    fn abort_download(&self, id: u64, err: TransferError) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|s| s.id == id) {
            self.cancel_locked(&mut slot);
        }
        drop(slot);
        self.report(&err);
    }

    fn on_watchdog_timeout(&self, id: u64) {
        let mut slot = self.lock();
        if !slot.as_ref().is_some_and(|s| s.id == id) {
            return;
        }
        self.cancel_locked(&mut slot);
        drop(slot);
        self.report(&TransferError::Timeout);
    }

    fn cancel_locked(&self, slot: &mut Slot) -> bool {
        let Some(session) = slot.take() else {
            return false;
        };

        session.cancelled.store(true, Ordering::SeqCst);
        self.watchdog.disarm();
        drop(session.file);

        if let Err(e) = self.storage.remove_temp() {
            warn!("{}", e);
        }
        info!(
            "Transfer cancelled ({:?}, {}/{} bytes)",
            session.direction, session.bytes_transferred, session.total_size
        );
        true
    }
}
