//! End-to-end protocol scenarios against a running engine

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use slidr_link::transport::{memory_port, HostPort};
use slidr_link::{
    Command, CommandHandler, Direction, Engine, ErrorCode, Link, LinkConfig, Packet,
};
use slidr_protocol::{DownloadStart, UploadStart, FRAME_START};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(2);

/// Handler that answers PING and records stored files
#[derive(Clone, Default)]
struct Device {
    handled: Arc<Mutex<Vec<u8>>>,
    stored: Arc<Mutex<Vec<PathBuf>>>,
}

impl CommandHandler for Device {
    fn handle(&mut self, packet: &Packet, link: &Link) -> bool {
        self.handled.lock().unwrap().push(packet.cmd);
        if packet.command() == Some(Command::Ping) {
            link.send_packet(Command::Pong, &[]);
            return true;
        }
        false
    }

    fn file_received(&mut self, path: &Path) {
        self.stored.lock().unwrap().push(path.to_path_buf());
    }
}

struct Bench {
    engine: Engine,
    host: HostPort,
    device: Device,
    dir: TempDir,
}

impl Bench {
    fn new(packet_timeout_ms: u32) -> Self {
        let dir = TempDir::new().unwrap();
        let (rx, tx, host) = memory_port();
        let config = LinkConfig {
            packet_timeout_ms,
            poll_interval_ms: 1,
            storage_root: dir.path().to_path_buf(),
            ..LinkConfig::default()
        };
        let device = Device::default();
        let engine = Engine::start(&config, rx, tx, device.clone()).unwrap();
        Self {
            engine,
            host,
            device,
            dir,
        }
    }

    fn image(&self, segment: u8) -> PathBuf {
        self.dir
            .path()
            .join("images")
            .join(format!("img-{}.bin", segment))
    }

    fn temp(&self) -> PathBuf {
        self.dir.path().join("upload_temp")
    }

    fn write_image(&self, segment: u8, content: &[u8]) {
        let path = self.image(segment);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn upload_start(&self, segment: u8, total_size: u32) {
        self.host.send(
            &UploadStart {
                segment,
                total_size,
            }
            .to_packet()
            .unwrap(),
        );
    }

    fn reply(&mut self) -> Packet {
        self.host.recv_reply(WAIT).expect("no reply from device")
    }

    fn wait_idle(&self) {
        let start = Instant::now();
        while self.engine.is_transfer_active() && start.elapsed() < WAIT {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

#[test_log::test]
fn scenario_a_upload_complete() {
    let mut bench = Bench::new(1000);
    let chunk = b"0123456789";

    bench.upload_start(0, 10);
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageData, chunk);
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageEnd, &[]);
    assert_eq!(bench.reply(), Packet::ack());

    assert_eq!(fs::read(bench.image(0)).unwrap(), chunk);
    assert!(!bench.temp().exists());
    assert_eq!(*bench.device.stored.lock().unwrap(), vec![bench.image(0)]);
    assert!(!bench.engine.is_transfer_active());
}

#[test_log::test]
fn scenario_b_upload_size_mismatch() {
    let mut bench = Bench::new(1000);

    bench.upload_start(0, 10);
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageData, b"01234");
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageEnd, &[]);
    assert_eq!(bench.reply(), Packet::error(ErrorCode::InvalidCommand));

    assert!(!bench.image(0).exists());
    assert!(!bench.temp().exists());
    assert!(bench.device.stored.lock().unwrap().is_empty());
    assert!(!bench.engine.is_transfer_active());
}

#[test_log::test]
fn scenario_c_download_in_chunks() {
    let mut bench = Bench::new(1000);
    let content: Vec<u8> = (0..1300u32).map(|i| (i * 7) as u8).collect();
    bench.write_image(2, &content);

    bench
        .host
        .send(&DownloadStart { segment: 2 }.to_packet().unwrap());
    assert_eq!(bench.reply(), Packet::ack());

    let mut sizes = Vec::new();
    let mut received = Vec::new();
    loop {
        let packet = bench.reply();
        match packet.command() {
            Some(Command::DownloadImageData) => {
                sizes.push(packet.payload.len());
                received.extend_from_slice(&packet.payload);
                bench.host.send(&Packet::ack());
            }
            Some(Command::DownloadImageEnd) => break,
            other => panic!("unexpected packet {:?}", other),
        }
    }

    assert_eq!(sizes, vec![512, 512, 276]);
    assert_eq!(received, content);

    // The download's ACKs never reach the device handler
    bench.wait_idle();
    assert!(!bench.engine.is_transfer_active());
    assert!(bench.device.handled.lock().unwrap().is_empty());

    // No late watchdog fire after completion
    assert_eq!(bench.host.recv(Duration::from_millis(1500)), None);
}

#[test_log::test]
fn scenario_d_stalled_upload_times_out() {
    let mut bench = Bench::new(200);

    bench.upload_start(1, 100);
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageData, &[1, 2, 3]);
    assert_eq!(bench.reply(), Packet::ack());
    assert!(bench.temp().exists());

    // Withhold everything past the watchdog window
    assert_eq!(bench.reply(), Packet::error(ErrorCode::TransferTimeout));
    bench.wait_idle();
    assert!(!bench.engine.is_transfer_active());
    assert!(!bench.temp().exists());
    assert!(!bench.image(1).exists());
}

#[test_log::test]
fn scenario_e_declared_length_overflow() {
    let mut bench = Bench::new(1000);

    // length = 5000
    bench.host.send_raw(&[FRAME_START, 0x01, 0x88, 0x13]);
    let log = bench.host.recv(WAIT).unwrap();
    assert_eq!(log.command(), Some(Command::LogMessage));
    assert_eq!(bench.reply(), Packet::error(ErrorCode::BufferOverflow));
    assert!(bench.device.handled.lock().unwrap().is_empty());

    // The parser is idle again
    bench.host.send_command(Command::Ping, &[]);
    assert_eq!(bench.reply(), Packet::empty(Command::Pong));
}

#[test_log::test]
fn corrupted_frame_reports_checksum_error() {
    let mut bench = Bench::new(1000);
    let mut frame = Packet::new(Command::Ping, &[])
        .unwrap()
        .encode_to_vec()
        .unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x10;

    bench.host.send_raw(&frame);
    assert_eq!(bench.reply(), Packet::error(ErrorCode::ChecksumError));
    assert!(bench.device.handled.lock().unwrap().is_empty());
}

#[test_log::test]
fn second_session_is_rejected() {
    let mut bench = Bench::new(1000);
    bench.write_image(3, &[0xAB; 64]);

    bench.upload_start(0, 8);
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageData, b"abcd");
    assert_eq!(bench.reply(), Packet::ack());
    let before = bench.engine.transfer().session_info().unwrap();

    bench.upload_start(1, 4);
    assert_eq!(bench.reply(), Packet::error(ErrorCode::TransferInProgress));
    bench
        .host
        .send(&DownloadStart { segment: 3 }.to_packet().unwrap());
    assert_eq!(bench.reply(), Packet::error(ErrorCode::TransferInProgress));
    assert_eq!(bench.engine.transfer().session_info().unwrap(), before);

    // The first session still completes normally
    bench.host.send_command(Command::UploadImageData, b"efgh");
    assert_eq!(bench.reply(), Packet::ack());
    bench.host.send_command(Command::UploadImageEnd, &[]);
    assert_eq!(bench.reply(), Packet::ack());
    assert_eq!(fs::read(bench.image(0)).unwrap(), b"abcdefgh");
}

#[test_log::test]
fn upload_commands_ignored_during_download() {
    let mut bench = Bench::new(1000);
    bench.write_image(4, &[0x11; 600]);

    bench
        .host
        .send(&DownloadStart { segment: 4 }.to_packet().unwrap());
    assert_eq!(bench.reply(), Packet::ack());
    let first = bench.reply();
    assert_eq!(first.command(), Some(Command::DownloadImageData));
    assert_eq!(
        bench.engine.transfer().session_info().unwrap().direction,
        Direction::Download
    );

    // Upload data has no upload session to land in
    bench.host.send_command(Command::UploadImageData, b"zz");
    assert_eq!(bench.reply(), Packet::error(ErrorCode::InvalidCommand));
    assert!(!bench.temp().exists());

    bench.host.send(&Packet::ack());
    let second = bench.reply();
    assert_eq!(second.payload.len(), 88);
    bench.host.send(&Packet::ack());
    assert_eq!(bench.reply(), Packet::empty(Command::DownloadImageEnd));
    assert_eq!(fs::read(bench.image(4)).unwrap(), vec![0x11; 600]);
}

#[test_log::test]
fn download_without_acks_is_cancelled_by_watchdog() {
    let mut bench = Bench::new(150);
    bench.write_image(0, &vec![0x22; 4096]);

    bench
        .host
        .send(&DownloadStart { segment: 0 }.to_packet().unwrap());
    assert_eq!(bench.reply(), Packet::ack());

    let mut data = 0;
    let mut timed_out = false;
    while let Some(packet) = bench.host.recv_reply(WAIT) {
        match packet.command() {
            Some(Command::DownloadImageData) => data += 1,
            Some(Command::ErrorCmd) => {
                assert_eq!(packet, Packet::error(ErrorCode::TransferTimeout));
                timed_out = true;
                break;
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    assert!(timed_out);
    assert!(data < 8);
    bench.wait_idle();
    assert!(!bench.engine.is_transfer_active());
    // The sender stops without sending DOWNLOAD_IMAGE_END
    assert!(bench
        .host
        .collect(Duration::from_millis(400))
        .iter()
        .all(|p| p.command() != Some(Command::DownloadImageEnd)));
}

#[test_log::test]
fn stray_ack_goes_to_handler() {
    let mut bench = Bench::new(1000);
    bench.host.send(&Packet::ack());
    assert_eq!(bench.reply(), Packet::error(ErrorCode::InvalidCommand));
    assert_eq!(*bench.device.handled.lock().unwrap(), vec![0x0D]);
}

#[test_log::test]
fn link_health_tracks_valid_packets() {
    let mut bench = Bench::new(1000);
    thread::sleep(Duration::from_millis(50));
    assert!(bench.engine.last_packet_elapsed() >= Duration::from_millis(50));

    bench.host.send_command(Command::Ping, &[]);
    assert_eq!(bench.reply(), Packet::empty(Command::Pong));
    assert!(bench.engine.last_packet_elapsed() < Duration::from_millis(50));
}

#[test_log::test]
fn shutdown_cancels_active_upload() {
    let mut bench = Bench::new(1000);
    bench.upload_start(0, 10);
    assert_eq!(bench.reply(), Packet::ack());
    assert!(bench.temp().exists());

    let temp = bench.temp();
    let Bench { engine, dir, .. } = bench;
    engine.shutdown();
    assert!(!temp.exists());
    drop(dir);
}
