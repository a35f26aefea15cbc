use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pcap::{Active, Capture, Device};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::network::decode;
use crate::network::file;
use crate::network::filter;
use crate::network::stats::ProtocolStats;
use crate::network::store::FrameStore;
use crate::network::types::{timeval_to_datetime, CaptureEvent, Frame};

/// Hard ceiling on how long one capture task runs.
pub const CAPTURE_WINDOW: Duration = Duration::from_secs(60);

/// How long `stop_capture` waits for workers before abandoning them.
pub const STOP_GRACE: Duration = Duration::from_secs(1);

const SNAPLEN: i32 = 65535;
// Blocked reads return at least twice per second, so a stop request is
// observed well inside the grace period on an idle interface.
const READ_TIMEOUT_MS: i32 = 500;

/// Capturable interface names on this host.
pub fn load_interfaces() -> Result<Vec<String>> {
    let devices = Device::list().map_err(|e| Error::Io(std::io::Error::other(e)))?;
    Ok(devices.into_iter().map(|device| device.name).collect())
}

struct Worker {
    interface: String,
    handle: JoinHandle<()>,
}

/// Owned capture state for one process: the selected interfaces, one
/// cancellation flag shared by every capture task, the frame store, the
/// protocol tally, and the delivery queue of capture events.
pub struct CaptureSession {
    store: FrameStore,
    stats: ProtocolStats,
    stop: Arc<AtomicBool>,
    workers: Vec<Worker>,
    interfaces: Vec<String>,
    events_tx: Sender<CaptureEvent>,
    events_rx: Receiver<CaptureEvent>,
}

impl CaptureSession {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        CaptureSession {
            store: FrameStore::new(),
            stats: ProtocolStats::new(),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            interfaces: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    /// Launches one capture task per interface and returns immediately.
    /// Open failures surface as `CaptureEvent::Error` on the delivery
    /// queue, tagged with their interface; sibling tasks are unaffected.
    pub fn start_capture(&mut self, interfaces: &[String]) -> Result<()> {
        if interfaces.is_empty() {
            return Err(Error::InvalidArgument("no interfaces selected".to_string()));
        }
        if !self.workers.is_empty() {
            self.stop_capture();
        }

        self.stop.store(false, Ordering::Relaxed);
        self.interfaces = interfaces.to_vec();

        for interface in interfaces {
            let name = interface.clone();
            let task_interface = interface.clone();
            let store = self.store.clone();
            let stats = self.stats.clone();
            let stop = Arc::clone(&self.stop);
            let events = self.events_tx.clone();

            let handle = thread::spawn(move || {
                capture_task(task_interface, store, stats, events, stop);
            });
            self.workers.push(Worker {
                interface: name,
                handle,
            });
        }

        info!("capture started on {} interface(s)", interfaces.len());
        Ok(())
    }

    /// Signals every capture task to stop, then waits under a single
    /// overall deadline. Best effort: a task blocked past the deadline is
    /// abandoned, not killed, and may still run briefly after this
    /// returns.
    pub fn stop_capture(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        info!("stopping capture on {} interface(s)", self.workers.len());
        self.stop.store(true, Ordering::Relaxed);

        let deadline = Instant::now() + STOP_GRACE;
        for worker in self.workers.drain(..) {
            while !worker.handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if worker.handle.is_finished() {
                let _ = worker.handle.join();
            } else {
                warn!(
                    "capture on {} did not stop within the grace period, abandoning",
                    worker.interface
                );
            }
        }
        self.interfaces.clear();
    }

    /// Next delivery-queue entry, without blocking.
    pub fn poll_event(&self) -> Option<CaptureEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Next delivery-queue entry, waiting up to `timeout`.
    pub fn next_event(&self, timeout: Duration) -> Option<CaptureEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    pub fn frame(&self, index: usize) -> Option<Frame> {
        self.store.get(index)
    }

    /// Multi-line decoded view of the frame at `index`.
    pub fn frame_detail(&self, index: usize) -> Option<String> {
        self.store.get(index).map(|frame| decode::detail(&frame))
    }

    pub fn frame_count(&self) -> usize {
        self.store.len()
    }

    pub fn protocol_stats(&self) -> HashMap<String, u64> {
        self.stats.snapshot()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Replaces the store contents with the frames from a capture file.
    pub fn load_pcap(&self, path: impl AsRef<Path>) -> Result<usize> {
        file::load(path.as_ref(), &self.store, &self.stats)
    }

    /// Writes the store (or one interface's slice of it) to a capture file.
    pub fn save_pcap(&self, path: impl AsRef<Path>, interface: Option<&str>) -> Result<usize> {
        file::save(path.as_ref(), &self.store, interface)
    }

    pub fn apply_filters(
        &self,
        protocol: Option<&str>,
        source: Option<&str>,
        destination: Option<&str>,
    ) -> Vec<Frame> {
        filter::apply_filters(&self.store.snapshot(), protocol, source, destination)
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

fn capture_task(
    interface: String,
    store: FrameStore,
    stats: ProtocolStats,
    events: Sender<CaptureEvent>,
    stop: Arc<AtomicBool>,
) {
    let mut capture = match open_live(&interface) {
        Ok(capture) => capture,
        Err(error) => {
            warn!("{}", error);
            let _ = events.send(CaptureEvent::Error { interface, error });
            return;
        }
    };

    let started = Instant::now();
    debug!("capture task running on {}", interface);

    loop {
        if stop.load(Ordering::Relaxed) {
            debug!("capture on {} observed stop signal", interface);
            break;
        }
        if started.elapsed() >= CAPTURE_WINDOW {
            debug!("capture window elapsed on {}", interface);
            break;
        }

        match capture.next_packet() {
            Ok(packet) => {
                let frame = Frame::from_wire(
                    Some(interface.clone()),
                    packet.data.to_vec(),
                    packet.header.len,
                    timeval_to_datetime(&packet.header.ts),
                );
                store.append(frame.clone());
                if let Some(name) = frame.protocol {
                    stats.increment(name);
                }
                let _ = events.send(CaptureEvent::Frame {
                    interface: interface.clone(),
                    frame,
                });
            }
            // a read timeout is a poll point, not an error
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                warn!("capture error on {}: {}", interface, e);
                let _ = events.send(CaptureEvent::Error {
                    interface: interface.clone(),
                    error: Error::CaptureRuntime {
                        interface: interface.clone(),
                        reason: e.to_string(),
                    },
                });
                break;
            }
        }
    }

    info!(
        "capture finished on {} after {:.1}s",
        interface,
        started.elapsed().as_secs_f64()
    );
}

fn open_live(interface: &str) -> Result<Capture<Active>> {
    let device = Device::list()
        .map_err(|e| Error::CaptureOpen {
            interface: interface.to_string(),
            reason: e.to_string(),
        })?
        .into_iter()
        .find(|device| device.name == interface)
        .ok_or_else(|| Error::CaptureOpen {
            interface: interface.to_string(),
            reason: "no such interface".to_string(),
        })?;

    Capture::from_device(device)
        .and_then(|capture| {
            capture
                .immediate_mode(true)
                .snaplen(SNAPLEN)
                .timeout(READ_TIMEOUT_MS)
                .open()
        })
        .map_err(|e| Error::CaptureOpen {
            interface: interface.to_string(),
            reason: e.to_string(),
        })
}
