//! # Serial device links
//!
//! Every device is read by its own background thread. The thread reassembles frames from the byte
//! stream, decodes them and pushes the typed records into a bounded channel. The control loop is
//! the only consumer and drains every channel without blocking once per cycle, so a slow or
//! disconnected device only ever produces stale data.
//!
//! Devices which accept commands (thruster boards, power board, auxiliary board) also get a
//! [`SerialWriter`] sharing the same port.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    collections::BTreeMap,
    io::{ErrorKind, Read, Write},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{sync_channel, Receiver, SyncSender, TryRecvError, TrySendError},
        Arc,
    },
    thread,
    time::Duration,
};

use comms_if::eqpt::{
    frame::{BoardFramer, EncodeError},
    DeviceFrame, DeviceKind,
};
use log::{debug, error, info, warn};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Size of the buffer each reader reads into.
const READ_BUFFER_LEN: usize = 256;

/// Pause after an unexpected read error before retrying.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of one serial device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceParams {
    pub kind: DeviceKind,

    /// Path to the port, for example `/dev/ttyUSB0`
    pub port: String,

    pub baud_rate: u32,

    /// If true failing to open this device aborts startup
    #[serde(default)]
    pub required: bool,
}

/// Parameters shared by all serial links.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialParams {
    pub devices: Vec<DeviceParams>,

    /// Capacity of each reader's frame queue
    pub queue_capacity: usize,

    /// Timeout of a single read on a port
    ///
    /// Units: milliseconds
    pub read_timeout_ms: u64,
}

/// Counters kept by a reader thread.
#[derive(Debug, Default)]
pub struct ReaderStats {
    /// Frames discarded because the queue was full
    pub frames_dropped: AtomicU64,

    /// Frames which failed to decode
    pub decode_errors: AtomicU64,

    /// Bytes discarded while resynchronising
    pub bytes_dropped: AtomicU64,
}

/// A background reader for one device.
pub struct SerialReader {
    device: DeviceKind,
    rx: Receiver<DeviceFrame>,
    stop: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
    join_handle: Option<thread::JoinHandle<()>>,
}

/// Writes board frames to one device.
pub struct SerialWriter {
    device: DeviceKind,
    sink: Box<dyn Write + Send>,
}

/// All open device links.
#[derive(Default)]
pub struct Devices {
    readers: Vec<SerialReader>,
    writers: BTreeMap<DeviceKind, SerialWriter>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Could not open {device} on {port}: {source}")]
    OpenError {
        device: DeviceKind,
        port: String,
        source: serialport::Error,
    },

    #[error("Could not share the port of {0} between its reader and writer: {1}")]
    CloneError(DeviceKind, serialport::Error),

    #[error("Could not start the reader thread for {0}: {1}")]
    SpawnError(DeviceKind, std::io::Error),

    #[error("Could not write to {0}: {1}")]
    WriteError(DeviceKind, std::io::Error),

    #[error("Could not encode a frame for {0}: {1}")]
    EncodeError(DeviceKind, EncodeError),

    #[error("{0} is not open for writing")]
    NotOpen(DeviceKind),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SerialReader {
    /// Start a reader thread for a device reading from the given byte source.
    pub fn spawn(
        device: DeviceKind,
        source: Box<dyn Read + Send>,
        queue_capacity: usize,
    ) -> Result<Self, SerialError> {
        let (tx, rx) = sync_channel(queue_capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ReaderStats::default());

        let stop_clone = stop.clone();
        let stats_clone = stats.clone();

        let join_handle = thread::Builder::new()
            .name(format!("reader_{:?}", device).to_lowercase())
            .spawn(move || read_loop(device, source, tx, stop_clone, stats_clone))
            .map_err(|e| SerialError::SpawnError(device, e))?;

        Ok(Self {
            device,
            rx,
            stop,
            stats,
            join_handle: Some(join_handle),
        })
    }

    /// Take every frame queued since the last drain, in arrival order, without blocking.
    pub fn drain(&self) -> Vec<DeviceFrame> {
        let mut frames = Vec::new();

        loop {
            match self.rx.try_recv() {
                Ok(f) => frames.push(f),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        frames
    }

    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// Returns true while the reader thread is running.
    pub fn is_running(&self) -> bool {
        match self.join_handle {
            Some(ref jh) => !jh.is_finished(),
            None => false,
        }
    }

    /// Signal the reader thread to stop and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                error!("Reader thread for {} panicked", self.device);
            }
        }
    }
}

impl Drop for SerialReader {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SerialWriter {
    pub fn new(device: DeviceKind, sink: Box<dyn Write + Send>) -> Self {
        Self { device, sink }
    }

    /// Send a board frame.
    pub fn send(&mut self, msg_type: u8, payload: &[u8]) -> Result<(), SerialError> {
        let frame = BoardFramer::encode(msg_type, payload)
            .map_err(|e| SerialError::EncodeError(self.device, e))?;

        self.sink
            .write_all(&frame)
            .and_then(|_| self.sink.flush())
            .map_err(|e| SerialError::WriteError(self.device, e))
    }
}

impl Devices {
    /// Open every configured device.
    ///
    /// A device which fails to open is skipped with a warning, unless it is required in which
    /// case the error is returned.
    pub fn open(params: &SerialParams) -> Result<Self, SerialError> {
        let mut devices = Self::default();

        for dev in params.devices.iter() {
            match open_device(dev, params) {
                Ok((reader, writer)) => {
                    info!("{} opened on {}", dev.kind, dev.port);
                    devices.add(reader, writer);
                }
                Err(e) if dev.required => return Err(e),
                Err(e) => warn!("Optional device unavailable: {}", e),
            }
        }

        Ok(devices)
    }

    /// Add an already started reader and optional writer.
    pub fn add(&mut self, reader: SerialReader, writer: Option<SerialWriter>) {
        if let Some(w) = writer {
            self.writers.insert(w.device, w);
        }
        self.readers.push(reader);
    }

    /// Drain every reader's queue.
    pub fn drain_all(&self) -> Vec<(DeviceKind, DeviceFrame)> {
        self.readers
            .iter()
            .flat_map(|r| {
                let device = r.device();
                r.drain().into_iter().map(move |f| (device, f))
            })
            .collect()
    }

    /// Send a board frame to a device.
    pub fn send(
        &mut self,
        device: DeviceKind,
        msg_type: u8,
        payload: &[u8],
    ) -> Result<(), SerialError> {
        match self.writers.get_mut(&device) {
            Some(w) => w.send(msg_type, payload),
            None => Err(SerialError::NotOpen(device)),
        }
    }

    pub fn is_open(&self, device: DeviceKind) -> bool {
        self.readers.iter().any(|r| r.device() == device)
    }

    /// Devices whose reader thread has exited.
    pub fn stopped_readers(&self) -> Vec<DeviceKind> {
        self.readers
            .iter()
            .filter(|r| !r.is_running())
            .map(|r| r.device())
            .collect()
    }

    pub fn readers(&self) -> impl Iterator<Item = &SerialReader> {
        self.readers.iter()
    }

    /// Stop and join every reader thread.
    pub fn stop_readers(&mut self) {
        for r in self.readers.iter_mut() {
            r.stop();
            debug!("{} reader stopped", r.device());
        }
    }
}

/// Returns true if the core sends commands to this device.
pub fn is_commanded(device: DeviceKind) -> bool {
    matches!(
        device,
        DeviceKind::ThrusterBoard0
            | DeviceKind::ThrusterBoard1
            | DeviceKind::Power
            | DeviceKind::Aux
    )
}

/// The device kind of a thruster driver board index.
pub fn thruster_board(index: u8) -> Option<DeviceKind> {
    match index {
        0 => Some(DeviceKind::ThrusterBoard0),
        1 => Some(DeviceKind::ThrusterBoard1),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn open_device(
    dev: &DeviceParams,
    params: &SerialParams,
) -> Result<(SerialReader, Option<SerialWriter>), SerialError> {
    let port = serialport::new(&dev.port, dev.baud_rate)
        .timeout(Duration::from_millis(params.read_timeout_ms))
        .open()
        .map_err(|e| SerialError::OpenError {
            device: dev.kind,
            port: dev.port.clone(),
            source: e,
        })?;

    if is_commanded(dev.kind) {
        let read_half = port
            .try_clone()
            .map_err(|e| SerialError::CloneError(dev.kind, e))?;

        let reader = SerialReader::spawn(dev.kind, Box::new(read_half), params.queue_capacity)?;
        Ok((reader, Some(SerialWriter::new(dev.kind, Box::new(port)))))
    } else {
        let reader = SerialReader::spawn(dev.kind, Box::new(port), params.queue_capacity)?;
        Ok((reader, None))
    }
}

fn read_loop(
    device: DeviceKind,
    mut source: Box<dyn Read + Send>,
    tx: SyncSender<DeviceFrame>,
    stop: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
) {
    let mut framer = device.framing().framer();
    let mut buf = [0u8; READ_BUFFER_LEN];
    let mut logged_error = false;

    while !stop.load(Ordering::Relaxed) {
        let n = match source.read(&mut buf) {
            Ok(0) => {
                info!("{} reached end of stream", device);
                break;
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => {
                if !logged_error {
                    warn!("Error reading from {}: {}", device, e);
                    logged_error = true;
                }
                thread::sleep(READ_ERROR_BACKOFF);
                continue;
            }
        };
        logged_error = false;

        framer.extend(&buf[..n]);

        while let Some(raw) = framer.next_frame() {
            match device.decode(&raw) {
                Ok(frame) => match tx.try_send(frame) {
                    Ok(()) => (),
                    Err(TrySendError::Full(_)) => {
                        stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => return,
                },
                Err(e) => {
                    stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("Dropped frame from {}: {}", device, e);
                }
            }
        }

        stats
            .bytes_dropped
            .store(framer.num_dropped_bytes(), Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::{ahrs, power};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// A sink which records everything written to it.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn wait_for_exit(reader: &SerialReader) {
        for _ in 0..200 {
            if !reader.is_running() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("Reader did not finish");
    }

    #[test]
    fn test_reader_decodes_and_drops_bad_frames() {
        let mut bytes = Vec::new();
        bytes.extend(BoardFramer::encode(ahrs::MSG_TYPE, &[0x10, 0x27, 0, 0, 0, 0]).unwrap());
        // Wrong length payload, framed correctly but fails to decode
        bytes.extend(BoardFramer::encode(ahrs::MSG_TYPE, &[1, 2, 3]).unwrap());
        bytes.extend(&[0x01, 0x02, 0x03]);
        bytes.extend(BoardFramer::encode(ahrs::MSG_TYPE, &[0x20, 0x4E, 0, 0, 0, 0]).unwrap());

        let mut reader =
            SerialReader::spawn(DeviceKind::Ahrs0, Box::new(Cursor::new(bytes)), 8).unwrap();
        wait_for_exit(&reader);

        let frames = reader.drain();
        assert_eq!(frames.len(), 2);
        match (&frames[0], &frames[1]) {
            (DeviceFrame::Ahrs(a), DeviceFrame::Ahrs(b)) => {
                assert_eq!(a.heading_deg, 100.0);
                assert_eq!(b.heading_deg, 200.0);
            }
            f => panic!("Unexpected frames {:?}", f),
        }
        assert_eq!(reader.stats().decode_errors.load(Ordering::Relaxed), 1);
        assert_eq!(reader.stats().bytes_dropped.load(Ordering::Relaxed), 3);

        // Nothing left after the drain
        assert!(reader.drain().is_empty());
        reader.stop();
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let mut bytes = Vec::new();
        for current_ma in 1..=5u8 {
            bytes.extend(BoardFramer::encode(power::MSG_TYPE, &[1, current_ma, 0, 0, 0]).unwrap());
        }

        let reader =
            SerialReader::spawn(DeviceKind::Power, Box::new(Cursor::new(bytes)), 2).unwrap();
        wait_for_exit(&reader);

        let frames = reader.drain();
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            DeviceFrame::Power(p) => assert!((p.battery1_a - 0.001).abs() < 1e-12),
            f => panic!("Unexpected frame {:?}", f),
        }
        assert_eq!(reader.stats().frames_dropped.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_writer_frames_payload() {
        let sink = SharedSink::default();
        let mut devices = Devices::default();

        let reader =
            SerialReader::spawn(DeviceKind::Power, Box::new(Cursor::new(Vec::new())), 1).unwrap();
        devices.add(
            reader,
            Some(SerialWriter::new(DeviceKind::Power, Box::new(sink.clone()))),
        );

        devices
            .send(DeviceKind::Power, power::CMD_MSG_TYPE, &power::encode_cmd(false))
            .unwrap();
        assert_eq!(
            *sink.0.lock().unwrap(),
            BoardFramer::encode(power::CMD_MSG_TYPE, &[0]).unwrap()
        );

        assert!(matches!(
            devices.send(DeviceKind::Aux, 0x40, &[1]),
            Err(SerialError::NotOpen(DeviceKind::Aux))
        ));

        devices.stop_readers();
        assert_eq!(devices.stopped_readers(), vec![DeviceKind::Power]);
    }
}
