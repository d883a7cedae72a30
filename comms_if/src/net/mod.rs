//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, which carries the link between the
//! vehicle core and the operator console.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout on the monitor socket, bounds how long dropping a `MonitoredSocket` can take.
const MONITOR_POLL_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Number of monitors that are registered. Gives each monitor a unique inproc endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded as part of the executable's parameter file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint of the console link, for example `"tcp://*:5000"`.
    pub console_endpoint: String,

    /// Time the core waits for the console's reply after sending telemetry.
    ///
    /// Units: milliseconds
    pub console_recv_timeout_ms: i32,

    /// If true the core binds the console endpoint, otherwise it connects to it.
    #[serde(default = "default_true")]
    pub console_bind: bool,
}

/// A zmq socket whose connection state is tracked by a background thread reading the socket's
/// monitor events.
pub struct MonitoredSocket {
    socket: Socket,

    join_handle: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>,
}

/// Options applied to a monitored socket before it binds or connects.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Bind the endpoint (server side) rather than connect to it.
    pub bind: bool,

    /// Block in [`MonitoredSocket::new`] until the first peer connects.
    pub block_on_first_connect: bool,

    /// Units: milliseconds
    pub linger_ms: i32,

    /// Units: milliseconds, -1 blocks forever
    pub recv_timeout_ms: i32,

    /// Units: milliseconds, -1 blocks forever
    pub send_timeout_ms: i32,

    /// Interval between ZMTP heartbeats, 0 disables them. A peer which misses heartbeats for
    /// `heartbeat_timeout_ms` is disconnected.
    ///
    /// Units: milliseconds
    pub heartbeat_ivl_ms: i32,

    /// Units: milliseconds
    pub heartbeat_timeout_ms: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a socket of `socket_type` on `endpoint` and start watching its connection state.
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: &SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        let socket = ctx
            .socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // Create monitor endpoint
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );

        // Enable, create, and connect monitor
        socket
            .monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx
            .socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor
            .connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        socket_options.apply(&socket)?;

        match socket_options.bind {
            false => socket.connect(endpoint),
            true => socket.bind(endpoint),
        }
        .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        // Wait for the monitor to signal the first connection
        if socket_options.block_on_first_connect {
            loop {
                let event = read_event(&monitor).map_err(MonitoredSocketError::EventReadError)?;

                match event {
                    SocketEvent::CONNECTED | SocketEvent::ACCEPTED => break,
                    SocketEvent::CONNECT_DELAYED | SocketEvent::LISTENING => continue,
                    _ => return Err(MonitoredSocketError::CouldNotConnect(None)),
                }
            }

            connected.store(true, Ordering::Relaxed);
        }

        // From here on the monitor polls so that the thread can observe shutdown
        set_sockopts!(monitor, (set_rcvtimeo, MONITOR_POLL_TIMEOUT_MS));

        let shutdown_clone = shutdown.clone();
        let connected_clone = connected.clone();

        let join_handle = thread::spawn(move || {
            monitor_socket(monitor, monitor_endpoint, shutdown_clone, connected_clone)
        });

        Ok(Self {
            socket,
            join_handle: Some(join_handle),
            shutdown,
            connected,
        })
    }

    /// Return if the socket is connected or not.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            jh.join().ok();
        }
    }
}

impl std::ops::Deref for MonitoredSocket {
    type Target = Socket;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl std::ops::DerefMut for MonitoredSocket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl SocketOptions {
    /// Options of the core's end of the console link.
    ///
    /// The core never blocks waiting for the console, and a console which stops answering
    /// heartbeats shows as disconnected within a second.
    pub fn console(params: &NetParams) -> Self {
        Self {
            bind: params.console_bind,
            block_on_first_connect: false,
            linger_ms: 1,
            recv_timeout_ms: params.console_recv_timeout_ms,
            send_timeout_ms: 10,
            heartbeat_ivl_ms: 500,
            heartbeat_timeout_ms: 1000,
        }
    }

    fn apply(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_linger, self.linger_ms),
            (set_rcvtimeo, self.recv_timeout_ms),
            (set_sndtimeo, self.send_timeout_ms),
            (set_heartbeat_ivl, self.heartbeat_ivl_ms),
            (set_heartbeat_timeout, self.heartbeat_timeout_ms),
            (set_heartbeat_ttl, self.heartbeat_timeout_ms)
        );

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Read an event from a socket.
fn read_event(socket: &Socket) -> Result<SocketEvent, zmq::Error> {
    let msg = socket.recv_msg(0)?;

    if msg.len() < 2 {
        return Err(zmq::Error::EPROTO);
    }

    let event = u16::from_ne_bytes([msg[0], msg[1]]);

    // The second frame holds the address, which is ignored
    if socket.get_rcvmore()? {
        let _ = socket.recv_msg(0)?;
    }

    Ok(SocketEvent::from_raw(event))
}

fn monitor_socket(
    monitor: Socket,
    monitor_endpoint: String,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(e) => e,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                warn!("Error reading event from monitor {}: {}", monitor_endpoint, e);
                break;
            }
        };

        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => {
                connected.store(true, Ordering::Relaxed)
            }
            SocketEvent::DISCONNECTED => connected.store(false, Ordering::Relaxed),
            _ => (),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_monitor_tracks_connection() {
        let ctx = Context::new();
        let endpoint = "inproc://net_monitor_test";

        let params = NetParams {
            console_endpoint: endpoint.into(),
            console_recv_timeout_ms: 50,
            console_bind: true,
        };
        let options = SocketOptions::console(&params);
        assert!(options.bind);
        assert!(!options.block_on_first_connect);
        assert_eq!(options.recv_timeout_ms, 50);

        let server = MonitoredSocket::new(&ctx, zmq::PAIR, &options, endpoint).unwrap();
        assert!(!server.connected());

        let client = ctx.socket(zmq::PAIR).unwrap();
        client.connect(endpoint).unwrap();
        client.send("ping", 0).unwrap();

        assert_eq!(server.recv_string(0).unwrap().unwrap(), "ping");
    }
}
