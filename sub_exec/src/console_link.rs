//! # Console link
//!
//! JSON messages exchanged with the operator console over a zmq PAIR socket. The core sends one
//! [`CoreTm`] per cycle, subject to [`FlowControl`], then waits up to the receive timeout for one
//! [`ConsoleCmd`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    console::{ConsoleCmd, ConsoleMsgError, CoreTm},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::debug;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Console link server
pub struct ConsoleLink {
    socket: MonitoredSocket,
}

/// Outbound flow control.
///
/// Telemetry may only be sent if the most recently received command had `console_ready` set. The
/// console is not ready until it has said so.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowControl {
    ready: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConsoleLinkError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The console is not connected")]
    NotConnected,

    #[error("Could not send telemetry to the console: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the console: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the console command: {0}")]
    CmdParseError(ConsoleMsgError),

    #[error("The console sent a message which was not valid UTF-8")]
    NonUtf8Cmd,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConsoleLink {
    /// Create the link.
    ///
    /// This function will not block until the console connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, ConsoleLinkError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PAIR,
            &SocketOptions::console(params),
            &params.console_endpoint,
        )
        .map_err(ConsoleLinkError::SocketError)?;

        Ok(Self { socket })
    }

    /// Check if the console is connected
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Send one telemetry message.
    pub fn send_tm(&self, tm: &CoreTm) -> Result<(), ConsoleLinkError> {
        if !self.socket.connected() {
            return Err(ConsoleLinkError::NotConnected);
        }

        let tm_str = tm.to_json().map_err(ConsoleLinkError::SerializationError)?;

        self.socket
            .send(&tm_str, 0)
            .map_err(ConsoleLinkError::SendError)
    }

    /// Wait up to the receive timeout for one command.
    ///
    /// Returns `Ok(None)` if no command arrived in time.
    pub fn recv_cmd(&self) -> Result<Option<ConsoleCmd>, ConsoleLinkError> {
        let cmd_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(ConsoleLinkError::NonUtf8Cmd),
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(ConsoleLinkError::RecvError(e)),
        };

        ConsoleCmd::from_json(&cmd_str)
            .map(Some)
            .map_err(ConsoleLinkError::CmdParseError)
    }
}

impl FlowControl {
    /// Record the readiness carried by a received command.
    pub fn on_cmd(&mut self, cmd: &ConsoleCmd) {
        if self.ready != cmd.console_ready {
            debug!("Console ready: {}", cmd.console_ready);
        }
        self.ready = cmd.console_ready;
    }

    /// True if telemetry may be sent.
    pub fn may_send(&self) -> bool {
        self.ready
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn cmd(console_ready: bool) -> ConsoleCmd {
        ConsoleCmd {
            console_ready,
            ..Default::default()
        }
    }

    #[test]
    fn test_flow_control() {
        let mut flow = FlowControl::default();
        assert!(!flow.may_send());

        flow.on_cmd(&cmd(true));
        assert!(flow.may_send());

        flow.on_cmd(&cmd(false));
        assert!(!flow.may_send());

        flow.on_cmd(&cmd(true));
        assert!(flow.may_send());
    }

    #[test]
    fn test_link_exchange() {
        let ctx = zmq::Context::new();
        let endpoint = "inproc://console_link_test";

        let link = ConsoleLink::new(
            &ctx,
            &NetParams {
                console_endpoint: endpoint.into(),
                console_recv_timeout_ms: 200,
                console_bind: true,
            },
        )
        .unwrap();

        let console = ctx.socket(zmq::PAIR).unwrap();
        console.connect(endpoint).unwrap();

        console
            .send(r#"{"schema_version": 1, "console_ready": true}"#, 0)
            .unwrap();
        let received = link.recv_cmd().unwrap().unwrap();
        assert!(received.console_ready);

        // Nothing else pending
        assert!(link.recv_cmd().unwrap().is_none());

        console.send(r#"{"schema_version": 99}"#, 0).unwrap();
        assert!(matches!(
            link.recv_cmd(),
            Err(ConsoleLinkError::CmdParseError(_))
        ));
    }
}
