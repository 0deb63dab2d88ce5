//! # Vehicle Client
//!
//! Owns the lifecycle of the duplex command channel to the vehicle. All
//! outbound traffic passes through [`VehicleClient::send_if_open`], the
//! single choke point shared by the live input pipeline and the replayer, so
//! both see identical backpressure behaviour.
//!
//! There is deliberately no automatic reconnection: a dropped channel
//! requires the operator to toggle the connection, so no commands are ever
//! sent while the channel state is uncertain.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};

use comms_if::{
    cmd::{Command, VehicleMsg},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Client for the vehicle command channel.
pub struct VehicleClient {
    socket: Option<MonitoredSocket>,

    state: ConnectionState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Lifecycle state of the command channel.
///
/// Owned exclusively by the [`VehicleClient`], collaborators only ever see
/// the `send_if_open` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Error,
}

/// Events reported by [`VehicleClient::poll`] when the channel changes
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    None,

    /// The channel has just become open and the enable handshake has been
    /// sent
    Opened,

    /// The channel has been lost
    Lost,
}

#[derive(Debug, thiserror::Error)]
pub enum VehicleClientError {
    #[error("The endpoint `{0}` is malformed")]
    MalformedEndpoint(String),

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not serialize the command: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehicleClient {
    /// Create a new, disconnected client.
    pub fn new() -> Self {
        Self {
            socket: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current channel state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Open a new channel to the vehicle.
    ///
    /// A malformed endpoint fails this call synchronously and leaves the
    /// state `Disconnected`. All other failures surface asynchronously
    /// through [`VehicleClient::poll`].
    pub fn connect(&mut self, ctx: &zmq::Context, endpoint: &str) -> Result<(), VehicleClientError> {
        // Drop any previous channel first
        if self.socket.is_some() {
            self.disconnect();
        }

        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            // No automatic reconnection, see module docs
            reconnect_ivl: -1,
            linger: 1,
            recv_timeout: 0,
            send_timeout: 10,
            heartbeat_ivl: 500,
            heartbeat_timeout: 1000,
            heartbeat_ttl: 1000,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PAIR, socket_options, endpoint).map_err(
            |e| match e {
                MonitoredSocketError::InvalidEndpoint(ep) => {
                    VehicleClientError::MalformedEndpoint(ep)
                }
                e => VehicleClientError::SocketError(e),
            },
        )?;

        self.socket = Some(socket);
        self.state = ConnectionState::Connecting;

        info!("Connecting to vehicle at {}", endpoint);

        Ok(())
    }

    /// Observe the channel and update the lifecycle state.
    ///
    /// On transition to `Open` the enable handshake (`{en: 1}`) is sent
    /// immediately. Omitting it would leave the vehicle disabled
    /// indefinitely.
    pub fn poll(&mut self) -> ConnectionEvent {
        let connected = match self.socket {
            Some(ref s) => s.connected(),
            None => return ConnectionEvent::None,
        };

        match (self.state, connected) {
            (ConnectionState::Connecting, true) => {
                self.state = ConnectionState::Open;
                info!("Channel to vehicle open");

                if !self.send_if_open(&Command::enable()) {
                    warn!("Could not send the enable handshake");
                }

                ConnectionEvent::Opened
            }
            (ConnectionState::Open, false) => {
                self.state = ConnectionState::Error;
                self.socket = None;
                self.state = ConnectionState::Disconnected;

                warn!("Channel to vehicle lost");

                ConnectionEvent::Lost
            }
            _ => ConnectionEvent::None,
        }
    }

    /// Drain inbound messages from the vehicle.
    ///
    /// The only recognised message is `{"encendido": true}`, the vehicle
    /// reporting itself disabled, to which the client re-sends the enable
    /// command. The client is the source of truth for "operator wants
    /// control".
    pub fn poll_inbound(&mut self) {
        loop {
            let msg_str = match self.socket {
                Some(ref s) => match s.recv_string(zmq::DONTWAIT) {
                    Ok(Ok(m)) => m,
                    Ok(Err(_)) => {
                        warn!("Vehicle sent a message which was not valid UTF-8");
                        continue;
                    }
                    Err(_) => return,
                },
                None => return,
            };

            match serde_json::from_str::<VehicleMsg>(&msg_str) {
                Ok(msg) => {
                    if msg.encendido == Some(true) {
                        debug!("Vehicle reports disabled, re-sending enable");
                        self.send_if_open(&Command::enable());
                    }
                }
                Err(e) => debug!("Unrecognised message from vehicle: {}", e),
            }
        }
    }

    /// Send a command if the channel is open.
    ///
    /// This is a no-op, not an error, when the channel is not open or the
    /// command is empty. Returns whether the command was actually put on
    /// the wire.
    pub fn send_if_open(&self, command: &Command) -> bool {
        if self.state != ConnectionState::Open || command.is_empty() {
            return false;
        }

        let socket = match self.socket {
            Some(ref s) => s,
            None => return false,
        };

        let json = match serde_json::to_string(command) {
            Ok(j) => j,
            Err(e) => {
                warn!("Could not serialize command: {}", e);
                return false;
            }
        };

        match socket.send(&json, 0) {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not send command to vehicle: {}", e);
                false
            }
        }
    }

    /// Operator-initiated close.
    ///
    /// Transitions to `Disconnected` and does not reconnect.
    pub fn disconnect(&mut self) {
        if self.socket.is_some() {
            self.state = ConnectionState::Closing;
            self.socket = None;
            info!("Channel to vehicle closed");
        }

        self.state = ConnectionState::Disconnected;
    }
}

impl Default for VehicleClient {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::time::{Duration, Instant};

    /// Bind a PAIR socket on an ephemeral local port, returning it and its
    /// endpoint.
    fn bind_vehicle(ctx: &zmq::Context) -> (zmq::Socket, String) {
        let sock = ctx.socket(zmq::PAIR).unwrap();
        sock.set_rcvtimeo(2000).unwrap();
        sock.bind("tcp://127.0.0.1:*").unwrap();
        let endpoint = sock.get_last_endpoint().unwrap().unwrap();
        (sock, endpoint)
    }

    /// Poll the client until it reports open, or panic after a timeout.
    fn wait_for_open(client: &mut VehicleClient) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if client.poll() == ConnectionEvent::Opened {
                return;
            }
            if Instant::now() > deadline {
                panic!("Client did not open in time");
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_malformed_endpoint_fails_synchronously() {
        let ctx = zmq::Context::new();
        let mut client = VehicleClient::new();

        let res = client.connect(&ctx, "not-an-endpoint");

        assert!(matches!(res, Err(VehicleClientError::MalformedEndpoint(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_if_open_refuses_when_disconnected() {
        let client = VehicleClient::new();
        assert!(!client.send_if_open(&Command::motion(0.0, 0)));
    }

    #[test]
    fn test_handshake_and_send() {
        let ctx = zmq::Context::new();
        let (vehicle, endpoint) = bind_vehicle(&ctx);

        let mut client = VehicleClient::new();
        client.connect(&ctx, &endpoint).unwrap();
        wait_for_open(&mut client);

        // First message on the wire must be the enable handshake
        let handshake = vehicle.recv_string(0).unwrap().unwrap();
        let cmd: Command = serde_json::from_str(&handshake).unwrap();
        assert_eq!(cmd, Command::enable());

        // A motion command passes through the choke point
        assert!(client.send_if_open(&Command::motion(90.0, 40)));
        let motion = vehicle.recv_string(0).unwrap().unwrap();
        let cmd: Command = serde_json::from_str(&motion).unwrap();
        assert_eq!(cmd, Command::motion(90.0, 40));

        // An empty command never goes on the wire
        assert!(!client.send_if_open(&Command::default()));

        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_disabled_report_triggers_reenable() {
        let ctx = zmq::Context::new();
        let (vehicle, endpoint) = bind_vehicle(&ctx);

        let mut client = VehicleClient::new();
        client.connect(&ctx, &endpoint).unwrap();
        wait_for_open(&mut client);

        // Swallow the handshake
        vehicle.recv_string(0).unwrap().unwrap();

        // Vehicle claims it is disabled
        vehicle.send(r#"{"encendido": true}"#, 0).unwrap();

        // Give the message time to arrive, then drain inbound
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            client.poll_inbound();
            match vehicle.recv_string(zmq::DONTWAIT) {
                Ok(Ok(json)) => {
                    let cmd: Command = serde_json::from_str(&json).unwrap();
                    assert_eq!(cmd, Command::enable());
                    break;
                }
                _ => {
                    if Instant::now() > deadline {
                        panic!("No re-enable was sent");
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }
}
