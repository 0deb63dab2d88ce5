//! # Network Module
//!
//! This module provides the duplex channel abstraction over ZMQ, the
//! networking library chosen for the software. A [`MonitoredSocket`] is a zmq
//! socket with a background monitor thread which tracks whether the peer is
//! actually connected, allowing the console to observe channel loss without
//! a send failing first.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
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
// STATICS
// ------------------------------------------------------------------------------------------------

/// Number of monitors created so far, used to build unique inproc endpoints.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout on the monitor pair socket, bounds how long the monitor
/// thread takes to notice a shutdown request.
const MONITOR_RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A zmq socket with a background monitor thread.
///
/// The monitor tracks connection and disconnection events on the underlying
/// socket, so the owner can poll [`MonitoredSocket::connected`] at any time.
/// The socket itself is reachable through `Deref`.
pub struct MonitoredSocket {
    socket: Socket,

    join_handle: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>,
}

/// Options applied to a [`MonitoredSocket`] on creation.
///
/// Most fields correspond to options in the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt)
/// documentation.
pub struct SocketOptions {
    /// If true the socket binds to the endpoint rather than connecting to it.
    /// Servers bind, clients connect. Default `false`.
    pub bind: bool,

    /// If true `MonitoredSocket::new` blocks until the first connection is
    /// established or fails. Default `false`.
    pub block_on_first_connect: bool,

    /// `ZMQ_CONNECT_TIMEOUT`: timeout for `connect()` in milliseconds.
    pub connect_timeout: i32,

    /// `ZMQ_RECONNECT_IVL`: reconnection interval in milliseconds. Set to
    /// `-1` to disable automatic reconnection entirely.
    pub reconnect_ivl: i32,

    /// `ZMQ_LINGER`: linger period for socket shutdown.
    pub linger: i32,

    /// `ZMQ_RCVTIMEO`: maximum time before a recv returns with `EAGAIN`.
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: maximum time before a send returns with `EAGAIN`.
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`: interval between ZMTP heartbeats.
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`: timeout for ZMTP heartbeats.
    pub heartbeat_timeout: i32,

    /// `ZMQ_HEARTBEAT_TTL`: time to live for ZMTP heartbeats.
    pub heartbeat_ttl: i32,
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

    #[error("The endpoint `{0}` is malformed")]
    InvalidEndpoint(String),

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
    /// Create a new monitored socket and connect (or bind) it to `endpoint`.
    ///
    /// A malformed endpoint fails this call synchronously with
    /// [`MonitoredSocketError::InvalidEndpoint`]. All later connection
    /// failures are observed asynchronously through
    /// [`MonitoredSocket::connected`].
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        // Create socket
        let socket = ctx
            .socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        // Create, enable, and connect the monitor before the socket itself
        // connects, so no event can be missed
        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );

        socket
            .monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;

        let monitor = ctx
            .socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor
            .set_rcvtimeo(MONITOR_RECV_TIMEOUT_MS)
            .map_err(|e| MonitoredSocketError::SocketOptionError("set_rcvtimeo".into(), e))?;
        monitor
            .connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        // Set the options on the socket
        socket_options.set(&socket)?;

        // Connect or bind the socket to its endpoint. An EINVAL here means
        // the endpoint string itself is bad.
        let connect_result = match socket_options.bind {
            false => socket.connect(endpoint),
            true => socket.bind(endpoint),
        };
        match connect_result {
            Ok(_) => (),
            Err(zmq::Error::EINVAL) => {
                return Err(MonitoredSocketError::InvalidEndpoint(endpoint.into()))
            }
            Err(e) => return Err(MonitoredSocketError::CouldNotConnect(Some(e))),
        }

        // If requested wait for the monitor to signal the first connection
        if socket_options.block_on_first_connect {
            loop {
                let event = match read_event(&monitor) {
                    Ok(ev) => ev,
                    Err(zmq::Error::EAGAIN) => continue,
                    Err(e) => return Err(MonitoredSocketError::EventReadError(e)),
                };

                match event {
                    Some(SocketEvent::CONNECTED) => break,
                    Some(SocketEvent::CONNECT_DELAYED) | Some(SocketEvent::CONNECT_RETRIED) => {
                        continue
                    }
                    Some(_) => return Err(MonitoredSocketError::CouldNotConnect(None)),
                    None => continue,
                }
            }

            connected.store(true, Ordering::Relaxed);
        }

        // Spawn the monitor thread
        let join_handle = {
            let shutdown = shutdown.clone();
            let connected = connected.clone();
            thread::spawn(move || monitor_socket(monitor, shutdown, connected))
        };

        Ok(Self {
            socket,
            join_handle: Some(join_handle),
            shutdown,
            connected,
        })
    }

    /// Return whether the peer is currently connected.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The monitor recv timeout bounds how long this join can take
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

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_linger, self.linger),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout),
            (set_heartbeat_ivl, self.heartbeat_ivl),
            (set_heartbeat_timeout, self.heartbeat_timeout),
            (set_heartbeat_ttl, self.heartbeat_ttl)
        );

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Defaults for sockopts taken from http://api.zeromq.org/4-2:zmq-setsockopt
        Self {
            bind: false,
            block_on_first_connect: false,
            connect_timeout: 0,
            reconnect_ivl: 100,
            linger: 30_000,
            recv_timeout: -1,
            send_timeout: -1,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read an event from the monitor socket.
///
/// Returns `Ok(None)` if the event frame could not be decoded.
fn read_event(socket: &Socket) -> Result<Option<SocketEvent>, zmq::Error> {
    let msg = socket.recv_msg(0)?;

    if msg.len() < 2 {
        return Ok(None);
    }

    let event = u16::from_ne_bytes([msg[0], msg[1]]);

    // Each event carries a second frame with the endpoint address, which is
    // not needed here
    if socket.get_rcvmore()? {
        let _ = socket.recv_msg(0)?;
    }

    Ok(Some(SocketEvent::from_raw(event)))
}

fn monitor_socket(monitor: Socket, shutdown: Arc<AtomicBool>, connected: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        let event = match read_event(&monitor) {
            Ok(Some(ev)) => ev,
            // Timeout, loop around to check the shutdown flag
            Ok(None) | Err(zmq::Error::EAGAIN) => continue,
            // The monitored socket has been destroyed, nothing left to watch
            Err(_) => break,
        };

        match event {
            SocketEvent::CONNECTED | SocketEvent::ACCEPTED => {
                debug!("Monitored socket peer connected ({:?})", event);
                connected.store(true, Ordering::Relaxed)
            }
            SocketEvent::DISCONNECTED | SocketEvent::CLOSED => {
                debug!("Monitored socket peer lost ({:?})", event);
                connected.store(false, Ordering::Relaxed)
            }
            _ => (),
        }
    }
}
