//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, used to broadcast arm status to any
//! number of subscribers.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use zmq::{Context, Socket};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| PublisherError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A bound zmq PUB socket.
///
/// Sends never block: if a subscriber is too slow the message is dropped for that subscriber by
/// zmq once the high water mark is reached.
pub struct Publisher {
    socket: Socket,

    endpoint: String,
}

/// Represents options which can be set on a publisher socket.
///
/// Options here correspond to those found in the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_SNDHWM`: Maximum number of queued outbound messages per subscriber
    pub send_hwm: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum PublisherError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Could not bind the socket to {0}: {1}")]
    CouldNotBind(String, zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),

    #[error("Could not send data: {0}")]
    SendError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Publisher {
    /// Create a new publisher bound to `endpoint`, such as `"tcp://*:9999"`.
    pub fn new(
        ctx: &Context,
        socket_options: SocketOptions,
        endpoint: &str
    ) -> Result<Self, PublisherError> {
        let socket = ctx.socket(zmq::PUB)
            .map_err(PublisherError::CreateSocketError)?;

        socket_options.set(&socket)?;

        socket.bind(endpoint)
            .map_err(|e| PublisherError::CouldNotBind(endpoint.into(), e))?;

        debug!("PUB socket bound to {}", endpoint);

        Ok(Self {
            socket,
            endpoint: endpoint.into()
        })
    }

    /// Send one message to all subscribers without blocking.
    pub fn send(&self, data: &[u8]) -> Result<(), PublisherError> {
        self.socket.send(data, zmq::DONTWAIT)
            .map_err(PublisherError::SendError)
    }

    /// The endpoint this publisher is bound to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), PublisherError> {
        set_sockopts!(
            socket,
            (set_linger, self.linger),
            (set_sndtimeo, self.send_timeout),
            (set_sndhwm, self.send_hwm)
        );

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Only the latest status matters, so keep queues short and never linger on close
        Self {
            linger: 0,
            send_timeout: 0,
            send_hwm: 10,
        }
    }
}
