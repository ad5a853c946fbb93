//! # Arm Client
//!
//! Opens the two TCP connections to the arm controller: the command channel, which accepts
//! newline terminated script commands, and the realtime feedback channel which streams fixed size
//! status frames.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use std::io::{self, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::params::ArmExecParams;
use crate::status_reader::FeedbackSource;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can open the arm's channels.
pub trait ArmConnector {
    /// Open the command channel.
    fn connect_command(&mut self) -> io::Result<Box<dyn Write>>;

    /// Open the feedback channel.
    fn connect_feedback(&mut self) -> io::Result<Box<dyn FeedbackSource>>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Connects to the arm over TCP.
pub struct TcpConnector {
    command_host: String,
    command_port: u16,
    feedback_host: String,
    feedback_port: u16,
    timeout: Duration,
}

/// The arm's feedback channel over TCP.
pub struct TcpFeedback {
    stream: TcpStream,
    healthy: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcpConnector {
    pub fn new(params: &ArmExecParams) -> Self {
        Self {
            command_host: params.arm_host.clone(),
            command_port: params.arm_port,
            feedback_host: params.feedback_host.clone(),
            feedback_port: params.feedback_port,
            timeout: Duration::from_millis(params.connect_timeout_ms),
        }
    }
}

impl ArmConnector for TcpConnector {
    fn connect_command(&mut self) -> io::Result<Box<dyn Write>> {
        let stream = connect(&self.command_host, self.command_port, self.timeout)?;
        stream.set_nodelay(true)?;

        info!("Command channel connected to {}:{}", self.command_host, self.command_port);

        Ok(Box::new(BufWriter::new(stream)))
    }

    fn connect_feedback(&mut self) -> io::Result<Box<dyn FeedbackSource>> {
        let stream = connect(&self.feedback_host, self.feedback_port, self.timeout)?;

        info!("Feedback channel connected to {}:{}", self.feedback_host, self.feedback_port);

        Ok(Box::new(TcpFeedback::new(stream)))
    }
}

impl TcpFeedback {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            healthy: true,
        }
    }

    fn closed(&mut self) -> io::Error {
        self.healthy = false;
        io::Error::new(io::ErrorKind::ConnectionAborted, "feedback channel closed by the arm")
    }
}

impl Read for TcpFeedback {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stream.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.healthy = false;
        }
        Ok(n)
    }
}

impl FeedbackSource for TcpFeedback {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        // A zero timeout would mean blocking forever
        let timeout = timeout.max(Duration::from_millis(1));

        self.stream.set_nonblocking(false)?;
        self.stream.set_read_timeout(Some(timeout))?;

        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe) {
            Ok(0) => Err(self.closed()),
            Ok(_) => Ok(true),
            Err(e) if is_timeout(&e) => Ok(false),
            Err(e) => {
                self.healthy = false;
                Err(e)
            }
        }
    }

    fn has_data(&mut self) -> io::Result<bool> {
        let mut probe = [0u8; 1];

        self.stream.set_nonblocking(true)?;
        let result = self.stream.peek(&mut probe);
        self.stream.set_nonblocking(false)?;

        match result {
            Ok(0) => {
                self.healthy = false;
                Ok(false)
            },
            Ok(_) => Ok(true),
            Err(e) if is_timeout(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addr: SocketAddr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{}:{} did not resolve to any address", host, port)
        ))?;

    debug!("Connecting to {} (timeout {:?})", addr, timeout);

    TcpStream::connect_timeout(&addr, timeout)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
