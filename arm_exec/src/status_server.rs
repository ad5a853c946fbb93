//! # Status Server
//!
//! Broadcasts the arm's status frame to any number of subscribers once per cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::arm::StatusFrame,
    net::{zmq, Publisher, PublisherError, SocketOptions},
};
use log::info;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A destination for the per-cycle status frame.
pub trait StatusSink {
    fn publish(&mut self, frame: &StatusFrame) -> Result<(), StatusServerError>;

    /// Stop broadcasting. Later publishes fail with [`StatusServerError::Closed`].
    fn close(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct StatusServer {
    publisher: Option<Publisher>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StatusServerError {
    #[error("Could not start the status server: {0}")]
    InitError(PublisherError),

    #[error("Could not send the status frame: {0}")]
    SendError(PublisherError),

    #[error("The status server has been closed")]
    Closed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StatusServer {
    /// Create a new status server bound to `endpoint`.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, StatusServerError> {
        let publisher = Publisher::new(ctx, SocketOptions::default(), endpoint)
            .map_err(StatusServerError::InitError)?;

        info!("Status server bound to {}", endpoint);

        Ok(Self {
            publisher: Some(publisher)
        })
    }
}

impl StatusSink for StatusServer {
    fn publish(&mut self, frame: &StatusFrame) -> Result<(), StatusServerError> {
        match self.publisher {
            Some(ref p) => p.send(&frame.to_bytes()).map_err(StatusServerError::SendError),
            None => Err(StatusServerError::Closed)
        }
    }

    fn close(&mut self) {
        if let Some(p) = self.publisher.take() {
            info!("Status server on {} closed", p.endpoint());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::arm::STATUS_FRAME_SIZE;
    use std::{thread, time::Duration};

    #[test]
    fn test_subscriber_receives_frames() {
        let ctx = zmq::Context::new();
        let mut server = StatusServer::new(&ctx, "inproc://arm_status_test").unwrap();

        let sub = ctx.socket(zmq::SUB).unwrap();
        sub.connect("inproc://arm_status_test").unwrap();
        sub.set_subscribe(b"").unwrap();

        let frame = StatusFrame {
            status: 0,
            joint_angles_rad: [0.0, -1.0, 1.0, -0.5, 1.5, 0.25],
        };

        // Subscriptions propagate asynchronously, keep publishing until one gets through
        let mut received = None;
        for _ in 0..200 {
            server.publish(&frame).unwrap();
            if let Ok(msg) = sub.recv_bytes(zmq::DONTWAIT) {
                received = Some(msg);
                break
            }
            thread::sleep(Duration::from_millis(5));
        }

        let msg = received.expect("No frame received");
        assert_eq!(msg.len(), STATUS_FRAME_SIZE);
        assert_eq!(StatusFrame::from_bytes(&msg), Some(frame));
    }

    #[test]
    fn test_publish_after_close() {
        let ctx = zmq::Context::new();
        let mut server = StatusServer::new(&ctx, "inproc://arm_status_closed").unwrap();

        server.close();

        let frame = StatusFrame { status: 7, joint_angles_rad: [0.0; 6] };
        assert!(matches!(server.publish(&frame), Err(StatusServerError::Closed)));
    }
}
