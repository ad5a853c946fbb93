//! # Status Reader
//!
//! Pulls the freshest feedback frame from the arm. The reader waits a bounded time for the
//! feedback channel to become readable, then decodes frames until the channel has no more buffered
//! data. Only the last frame is kept, older frames are stale by the time they are read.
//!
//! A timeout or a misaligned frame is fatal to the control session: the arm may be failing
//! silently and must be stopped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::{ArmStatus, FrameError, FRAME_SIZE};
use std::io::{self, Read};
use std::time::Duration;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A channel carrying the arm's feedback frames.
pub trait FeedbackSource: Read {
    /// Block until the channel is readable or `timeout` elapses.
    ///
    /// Returns `false` if the timeout elapsed with no data available.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// True if data can be read without blocking.
    fn has_data(&mut self) -> io::Result<bool>;

    /// False once the channel is known to be closed or broken.
    fn is_healthy(&self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct StatusReader {
    timeout: Duration,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StatusReaderError {
    #[error("No status frame received from the arm within {0} ms")]
    StatusTimeout(u128),

    #[error("Status frame alignment error: {0}")]
    FrameAlignment(FrameError),

    #[error("Could not read from the feedback channel: {0}")]
    ReadError(io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StatusReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Read the latest status from the feedback channel into `status`.
    ///
    /// `status` is only written once a complete frame has been decoded, on error it holds the
    /// previous status. Returns the number of frames decoded, of which all but the last were
    /// discarded.
    pub fn read_status(
        &self,
        source: &mut dyn FeedbackSource,
        status: &mut ArmStatus
    ) -> Result<usize, StatusReaderError> {
        let ready = source.wait_readable(self.timeout)
            .map_err(StatusReaderError::ReadError)?;

        if !ready {
            return Err(StatusReaderError::StatusTimeout(self.timeout.as_millis()))
        }

        let mut buf = [0u8; FRAME_SIZE];
        let mut latest = None;
        let mut num_frames = 0;

        loop {
            source.read_exact(&mut buf)
                .map_err(StatusReaderError::ReadError)?;

            latest = Some(
                ArmStatus::decode(&buf).map_err(StatusReaderError::FrameAlignment)?
            );
            num_frames += 1;

            if !source.has_data().map_err(StatusReaderError::ReadError)? {
                break
            }
        }

        if let Some(s) = latest {
            *status = s;
        }

        Ok(num_frames)
    }
}
