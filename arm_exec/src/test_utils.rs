//! In-memory doubles for the arm's channels and the status broadcast.

use comms_if::eqpt::arm::{ArmStatus, RobotMode, StatusFrame, NUM_JOINTS};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use crate::arm_client::ArmConnector;
use crate::status_reader::FeedbackSource;
use crate::status_server::{StatusServerError, StatusSink};

/// Encode a feedback frame with the given mode and joint angles.
pub fn frame(mode: RobotMode, joint_angles_rad: [f64; NUM_JOINTS]) -> Vec<u8> {
    ArmStatus {
        robot_mode: mode,
        joint_angles_rad,
        ..Default::default()
    }.encode()
}

/// A writer whose contents can be inspected after it has been given away.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Feedback channel releasing one batch of bytes per wait. An empty batch, or running out of
/// batches, behaves as a wait which timed out.
pub struct ScriptedFeedback {
    batches: VecDeque<Vec<u8>>,
    buffer: VecDeque<u8>,
    healthy: bool,
}

impl ScriptedFeedback {
    pub fn new(batches: Vec<Vec<u8>>) -> Self {
        Self {
            batches: batches.into(),
            buffer: VecDeque::new(),
            healthy: true,
        }
    }

    pub fn broken() -> Self {
        Self {
            healthy: false,
            ..Self::new(Vec::new())
        }
    }
}

impl Read for ScriptedFeedback {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.buffer.len());
        for (dst, src) in buf.iter_mut().zip(self.buffer.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl FeedbackSource for ScriptedFeedback {
    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        if self.buffer.is_empty() {
            if let Some(batch) = self.batches.pop_front() {
                self.buffer.extend(batch);
            }
        }
        Ok(!self.buffer.is_empty())
    }

    fn has_data(&mut self) -> io::Result<bool> {
        Ok(!self.buffer.is_empty())
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

/// Status sink recording every published frame.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub frames: Rc<RefCell<Vec<StatusFrame>>>,
    pub closed: Rc<Cell<bool>>,
}

impl StatusSink for RecordingSink {
    fn publish(&mut self, frame: &StatusFrame) -> Result<(), StatusServerError> {
        if self.closed.get() {
            return Err(StatusServerError::Closed)
        }
        self.frames.borrow_mut().push(*frame);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.set(true);
    }
}

/// Connector handing out in-memory channels.
pub struct MockConnector {
    pub command: SharedBuf,
    pub feedback: Option<ScriptedFeedback>,
}

impl MockConnector {
    pub fn new(feedback: ScriptedFeedback) -> Self {
        Self {
            command: SharedBuf::default(),
            feedback: Some(feedback),
        }
    }
}

impl ArmConnector for MockConnector {
    fn connect_command(&mut self) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(self.command.clone()))
    }

    fn connect_feedback(&mut self) -> io::Result<Box<dyn FeedbackSource>> {
        match self.feedback.take() {
            Some(f) => Ok(Box::new(f)),
            None => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
        }
    }
}
