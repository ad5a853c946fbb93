//! # Command Inputs
//!
//! Command lines arrive on a blocking reader (usually stdin). A reader thread forwards each line
//! over a channel so the control loop can collect whatever has arrived without ever stalling the
//! cycle. Lines are tokenised and queued in arrival order.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::tc::tokenise;
use log::{debug, info};
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Inputs {
    rover_id: u16,

    rx: Receiver<io::Result<String>>,

    /// Tokenised lines waiting to be processed, oldest first
    queue: VecDeque<Vec<String>>,

    /// Set once the reader has finished
    closed: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum InputsError {
    #[error("Could not start the input reader thread: {0}")]
    SpawnError(io::Error),

    #[error("Could not read a command line: {0}")]
    ReadError(io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Inputs {
    /// Create inputs fed by the given channel, accepting commands addressed to `rover_id`.
    pub fn new(rover_id: u16, rx: Receiver<io::Result<String>>) -> Self {
        Self {
            rover_id,
            rx,
            queue: VecDeque::new(),
            closed: false,
        }
    }

    /// Create inputs fed by a reader thread over `reader`.
    pub fn from_reader<R>(rover_id: u16, reader: R) -> Result<Self, InputsError>
    where
        R: BufRead + Send + 'static
    {
        let (tx, rx) = mpsc::channel();
        spawn_reader(reader, tx).map_err(InputsError::SpawnError)?;

        Ok(Self::new(rover_id, rx))
    }

    /// Collect all lines which have arrived since the last call, without blocking.
    ///
    /// Returns the number of commands queued.
    pub fn read(&mut self) -> Result<usize, InputsError> {
        let mut num_queued = 0;

        loop {
            match self.rx.try_recv() {
                Ok(Ok(line)) => {
                    if self.push_line(&line) {
                        num_queued += 1;
                    }
                },
                Ok(Err(e)) => return Err(InputsError::ReadError(e)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        info!("Command input closed");
                        self.closed = true;
                    }
                    break
                }
            }
        }

        Ok(num_queued)
    }

    /// Take the oldest queued command.
    pub fn pop(&mut self) -> Option<Vec<String>> {
        self.queue.pop_front()
    }

    /// Take every queued command, oldest first.
    pub fn drain(&mut self) -> Vec<Vec<String>> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// True once the source has closed and every queued command has been taken.
    pub fn is_exhausted(&self) -> bool {
        self.closed && self.queue.is_empty()
    }

    fn push_line(&mut self, line: &str) -> bool {
        let tokens = tokenise(line);

        if tokens.is_empty() {
            return false
        }

        // A line with a numeric ID is only accepted if it is ours, anything else is left for the
        // parser to reject
        if let Ok(id) = tokens[0].parse::<u16>() {
            if id != self.rover_id {
                debug!("Ignoring command for arm {}: {}", id, line.trim());
                return false
            }
        }

        self.queue.push_back(tokens);
        true
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Forward every line of `reader` to `tx` from a new thread.
///
/// The thread stops after the first read error, at end of input, or once the receiver is gone.
pub fn spawn_reader<R>(
    reader: R,
    tx: Sender<io::Result<String>>
) -> io::Result<thread::JoinHandle<()>>
where
    R: BufRead + Send + 'static
{
    thread::Builder::new()
        .name(String::from("cmd_input"))
        .spawn(move || {
            for line in reader.lines() {
                let is_err = line.is_err();
                if tx.send(line).is_err() || is_err {
                    break
                }
            }
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[test]
    fn test_queue_order_and_filtering() {
        let (tx, rx) = mpsc::channel();
        let mut inputs = Inputs::new(7, rx);

        for line in [">7,1,set_home;", "", "8,2,set_home", "7,3,stop", "x,4,stop"].iter() {
            tx.send(Ok(line.to_string())).unwrap();
        }

        assert_eq!(inputs.read().unwrap(), 3);
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.pop().unwrap(), vec!["7", "1", "set_home"]);

        let rest = inputs.drain();
        assert_eq!(rest[0], vec!["7", "3", "stop"]);
        assert_eq!(rest[1], vec!["x", "4", "stop"]);
        assert!(inputs.is_empty());
        assert!(!inputs.is_exhausted());

        // Nothing new, still open
        assert_eq!(inputs.read().unwrap(), 0);

        drop(tx);
        inputs.read().unwrap();
        assert!(inputs.is_exhausted());
    }

    #[test]
    fn test_exhausted_only_once_drained() {
        let (tx, rx) = mpsc::channel();
        let mut inputs = Inputs::new(7, rx);

        tx.send(Ok(String::from("7,1,stop"))).unwrap();
        drop(tx);

        inputs.read().unwrap();
        assert!(!inputs.is_exhausted());
        inputs.pop();
        assert!(inputs.is_exhausted());
    }

    #[test]
    fn test_read_error() {
        let (tx, rx) = mpsc::channel();
        let mut inputs = Inputs::new(7, rx);

        tx.send(Err(io::Error::new(io::ErrorKind::InvalidData, "bad utf-8"))).unwrap();

        assert!(matches!(inputs.read(), Err(InputsError::ReadError(_))));
    }

    #[test]
    fn test_reader_thread() {
        let reader = Cursor::new(b"7,1,set_home\n7,2,bogus_op\n".to_vec());
        let mut inputs = Inputs::from_reader(7, reader).unwrap();

        let start = Instant::now();
        while !inputs.is_exhausted() && inputs.len() < 2 {
            inputs.read().unwrap();
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(inputs.drain().len(), 2);
    }
}
