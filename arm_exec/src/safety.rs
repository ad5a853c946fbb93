//! # Safety Guard
//!
//! Wraps the arm's command channel for the lifetime of a control session. When the guard is
//! dropped, on any exit path including a panic unwind, a stop command and a power off command are
//! written to the arm and flushed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::NUM_JOINTS;
use log::{error, info};
use std::io::Write;
use std::ops::{Deref, DerefMut};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Joint deceleration used when stopping the arm.
///
/// Units: radians/second^2
const STOP_DECEL_RADS2: f64 = 0.1;

/// Command which switches the arm's power off.
pub const POWER_OFF_CMD: &str = "power off";

/// Command which switches the arm's power on.
pub const POWER_ON_CMD: &str = "power on";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Owner of the arm's command channel which stops the arm when dropped.
pub struct SafetyGuard<W: Write> {
    writer: W,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<W: Write> SafetyGuard<W> {
    pub fn new(writer: W) -> Self {
        info!("Safety guard installed on the arm command channel");
        Self { writer }
    }
}

impl<W: Write> Deref for SafetyGuard<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> DerefMut for SafetyGuard<W> {
    fn deref_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: Write> Drop for SafetyGuard<W> {
    fn drop(&mut self) {
        info!("Stopping the arm and switching off power");

        let result = writeln!(self.writer, "{}", stop_command())
            .and_then(|_| writeln!(self.writer, "{}", POWER_OFF_CMD))
            .and_then(|_| self.writer.flush());

        // Nothing can be done about a failure here other than report it
        if let Err(e) = result {
            error!("Could not send the stop sequence to the arm: {}", e);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The command which brings all joints to rest with a low fixed deceleration.
pub fn stop_command() -> String {
    let decels = vec![format!("{}", STOP_DECEL_RADS2); NUM_JOINTS];
    format!("stopj([{}])", decels.join(","))
}
