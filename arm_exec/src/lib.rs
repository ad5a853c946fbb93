//! # Arm library.
//!
//! This library allows other crates in the workspace, and the arm executable itself, to access the
//! components of the arm control session.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm client - opens the command and feedback channels to the arm controller
pub mod arm_client;

/// Automatic initialisation - brings the arm's joints out of their power-up state
pub mod auto_init;

/// Command handler - parses command lines and dispatches them
pub mod cmd_handler;

/// Control loop - the fixed period control session
pub mod control_loop;

pub mod data_store;

/// Home position monitor - maintains the home marker file
pub mod home_monitor;

/// Command inputs - queues command lines without blocking the loop
pub mod inputs;

/// Motion control - turns command intent into joint targets
pub mod motion_ctrl;

pub mod params;

/// Safety guard - stops the arm whenever the control session ends
pub mod safety;

/// Status reader - reads the freshest feedback frame from the arm
pub mod status_reader;

/// Status server - broadcasts the arm status to subscribers
pub mod status_server;

#[cfg(test)]
pub(crate) mod test_utils;
