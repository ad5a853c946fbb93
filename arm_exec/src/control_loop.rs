//! # Control Loop
//!
//! Runs the arm's control session. Each cycle:
//!
//!     - Status acquisition:
//!         - Check the feedback channel is healthy
//!         - Read the freshest status frame
//!         - Update the home marker
//!     - Telecommand processing, one queued command per cycle
//!     - Motion control processing
//!     - Motion command output
//!     - Status broadcast
//!
//! Any error returned from a cycle is fatal. The arm's command channel is held by a
//! [`SafetyGuard`] for the whole session, so the arm is stopped and powered off however the
//! session ends.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::StatusFrame;
use log::{debug, info, trace, warn};
use std::io::{self, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Instant;

use crate::{
    arm_client::ArmConnector,
    auto_init::AutoInit,
    cmd_handler::{self, CmdContext},
    data_store::DataStore,
    home_monitor::{HomeMonitor, HomeMonitorError},
    inputs::{Inputs, InputsError},
    motion_ctrl::{CommandFlag, MotionController},
    params::{ArmExecParams, ParamsError},
    safety::{SafetyGuard, POWER_OFF_CMD},
    status_reader::{FeedbackSource, StatusReader, StatusReaderError},
    status_server::StatusSink,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The components the loop drives but does not own the implementation of.
pub struct Collaborators {
    pub controller: Box<dyn MotionController>,
    pub auto_init: Box<dyn AutoInit>,
    pub sink: Box<dyn StatusSink>,
    pub inputs: Inputs,

    /// Where command replies are written
    pub replies: Box<dyn Write>,
}

/// How a session which ended without error finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub num_cycles: u64,
    pub exit_cause: ExitCause,
}

pub struct ControlLoop {
    state: LoopState,

    params: ArmExecParams,

    // Declared before the other channels so the arm is stopped before they close
    arm: SafetyGuard<Box<dyn Write>>,

    feedback: Box<dyn FeedbackSource>,

    status_reader: StatusReader,

    home_monitor: HomeMonitor,

    collab: Collaborators,

    ds: DataStore,

    shutdown: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Connecting,
    Running,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    /// A termination signal was received
    Signal,

    /// The command input closed and every command was processed
    InputClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlLoopError {
    #[error("Could not connect to the arm's command channel: {0}")]
    CommandConnect(io::Error),

    #[error("Could not connect to the arm's feedback channel: {0}")]
    FeedbackConnect(io::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(ParamsError),

    #[error("The arm's feedback channel has been lost")]
    FeedbackChannelLost,

    #[error(transparent)]
    Status(StatusReaderError),

    #[error(transparent)]
    HomeMarker(HomeMonitorError),

    #[error(transparent)]
    InputRead(InputsError),

    #[error("Could not send a motion command to the arm: {0}")]
    ArmWrite(io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlLoop {
    /// Connect to the arm and validate the parameters.
    ///
    /// The safety guard is installed as soon as the command channel is open, so a failure of any
    /// later step still stops the arm.
    pub fn connect<C: ArmConnector>(
        params: ArmExecParams,
        connector: &mut C,
        collab: Collaborators,
        shutdown: Arc<AtomicBool>
    ) -> Result<Self, ControlLoopError> {
        info!("Control loop state: {:?}", LoopState::Connecting);

        let command = connector.connect_command()
            .map_err(ControlLoopError::CommandConnect)?;
        let arm = SafetyGuard::new(command);

        let feedback = connector.connect_feedback()
            .map_err(ControlLoopError::FeedbackConnect)?;

        let mut control_loop = Self {
            state: LoopState::Connecting,
            status_reader: StatusReader::new(
                std::time::Duration::from_millis(params.status_timeout_ms)
            ),
            home_monitor: HomeMonitor::new(&params),
            params,
            arm,
            feedback,
            collab,
            ds: DataStore::default(),
            shutdown,
        };

        control_loop.params.validate()
            .map_err(ControlLoopError::InvalidParams)?;

        control_loop.set_state(LoopState::Running);

        Ok(control_loop)
    }

    /// Run cycles until a termination signal, the command input closing, or a fatal error.
    ///
    /// The session is always shut down before returning.
    pub fn run(mut self) -> Result<RunSummary, ControlLoopError> {
        let result = self.run_cycles();

        match result {
            Ok(ref s) => info!(
                "Control loop finished after {} cycles: {:?}, arm at home: {}",
                s.num_cycles,
                s.exit_cause,
                match self.ds.at_home {
                    Some(true) => "yes",
                    Some(false) => "no",
                    None => "unknown",
                }
            ),
            Err(ref e) => warn!(
                "Control loop stopped after {} cycles: {}", self.ds.num_cycles, e
            ),
        }

        self.shut_down();

        result
    }

    /// Execute one control cycle.
    pub fn cycle(&mut self) -> Result<(), ControlLoopError> {

        // Clear items that need wiping at the start of the cycle
        self.ds.cycle_start();

        // ---- STATUS ACQUISITION ----

        if !self.feedback.is_healthy() {
            return Err(ControlLoopError::FeedbackChannelLost)
        }

        let prev_mode = self.ds.arm_status.robot_mode;

        let num_frames = self.status_reader
            .read_status(self.feedback.as_mut(), &mut self.ds.arm_status)
            .map_err(ControlLoopError::Status)?;

        if num_frames > 1 {
            trace!("Discarded {} stale status frames", num_frames - 1);
        }
        trace!(
            "Arm status: {}",
            serde_json::to_string(&self.ds.arm_status).unwrap_or_default()
        );

        if self.ds.arm_status.robot_mode != prev_mode || self.ds.num_cycles == 0 {
            info!("Arm mode: {}", self.ds.arm_status.robot_mode);
        }

        if let Some(at_home) = self.home_monitor.check(&self.ds.arm_status)
            .map_err(ControlLoopError::HomeMarker)?
        {
            self.ds.at_home = Some(at_home);
        }

        // ---- TELECOMMAND PROCESSING ----

        self.collab.inputs.read().map_err(ControlLoopError::InputRead)?;

        if let Some(tokens) = self.collab.inputs.pop() {
            self.process_command(&tokens);
        }

        // ---- MOTION CONTROL PROCESSING ----

        self.ds.ctrl_output = self.collab.controller.step(&self.ds.ctrl_input, &self.ds.arm_status);

        match self.ds.ctrl_output.flag {
            CommandFlag::Send => {
                let cmd = self.ds.ctrl_output.to_movej(
                    self.params.acceleration_rads2,
                    self.params.velocity_rads
                );
                debug!(
                    "Sending {}",
                    self.ds.ctrl_output.to_movej_deg(
                        self.params.acceleration_rads2,
                        self.params.velocity_rads
                    )
                );

                writeln!(self.arm, "{}", cmd)
                    .and_then(|_| self.arm.flush())
                    .map_err(ControlLoopError::ArmWrite)?;
            },
            CommandFlag::Collision => {
                self.ds.num_collision_rejections += 1;
                warn!(
                    "Motion rejected by the controller as collision-unsafe ({} so far)",
                    self.ds.num_collision_rejections
                );
            },
            CommandFlag::Idle => ()
        }

        // ---- STATUS BROADCAST ----

        match self.collab.sink.publish(&StatusFrame::from_status(&self.ds.arm_status)) {
            Ok(_) => (),
            Err(e) => warn!("StatusServer error: {}", e)
        };

        // Increment cycle counter
        self.ds.num_cycles += 1;

        Ok(())
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn data_store(&self) -> &DataStore {
        &self.ds
    }

    fn run_cycles(&mut self) -> Result<RunSummary, ControlLoopError> {
        let period_s = self.params.cycle_period_s;
        let period = util::time::seconds_to_std_duration(period_s);

        info!("Beginning control loop, period {} s\n", period_s);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Termination signal received");
                return Ok(self.summary(ExitCause::Signal))
            }

            if self.collab.inputs.is_exhausted() {
                info!("All commands processed and input closed");
                return Ok(self.summary(ExitCause::InputClosed))
            }

            // Get cycle start time
            let cycle_start_instant = Instant::now();

            self.cycle()?;

            // ---- CYCLE MANAGEMENT ----

            if period_s == 0.0 {
                continue
            }

            let cycle_dur = Instant::now() - cycle_start_instant;

            match period.checked_sub(cycle_dur) {
                Some(d) => {
                    self.ds.num_consec_cycle_overruns = 0;
                    thread::sleep(d);
                },
                None => {
                    self.ds.num_consec_cycle_overruns += 1;
                    warn!(
                        "Cycle overran by {:.06} s ({} consecutive)",
                        cycle_dur.as_secs_f64() - period.as_secs_f64(),
                        self.ds.num_consec_cycle_overruns
                    );
                }
            }
        }
    }

    fn process_command(&mut self, tokens: &[String]) {
        let mut ctx = CmdContext {
            status: &self.ds.arm_status,
            arm: &mut **self.arm,
            ctrl_input: &mut self.ds.ctrl_input,
            auto_init: self.collab.auto_init.as_mut(),
            params: &self.params,
        };

        let reply = cmd_handler::process(tokens, &mut ctx);

        let replies = &mut self.collab.replies;
        if let Err(e) = writeln!(replies, "{}", reply).and_then(|_| replies.flush()) {
            warn!("Could not write the command reply: {}", e);
        }
    }

    /// Best effort early power off, the safety guard sends the full stop sequence when the loop
    /// is dropped.
    fn shut_down(&mut self) {
        self.set_state(LoopState::ShuttingDown);

        if let Err(e) = writeln!(self.arm, "{}", POWER_OFF_CMD).and_then(|_| self.arm.flush()) {
            warn!("Could not send power off to the arm: {}", e);
        }

        self.collab.sink.close();
    }

    fn summary(&self, exit_cause: ExitCause) -> RunSummary {
        RunSummary {
            num_cycles: self.ds.num_cycles,
            exit_cause,
        }
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            info!("Control loop state: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}
