//! # Automatic Initialisation
//!
//! After power up each joint of the arm has to be moved slightly before the controller will report
//! it as initialised. The control loop only depends on the [`AutoInit`] trait; [`InitStepper`] is
//! a minimal implementation that jogs every uninitialised joint each time it is run.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::{ArmStatus, RobotMode, JOINT_MODE_RUNNING, NUM_JOINTS};
use log::{debug, info};
use std::io::{self, Write};

use crate::params::ArmExecParams;
use crate::safety::POWER_ON_CMD;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait AutoInit {
    /// Advance the initialisation by one step, writing any commands to `arm`.
    ///
    /// Returns a message describing what was done.
    fn run(
        &mut self,
        status: &ArmStatus,
        arm: &mut dyn Write,
        force_limit_n: Option<f64>
    ) -> Result<String, AutoInitError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AutoInitError {
    #[error("cannot initialise while the arm is in {0} mode")]
    InvalidRobotState(RobotMode),

    #[error("tool force {force_n:.2} N exceeds the limit of {limit_n:.2} N")]
    ForceLimitExceeded { force_n: f64, limit_n: f64 },

    #[error("could not write to the arm: {0}")]
    WriteError(io::Error),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct InitStepper {
    speed_rads: f64,
    acceleration_rads2: f64,
    time_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InitStepper {
    pub fn new(params: &ArmExecParams) -> Self {
        Self {
            speed_rads: params.joint_move_speed_rads,
            acceleration_rads2: params.acceleration_rads2,
            time_s: params.joint_move_time_s,
        }
    }
}

impl AutoInit for InitStepper {
    fn run(
        &mut self,
        status: &ArmStatus,
        arm: &mut dyn Write,
        force_limit_n: Option<f64>
    ) -> Result<String, AutoInitError> {
        match status.robot_mode {
            RobotMode::Running => Ok(String::from("already initialised")),
            RobotMode::NoPower => {
                writeln!(arm, "{}", POWER_ON_CMD)
                    .and_then(|_| arm.flush())
                    .map_err(AutoInitError::WriteError)?;

                info!("Auto init: power on sent");
                Ok(String::from("power on sent"))
            },
            RobotMode::Initialising => {
                if let Some(limit_n) = force_limit_n {
                    let force_n = status.tool_force_magnitude_n();
                    if force_n > limit_n {
                        return Err(AutoInitError::ForceLimitExceeded { force_n, limit_n })
                    }
                }

                let mut speeds = [0f64; NUM_JOINTS];
                let mut pending = Vec::new();
                for (i, mode) in status.joint_modes.iter().enumerate() {
                    if *mode != JOINT_MODE_RUNNING {
                        speeds[i] = self.speed_rads;
                        pending.push(i);
                    }
                }

                if pending.is_empty() {
                    return Ok(String::from("all joints initialised"))
                }

                let cmd = speedj_init_command(&speeds, self.acceleration_rads2, self.time_s);
                debug!("Auto init: {}", cmd);

                writeln!(arm, "{}", cmd)
                    .and_then(|_| arm.flush())
                    .map_err(AutoInitError::WriteError)?;

                Ok(format!("stepping joints {:?}", pending))
            },
            mode => Err(AutoInitError::InvalidRobotState(mode))
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The script command jogging joints at the given speeds during initialisation.
pub fn speedj_init_command(
    speeds_rads: &[f64; NUM_JOINTS],
    acceleration_rads2: f64,
    time_s: f64
) -> String {
    let speeds: Vec<String> = speeds_rads.iter().map(|s| format!("{}", s)).collect();

    format!("speedj_init([{}],{},{})", speeds.join(","), acceleration_rads2, time_s)
}

#[cfg(test)]
mod test {
    use super::*;

    fn stepper() -> InitStepper {
        InitStepper::new(&ArmExecParams::default())
    }

    #[test]
    fn test_power_on_when_unpowered() {
        let status = ArmStatus { robot_mode: RobotMode::NoPower, ..Default::default() };
        let mut arm = Vec::new();

        assert_eq!(stepper().run(&status, &mut arm, None).unwrap(), "power on sent");
        assert_eq!(arm, b"power on\n");
    }

    #[test]
    fn test_jogs_pending_joints() {
        let status = ArmStatus {
            robot_mode: RobotMode::Initialising,
            joint_modes: [JOINT_MODE_RUNNING, 0, JOINT_MODE_RUNNING, 0, 0, JOINT_MODE_RUNNING],
            ..Default::default()
        };
        let mut arm = Vec::new();

        let msg = stepper().run(&status, &mut arm, Some(50.0)).unwrap();

        assert_eq!(msg, "stepping joints [1, 3, 4]");
        assert_eq!(
            String::from_utf8(arm).unwrap(),
            "speedj_init([0,0.05,0,0.05,0.05,0],0.5,0.2)\n"
        );
    }

    #[test]
    fn test_force_limit() {
        let status = ArmStatus {
            robot_mode: RobotMode::Initialising,
            tool_force_n: [30.0, 40.0, 0.0, 0.0, 0.0, 0.0],
            ..Default::default()
        };
        let mut arm = Vec::new();

        assert!(matches!(
            stepper().run(&status, &mut arm, Some(49.0)),
            Err(AutoInitError::ForceLimitExceeded { .. })
        ));
        assert!(arm.is_empty());

        // No limit configured
        assert!(stepper().run(&status, &mut arm, None).is_ok());
    }

    #[test]
    fn test_states() {
        let mut arm = Vec::new();

        let running = ArmStatus { robot_mode: RobotMode::Running, ..Default::default() };
        assert_eq!(stepper().run(&running, &mut arm, None).unwrap(), "already initialised");

        let estop = ArmStatus { robot_mode: RobotMode::EmergencyStopped, ..Default::default() };
        assert!(matches!(
            stepper().run(&estop, &mut arm, None),
            Err(AutoInitError::InvalidRobotState(RobotMode::EmergencyStopped))
        ));
        assert!(arm.is_empty());
    }
}
