//! # Motion Control
//!
//! The motion controller turns the intent set by command dispatch into a joint target for the arm,
//! along with a flag saying whether the target should be sent. The control loop only sees the
//! [`MotionController`] trait, any trajectory generator can sit behind it.
//!
//! [`DirectController`] is the reference controller: it targets poses directly with no trajectory
//! planning, and rejects any target outside the joint limits.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{eqpt::arm::{ArmStatus, NUM_JOINTS}, tc::Position};
use log::debug;

use crate::params::ArmExecParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait MotionController {
    /// Process one cycle of intent against the current arm status.
    fn step(&mut self, input: &ControllerInput, status: &ArmStatus) -> ControllerOutput;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// High level instruction for the motion controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPrimitive {
    NoAction,

    /// Point the camera relative to the reference pose.
    MoveCam {
        pan_rad: f64,
        tilt_rad: f64,
        height_m: f64,
    },

    /// Go to a named pose.
    SetPosition(Position),

    /// Take the current pose as the reference.
    SetHome,
}

/// What the control loop should do with the controller's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFlag {
    /// Nothing to send this cycle
    Idle,

    /// Send the joint target to the arm
    Send,

    /// The target was rejected as collision-unsafe, send nothing
    Collision,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerInput {
    pub primitive: MotionPrimitive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerOutput {
    pub flag: CommandFlag,

    /// Joint target.
    ///
    /// Units: radians
    pub joint_angles_rad: [f64; NUM_JOINTS],
}

/// Targets poses directly, without trajectory planning.
pub struct DirectController {
    params: ArmExecParams,

    /// Pose camera moves are made relative to
    reference_rad: [f64; NUM_JOINTS],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MotionPrimitive {
    fn default() -> Self {
        MotionPrimitive::NoAction
    }
}

impl Default for CommandFlag {
    fn default() -> Self {
        CommandFlag::Idle
    }
}

impl ControllerOutput {
    /// The script command moving the arm to this output's target.
    pub fn to_movej(&self, acceleration_rads2: f64, velocity_rads: f64) -> String {
        let joints: Vec<String> = self.joint_angles_rad
            .iter()
            .map(|j| format!("{:.6}", j))
            .collect();

        format!(
            "movej([{}],a={},v={})",
            joints.join(","),
            acceleration_rads2,
            velocity_rads
        )
    }

    /// Same as [`ControllerOutput::to_movej`] but with the joints in degrees, for logging.
    pub fn to_movej_deg(&self, acceleration_rads2: f64, velocity_rads: f64) -> String {
        let joints: Vec<String> = self.joint_angles_rad
            .iter()
            .map(|j| format!("{:.2}", j.to_degrees()))
            .collect();

        format!(
            "movej([{}],a={},v={})",
            joints.join(","),
            acceleration_rads2,
            velocity_rads
        )
    }
}

impl DirectController {
    pub fn new(params: &ArmExecParams) -> Self {
        Self {
            reference_rad: params.home_position_rad(),
            params: params.clone(),
        }
    }

    pub fn reference_rad(&self) -> &[f64; NUM_JOINTS] {
        &self.reference_rad
    }

    fn target(&self, target: [f64; NUM_JOINTS]) -> ControllerOutput {
        let flag = match self.params.first_joint_outside_limits_rad(&target) {
            Some(joint) => {
                debug!("Target for joint {} is outside the joint limits", joint);
                CommandFlag::Collision
            },
            None => CommandFlag::Send
        };

        ControllerOutput {
            flag,
            joint_angles_rad: target
        }
    }
}

impl MotionController for DirectController {
    fn step(&mut self, input: &ControllerInput, status: &ArmStatus) -> ControllerOutput {
        match input.primitive {
            MotionPrimitive::NoAction => ControllerOutput::default(),
            MotionPrimitive::SetHome => {
                self.reference_rad = status.joint_angles_rad;
                ControllerOutput::default()
            },
            MotionPrimitive::SetPosition(Position::Home) => {
                self.target(self.params.home_position_rad())
            },
            MotionPrimitive::SetPosition(Position::Giraffe) => {
                self.target(self.params.giraffe_position_rad())
            },
            // Height would need inverse kinematics, only pan and tilt are applied
            MotionPrimitive::MoveCam { pan_rad, tilt_rad, .. } => {
                let mut target = self.reference_rad;
                target[0] += pan_rad;
                target[3] += tilt_rad;
                self.target(target)
            }
        }
    }
}
