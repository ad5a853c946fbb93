//! # Arm Executable Parameters
//!
//! This module provides parameters for the arm executable. Parameters are loaded once at startup
//! from a TOML file, every field has a default so partial files are accepted.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::NUM_JOINTS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArmExecParams {

    // ---- IDENTIFICATION ----

    /// Identifier commands must carry to be accepted
    pub rover_id: u16,

    // ---- TIMING ----

    /// Target period of one control cycle, zero disables the end of cycle sleep.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Maximum time to wait for a feedback frame before the arm is considered lost.
    ///
    /// Units: milliseconds
    pub status_timeout_ms: u64,

    /// Maximum time allowed to open each arm connection.
    ///
    /// Units: milliseconds
    pub connect_timeout_ms: u64,

    // ---- NETWORK ----

    /// Host of the arm's command (script) interface
    pub arm_host: String,

    /// Port of the arm's command (script) interface
    pub arm_port: u16,

    /// Host of the arm's realtime feedback interface
    pub feedback_host: String,

    /// Port of the arm's realtime feedback interface
    pub feedback_port: u16,

    /// ZMQ endpoint the status broadcast is bound to
    pub status_endpoint: String,

    // ---- HOME POSITION ----

    /// Directory holding the home marker file, must already exist
    pub work_directory: PathBuf,

    /// Name of the home marker file inside the work directory
    pub home_marker_file: String,

    /// Joint angles of the home pose.
    ///
    /// Units: degrees
    pub home_position_deg: [f64; NUM_JOINTS],

    /// Joint angles of the giraffe (camera up) pose.
    ///
    /// Units: degrees
    pub giraffe_position_deg: [f64; NUM_JOINTS],

    /// Per joint tolerance within which the arm is considered home.
    ///
    /// Units: degrees
    pub home_tolerance_deg: f64,

    // ---- CAPABILITIES ----

    /// Minimum joint angle (lowest negative value)
    ///
    /// Units: degrees
    pub min_joint_pos_deg: [f64; NUM_JOINTS],

    /// Maximum joint angle (highest positive value)
    ///
    /// Units: degrees
    pub max_joint_pos_deg: [f64; NUM_JOINTS],

    /// Joint acceleration used for motion commands.
    ///
    /// Units: radians/second^2
    pub acceleration_rads2: f64,

    /// Joint velocity used for motion commands.
    ///
    /// Units: radians/second
    pub velocity_rads: f64,

    /// Joint speed used when jogging a joint during initialisation.
    ///
    /// Units: radians/second
    pub joint_move_speed_rads: f64,

    /// Duration of one initialisation jog.
    ///
    /// Units: seconds
    pub joint_move_time_s: f64,

    /// Tool force above which automatic initialisation is aborted, `None` for no limit.
    ///
    /// Units: newtons
    pub init_force_limit_n: Option<f64>,

    // ---- CAMERA ----

    /// Largest accepted camera pan either side of centre.
    ///
    /// Units: degrees
    pub cam_pan_limit_deg: f64,

    /// Largest accepted camera tilt either side of level.
    ///
    /// Units: degrees
    pub cam_tilt_limit_deg: f64,

    /// Accepted camera height range, `[min, max]`.
    ///
    /// Units: meters
    pub cam_height_range_m: [f64; 2],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reasons a set of parameters is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("No work directory for the home position file has been given")]
    NoWorkDirectory,

    #[error("The work directory must exist and be a directory: {0:?}")]
    InvalidWorkDirectory(PathBuf),

    #[error("The home tolerance must be positive, found {0} deg")]
    InvalidTolerance(f64),

    #[error("The status timeout must be greater than zero")]
    InvalidStatusTimeout,

    #[error("The cycle period must be zero or positive, found {0} s")]
    InvalidCyclePeriod(f64),

    #[error("Joint {0} has a minimum position which is not below its maximum")]
    InvalidJointLimits(usize),

    #[error("Joint {joint} of the {pose} pose is outside the joint limits")]
    PoseOutsideLimits { pose: &'static str, joint: usize },

    #[error("The camera height range must be ordered as [min, max]")]
    InvalidCameraRange,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ArmExecParams {
    fn default() -> Self {
        Self {
            rover_id: 7,
            cycle_period_s: 0.1,
            status_timeout_ms: 100,
            connect_timeout_ms: 2000,
            arm_host: String::from("127.0.0.1"),
            arm_port: 30002,
            feedback_host: String::from("127.0.0.1"),
            feedback_port: 30003,
            status_endpoint: String::from("tcp://*:9999"),
            work_directory: PathBuf::new(),
            home_marker_file: String::from("ur5_home_position"),
            home_position_deg: [0.0, -180.0, 150.0, -60.0, 90.0, 0.0],
            giraffe_position_deg: [0.0, -90.0, 0.0, -90.0, 0.0, 0.0],
            home_tolerance_deg: 2.0,
            min_joint_pos_deg: [-360.0; NUM_JOINTS],
            max_joint_pos_deg: [360.0; NUM_JOINTS],
            acceleration_rads2: 0.5,
            velocity_rads: 0.1,
            joint_move_speed_rads: 0.05,
            joint_move_time_s: 0.2,
            init_force_limit_n: None,
            cam_pan_limit_deg: 45.0,
            cam_tilt_limit_deg: 90.0,
            cam_height_range_m: [0.1, 1.0],
        }
    }
}

impl ArmExecParams {
    /// Check the parameters are usable, including that the work directory exists.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.work_directory.as_os_str().is_empty() {
            return Err(ParamsError::NoWorkDirectory)
        }
        if !self.work_directory.is_dir() {
            return Err(ParamsError::InvalidWorkDirectory(self.work_directory.clone()))
        }

        if !(self.home_tolerance_deg > 0.0) {
            return Err(ParamsError::InvalidTolerance(self.home_tolerance_deg))
        }
        if self.status_timeout_ms == 0 {
            return Err(ParamsError::InvalidStatusTimeout)
        }
        if util::time::checked_seconds_to_std_duration(self.cycle_period_s).is_none() {
            return Err(ParamsError::InvalidCyclePeriod(self.cycle_period_s))
        }

        for i in 0..NUM_JOINTS {
            if !(self.min_joint_pos_deg[i] < self.max_joint_pos_deg[i]) {
                return Err(ParamsError::InvalidJointLimits(i))
            }
        }

        for (pose, angles) in [
            ("home", &self.home_position_deg),
            ("giraffe", &self.giraffe_position_deg),
        ].iter() {
            if let Some(joint) = self.first_joint_outside_limits_deg(angles) {
                return Err(ParamsError::PoseOutsideLimits { pose: *pose, joint })
            }
        }

        if !(self.cam_height_range_m[0] <= self.cam_height_range_m[1]) {
            return Err(ParamsError::InvalidCameraRange)
        }

        Ok(())
    }

    /// Full path of the home marker file.
    pub fn home_marker_path(&self) -> PathBuf {
        self.work_directory.join(&self.home_marker_file)
    }

    /// Home pose in radians.
    pub fn home_position_rad(&self) -> [f64; NUM_JOINTS] {
        deg_to_rad(&self.home_position_deg)
    }

    /// Giraffe pose in radians.
    pub fn giraffe_position_rad(&self) -> [f64; NUM_JOINTS] {
        deg_to_rad(&self.giraffe_position_deg)
    }

    /// Index of the first joint outside the joint limits, if any.
    pub fn first_joint_outside_limits_rad(&self, angles_rad: &[f64; NUM_JOINTS]) -> Option<usize> {
        let mut angles_deg = [0f64; NUM_JOINTS];
        for (d, r) in angles_deg.iter_mut().zip(angles_rad.iter()) {
            *d = r.to_degrees();
        }
        self.first_joint_outside_limits_deg(&angles_deg)
    }

    fn first_joint_outside_limits_deg(&self, angles_deg: &[f64; NUM_JOINTS]) -> Option<usize> {
        (0..NUM_JOINTS).find(|&i| {
            !(angles_deg[i] >= self.min_joint_pos_deg[i] && angles_deg[i] <= self.max_joint_pos_deg[i])
        })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert a set of joint angles from degrees to radians.
pub fn deg_to_rad(angles_deg: &[f64; NUM_JOINTS]) -> [f64; NUM_JOINTS] {
    let mut rad = [0f64; NUM_JOINTS];
    for (r, d) in rad.iter_mut().zip(angles_deg.iter()) {
        *r = d.to_radians();
    }
    rad
}
