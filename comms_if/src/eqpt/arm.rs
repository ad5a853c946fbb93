//! # Robot Arm Equipment Frames
//!
//! Two binary frames are defined here:
//!
//! - The feedback frame, streamed by the arm controller on its realtime interface. Frames are big
//!   endian and fixed size, beginning with a length field that must equal [`FRAME_SIZE`].
//! - The status frame, broadcast by the arm executable to subscribers once per cycle. It contains
//!   the robot mode as a single status byte followed by the six joint angles, little endian.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::Cursor;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of joints on the arm.
pub const NUM_JOINTS: usize = 6;

/// Size in bytes of one feedback frame.
///
/// Length field, time, four blocks of per-joint values, robot mode and joint modes.
pub const FRAME_SIZE: usize = 4 + 8 * (1 + 4 * NUM_JOINTS + 1 + NUM_JOINTS);

/// Size in bytes of one status broadcast frame.
pub const STATUS_FRAME_SIZE: usize = 1 + 8 * NUM_JOINTS;

/// Joint mode code reported by a joint which has finished initialisation.
pub const JOINT_MODE_RUNNING: u8 = 253;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Operating mode of the arm controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RobotMode {
    Running,
    Freedrive,
    Ready,
    Initialising,
    SecurityStopped,
    EmergencyStopped,
    FatalError,
    NoPower,
    NotConnected,
    Shutdown,
    SafeguardStop,
    Unknown(u8),
}

/// Errors which can occur while decoding a feedback frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Expected a buffer of {expected} bytes but got {found}")]
    WrongBufferSize { expected: usize, found: usize },

    #[error("Status data alignment check failed: frame declares {declared} bytes, expected {expected}")]
    Misaligned { declared: i32, expected: usize },

    #[error("Could not read frame field: {0}")]
    FieldReadError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The latest state reported by the arm.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArmStatus {
    /// Controller time since power up.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Actual joint angles, base first.
    ///
    /// Units: radians
    pub joint_angles_rad: [f64; NUM_JOINTS],

    /// Actual joint speeds.
    ///
    /// Units: radians/second
    pub joint_speeds_rads: [f64; NUM_JOINTS],

    /// Actual joint currents.
    ///
    /// Units: amps
    pub joint_currents_a: [f64; NUM_JOINTS],

    /// Force and torque at the tool, `[fx, fy, fz, tx, ty, tz]`.
    ///
    /// Units: newtons, newton metres
    pub tool_force_n: [f64; NUM_JOINTS],

    /// Operating mode of the controller.
    pub robot_mode: RobotMode,

    /// Per joint mode codes.
    pub joint_modes: [u8; NUM_JOINTS],
}

/// The status record broadcast to subscribers every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusFrame {
    /// Robot mode code, see [`RobotMode::code`].
    pub status: u8,

    /// Joint angles in radians.
    pub joint_angles_rad: [f64; NUM_JOINTS],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotMode {
    /// Get the mode from its wire code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => RobotMode::Running,
            1 => RobotMode::Freedrive,
            2 => RobotMode::Ready,
            3 => RobotMode::Initialising,
            4 => RobotMode::SecurityStopped,
            5 => RobotMode::EmergencyStopped,
            6 => RobotMode::FatalError,
            7 => RobotMode::NoPower,
            8 => RobotMode::NotConnected,
            9 => RobotMode::Shutdown,
            10 => RobotMode::SafeguardStop,
            c => RobotMode::Unknown(c),
        }
    }

    /// Get the wire code of this mode.
    pub fn code(&self) -> u8 {
        match self {
            RobotMode::Running => 0,
            RobotMode::Freedrive => 1,
            RobotMode::Ready => 2,
            RobotMode::Initialising => 3,
            RobotMode::SecurityStopped => 4,
            RobotMode::EmergencyStopped => 5,
            RobotMode::FatalError => 6,
            RobotMode::NoPower => 7,
            RobotMode::NotConnected => 8,
            RobotMode::Shutdown => 9,
            RobotMode::SafeguardStop => 10,
            RobotMode::Unknown(c) => *c,
        }
    }
}

impl Default for RobotMode {
    fn default() -> Self {
        RobotMode::NotConnected
    }
}

impl std::fmt::Display for RobotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RobotMode::Running => write!(f, "running"),
            RobotMode::Freedrive => write!(f, "freedrive"),
            RobotMode::Ready => write!(f, "ready"),
            RobotMode::Initialising => write!(f, "initialising"),
            RobotMode::SecurityStopped => write!(f, "security stopped"),
            RobotMode::EmergencyStopped => write!(f, "emergency stopped"),
            RobotMode::FatalError => write!(f, "fatal error"),
            RobotMode::NoPower => write!(f, "no power"),
            RobotMode::NotConnected => write!(f, "not connected"),
            RobotMode::Shutdown => write!(f, "shutdown"),
            RobotMode::SafeguardStop => write!(f, "safeguard stop"),
            RobotMode::Unknown(c) => write!(f, "unknown ({})", c),
        }
    }
}

impl ArmStatus {
    /// True if the arm reports the running mode.
    pub fn is_running(&self) -> bool {
        self.robot_mode == RobotMode::Running
    }

    /// Magnitude of the linear force at the tool.
    ///
    /// Units: newtons
    pub fn tool_force_magnitude_n(&self) -> f64 {
        self.tool_force_n[..3]
            .iter()
            .map(|f| f * f)
            .sum::<f64>()
            .sqrt()
    }

    /// Decode one feedback frame.
    ///
    /// The buffer must hold exactly one frame, and the frame's length field must equal
    /// [`FRAME_SIZE`]. Nothing is returned for a frame failing either check.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() != FRAME_SIZE {
            return Err(FrameError::WrongBufferSize {
                expected: FRAME_SIZE,
                found: frame.len()
            })
        }

        let mut rdr = Cursor::new(frame);

        let declared = rdr.read_i32::<BigEndian>().map_err(FrameError::FieldReadError)?;
        if declared < 0 || declared as usize != FRAME_SIZE {
            return Err(FrameError::Misaligned {
                declared,
                expected: FRAME_SIZE
            })
        }

        let mut status = ArmStatus::default();

        status.time_s = rdr.read_f64::<BigEndian>().map_err(FrameError::FieldReadError)?;
        read_joints(&mut rdr, &mut status.joint_angles_rad)?;
        read_joints(&mut rdr, &mut status.joint_speeds_rads)?;
        read_joints(&mut rdr, &mut status.joint_currents_a)?;
        read_joints(&mut rdr, &mut status.tool_force_n)?;

        let mode = rdr.read_f64::<BigEndian>().map_err(FrameError::FieldReadError)?;
        status.robot_mode = RobotMode::from_code(code_from_f64(mode));

        let mut joint_modes = [0f64; NUM_JOINTS];
        read_joints(&mut rdr, &mut joint_modes)?;
        for (dst, src) in status.joint_modes.iter_mut().zip(joint_modes.iter()) {
            *dst = code_from_f64(*src);
        }

        Ok(status)
    }

    /// Encode this status as a feedback frame, as the arm controller would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_SIZE);

        // Writes into a Vec cannot fail
        buf.write_i32::<BigEndian>(FRAME_SIZE as i32).ok();
        buf.write_f64::<BigEndian>(self.time_s).ok();

        let blocks = [
            &self.joint_angles_rad,
            &self.joint_speeds_rads,
            &self.joint_currents_a,
            &self.tool_force_n,
        ];
        for block in blocks.iter() {
            for v in block.iter() {
                buf.write_f64::<BigEndian>(*v).ok();
            }
        }

        buf.write_f64::<BigEndian>(self.robot_mode.code() as f64).ok();
        for m in self.joint_modes.iter() {
            buf.write_f64::<BigEndian>(*m as f64).ok();
        }

        buf
    }
}

impl StatusFrame {
    /// Build the broadcast frame for the given arm status.
    pub fn from_status(status: &ArmStatus) -> Self {
        Self {
            status: status.robot_mode.code(),
            joint_angles_rad: status.joint_angles_rad,
        }
    }

    /// Serialise the frame.
    pub fn to_bytes(&self) -> [u8; STATUS_FRAME_SIZE] {
        let mut buf = [0u8; STATUS_FRAME_SIZE];

        buf[0] = self.status;
        for (i, angle) in self.joint_angles_rad.iter().enumerate() {
            let start = 1 + 8 * i;
            LittleEndian::write_f64(&mut buf[start..start + 8], *angle);
        }

        buf
    }

    /// Deserialise a frame, `None` if the buffer is not exactly one frame long.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != STATUS_FRAME_SIZE {
            return None
        }

        let mut joint_angles_rad = [0f64; NUM_JOINTS];
        for (i, angle) in joint_angles_rad.iter_mut().enumerate() {
            let start = 1 + 8 * i;
            *angle = LittleEndian::read_f64(&buf[start..start + 8]);
        }

        Some(Self {
            status: buf[0],
            joint_angles_rad,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn read_joints(
    rdr: &mut Cursor<&[u8]>,
    dst: &mut [f64; NUM_JOINTS]
) -> Result<(), FrameError> {
    for v in dst.iter_mut() {
        *v = rdr.read_f64::<BigEndian>().map_err(FrameError::FieldReadError)?;
    }
    Ok(())
}

/// Mode codes are sent as doubles, anything outside a byte maps to `u8::MAX`.
fn code_from_f64(value: f64) -> u8 {
    if value.is_finite() && value >= 0.0 && value <= u8::MAX as f64 {
        value as u8
    }
    else {
        u8::MAX
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_status() -> ArmStatus {
        ArmStatus {
            time_s: 12.5,
            joint_angles_rad: [0.1, -1.2, 1.3, -0.4, 1.5, 0.0],
            joint_speeds_rads: [0.01; NUM_JOINTS],
            joint_currents_a: [0.5; NUM_JOINTS],
            tool_force_n: [3.0, 4.0, 0.0, 0.1, 0.2, 0.3],
            robot_mode: RobotMode::Running,
            joint_modes: [JOINT_MODE_RUNNING; NUM_JOINTS],
        }
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(FRAME_SIZE, 260);
        assert_eq!(STATUS_FRAME_SIZE, 49);
        assert_eq!(sample_status().encode().len(), FRAME_SIZE);
    }

    #[test]
    fn test_decode() {
        let status = sample_status();
        let decoded = ArmStatus::decode(&status.encode()).unwrap();

        assert_eq!(decoded, status);
        assert!(decoded.is_running());
        assert_eq!(decoded.tool_force_magnitude_n(), 5.0);
    }

    #[test]
    fn test_decode_misaligned() {
        let mut frame = sample_status().encode();
        BigEndian::write_i32(&mut frame[0..4], 812);

        match ArmStatus::decode(&frame) {
            Err(FrameError::Misaligned { declared, expected }) => {
                assert_eq!(declared, 812);
                assert_eq!(expected, FRAME_SIZE);
            },
            r => panic!("Expected misaligned error, got {:?}", r)
        }
    }

    #[test]
    fn test_decode_wrong_buffer() {
        let frame = sample_status().encode();

        assert!(matches!(
            ArmStatus::decode(&frame[..100]),
            Err(FrameError::WrongBufferSize { found: 100, .. })
        ));
    }

    #[test]
    fn test_robot_modes() {
        for code in 0..=10u8 {
            assert_eq!(RobotMode::from_code(code).code(), code);
        }
        assert_eq!(RobotMode::from_code(42), RobotMode::Unknown(42));
        assert_eq!(RobotMode::from_code(3), RobotMode::Initialising);

        let mut status = sample_status();
        status.robot_mode = RobotMode::NoPower;
        let decoded = ArmStatus::decode(&status.encode()).unwrap();
        assert_eq!(decoded.robot_mode, RobotMode::NoPower);
        assert!(!decoded.is_running());
    }

    #[test]
    fn test_status_frame_layout() {
        let frame = StatusFrame::from_status(&sample_status());
        let bytes = frame.to_bytes();

        assert_eq!(bytes[0], 0);
        assert_eq!(LittleEndian::read_f64(&bytes[1..9]), 0.1);
        assert_eq!(LittleEndian::read_f64(&bytes[41..49]), 0.0);
        assert_eq!(StatusFrame::from_bytes(&bytes), Some(frame));
        assert_eq!(StatusFrame::from_bytes(&bytes[..10]), None);
    }
}
