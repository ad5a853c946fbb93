//! # Data Store
//!
//! Holds everything the control loop owns across cycles. There is exactly one arm status, which
//! is overwritten in place by the status reader and lent to the other components for the duration
//! of a cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::ArmStatus;

use crate::motion_ctrl::{ControllerInput, ControllerOutput};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    // Arm
    /// Latest status reported by the arm
    pub arm_status: ArmStatus,

    /// Whether the arm was at home on the last evaluation, `None` if not evaluated yet
    pub at_home: Option<bool>,

    // Motion control
    pub ctrl_input: ControllerInput,
    pub ctrl_output: ControllerOutput,

    // Monitoring Counters
    /// Number of motions rejected as collision-unsafe
    pub num_collision_rejections: u64,

    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// The motion intent is one-shot: anything dispatched in the previous cycle has already been
    /// given to the controller, so it is cleared along with the controller's last output.
    pub fn cycle_start(&mut self) {
        self.ctrl_input = ControllerInput::default();
        self.ctrl_output = ControllerOutput::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::motion_ctrl::{CommandFlag, MotionPrimitive};

    #[test]
    fn test_cycle_start_clears_intent() {
        let mut ds = DataStore::default();
        ds.ctrl_input.primitive = MotionPrimitive::SetHome;
        ds.ctrl_output.flag = CommandFlag::Send;
        ds.num_cycles = 4;

        ds.cycle_start();

        assert_eq!(ds.ctrl_input.primitive, MotionPrimitive::NoAction);
        assert_eq!(ds.ctrl_output.flag, CommandFlag::Idle);
        assert_eq!(ds.num_cycles, 4);
    }
}
