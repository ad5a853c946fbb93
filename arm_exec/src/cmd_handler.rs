//! # Command Handler
//!
//! Parses a tokenised command line and dispatches it to the handler for its operation. Every line
//! produces exactly one [`DispatchResult`]; parse failures are reported in the same way as
//! rejected commands and never stop the control loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::arm::{ArmStatus, RobotMode, NUM_JOINTS},
    tc::{
        format_reply, Command, CommandKind, DispatchResult, Position, PowerState, ResultCode
    },
};
use log::{debug, info, warn};
use std::io::Write;

use crate::{
    auto_init::{speedj_init_command, AutoInit, AutoInitError},
    motion_ctrl::{ControllerInput, MotionPrimitive},
    params::ArmExecParams,
    safety::{stop_command, POWER_OFF_CMD, POWER_ON_CMD},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Everything a handler may read or act upon.
pub struct CmdContext<'a> {
    /// Latest arm status
    pub status: &'a ArmStatus,

    /// The arm's command channel
    pub arm: &'a mut dyn Write,

    /// Intent given to the motion controller this cycle
    pub ctrl_input: &'a mut ControllerInput,

    pub auto_init: &'a mut dyn AutoInit,

    pub params: &'a ArmExecParams,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse and dispatch one command line, returning the reply line.
pub fn process(tokens: &[String], ctx: &mut CmdContext) -> String {
    let result = match Command::parse(tokens) {
        Ok(cmd) => dispatch(&cmd, ctx),
        Err(e) => DispatchResult::from(&e),
    };

    if result.is_success() {
        info!("{} -> {}", tokens.join(","), result.message);
    }
    else {
        warn!("{} -> {:?}: {}", tokens.join(","), result.code, result.message);
    }

    format_reply(tokens, &result)
}

/// Execute a parsed command.
pub fn dispatch(cmd: &Command, ctx: &mut CmdContext) -> DispatchResult {
    debug!("Dispatching {:?} in mode {}", cmd.operation(), ctx.status.robot_mode);

    match cmd.kind {
        CommandKind::MoveCam { pan_deg, tilt_deg, height_m } => {
            move_cam(ctx, pan_deg, tilt_deg, height_m)
        },
        CommandKind::SetPosition { position } => set_position(ctx, position),
        CommandKind::SetHome => {
            ctx.ctrl_input.primitive = MotionPrimitive::SetHome;
            DispatchResult::success()
        },
        CommandKind::Power { state } => power(ctx, state),
        CommandKind::Brakes => brakes(ctx),
        CommandKind::AutoInit => {
            let force_limit_n = ctx.params.init_force_limit_n;
            auto_init(ctx, force_limit_n)
        },
        CommandKind::AutoInitForce { force_limit_n } => {
            if !(force_limit_n.is_finite() && force_limit_n > 0.0) {
                return DispatchResult::with_message(
                    ResultCode::OutOfRange,
                    format!("force limit must be positive, found {}", force_limit_n)
                )
            }
            auto_init(ctx, Some(force_limit_n))
        },
        CommandKind::JointMove { joint_id, dir } => joint_move(ctx, joint_id, dir),
    }
}

// ------------------------------------------------------------------------------------------------
// HANDLERS
// ------------------------------------------------------------------------------------------------

fn move_cam(ctx: &mut CmdContext, pan_deg: f64, tilt_deg: f64, height_m: f64) -> DispatchResult {
    if let Some(r) = require_mode(ctx.status, RobotMode::Running) {
        return r
    }

    let p = ctx.params;
    if !within(pan_deg, -p.cam_pan_limit_deg, p.cam_pan_limit_deg) {
        return out_of_range("pan", pan_deg, -p.cam_pan_limit_deg, p.cam_pan_limit_deg)
    }
    if !within(tilt_deg, -p.cam_tilt_limit_deg, p.cam_tilt_limit_deg) {
        return out_of_range("tilt", tilt_deg, -p.cam_tilt_limit_deg, p.cam_tilt_limit_deg)
    }
    if !within(height_m, p.cam_height_range_m[0], p.cam_height_range_m[1]) {
        return out_of_range("height", height_m, p.cam_height_range_m[0], p.cam_height_range_m[1])
    }

    ctx.ctrl_input.primitive = MotionPrimitive::MoveCam {
        pan_rad: pan_deg.to_radians(),
        tilt_rad: tilt_deg.to_radians(),
        height_m,
    };

    DispatchResult::success()
}

fn set_position(ctx: &mut CmdContext, position: Position) -> DispatchResult {
    if let Some(r) = require_mode(ctx.status, RobotMode::Running) {
        return r
    }

    let target = match position {
        Position::Home => ctx.params.home_position_rad(),
        Position::Giraffe => ctx.params.giraffe_position_rad(),
    };

    if let Some(joint) = ctx.params.first_joint_outside_limits_rad(&target) {
        return DispatchResult::with_message(
            ResultCode::OutOfRange,
            format!("{} position exceeds the limits of joint {}", position, joint)
        )
    }

    ctx.ctrl_input.primitive = MotionPrimitive::SetPosition(position);

    DispatchResult::success()
}

fn power(ctx: &mut CmdContext, state: PowerState) -> DispatchResult {
    let cmd = match state {
        PowerState::On => POWER_ON_CMD,
        PowerState::Off => POWER_OFF_CMD,
    };

    send(ctx.arm, cmd)
}

fn brakes(ctx: &mut CmdContext) -> DispatchResult {
    ctx.ctrl_input.primitive = MotionPrimitive::NoAction;

    send(ctx.arm, &stop_command())
}

fn auto_init(ctx: &mut CmdContext, force_limit_n: Option<f64>) -> DispatchResult {
    match ctx.auto_init.run(ctx.status, ctx.arm, force_limit_n) {
        Ok(msg) => DispatchResult::with_message(ResultCode::Success, msg),
        Err(e @ AutoInitError::InvalidRobotState(_)) => {
            DispatchResult::with_message(ResultCode::InvalidRobotState, e.to_string())
        },
        Err(e) => DispatchResult::with_message(ResultCode::Failure, e.to_string()),
    }
}

fn joint_move(ctx: &mut CmdContext, joint_id: u8, dir: i8) -> DispatchResult {
    if let Some(r) = require_mode(ctx.status, RobotMode::Initialising) {
        return r
    }

    let joint = joint_id as usize;
    if joint >= NUM_JOINTS {
        return DispatchResult::with_message(
            ResultCode::OutOfRange,
            format!("joint id must be below {}, found {}", NUM_JOINTS, joint_id)
        )
    }
    if dir != 1 && dir != -1 {
        return DispatchResult::with_message(
            ResultCode::OutOfRange,
            format!("direction must be 1 or -1, found {}", dir)
        )
    }

    let mut speeds = [0f64; NUM_JOINTS];
    speeds[joint] = dir as f64 * ctx.params.joint_move_speed_rads;

    let cmd = speedj_init_command(
        &speeds,
        ctx.params.acceleration_rads2,
        ctx.params.joint_move_time_s
    );

    send(ctx.arm, &cmd)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn require_mode(status: &ArmStatus, mode: RobotMode) -> Option<DispatchResult> {
    if status.robot_mode == mode {
        None
    }
    else {
        Some(DispatchResult::with_message(
            ResultCode::InvalidRobotState,
            format!("arm must be {} but is {}", mode, status.robot_mode)
        ))
    }
}

fn within(value: f64, min: f64, max: f64) -> bool {
    value.is_finite() && value >= min && value <= max
}

fn out_of_range(field: &str, value: f64, min: f64, max: f64) -> DispatchResult {
    DispatchResult::with_message(
        ResultCode::OutOfRange,
        format!("{} of {} is outside [{}, {}]", field, value, min, max)
    )
}

fn send(arm: &mut dyn Write, cmd: &str) -> DispatchResult {
    match writeln!(arm, "{}", cmd).and_then(|_| arm.flush()) {
        Ok(()) => DispatchResult::success(),
        Err(e) => DispatchResult::with_message(
            ResultCode::Failure,
            format!("could not write to the arm: {}", e)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::auto_init::InitStepper;
    use comms_if::tc::tokenise;
    use std::io;

    struct Harness {
        status: ArmStatus,
        arm: Vec<u8>,
        ctrl_input: ControllerInput,
        auto_init: InitStepper,
        params: ArmExecParams,
    }

    impl Harness {
        fn new(mode: RobotMode) -> Self {
            let params = ArmExecParams::default();
            Self {
                status: ArmStatus { robot_mode: mode, ..Default::default() },
                arm: Vec::new(),
                ctrl_input: ControllerInput::default(),
                auto_init: InitStepper::new(&params),
                params,
            }
        }

        fn process(&mut self, line: &str) -> String {
            let mut ctx = CmdContext {
                status: &self.status,
                arm: &mut self.arm,
                ctrl_input: &mut self.ctrl_input,
                auto_init: &mut self.auto_init,
                params: &self.params,
            };
            process(&tokenise(line), &mut ctx)
        }

        fn arm_output(&self) -> String {
            String::from_utf8_lossy(&self.arm).into_owned()
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "arm gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_set_home_then_unknown() {
        let mut h = Harness::new(RobotMode::Running);

        assert_eq!(h.process("7,1,set_home"), "<7,1,set_home,0,\"success\";");
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::SetHome);

        h.ctrl_input = ControllerInput::default();
        assert_eq!(
            h.process("7,2,bogus_op"),
            "<7,2,bogus_op,2,\"unknown command found: 'bogus_op'\";"
        );
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::NoAction);
        assert!(h.arm.is_empty());
    }

    #[test]
    fn test_format_errors_have_no_side_effects() {
        let mut h = Harness::new(RobotMode::Running);

        let reply = h.process(">7,3,move_cam,ten,0,0.5;");
        assert!(reply.starts_with("<7,3,move_cam,ten,0,0.5,1,\"command format error"));
        assert!(reply.contains("fields: rover_id,sequence_number,name,pan,tilt,height"));

        let reply = h.process("7,4,power");
        assert!(reply.starts_with("<7,4,power,1,"));

        let reply = h.process("7,5");
        assert!(reply.starts_with("<7,5,1,"));

        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::NoAction);
        assert!(h.arm.is_empty());
    }

    #[test]
    fn test_move_cam() {
        let mut h = Harness::new(RobotMode::Running);

        assert_eq!(h.process("7,1,MOVE_CAM,10,-20,0.5"), "<7,1,MOVE_CAM,10,-20,0.5,0,\"success\";");
        match h.ctrl_input.primitive {
            MotionPrimitive::MoveCam { pan_rad, tilt_rad, height_m } => {
                assert!((pan_rad - 10f64.to_radians()).abs() < 1e-12);
                assert!((tilt_rad + 20f64.to_radians()).abs() < 1e-12);
                assert_eq!(height_m, 0.5);
            },
            p => panic!("Unexpected primitive {:?}", p)
        }

        h.ctrl_input = ControllerInput::default();
        assert!(h.process("7,2,move_cam,50,0,0.5").starts_with("<7,2,move_cam,50,0,0.5,4,"));
        assert!(h.process("7,3,move_cam,0,0,2.0").starts_with("<7,3,move_cam,0,0,2.0,4,"));
        assert!(h.process("7,4,move_cam,NaN,0,0.5").starts_with("<7,4,move_cam,NaN,0,0.5,4,"));
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::NoAction);
    }

    #[test]
    fn test_motion_requires_running() {
        let mut h = Harness::new(RobotMode::Freedrive);

        assert_eq!(
            h.process("7,1,set_pos,home"),
            "<7,1,set_pos,home,3,\"arm must be running but is freedrive\";"
        );
        assert!(h.process("7,2,move_cam,0,0,0.5").starts_with("<7,2,move_cam,0,0,0.5,3,"));
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::NoAction);
    }

    #[test]
    fn test_set_position() {
        let mut h = Harness::new(RobotMode::Running);

        assert_eq!(h.process("7,1,set_position,Giraffe"), "<7,1,set_position,Giraffe,0,\"success\";");
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::SetPosition(Position::Giraffe));

        h.ctrl_input = ControllerInput::default();
        h.params.max_joint_pos_deg[2] = 100.0;
        assert_eq!(
            h.process("7,2,set_pos,home"),
            "<7,2,set_pos,home,4,\"home position exceeds the limits of joint 2\";"
        );
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::NoAction);
    }

    #[test]
    fn test_power_and_brakes() {
        let mut h = Harness::new(RobotMode::Running);

        assert_eq!(h.process("7,1,power,on"), "<7,1,power,on,0,\"success\";");
        h.ctrl_input.primitive = MotionPrimitive::SetHome;
        assert_eq!(h.process("7,2,stop"), "<7,2,stop,0,\"success\";");
        assert_eq!(h.ctrl_input.primitive, MotionPrimitive::NoAction);
        assert_eq!(h.process("7,3,power,OFF"), "<7,3,power,OFF,0,\"success\";");

        assert_eq!(
            h.arm_output(),
            "power on\nstopj([0.1,0.1,0.1,0.1,0.1,0.1])\npower off\n"
        );
    }

    #[test]
    fn test_write_failure() {
        let status = ArmStatus::default();
        let params = ArmExecParams::default();
        let mut arm = BrokenPipe;
        let mut ctrl_input = ControllerInput::default();
        let mut auto_init = InitStepper::new(&params);

        let mut ctx = CmdContext {
            status: &status,
            arm: &mut arm,
            ctrl_input: &mut ctrl_input,
            auto_init: &mut auto_init,
            params: &params,
        };

        assert_eq!(
            process(&tokenise("7,9,power,on"), &mut ctx),
            "<7,9,power,on,5,\"could not write to the arm: arm gone\";"
        );
    }

    #[test]
    fn test_auto_init() {
        let mut h = Harness::new(RobotMode::NoPower);
        assert_eq!(h.process("7,1,auto_init"), "<7,1,auto_init,0,\"power on sent\";");
        assert_eq!(h.arm_output(), "power on\n");

        let mut h = Harness::new(RobotMode::Initialising);
        h.status.tool_force_n = [0.0, 0.0, 80.0, 0.0, 0.0, 0.0];
        assert_eq!(
            h.process("7,2,auto_init,60"),
            "<7,2,auto_init,60,5,\"tool force 80.00 N exceeds the limit of 60.00 N\";"
        );
        assert!(h.process("7,3,auto_init,-1").starts_with("<7,3,auto_init,-1,4,"));
        assert!(h.arm.is_empty());

        let mut h = Harness::new(RobotMode::Shutdown);
        assert_eq!(
            h.process("7,4,auto_init"),
            "<7,4,auto_init,3,\"cannot initialise while the arm is in shutdown mode\";"
        );
    }

    #[test]
    fn test_joint_move() {
        let mut h = Harness::new(RobotMode::Initialising);

        assert_eq!(h.process("7,1,initj,2,-1"), "<7,1,initj,2,-1,0,\"success\";");
        assert_eq!(h.arm_output(), "speedj_init([0,0,-0.05,0,0,0],0.5,0.2)\n");

        assert!(h.process("7,2,joint_move,6,1").starts_with("<7,2,joint_move,6,1,4,"));
        assert!(h.process("7,3,joint_move,1,0").starts_with("<7,3,joint_move,1,0,4,"));

        let mut h = Harness::new(RobotMode::Running);
        assert!(h.process("7,4,initj,0,1").starts_with("<7,4,initj,0,1,3,"));
        assert!(h.arm.is_empty());
    }
}
