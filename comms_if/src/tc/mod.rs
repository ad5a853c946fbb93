//! # Telecommand module
//!
//! Arm telecommands arrive as lines of comma separated tokens:
//!
//! ```text
//! >7,12,set_pos,home;
//! ```
//!
//! The first three tokens form the header (rover ID, sequence number, operation name). The
//! operation name selects which [`CommandKind`] the remaining tokens are parsed into. The leading
//! `>` and trailing `;` are optional.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod response;

pub use response::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of header tokens at the start of every command line.
pub const NUM_HEADER_FIELDS: usize = 3;

const HEADER_NAMES: [&str; 3] = ["rover_id", "sequence_number", "name"];
const HEADER_TYPES: [&str; 3] = ["u16", "u32", "string"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fields common to every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Identifier of the arm the command is addressed to
    pub rover_id: u16,

    /// Sequence number given by the sender, echoed back in the reply
    pub seq_no: u32,

    /// Operation name exactly as received
    pub name: String,
}

/// A parsed telecommand.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub header: Header,
    pub kind: CommandKind,
}

/// The field layout of one command variant, used to report format errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub names: &'static [&'static str],
    pub types: &'static [&'static str],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The operations supported by the arm, with their arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Point the arm mounted camera.
    MoveCam {
        pan_deg: f64,
        tilt_deg: f64,
        height_m: f64,
    },

    /// Move to a named pose.
    SetPosition {
        position: Position,
    },

    /// Use the current pose as the motion controller's reference.
    SetHome,

    /// Switch the arm's power.
    Power {
        state: PowerState,
    },

    /// Stop all joints and hold.
    Brakes,

    /// Run the automatic initialisation using the configured force limit.
    AutoInit,

    /// Run the automatic initialisation, aborting if the tool force exceeds the limit.
    AutoInitForce {
        force_limit_n: f64,
    },

    /// Jog a single joint during initialisation.
    JointMove {
        joint_id: u8,
        dir: i8,
    },
}

/// Named arm poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Home,
    Giraffe,
}

/// Arm power states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

/// Operation names recognised on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MoveCam,
    SetPosition,
    SetHome,
    Power,
    Brakes,
    AutoInit,
    AutoInitForce,
    JointMove,
}

/// Why a field conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// A field could not be converted to its type
    WrongType,

    /// The number of fields does not match the schema
    WrongFieldCount,
}

/// Possible parsing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TcParseError {
    #[error("unknown command found: '{0}'")]
    UnknownCommand(String),

    #[error("{}", format_error_message(.kind, .schema))]
    FormatError {
        kind: FormatErrorKind,
        schema: Schema,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Command {
    /// Parse a command from the tokens of one line.
    ///
    /// The operation is looked up case-insensitively. `auto_init` selects the force limited
    /// variant when the line has as many tokens as that variant's schema.
    pub fn parse(tokens: &[String]) -> Result<Self, TcParseError> {
        if tokens.len() < NUM_HEADER_FIELDS {
            return Err(TcParseError::FormatError {
                kind: FormatErrorKind::WrongFieldCount,
                schema: Schema::HEADER
            })
        }

        let op = Operation::from_tokens(tokens)
            .ok_or_else(|| TcParseError::UnknownCommand(tokens[2].clone()))?;

        let fields = Fields::new(tokens, op.schema())?;

        let header = Header {
            rover_id: fields.get(0)?,
            seq_no: fields.get(1)?,
            name: tokens[2].clone(),
        };

        let kind = match op {
            Operation::MoveCam => CommandKind::MoveCam {
                pan_deg: fields.get(3)?,
                tilt_deg: fields.get(4)?,
                height_m: fields.get(5)?,
            },
            Operation::SetPosition => CommandKind::SetPosition {
                position: fields.get(3)?
            },
            Operation::SetHome => CommandKind::SetHome,
            Operation::Power => CommandKind::Power {
                state: fields.get(3)?
            },
            Operation::Brakes => CommandKind::Brakes,
            Operation::AutoInit => CommandKind::AutoInit,
            Operation::AutoInitForce => CommandKind::AutoInitForce {
                force_limit_n: fields.get(3)?
            },
            Operation::JointMove => CommandKind::JointMove {
                joint_id: fields.get(3)?,
                dir: fields.get(4)?,
            },
        };

        Ok(Command { header, kind })
    }

    /// The operation this command was parsed as.
    pub fn operation(&self) -> Operation {
        match self.kind {
            CommandKind::MoveCam { .. } => Operation::MoveCam,
            CommandKind::SetPosition { .. } => Operation::SetPosition,
            CommandKind::SetHome => Operation::SetHome,
            CommandKind::Power { .. } => Operation::Power,
            CommandKind::Brakes => Operation::Brakes,
            CommandKind::AutoInit => Operation::AutoInit,
            CommandKind::AutoInitForce { .. } => Operation::AutoInitForce,
            CommandKind::JointMove { .. } => Operation::JointMove,
        }
    }
}

impl Operation {
    /// Select the operation named by token 2 of a line.
    fn from_tokens(tokens: &[String]) -> Option<Self> {
        let name = tokens[2].to_lowercase();

        match name.as_str() {
            "move_cam" => Some(Operation::MoveCam),
            "set_pos" | "set_position" => Some(Operation::SetPosition),
            "set_home" => Some(Operation::SetHome),
            "power" => Some(Operation::Power),
            "brakes" | "stop" => Some(Operation::Brakes),
            "auto_init" => {
                if tokens.len() == Schema::AUTO_INIT_FORCE.names.len() {
                    Some(Operation::AutoInitForce)
                }
                else {
                    Some(Operation::AutoInit)
                }
            },
            "initj" | "joint_move" => Some(Operation::JointMove),
            _ => None
        }
    }

    /// The field layout of this operation.
    pub fn schema(&self) -> Schema {
        match self {
            Operation::MoveCam => Schema::MOVE_CAM,
            Operation::SetPosition => Schema::SET_POSITION,
            Operation::SetHome => Schema::HEADER,
            Operation::Power => Schema::POWER,
            Operation::Brakes => Schema::HEADER,
            Operation::AutoInit => Schema::HEADER,
            Operation::AutoInitForce => Schema::AUTO_INIT_FORCE,
            Operation::JointMove => Schema::JOINT_MOVE,
        }
    }
}

impl Schema {
    pub const HEADER: Schema = Schema {
        names: &HEADER_NAMES,
        types: &HEADER_TYPES,
    };

    pub const MOVE_CAM: Schema = Schema {
        names: &["rover_id", "sequence_number", "name", "pan", "tilt", "height"],
        types: &["u16", "u32", "string", "f64 (deg)", "f64 (deg)", "f64 (m)"],
    };

    pub const SET_POSITION: Schema = Schema {
        names: &["rover_id", "sequence_number", "name", "position"],
        types: &["u16", "u32", "string", "home|giraffe"],
    };

    pub const POWER: Schema = Schema {
        names: &["rover_id", "sequence_number", "name", "state"],
        types: &["u16", "u32", "string", "on|off"],
    };

    pub const AUTO_INIT_FORCE: Schema = Schema {
        names: &["rover_id", "sequence_number", "name", "force"],
        types: &["u16", "u32", "string", "f64 (N)"],
    };

    pub const JOINT_MOVE: Schema = Schema {
        names: &["rover_id", "sequence_number", "name", "joint_id", "dir"],
        types: &["u16", "u32", "string", "u8", "i8"],
    };
}

impl FromStr for Position {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "home" => Ok(Position::Home),
            "giraffe" => Ok(Position::Giraffe),
            _ => Err(())
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Home => write!(f, "home"),
            Position::Giraffe => write!(f, "giraffe"),
        }
    }
}

impl FromStr for PowerState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(PowerState::On),
            "off" => Ok(PowerState::Off),
            _ => Err(())
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Split one input line into tokens.
///
/// Surrounding whitespace, a leading `>` and a trailing `;` are removed. An empty line gives no
/// tokens.
pub fn tokenise(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('>').unwrap_or(line);
    let line = line.strip_suffix(';').unwrap_or(line).trim();

    if line.is_empty() {
        return Vec::new()
    }

    line.split(',').map(|t| t.trim().to_string()).collect()
}

// ---------------------------------------------------------------------------
// PRIVATE
// ---------------------------------------------------------------------------

/// Typed access to the tokens of a line checked against a schema.
struct Fields<'a> {
    tokens: &'a [String],
    schema: Schema,
}

impl<'a> Fields<'a> {
    fn new(tokens: &'a [String], schema: Schema) -> Result<Self, TcParseError> {
        if tokens.len() != schema.names.len() {
            return Err(TcParseError::FormatError {
                kind: FormatErrorKind::WrongFieldCount,
                schema
            })
        }

        Ok(Self { tokens, schema })
    }

    fn get<T: FromStr>(&self, index: usize) -> Result<T, TcParseError> {
        self.tokens[index].parse().map_err(|_| TcParseError::FormatError {
            kind: FormatErrorKind::WrongType,
            schema: self.schema
        })
    }
}

fn format_error_message(kind: &FormatErrorKind, schema: &Schema) -> String {
    let what = match kind {
        FormatErrorKind::WrongType => "wrong field type/s",
        FormatErrorKind::WrongFieldCount => "wrong field/s or field type/s",
    };

    format!(
        "command format error, {}, fields: {} - types: {}",
        what,
        schema.names.join(","),
        schema.types.join(",")
    )
}
