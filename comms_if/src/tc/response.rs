//! # Telecommand responses
//!
//! Every command line gets exactly one reply line:
//!
//! ```text
//! <7,12,set_pos,home,0,"success";
//! <7,13,bogus_op,2,"unknown command found: 'bogus_op'";
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::TcParseError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Result codes sent back in replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    FormatError,
    UnknownCommand,
    InvalidRobotState,
    OutOfRange,
    Failure,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Outcome of dispatching one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub code: ResultCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ResultCode {
    /// The integer sent on the wire.
    pub fn value(&self) -> u8 {
        match self {
            ResultCode::Success => 0,
            ResultCode::FormatError => 1,
            ResultCode::UnknownCommand => 2,
            ResultCode::InvalidRobotState => 3,
            ResultCode::OutOfRange => 4,
            ResultCode::Failure => 5,
        }
    }
}

impl DispatchResult {
    pub fn success() -> Self {
        Self::with_message(ResultCode::Success, "success")
    }

    pub fn with_message<S: Into<String>>(code: ResultCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }

    /// The `code,"message"` part of a reply.
    pub fn get_message(&self) -> String {
        format!("{},\"{}\"", self.code.value(), self.message.replace('"', "'"))
    }
}

impl From<&TcParseError> for DispatchResult {
    fn from(e: &TcParseError) -> Self {
        let code = match e {
            TcParseError::UnknownCommand(_) => ResultCode::UnknownCommand,
            TcParseError::FormatError { .. } => ResultCode::FormatError,
        };

        Self::with_message(code, e.to_string())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the reply line for a command, echoing the tokens it was received as.
pub fn format_reply(tokens: &[String], result: &DispatchResult) -> String {
    format!("<{},{};", tokens.join(","), result.get_message())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tc::{tokenise, Command};

    #[test]
    fn test_success_reply() {
        let tokens = tokenise(">7,1,set_home;");
        assert_eq!(
            format_reply(&tokens, &DispatchResult::success()),
            "<7,1,set_home,0,\"success\";"
        );
    }

    #[test]
    fn test_parse_error_replies() {
        let tokens = tokenise("7,2,bogus_op");
        let err = Command::parse(&tokens).unwrap_err();
        assert_eq!(
            format_reply(&tokens, &DispatchResult::from(&err)),
            "<7,2,bogus_op,2,\"unknown command found: 'bogus_op'\";"
        );

        let tokens = tokenise("7,3,move_cam,1,2");
        let err = Command::parse(&tokens).unwrap_err();
        let reply = format_reply(&tokens, &DispatchResult::from(&err));
        assert!(reply.starts_with("<7,3,move_cam,1,2,1,\"command format error"));
        assert!(reply.ends_with("\";"));
    }

    #[test]
    fn test_quotes_are_escaped() {
        let result = DispatchResult::with_message(ResultCode::Failure, "bad \"thing\"");
        assert_eq!(result.get_message(), "5,\"bad 'thing'\"");
    }
}
