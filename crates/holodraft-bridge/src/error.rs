//! Errors raised while decoding host messages

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("malformed {command} message: {reason}")]
    Malformed { command: String, reason: String },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command} is missing required field {field}")]
    MissingField { command: String, field: &'static str },
    #[error("host bridge task has stopped")]
    Closed,
}

impl BridgeError {
    pub(crate) fn malformed(command: impl Into<String>, reason: impl ToString) -> Self {
        BridgeError::Malformed {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable error code reported to the host
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Malformed { .. } => "malformed",
            BridgeError::UnknownCommand(_) => "unknown_command",
            BridgeError::MissingField { .. } => "missing_field",
            BridgeError::Closed => "closed",
        }
    }

    /// Command the error relates to, if it was identified
    pub fn command(&self) -> Option<&str> {
        match self {
            BridgeError::Malformed { command, .. } | BridgeError::MissingField { command, .. } => {
                Some(command)
            }
            BridgeError::UnknownCommand(_) | BridgeError::Closed => None,
        }
    }
}
