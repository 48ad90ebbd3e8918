use std::fmt;

use crate::flags::SessionState;

#[derive(Debug)]
pub enum PlatenError {
    InvalidConfiguration(String),
    Allocation(String),
    SessionState {
        operation: &'static str,
        state: SessionState,
    },
    Encode(String),
    Io(std::io::Error),
}

impl fmt::Display for PlatenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatenError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PlatenError::Allocation(message) => {
                write!(f, "allocation failed: {}", message)
            }
            PlatenError::SessionState { operation, state } => {
                write!(f, "{} called in session state {}", operation, state)
            }
            PlatenError::Encode(message) => write!(f, "encode error: {}", message),
            PlatenError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PlatenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlatenError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlatenError {
    fn from(value: std::io::Error) -> Self {
        PlatenError::Io(value)
    }
}
