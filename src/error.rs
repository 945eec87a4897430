use std::{error::Error, fmt};

const ERR_MSG_INVALID_STATE: &str = "operation issued in invalid state";

/// Semantic error categories surfaced by the infrastructure layer.
///
/// Lifecycle and transport operations return these to the caller; read and
/// dispatch paths absorb failures internally (defaults, dropped messages)
/// to preserve steady-state availability.
#[derive(Debug)]
pub enum InfraError {
    /// A file, directory, or sink could not be opened or created.
    ResourceUnavailable(String),
    /// A configuration document failed to parse.
    MalformedInput(String),
    /// An operation was issued against a component in the wrong lifecycle state.
    InvalidState(&'static str),
    /// A control-plane transport operation failed; carries the native error.
    Transport(zmq::Error),
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfraError::ResourceUnavailable(what) => {
                write!(f, "resource unavailable: {what}")
            }
            InfraError::MalformedInput(what) => write!(f, "malformed input: {what}"),
            InfraError::InvalidState(what) => {
                write!(f, "{ERR_MSG_INVALID_STATE}: {what}")
            }
            InfraError::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl Error for InfraError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InfraError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<zmq::Error> for InfraError {
    fn from(e: zmq::Error) -> Self {
        InfraError::Transport(e)
    }
}
