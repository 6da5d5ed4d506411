// Error taxonomy for the engine.
//
// Only programming errors are `Err`: malformed arguments and illegal state
// transitions. Expected negative outcomes (no path within the node cap, a
// walkable candidate that lands inside a mask, an empty chunk bucket) are
// `Option::None` at the call site and never reach this type.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HamletError {
    /// Malformed input: inverted bounds, negative buffers, non-positive
    /// costs or batch sizes, unsupported rotations.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An operation was attempted from the wrong lifecycle state, e.g.
    /// submitting a queue that is not READY.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, HamletError>;
