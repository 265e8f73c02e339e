//! Error types for the foreign emulator boundary.
//!
//! Everything the emulator can fail at is surfaced through
//! [`EmulatorError`]. The engine never retries or masks these — retries,
//! if any, belong to the caller.

use std::error::Error;
use std::fmt;

use crate::action::Action;
use crate::emulator::StateKind;

/// Errors from the foreign emulator core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmulatorError {
    /// The ROM (or equivalent program image) failed to load.
    RomLoad {
        /// Backend description of the load failure.
        reason: String,
    },
    /// The emulator rejected an action code.
    InvalidAction {
        /// The rejected action.
        action: Action,
    },
    /// A state blob failed to decode.
    ///
    /// The emulator's prior state is guaranteed untouched: implementations
    /// must fully decode and validate before mutating anything.
    StateDecode {
        /// Which serialization flavor was being restored.
        kind: StateKind,
        /// Backend description of the decode failure.
        reason: String,
    },
    /// Any other backend failure (FFI fault, resource exhaustion, ...).
    Backend {
        /// Backend description of the failure.
        reason: String,
    },
}

impl fmt::Display for EmulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RomLoad { reason } => write!(f, "ROM load failed: {reason}"),
            Self::InvalidAction { action } => {
                write!(f, "emulator rejected action code {action}")
            }
            Self::StateDecode { kind, reason } => {
                write!(f, "{kind:?} state blob failed to decode: {reason}")
            }
            Self::Backend { reason } => write!(f, "emulator backend error: {reason}"),
        }
    }
}

impl Error for EmulatorError {}
