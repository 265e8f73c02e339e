//! The [`Emulator`] trait: everything the engine needs from a foreign
//! emulator core.
//!
//! The trait mirrors the C surface of the production emulator one-to-one
//! (act / game_over / lives / reset_game / screen and RAM capture / state
//! clone-and-encode in two flavors), with two deliberate departures:
//!
//! - Observation capture is a single [`observe()`](Emulator::observe) taking
//!   an [`ObsKind`] tag rather than one method per pixel source. The engine
//!   never needs both sources from the same step, and the tag keeps the
//!   dispatch data-driven.
//! - The logger verbosity knob is per-instance
//!   ([`set_logger_mode()`](Emulator::set_logger_mode)), not a process-wide
//!   static. The orchestrator owns the configured mode and pushes it to
//!   every emulator at construction.

use smallvec::SmallVec;

use crate::action::Action;
use crate::error::EmulatorError;

/// Which observation source to capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObsKind {
    /// Grayscale screen pixels, row-major, one byte per pixel.
    Screen,
    /// Console RAM contents, one byte per cell.
    Memory,
}

/// Which state-serialization flavor to encode or restore.
///
/// Both flavors round-trip losslessly through
/// [`encode_state`](Emulator::encode_state) /
/// [`restore_state`](Emulator::restore_state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// Excludes the emulator's pseudo-randomness. Restoring a planning
    /// state does not affect the emulator's future randomness draws, which
    /// makes it suitable for search/planning rollbacks.
    Planning,
    /// Includes the emulator's pseudo-randomness. Restoring a system state
    /// reproduces the exact future draw sequence, which makes it suitable
    /// for durable serialization.
    System,
}

/// Emulator logger verbosity.
///
/// Maps to the production core's 0/1/2 logger modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoggerMode {
    /// Everything, including per-frame diagnostics.
    Info,
    /// Warnings and errors only (the default).
    #[default]
    Warning,
    /// Errors only.
    Error,
}

/// One foreign emulator instance.
///
/// Each implementation owns exactly one underlying emulator resource,
/// released on drop. Instances are `Send` so a lane can be handed to a
/// worker thread, but nothing here is `Sync` — exclusive ownership by one
/// lane is the concurrency model.
pub trait Emulator: Send {
    /// Apply one primitive action and return the reward it produced.
    fn apply_action(&mut self, action: Action) -> Result<i64, EmulatorError>;

    /// Whether the current episode has ended (game over).
    fn is_terminal(&self) -> bool;

    /// Remaining lives in the current episode. Games without a life
    /// counter report 0 throughout.
    fn lives(&self) -> u32;

    /// Reset the emulator to the start of a new episode.
    fn reset_game(&mut self) -> Result<(), EmulatorError>;

    /// Capture the current raw observation for the given source.
    ///
    /// The returned buffer always has exactly
    /// [`frame_len(kind)`](Emulator::frame_len) bytes.
    fn observe(&mut self, kind: ObsKind) -> Result<Vec<u8>, EmulatorError>;

    /// Length in bytes of one raw observation for the given source
    /// (screen width × height, or RAM size). Constant for the lifetime
    /// of the instance.
    fn frame_len(&self, kind: ObsKind) -> usize;

    /// The full action set the loaded game accepts.
    fn legal_actions(&self) -> SmallVec<[Action; 18]>;

    /// The minimal action set: the subset of legal actions that actually
    /// affects the loaded game.
    fn minimal_actions(&self) -> SmallVec<[Action; 18]>;

    /// Encode the current emulator state as an opaque blob.
    fn encode_state(&self, kind: StateKind) -> Result<Vec<u8>, EmulatorError>;

    /// Restore a previously encoded state blob.
    ///
    /// On failure the emulator must be left exactly as it was —
    /// implementations decode and validate the whole blob before mutating
    /// any state.
    fn restore_state(&mut self, kind: StateKind, blob: &[u8]) -> Result<(), EmulatorError>;

    /// Create a fresh instance from the same configuration (same ROM,
    /// same settings), with no in-flight episode progress carried over.
    fn duplicate(&self) -> Result<Box<dyn Emulator>, EmulatorError>;

    /// Set this instance's logger verbosity.
    fn set_logger_mode(&mut self, mode: LoggerMode);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_mode_defaults_to_warning() {
        assert_eq!(LoggerMode::default(), LoggerMode::Warning);
    }
}
