//! Test utilities for Midway development.
//!
//! The engine is tested against [`ScriptedEmulator`], a deterministic
//! in-memory stand-in for the foreign emulator core. Its life counter
//! follows a script indexed by actions-since-reset, its observations are
//! a pure function of the episode position, and its "console randomness"
//! is a small LCG so the two state-serialization flavors can be told
//! apart in tests.

pub mod fixtures;

pub use fixtures::{ActionLog, ScriptedEmulator};
