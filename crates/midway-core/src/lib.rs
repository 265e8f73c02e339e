//! Core types and the emulator trait seam for the Midway batched environment.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! boundary between the orchestration engine (`midway-env`) and the foreign
//! emulator core: the [`Emulator`] trait, action and observation types, the
//! two state-serialization flavors, and the emulator error taxonomy.
//!
//! The actual emulator (an Atari 2600 core reached over FFI in production)
//! is deliberately opaque here. Everything the engine needs from it is
//! expressed through [`Emulator`], so the engine can be driven by scripted
//! fixtures in tests (`midway-test-utils`) and by real bindings elsewhere.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod emulator;
pub mod error;

pub use action::Action;
pub use emulator::{Emulator, LoggerMode, ObsKind, StateKind};
pub use error::EmulatorError;
