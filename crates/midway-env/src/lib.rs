//! Batched emulator environment for reinforcement-learning agents.
//!
//! Midway steps N independent emulator instances as one batch: the agent
//! supplies one action per lane, every lane advances through its
//! frame-skip/frame-stack pipeline, and the results come back as one
//! index-aligned batch. Lanes share nothing, so sequential and parallel
//! execution produce bit-identical results for identical seeds.
//!
//! # Quick start
//!
//! ```no_run
//! use midway_env::{BatchedEnv, EnvConfig};
//! # fn emulators() -> Vec<Box<dyn midway_core::Emulator>> { vec![] }
//!
//! # fn main() -> Result<(), midway_env::BatchError> {
//! let mut env = BatchedEnv::new(emulators(), EnvConfig::default())?;
//! let first = env.reset()?;
//! let actions = vec![0; first.len()];
//! let batch = env.step(&actions)?;
//! for (lane, step) in batch.iter().enumerate() {
//!     println!("lane {lane}: {:?} reward {}", step.boundary, step.reward);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate layout
//!
//! - [`config`] — [`EnvConfig`], execution modes, validation.
//! - [`skip`] — frame-skip and reset no-op draw policies.
//! - [`stack`] — the per-lane frame stack.
//! - [`lane`] — one emulator lane and its episode state machine.
//! - [`batch`] — the [`BatchedEnv`] orchestrator.
//!
//! Emulator backends implement [`midway_core::Emulator`]; this crate is
//! backend-agnostic.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod lane;
pub mod skip;
pub mod stack;

pub use batch::{BatchError, BatchResult, BatchSnapshot, BatchedEnv};
pub use config::{ActionSetKind, ConfigError, EnvConfig, ExecutionMode};
pub use lane::{Boundary, Lane, StepResult};
pub use skip::{PolicyError, SkipPolicy};
pub use stack::FrameStack;
