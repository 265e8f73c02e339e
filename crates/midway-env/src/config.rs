//! Environment configuration, validation, and error types.
//!
//! [`EnvConfig`] is the builder-input for constructing a
//! [`BatchedEnv`](crate::batch::BatchedEnv).
//! [`validate()`](EnvConfig::validate) checks structural invariants up
//! front so construction never partially applies.

use std::error::Error;
use std::fmt;

use midway_core::{LoggerMode, ObsKind};

use crate::skip::SkipPolicy;

// ── ExecutionMode ───────────────────────────────────────────────

/// How the orchestrator fans lane work out per batched call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Lanes processed one at a time, in index order.
    Sequential,
    /// Lanes processed by a fixed pool of worker threads.
    ///
    /// Observably equivalent to [`Sequential`](ExecutionMode::Sequential)
    /// for identical seeds; only wall-clock latency differs.
    Parallel {
        /// Worker thread count. `None` = auto-detect
        /// (`available_parallelism / 2`, clamped to `[2, 16]`).
        workers: Option<usize>,
    },
}

impl ExecutionMode {
    /// Resolve the actual worker count for parallel mode, applying
    /// auto-detection if unset. Explicit values are clamped to `[1, 64]`.
    /// Sequential mode resolves to 1.
    pub fn resolved_worker_count(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { workers: Some(n) } => (*n).clamp(1, 64),
            Self::Parallel { workers: None } => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                (cpus / 2).clamp(2, 16)
            }
        }
    }
}

// ── ActionSetKind ───────────────────────────────────────────────

/// Which emulator action set the environment exposes to the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionSetKind {
    /// The full action set the console supports.
    Legal,
    /// The subset of actions that actually affects the loaded game.
    /// Requires every lane's emulator to report the same subset.
    Minimal,
}

// ── ConfigError ─────────────────────────────────────────────────

/// Errors detected during [`EnvConfig::validate()`] or batched-env
/// construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Stack depth is zero.
    ZeroStackDepth,
    /// The frame-skip policy can draw a zero step count, which would
    /// apply no action at all.
    ZeroStepSkip,
    /// Parallel mode configured with an explicit worker count of zero.
    ZeroWorkers,
    /// No emulators supplied to the constructor.
    NoLanes,
    /// Minimal action set requested but lanes disagree on its contents.
    ActionSetMismatch {
        /// Index of the first lane whose set differs from lane 0's.
        lane: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroStackDepth => write!(f, "stack_depth must be at least 1"),
            Self::ZeroStepSkip => {
                write!(f, "frame_skip must apply at least one action per step")
            }
            Self::ZeroWorkers => write!(f, "parallel worker count must be at least 1"),
            Self::NoLanes => write!(f, "at least one emulator is required"),
            Self::ActionSetMismatch { lane } => write!(
                f,
                "lane {lane} reports a different minimal action set than lane 0; \
                 all lanes must share one action set"
            ),
        }
    }
}

impl Error for ConfigError {}

// ── EnvConfig ───────────────────────────────────────────────────

/// Complete configuration for constructing a batched environment.
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// Number of recent frames concatenated into the agent-visible
    /// observation. Minimum 1.
    pub stack_depth: usize,
    /// How many times the caller's action is applied per step.
    pub frame_skip: SkipPolicy,
    /// How many no-op actions are applied after each reset.
    pub reset_noops: SkipPolicy,
    /// Treat a life loss as an episode boundary without resetting the game.
    pub episodic_lives: bool,
    /// Observation source: screen pixels or console RAM.
    pub obs_kind: ObsKind,
    /// Which action set the environment exposes.
    pub action_set: ActionSetKind,
    /// Sequential or parallel lane fan-out.
    pub execution: ExecutionMode,
    /// Base seed. Lane `i` seeds its private stream from
    /// `seed.wrapping_add(i)`.
    pub seed: u64,
    /// Logger verbosity pushed to every emulator at construction.
    pub logger_mode: LoggerMode,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            stack_depth: 4,
            frame_skip: SkipPolicy::Constant(4),
            reset_noops: SkipPolicy::None,
            episodic_lives: false,
            obs_kind: ObsKind::Screen,
            action_set: ActionSetKind::Legal,
            execution: ExecutionMode::Sequential,
            seed: 0,
            logger_mode: LoggerMode::default(),
        }
    }
}

impl EnvConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_depth == 0 {
            return Err(ConfigError::ZeroStackDepth);
        }
        if self.frame_skip.min_step_count() == 0 {
            return Err(ConfigError::ZeroStepSkip);
        }
        if let ExecutionMode::Parallel { workers: Some(0) } = self.execution {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}
