//! One emulator lane: a private emulator, a private random stream, a frame
//! stack, and the episode-lifecycle state machine.
//!
//! A [`Lane`] owns everything it mutates. Nothing here is shared with any
//! other lane or with the orchestrator, which is what makes the parallel
//! fan-out in [`BatchedEnv`](crate::batch::BatchedEnv) race-free by
//! construction.
//!
//! # Episode boundaries
//!
//! Each step or reset is classified with a [`Boundary`]:
//!
//! - [`First`](Boundary::First) — the synthetic step a reset produces.
//! - [`Transition`](Boundary::Transition) — an ordinary mid-episode step.
//! - [`LastTerminal`](Boundary::LastTerminal) — the game is over; the next
//!   step performs a full native reset.
//! - [`LastResettable`](Boundary::LastResettable) — a life was lost with
//!   the game still running (episodic-lives mode). The native reset is
//!   deliberately **not** performed, and deliberately not performed on the
//!   next call either: the next step applies the reset no-op sequence in
//!   place of the caller's action and classifies the outcome normally, so
//!   game continuity is preserved for multi-life games. The one-call delay
//!   determines which frame lands in the stack at the boundary and must
//!   not be collapsed into an eager reset.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use midway_core::{Action, Emulator, EmulatorError, ObsKind, StateKind};

use crate::config::EnvConfig;
use crate::skip::SkipPolicy;
use crate::stack::FrameStack;

// Compile-time assertion: lanes move into worker threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Lane>();
    }
};

// ── Boundary ────────────────────────────────────────────────────

/// Episode-boundary classification of one step result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// First observation of an episode, produced by a reset.
    First,
    /// Ordinary mid-episode step.
    Transition,
    /// True game over. The lane needs a full reset.
    LastTerminal,
    /// A life was lost but the game continues (episodic-lives mode).
    /// The lane applies the reset no-op sequence on its next step.
    LastResettable,
}

impl Boundary {
    /// Whether this boundary ends an episode for credit-assignment
    /// purposes (either flavor of last step).
    pub fn is_last(&self) -> bool {
        matches!(self, Self::LastTerminal | Self::LastResettable)
    }
}

// ── StepResult ──────────────────────────────────────────────────

/// Per-lane outcome of one orchestrated step or reset.
///
/// Immutable once produced; a fresh value is created on every call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepResult {
    /// Episode-boundary classification.
    pub boundary: Boundary,
    /// Stacked observation: the most recent `stack_depth` raw frames
    /// concatenated oldest-first.
    pub observation: Vec<u8>,
    /// Reward accumulated over however many primitive actions this call
    /// applied. Zero for resets.
    pub reward: i64,
}

// ── Lane ────────────────────────────────────────────────────────

/// What kind of reset the lane owes before it can act again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingReset {
    /// Native reset plus no-op sequence (game over, or never started).
    Full,
    /// No-op sequence only (life lost, game still running).
    Life,
}

/// One emulator lane and its private mutable state.
///
/// Created in the needs-reset state; the first `step` therefore behaves
/// as a reset regardless of the supplied action.
pub struct Lane {
    emulator: Box<dyn Emulator>,
    rng: ChaCha8Rng,
    stack: FrameStack,
    lives: u32,
    pending: Option<PendingReset>,
    seed: u64,

    frame_skip: SkipPolicy,
    reset_noops: SkipPolicy,
    episodic_lives: bool,
    obs_kind: ObsKind,
}

impl Lane {
    /// Build a lane around an emulator, seeding its private stream with
    /// `seed`. Pushes the configured logger mode to the emulator.
    pub fn new(mut emulator: Box<dyn Emulator>, config: &EnvConfig, seed: u64) -> Self {
        emulator.set_logger_mode(config.logger_mode);
        Self {
            emulator,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stack: FrameStack::new(config.stack_depth),
            lives: 0,
            pending: Some(PendingReset::Full),
            seed,
            frame_skip: config.frame_skip,
            reset_noops: config.reset_noops,
            episodic_lives: config.episodic_lives,
            obs_kind: config.obs_kind,
        }
    }

    /// Whether the most recent step ended an episode and no reset has
    /// happened since.
    pub fn needs_reset(&self) -> bool {
        self.pending.is_some()
    }

    /// The lane's current life bookkeeping.
    pub fn lives(&self) -> u32 {
        self.lives
    }

    /// The seed this lane's stream was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Perform a full reset: native emulator reset, then the configured
    /// no-op sequence, re-resetting if a no-op ends the episode (no-ops
    /// never observably terminate an episode).
    pub fn reset(&mut self) -> Result<StepResult, EmulatorError> {
        self.emulator.reset_game()?;
        let noops = self.reset_noops.reset_noop_count(&mut self.rng);
        for _ in 0..noops {
            self.emulator.apply_action(Action::NOOP)?;
            if self.emulator.is_terminal() {
                self.emulator.reset_game()?;
            }
        }
        self.lives = self.emulator.lives();
        self.pending = None;
        self.stack.clear();
        let frame = self.emulator.observe(self.obs_kind)?;
        self.stack.push(frame);
        Ok(StepResult {
            boundary: Boundary::First,
            observation: self.stack.stacked(),
            reward: 0,
        })
    }

    /// Perform one orchestrated step.
    ///
    /// If the lane owes a full reset, this behaves as [`reset()`](Self::reset)
    /// and the supplied action is discarded — resets always take priority
    /// so the batch never silently acts on a dead lane. If the lane owes a
    /// life reset, the reset no-op sequence is applied in place of the
    /// action (see the module docs for why this is delayed by one call).
    pub fn step(&mut self, action: Action) -> Result<StepResult, EmulatorError> {
        match self.pending {
            Some(PendingReset::Full) => self.reset(),
            Some(PendingReset::Life) => self.life_reset(),
            None => self.advance(action),
        }
    }

    /// The delayed soft reset after a life loss: no native reset, just the
    /// no-op sequence, then normal classification of wherever the game
    /// ended up.
    fn life_reset(&mut self) -> Result<StepResult, EmulatorError> {
        let noops = self.reset_noops.reset_noop_count(&mut self.rng);
        let mut reward = 0i64;
        for _ in 0..noops {
            reward += self.emulator.apply_action(Action::NOOP)?;
        }
        self.finish_step(reward)
    }

    fn advance(&mut self, action: Action) -> Result<StepResult, EmulatorError> {
        let count = self.frame_skip.step_count(&mut self.rng);
        let mut reward = 0i64;
        for _ in 0..count {
            reward += self.emulator.apply_action(action)?;
        }
        self.finish_step(reward)
    }

    /// Classify the post-action emulator state, update bookkeeping, and
    /// produce the step result. Classification priority: terminal, then
    /// life loss (episodic-lives mode), then ordinary transition.
    fn finish_step(&mut self, reward: i64) -> Result<StepResult, EmulatorError> {
        let raw_lives = self.emulator.lives();
        let boundary = if self.emulator.is_terminal() {
            self.pending = Some(PendingReset::Full);
            Boundary::LastTerminal
        } else if self.episodic_lives && raw_lives < self.lives && raw_lives > 0 {
            self.pending = Some(PendingReset::Life);
            // Decrement by exactly one rather than adopting the raw value:
            // losing several lives in one skip burst still yields one
            // LastResettable per orchestrated step.
            self.lives -= 1;
            Boundary::LastResettable
        } else {
            self.pending = None;
            self.lives = raw_lives;
            Boundary::Transition
        };
        let frame = self.emulator.observe(self.obs_kind)?;
        self.stack.push(frame);
        Ok(StepResult {
            boundary,
            observation: self.stack.stacked(),
            reward,
        })
    }

    /// Encode the emulator's state in the requested flavor.
    pub fn snapshot(&self, kind: StateKind) -> Result<Vec<u8>, EmulatorError> {
        self.emulator.encode_state(kind)
    }

    /// Restore a previously encoded emulator state and refresh the lane's
    /// bookkeeping from the restored emulator: lives are re-read rather
    /// than left stale, and the pending-reset marker is recomputed from
    /// the restored terminal flag.
    ///
    /// On decode failure the lane is left exactly as it was.
    pub fn restore(&mut self, kind: StateKind, blob: &[u8]) -> Result<(), EmulatorError> {
        self.emulator.restore_state(kind, blob)?;
        self.lives = self.emulator.lives();
        self.pending = if self.emulator.is_terminal() {
            Some(PendingReset::Full)
        } else {
            None
        };
        Ok(())
    }

    /// A fresh lane from the same emulator configuration and the same
    /// seed: new emulator instance, re-wound random stream, empty stack.
    pub fn duplicate(&self, config: &EnvConfig) -> Result<Lane, EmulatorError> {
        Ok(Lane::new(self.emulator.duplicate()?, config, self.seed))
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane")
            .field("lives", &self.lives)
            .field("needs_reset", &self.needs_reset())
            .field("seed", &self.seed)
            .field("stack_depth", &self.stack.depth())
            .finish()
    }
}
