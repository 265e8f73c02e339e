//! Batched environment orchestrating N emulator lanes.
//!
//! [`BatchedEnv`] owns an ordered collection of [`Lane`]s and fans each
//! `step`/`reset` call out across them, assembling the per-lane results
//! into one index-aligned [`BatchResult`].
//!
//! # Concurrency
//!
//! One lane-stepping function serves both execution modes; the orchestrator
//! chooses fan-out strategy only, so the two paths cannot drift in
//! behavior. In parallel mode a fixed pool of scoped worker threads pulls
//! `(index, &mut Lane)` jobs from a crossbeam channel and sends results
//! back tagged with their lane index; each result lands in its pre-sized
//! output slot, and the scope join is the completion barrier. No state is
//! shared between lanes, so the modes produce bit-identical results for
//! identical seeds — only wall-clock latency differs.
//!
//! # Error policy
//!
//! A batched call either produces a full batch or fails as a whole: every
//! lane performs its work first, then the call fails with the lowest
//! failing lane index and no partial [`BatchResult`] is ever returned.
//! Driving all lanes before reporting keeps post-abort lane states
//! identical across both execution modes. Within a single call no two
//! orchestrated operations are ever in flight concurrently (`&mut self`
//! enforces this at compile time).

use std::error::Error;
use std::fmt;

use smallvec::SmallVec;

use midway_core::{Action, Emulator, EmulatorError, StateKind};

use crate::config::{ActionSetKind, ConfigError, EnvConfig, ExecutionMode};
use crate::lane::{Lane, StepResult};

// Compile-time assertion: a batched env can move between threads.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<BatchedEnv>();
    }
};

// ── Error type ──────────────────────────────────────────────────

/// Error from a batched operation.
#[derive(Debug)]
pub enum BatchError {
    /// Configuration validation failed.
    Config(ConfigError),
    /// A lane's emulator failed, annotated with the lane index.
    Emulator {
        /// Index of the failing lane (0-based).
        lane: usize,
        /// The underlying emulator error.
        source: EmulatorError,
    },
    /// The action batch length does not match the lane count.
    ActionCountMismatch {
        /// Number of actions supplied.
        supplied: usize,
        /// The lane count.
        expected: usize,
    },
    /// An action index does not address the shared action set.
    ActionIndexOutOfRange {
        /// Lane the bad index was supplied for.
        lane: usize,
        /// The out-of-range index.
        index: usize,
        /// Size of the shared action set.
        set_size: usize,
    },
    /// A snapshot's per-lane state count does not match the lane count.
    SnapshotCountMismatch {
        /// Number of per-lane states in the snapshot.
        supplied: usize,
        /// The lane count.
        expected: usize,
    },
    /// A snapshot of the wrong serialization flavor was supplied.
    SnapshotKindMismatch {
        /// The flavor the call requires.
        expected: StateKind,
        /// The snapshot's actual flavor.
        found: StateKind,
    },
    /// A lane's emulator produces frames of a different length than
    /// lane 0's, so the batch cannot share one observation shape.
    FrameLenMismatch {
        /// Index of the first disagreeing lane.
        lane: usize,
        /// That lane's frame length in bytes.
        found: usize,
        /// Lane 0's frame length in bytes.
        expected: usize,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Emulator { lane, source } => write!(f, "lane {lane}: {source}"),
            Self::ActionCountMismatch { supplied, expected } => {
                write!(f, "got {supplied} actions for {expected} lanes")
            }
            Self::ActionIndexOutOfRange {
                lane,
                index,
                set_size,
            } => write!(
                f,
                "lane {lane}: action index {index} out of range (action set size {set_size})"
            ),
            Self::SnapshotCountMismatch { supplied, expected } => {
                write!(f, "snapshot has {supplied} lane states, expected {expected}")
            }
            Self::SnapshotKindMismatch { expected, found } => {
                write!(f, "expected a {expected:?} snapshot, got {found:?}")
            }
            Self::FrameLenMismatch {
                lane,
                found,
                expected,
            } => write!(
                f,
                "lane {lane} produces {found}-byte frames, lane 0 produces {expected}; \
                 all lanes must share one observation shape"
            ),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Emulator { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for BatchError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ── Result types ────────────────────────────────────────────────

/// Ordered per-lane step results, index-aligned with the action batch.
///
/// Always exactly one [`StepResult`] per lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchResult {
    steps: Vec<StepResult>,
}

impl BatchResult {
    /// Number of lanes in the batch.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the batch is empty (never true for a constructed env).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The result for one lane.
    pub fn get(&self, lane: usize) -> Option<&StepResult> {
        self.steps.get(lane)
    }

    /// Iterate results in lane order.
    pub fn iter(&self) -> std::slice::Iter<'_, StepResult> {
        self.steps.iter()
    }

    /// All results as a slice, in lane order.
    pub fn as_slice(&self) -> &[StepResult] {
        &self.steps
    }
}

impl std::ops::Index<usize> for BatchResult {
    type Output = StepResult;

    fn index(&self, lane: usize) -> &StepResult {
        &self.steps[lane]
    }
}

/// Bulk-encoded per-lane emulator states of one serialization flavor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchSnapshot {
    /// Which flavor every contained blob was encoded with.
    pub kind: StateKind,
    /// One opaque state blob per lane, in lane order.
    pub states: Vec<Vec<u8>>,
}

// ── BatchedEnv ──────────────────────────────────────────────────

/// Batched environment owning N emulator lanes.
///
/// Created from N emulators and an [`EnvConfig`]. All emulators must
/// agree on observation length, and on the minimal action set when
/// [`ActionSetKind::Minimal`] is configured (validated at construction).
pub struct BatchedEnv {
    lanes: Vec<Lane>,
    actions: SmallVec<[Action; 18]>,
    frame_len: usize,
    config: EnvConfig,
    last: Option<BatchResult>,
}

impl BatchedEnv {
    /// Create a batched environment from N emulators.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Config`] for an invalid configuration, zero
    /// emulators, or lanes that disagree on the minimal action set, and
    /// [`BatchError::FrameLenMismatch`] if lanes disagree on observation
    /// length.
    pub fn new(emulators: Vec<Box<dyn Emulator>>, config: EnvConfig) -> Result<Self, BatchError> {
        config.validate()?;
        if emulators.is_empty() {
            return Err(ConfigError::NoLanes.into());
        }

        let actions = match config.action_set {
            ActionSetKind::Legal => emulators[0].legal_actions(),
            ActionSetKind::Minimal => {
                let reference = emulators[0].minimal_actions();
                for (i, emu) in emulators.iter().enumerate().skip(1) {
                    if emu.minimal_actions() != reference {
                        return Err(ConfigError::ActionSetMismatch { lane: i }.into());
                    }
                }
                reference
            }
        };

        let frame_len = emulators[0].frame_len(config.obs_kind);
        for (i, emu) in emulators.iter().enumerate().skip(1) {
            let found = emu.frame_len(config.obs_kind);
            if found != frame_len {
                return Err(BatchError::FrameLenMismatch {
                    lane: i,
                    found,
                    expected: frame_len,
                });
            }
        }

        let lanes = emulators
            .into_iter()
            .enumerate()
            .map(|(i, emu)| Lane::new(emu, &config, config.seed.wrapping_add(i as u64)))
            .collect();

        Ok(Self {
            lanes,
            actions,
            frame_len,
            config,
            last: None,
        })
    }

    /// Step every lane with its action and return the assembled batch.
    ///
    /// `action_indices` are indices into [`action_set()`](Self::action_set),
    /// one per lane. Lanes that owe a reset discard their action and reset
    /// instead (see [`Lane::step`]).
    ///
    /// # Errors
    ///
    /// Index validation happens before any lane is touched, so a malformed
    /// batch never partially applies. An emulator failure aborts the whole
    /// call with the lowest failing lane index; the other lanes still
    /// complete their step first, in both execution modes.
    pub fn step(&mut self, action_indices: &[usize]) -> Result<&BatchResult, BatchError> {
        let n = self.lanes.len();
        if action_indices.len() != n {
            return Err(BatchError::ActionCountMismatch {
                supplied: action_indices.len(),
                expected: n,
            });
        }
        let mut resolved = Vec::with_capacity(n);
        for (lane, &index) in action_indices.iter().enumerate() {
            let action = self.actions.get(index).copied().ok_or({
                BatchError::ActionIndexOutOfRange {
                    lane,
                    index,
                    set_size: self.actions.len(),
                }
            })?;
            resolved.push(action);
        }

        let batch = self.run_batch(|idx, lane| lane.step(resolved[idx]))?;
        Ok(self.last.insert(batch))
    }

    /// Reset every lane and return the batch of first observations.
    pub fn reset(&mut self) -> Result<&BatchResult, BatchError> {
        let batch = self.run_batch(|_, lane| lane.reset())?;
        Ok(self.last.insert(batch))
    }

    /// The most recently produced batch, computing an initial reset
    /// lazily if no batch exists yet.
    pub fn current_batch(&mut self) -> Result<&BatchResult, BatchError> {
        if self.last.is_none() {
            self.reset()?;
        }
        Ok(self.last.as_ref().expect("reset populated the batch"))
    }

    /// Dispatch one lane operation across all lanes per the configured
    /// execution mode and assemble results in lane order.
    fn run_batch<F>(&mut self, op: F) -> Result<BatchResult, BatchError>
    where
        F: Fn(usize, &mut Lane) -> Result<StepResult, EmulatorError> + Sync,
    {
        let n = self.lanes.len();
        let workers = self.config.execution.resolved_worker_count().min(n);
        let mut slots: Vec<Option<Result<StepResult, EmulatorError>>> =
            (0..n).map(|_| None).collect();

        if matches!(self.config.execution, ExecutionMode::Sequential) || workers <= 1 {
            // Every lane runs even if an earlier one failed, so an aborted
            // batch leaves lane states identical to the parallel path.
            for (idx, lane) in self.lanes.iter_mut().enumerate() {
                slots[idx] = Some(op(idx, lane));
            }
            return Self::assemble(slots);
        }

        std::thread::scope(|scope| {
            let (job_tx, job_rx) = crossbeam_channel::bounded(n);
            let (result_tx, result_rx) = crossbeam_channel::bounded(n);

            for job in self.lanes.iter_mut().enumerate() {
                job_tx.send(job).expect("job queue sized to lane count");
            }
            // Close the queue so workers drain it and exit.
            drop(job_tx);

            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let op = &op;
                scope.spawn(move || {
                    for (idx, lane) in job_rx.iter() {
                        if result_tx.send((idx, op(idx, lane))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            // Each worker writes a distinct pre-sized slot; completion of
            // this loop (all senders dropped) is the batch barrier.
            for (idx, outcome) in result_rx.iter() {
                slots[idx] = Some(outcome);
            }
        });

        Self::assemble(slots)
    }

    /// Fold per-lane outcomes into a batch, failing with the lowest
    /// failing lane index. Shared by both execution modes so their error
    /// reporting cannot drift.
    fn assemble(
        slots: Vec<Option<Result<StepResult, EmulatorError>>>,
    ) -> Result<BatchResult, BatchError> {
        let mut steps = Vec::with_capacity(slots.len());
        let mut first_err: Option<BatchError> = None;
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot.expect("every lane job produced a result") {
                Ok(step) => steps.push(step),
                Err(source) => {
                    if first_err.is_none() {
                        first_err = Some(BatchError::Emulator { lane: idx, source });
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(BatchResult { steps }),
        }
    }

    /// An independent environment with freshly duplicated emulators (same
    /// configuration, no in-flight episode progress) and the same per-lane
    /// seeds. The original is not disturbed.
    pub fn try_clone(&self) -> Result<Self, BatchError> {
        let mut lanes = Vec::with_capacity(self.lanes.len());
        for (idx, lane) in self.lanes.iter().enumerate() {
            let copy = lane
                .duplicate(&self.config)
                .map_err(|source| BatchError::Emulator { lane: idx, source })?;
            lanes.push(copy);
        }
        Ok(Self {
            lanes,
            actions: self.actions.clone(),
            frame_len: self.frame_len,
            config: self.config.clone(),
            last: None,
        })
    }

    // ── State snapshot / restore ─────────────────────────────

    /// Bulk-encode every lane's planning state (excludes emulator
    /// pseudo-randomness).
    pub fn state_snapshot(&self) -> Result<BatchSnapshot, BatchError> {
        self.snapshot_inner(StateKind::Planning)
    }

    /// Bulk-encode every lane's system state (includes emulator
    /// pseudo-randomness; suitable for durable serialization).
    pub fn system_state_snapshot(&self) -> Result<BatchSnapshot, BatchError> {
        self.snapshot_inner(StateKind::System)
    }

    /// Restore a planning-state snapshot produced by
    /// [`state_snapshot()`](Self::state_snapshot).
    ///
    /// Snapshot flavor and lane count are checked before any lane is
    /// touched. Lanes then restore in index order; if a blob fails to
    /// decode, lanes before the failing index keep their restored state
    /// while the failing lane and all later lanes are unchanged.
    pub fn restore_state(&mut self, snapshot: &BatchSnapshot) -> Result<(), BatchError> {
        self.restore_inner(StateKind::Planning, snapshot)
    }

    /// Restore a system-state snapshot produced by
    /// [`system_state_snapshot()`](Self::system_state_snapshot).
    pub fn restore_system_state(&mut self, snapshot: &BatchSnapshot) -> Result<(), BatchError> {
        self.restore_inner(StateKind::System, snapshot)
    }

    fn snapshot_inner(&self, kind: StateKind) -> Result<BatchSnapshot, BatchError> {
        let mut states = Vec::with_capacity(self.lanes.len());
        for (idx, lane) in self.lanes.iter().enumerate() {
            let blob = lane
                .snapshot(kind)
                .map_err(|source| BatchError::Emulator { lane: idx, source })?;
            states.push(blob);
        }
        Ok(BatchSnapshot { kind, states })
    }

    fn restore_inner(&mut self, kind: StateKind, snapshot: &BatchSnapshot) -> Result<(), BatchError> {
        if snapshot.kind != kind {
            return Err(BatchError::SnapshotKindMismatch {
                expected: kind,
                found: snapshot.kind,
            });
        }
        let n = self.lanes.len();
        if snapshot.states.len() != n {
            return Err(BatchError::SnapshotCountMismatch {
                supplied: snapshot.states.len(),
                expected: n,
            });
        }
        for (idx, (lane, blob)) in self.lanes.iter_mut().zip(&snapshot.states).enumerate() {
            lane.restore(kind, blob)
                .map_err(|source| BatchError::Emulator { lane: idx, source })?;
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────

    /// Number of lanes in the batch.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// The shared action set the agent indexes into.
    pub fn action_set(&self) -> &[Action] {
        &self.actions
    }

    /// Length in bytes of one raw frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Length in bytes of one stacked observation
    /// (`frame_len × stack_depth`).
    pub fn observation_len(&self) -> usize {
        self.frame_len * self.config.stack_depth
    }

    /// Whether a specific lane currently owes a reset.
    pub fn lane_needs_reset(&self, lane: usize) -> Option<bool> {
        self.lanes.get(lane).map(Lane::needs_reset)
    }

    /// A specific lane's life bookkeeping.
    pub fn lane_lives(&self, lane: usize) -> Option<u32> {
        self.lanes.get(lane).map(Lane::lives)
    }
}

impl fmt::Debug for BatchedEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedEnv")
            .field("lanes", &self.lanes.len())
            .field("action_set", &self.actions.len())
            .field("frame_len", &self.frame_len)
            .field("execution", &self.config.execution)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::Boundary;
    use crate::skip::SkipPolicy;
    use midway_test_utils::ScriptedEmulator;

    fn emulators(count: usize) -> Vec<Box<dyn Emulator>> {
        (0..count)
            .map(|i| {
                Box::new(
                    ScriptedEmulator::new([9; 64]).with_reward_per_act(i as i64 + 1),
                ) as Box<dyn Emulator>
            })
            .collect()
    }

    fn config() -> EnvConfig {
        EnvConfig {
            stack_depth: 2,
            frame_skip: SkipPolicy::None,
            reset_noops: SkipPolicy::None,
            ..EnvConfig::default()
        }
    }

    // ── Construction ─────────────────────────────────────────

    #[test]
    fn new_zero_emulators_is_error() {
        let result = BatchedEnv::new(vec![], config());
        assert!(matches!(
            result,
            Err(BatchError::Config(ConfigError::NoLanes))
        ));
    }

    #[test]
    fn new_invalid_config_is_error() {
        let cfg = EnvConfig {
            stack_depth: 0,
            ..config()
        };
        let result = BatchedEnv::new(emulators(2), cfg);
        assert!(matches!(result, Err(BatchError::Config(_))));
    }

    #[test]
    fn mismatched_minimal_action_sets_rejected() {
        let cfg = EnvConfig {
            action_set: ActionSetKind::Minimal,
            ..config()
        };
        let emus: Vec<Box<dyn Emulator>> = vec![
            Box::new(ScriptedEmulator::new([9; 8])),
            Box::new(ScriptedEmulator::new([9; 8]).with_minimal_actions([0, 1])),
        ];
        let result = BatchedEnv::new(emus, cfg);
        assert!(matches!(
            result,
            Err(BatchError::Config(ConfigError::ActionSetMismatch { lane: 1 }))
        ));
    }

    #[test]
    fn mismatched_frame_lengths_rejected() {
        let emus: Vec<Box<dyn Emulator>> = vec![
            Box::new(ScriptedEmulator::new([9; 8]).with_screen_len(8)),
            Box::new(ScriptedEmulator::new([9; 8]).with_screen_len(16)),
        ];
        let result = BatchedEnv::new(emus, config());
        assert!(matches!(
            result,
            Err(BatchError::FrameLenMismatch {
                lane: 1,
                found: 16,
                expected: 8
            })
        ));
    }

    #[test]
    fn minimal_action_set_exposed_when_uniform() {
        let cfg = EnvConfig {
            action_set: ActionSetKind::Minimal,
            ..config()
        };
        let env = BatchedEnv::new(emulators(3), cfg).unwrap();
        assert_eq!(env.action_set().len(), 4);
        assert_eq!(env.lane_count(), 3);
    }

    #[test]
    fn observation_len_is_frame_times_depth() {
        let env = BatchedEnv::new(emulators(1), config()).unwrap();
        assert_eq!(env.frame_len(), 8);
        assert_eq!(env.observation_len(), 16);
    }

    // ── Reset and step shape ─────────────────────────────────

    #[test]
    fn reset_returns_one_first_per_lane() {
        let mut env = BatchedEnv::new(emulators(5), config()).unwrap();
        let batch = env.reset().unwrap();
        assert_eq!(batch.len(), 5);
        for step in batch.iter() {
            assert_eq!(step.boundary, Boundary::First);
            assert_eq!(step.reward, 0);
        }
    }

    #[test]
    fn step_results_are_index_aligned() {
        // Lane i rewards i+1 per action, so alignment is visible in the
        // reward column.
        let mut env = BatchedEnv::new(emulators(4), config()).unwrap();
        env.reset().unwrap();
        let batch = env.step(&[0, 0, 0, 0]).unwrap();
        let rewards: Vec<i64> = batch.iter().map(|s| s.reward).collect();
        assert_eq!(rewards, vec![1, 2, 3, 4]);
    }

    #[test]
    fn step_on_fresh_env_resets_every_lane() {
        let mut env = BatchedEnv::new(emulators(3), config()).unwrap();
        let batch = env.step(&[1, 1, 1]).unwrap();
        for step in batch.iter() {
            assert_eq!(step.boundary, Boundary::First);
        }
    }

    // ── Pre-flight validation (atomicity) ────────────────────

    #[test]
    fn wrong_action_count_is_error_before_any_lane_moves() {
        let mut env = BatchedEnv::new(emulators(2), config()).unwrap();
        env.reset().unwrap();
        let result = env.step(&[0]);
        assert!(matches!(
            result,
            Err(BatchError::ActionCountMismatch {
                supplied: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn out_of_range_action_index_does_not_step_lanes() {
        let mut env = BatchedEnv::new(emulators(2), config()).unwrap();
        let result = env.step(&[0, 99]);
        assert!(matches!(
            result,
            Err(BatchError::ActionIndexOutOfRange { lane: 1, index: 99, .. })
        ));
        // Lanes are untouched: both still owe their initial reset.
        assert_eq!(env.lane_needs_reset(0), Some(true));
        assert_eq!(env.lane_needs_reset(1), Some(true));
    }

    // ── current_batch ────────────────────────────────────────

    #[test]
    fn current_batch_performs_lazy_initial_reset() {
        let mut env = BatchedEnv::new(emulators(2), config()).unwrap();
        let batch = env.current_batch().unwrap().clone();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].boundary, Boundary::First);
    }

    #[test]
    fn current_batch_returns_most_recent_step() {
        let mut env = BatchedEnv::new(emulators(2), config()).unwrap();
        env.reset().unwrap();
        let stepped = env.step(&[0, 0]).unwrap().clone();
        let current = env.current_batch().unwrap();
        assert_eq!(*current, stepped);
    }

    // ── Error abort policy ───────────────────────────────────

    #[test]
    fn lane_failure_aborts_whole_call() {
        let emus: Vec<Box<dyn Emulator>> = vec![
            Box::new(ScriptedEmulator::new([9; 64])),
            Box::new(ScriptedEmulator::new([9; 64]).failing_after(0)),
        ];
        let mut env = BatchedEnv::new(emus, config()).unwrap();
        env.reset().unwrap();
        let before = env.current_batch().unwrap().clone();

        let result = env.step(&[0, 0]);
        assert!(matches!(result, Err(BatchError::Emulator { lane: 1, .. })));
        // No partial batch was published.
        assert_eq!(*env.current_batch().unwrap(), before);
    }

    #[test]
    fn aborted_batch_leaves_identical_lane_states_in_both_modes() {
        // One lane fails mid-batch. The surviving lanes must still step in
        // both modes, otherwise an aborted call would leave sequential and
        // parallel envs holding different emulator states.
        let build = |execution| {
            let emus: Vec<Box<dyn Emulator>> = vec![
                Box::new(ScriptedEmulator::new([9; 64])),
                Box::new(ScriptedEmulator::new([9; 64]).failing_after(0)),
                Box::new(ScriptedEmulator::new([9; 64])),
            ];
            let cfg = EnvConfig {
                execution,
                ..config()
            };
            BatchedEnv::new(emus, cfg).unwrap()
        };
        let mut seq = build(ExecutionMode::Sequential);
        let mut par = build(ExecutionMode::Parallel { workers: Some(2) });
        seq.reset().unwrap();
        par.reset().unwrap();

        let seq_err = seq.step(&[0, 0, 0]);
        let par_err = par.step(&[0, 0, 0]);
        assert!(matches!(seq_err, Err(BatchError::Emulator { lane: 1, .. })));
        assert!(matches!(par_err, Err(BatchError::Emulator { lane: 1, .. })));

        // Lane 2 sits past the failing index; its state advanced the same
        // way in both modes.
        assert_eq!(
            seq.state_snapshot().unwrap(),
            par.state_snapshot().unwrap()
        );
    }

    #[test]
    fn parallel_failure_reports_lowest_lane_index() {
        let emus: Vec<Box<dyn Emulator>> = (0..6)
            .map(|i| {
                let emu = ScriptedEmulator::new([9; 64]);
                let emu = if i >= 3 { emu.failing_after(0) } else { emu };
                Box::new(emu) as Box<dyn Emulator>
            })
            .collect();
        let cfg = EnvConfig {
            execution: ExecutionMode::Parallel { workers: Some(3) },
            ..config()
        };
        let mut env = BatchedEnv::new(emus, cfg).unwrap();
        env.reset().unwrap();
        let result = env.step(&[0; 6]);
        assert!(matches!(result, Err(BatchError::Emulator { lane: 3, .. })));
    }

    // ── Parallel mode smoke test ─────────────────────────────

    #[test]
    fn parallel_step_matches_sequential_shape() {
        let cfg = EnvConfig {
            execution: ExecutionMode::Parallel { workers: Some(2) },
            ..config()
        };
        let mut env = BatchedEnv::new(emulators(4), cfg).unwrap();
        env.reset().unwrap();
        let batch = env.step(&[0, 0, 0, 0]).unwrap();
        assert_eq!(batch.len(), 4);
        let rewards: Vec<i64> = batch.iter().map(|s| s.reward).collect();
        assert_eq!(rewards, vec![1, 2, 3, 4]);
    }

    // ── Clone ────────────────────────────────────────────────

    #[test]
    fn try_clone_is_fresh_and_independent() {
        let mut env = BatchedEnv::new(emulators(2), config()).unwrap();
        env.reset().unwrap();
        for _ in 0..5 {
            env.step(&[0, 0]).unwrap();
        }

        let mut copy = env.try_clone().unwrap();
        // The clone starts unstarted: its lanes owe their initial reset.
        assert_eq!(copy.lane_needs_reset(0), Some(true));
        let copy_batch = copy.current_batch().unwrap();
        assert_eq!(copy_batch[0].boundary, Boundary::First);

        // Stepping the clone does not disturb the original.
        copy.step(&[0, 0]).unwrap();
        env.step(&[0, 0]).unwrap();
        assert_eq!(env.lane_count(), 2);
    }

    // ── Snapshot / restore ───────────────────────────────────

    #[test]
    fn restore_refreshes_lane_bookkeeping() {
        let emus: Vec<Box<dyn Emulator>> =
            vec![Box::new(ScriptedEmulator::new([2, 1, 0]))];
        let mut env = BatchedEnv::new(emus, config()).unwrap();
        env.reset().unwrap();
        let snapshot = env.state_snapshot().unwrap();

        env.step(&[0]).unwrap();
        env.step(&[0]).unwrap();
        assert_eq!(env.lane_needs_reset(0), Some(true));

        env.restore_state(&snapshot).unwrap();
        assert_eq!(env.lane_needs_reset(0), Some(false));
        assert_eq!(env.lane_lives(0), Some(2));
    }

    #[test]
    fn snapshot_kind_mismatch_rejected() {
        let mut env = BatchedEnv::new(emulators(1), config()).unwrap();
        env.reset().unwrap();
        let planning = env.state_snapshot().unwrap();
        let result = env.restore_system_state(&planning);
        assert!(matches!(
            result,
            Err(BatchError::SnapshotKindMismatch { .. })
        ));
    }

    #[test]
    fn snapshot_count_mismatch_rejected() {
        let mut env = BatchedEnv::new(emulators(2), config()).unwrap();
        env.reset().unwrap();
        let mut snapshot = env.state_snapshot().unwrap();
        snapshot.states.pop();
        let result = env.restore_state(&snapshot);
        assert!(matches!(
            result,
            Err(BatchError::SnapshotCountMismatch {
                supplied: 1,
                expected: 2
            })
        ));
    }
}
