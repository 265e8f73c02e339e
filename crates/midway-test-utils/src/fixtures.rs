//! The scripted emulator fixture.

use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

use midway_core::{Action, Emulator, EmulatorError, LoggerMode, ObsKind, StateKind};

/// Shared log of every primitive action an emulator applied.
///
/// Tests keep a clone of the handle while the emulator itself is boxed
/// away inside a lane.
pub type ActionLog = Arc<Mutex<Vec<Action>>>;

const LCG_MUL: u64 = 6364136223846793005;
const LCG_INC: u64 = 1442695040888963407;

const PLANNING_TAG: u8 = 0x50;
const SYSTEM_TAG: u8 = 0x53;

/// A deterministic scripted emulator.
///
/// - `lives()` follows `lives_script`, indexed by actions applied since
///   the last `reset_game()` and clamped to the final entry.
/// - `is_terminal()` is true exactly when the scripted life count is 0.
/// - Observations are a pure function of `(resets, acts)`, so restoring
///   either state flavor reproduces them.
/// - Rewards are `reward_per_act`, optionally plus a component drawn from
///   an internal LCG. The LCG is the emulator's "console randomness": it
///   is included in System state blobs and excluded from Planning blobs.
pub struct ScriptedEmulator {
    lives_script: Vec<u32>,
    screen_len: usize,
    ram_len: usize,
    reward_per_act: i64,
    stochastic_reward: bool,
    legal: SmallVec<[Action; 18]>,
    minimal: SmallVec<[Action; 18]>,
    fail_after: Option<usize>,
    noise_seed: u64,

    acts: u32,
    resets: u32,
    total_applies: usize,
    noise: u64,
    logger_mode: LoggerMode,
    log: Option<ActionLog>,
}

impl ScriptedEmulator {
    /// Build an emulator whose life counter follows `lives_script`.
    ///
    /// # Panics
    ///
    /// Panics if the script is empty.
    pub fn new(lives_script: impl Into<Vec<u32>>) -> Self {
        let lives_script = lives_script.into();
        assert!(!lives_script.is_empty(), "lives script must not be empty");
        Self {
            lives_script,
            screen_len: 8,
            ram_len: 4,
            reward_per_act: 1,
            stochastic_reward: false,
            legal: (0..18).map(Action).collect(),
            minimal: (0..4).map(Action).collect(),
            fail_after: None,
            noise_seed: 0x5EED,
            acts: 0,
            resets: 0,
            total_applies: 0,
            noise: 0x5EED,
            logger_mode: LoggerMode::default(),
            log: None,
        }
    }

    /// Convenience: a single-life script of the given length. Terminal
    /// after `steps_until_terminal` actions.
    pub fn single_life(steps_until_terminal: usize) -> Self {
        let mut script = vec![1; steps_until_terminal];
        script.push(0);
        Self::new(script)
    }

    /// Set the screen observation length in bytes.
    pub fn with_screen_len(mut self, len: usize) -> Self {
        self.screen_len = len;
        self
    }

    /// Set the RAM observation length in bytes.
    pub fn with_ram_len(mut self, len: usize) -> Self {
        self.ram_len = len;
        self
    }

    /// Set the deterministic per-action reward (default 1).
    pub fn with_reward_per_act(mut self, reward: i64) -> Self {
        self.reward_per_act = reward;
        self
    }

    /// Add an LCG-drawn component to every reward. Used to distinguish
    /// System from Planning state restores.
    pub fn with_stochastic_reward(mut self) -> Self {
        self.stochastic_reward = true;
        self
    }

    /// Seed the internal console-randomness LCG (default `0x5EED`).
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = seed;
        self.noise = seed;
        self
    }

    /// Override the minimal action set (default `[0, 1, 2, 3]`).
    pub fn with_minimal_actions(mut self, actions: impl IntoIterator<Item = u32>) -> Self {
        self.minimal = actions.into_iter().map(Action).collect();
        self
    }

    /// Fail every `apply_action` once this many have been applied in total.
    pub fn failing_after(mut self, applies: usize) -> Self {
        self.fail_after = Some(applies);
        self
    }

    /// Record every applied action into the given shared log.
    pub fn with_action_log(mut self, log: ActionLog) -> Self {
        self.log = Some(log);
        self
    }

    /// The configured logger mode (set by the engine at construction).
    pub fn logger_mode(&self) -> LoggerMode {
        self.logger_mode
    }

    fn script_index(&self) -> usize {
        (self.acts as usize).min(self.lives_script.len() - 1)
    }

    fn obs_byte(&self) -> u8 {
        self.resets.wrapping_mul(31).wrapping_add(self.acts) as u8
    }
}

impl Emulator for ScriptedEmulator {
    fn apply_action(&mut self, action: Action) -> Result<i64, EmulatorError> {
        if let Some(limit) = self.fail_after {
            if self.total_applies >= limit {
                return Err(EmulatorError::Backend {
                    reason: format!("scripted failure after {limit} actions"),
                });
            }
        }
        if !self.legal.contains(&action) {
            return Err(EmulatorError::InvalidAction { action });
        }
        if let Some(log) = &self.log {
            log.lock().unwrap().push(action);
        }
        self.total_applies += 1;
        self.acts = self.acts.saturating_add(1);
        self.noise = self.noise.wrapping_mul(LCG_MUL).wrapping_add(LCG_INC);
        let mut reward = self.reward_per_act;
        if self.stochastic_reward {
            reward += ((self.noise >> 33) % 3) as i64;
        }
        Ok(reward)
    }

    fn is_terminal(&self) -> bool {
        self.lives() == 0
    }

    fn lives(&self) -> u32 {
        self.lives_script[self.script_index()]
    }

    fn reset_game(&mut self) -> Result<(), EmulatorError> {
        // Console randomness deliberately survives resets, as on real
        // hardware.
        self.acts = 0;
        self.resets += 1;
        Ok(())
    }

    fn observe(&mut self, kind: ObsKind) -> Result<Vec<u8>, EmulatorError> {
        let byte = self.obs_byte();
        match kind {
            ObsKind::Screen => Ok(vec![byte; self.screen_len]),
            ObsKind::Memory => Ok(vec![byte.wrapping_add(0x80); self.ram_len]),
        }
    }

    fn frame_len(&self, kind: ObsKind) -> usize {
        match kind {
            ObsKind::Screen => self.screen_len,
            ObsKind::Memory => self.ram_len,
        }
    }

    fn legal_actions(&self) -> SmallVec<[Action; 18]> {
        self.legal.clone()
    }

    fn minimal_actions(&self) -> SmallVec<[Action; 18]> {
        self.minimal.clone()
    }

    fn encode_state(&self, kind: StateKind) -> Result<Vec<u8>, EmulatorError> {
        let (tag, with_noise) = match kind {
            StateKind::Planning => (PLANNING_TAG, false),
            StateKind::System => (SYSTEM_TAG, true),
        };
        let mut blob = Vec::with_capacity(17);
        blob.push(tag);
        blob.extend_from_slice(&self.acts.to_le_bytes());
        blob.extend_from_slice(&self.resets.to_le_bytes());
        if with_noise {
            blob.extend_from_slice(&self.noise.to_le_bytes());
        }
        Ok(blob)
    }

    fn restore_state(&mut self, kind: StateKind, blob: &[u8]) -> Result<(), EmulatorError> {
        let decode_err = |reason: &str| EmulatorError::StateDecode {
            kind,
            reason: reason.to_string(),
        };
        let (tag, expected_len) = match kind {
            StateKind::Planning => (PLANNING_TAG, 9),
            StateKind::System => (SYSTEM_TAG, 17),
        };
        // Fully validate before mutating anything.
        if blob.len() != expected_len {
            return Err(decode_err("wrong blob length"));
        }
        if blob[0] != tag {
            return Err(decode_err("flavor tag mismatch"));
        }
        let acts = u32::from_le_bytes(blob[1..5].try_into().unwrap());
        let resets = u32::from_le_bytes(blob[5..9].try_into().unwrap());
        self.acts = acts;
        self.resets = resets;
        if kind == StateKind::System {
            self.noise = u64::from_le_bytes(blob[9..17].try_into().unwrap());
        }
        Ok(())
    }

    fn duplicate(&self) -> Result<Box<dyn Emulator>, EmulatorError> {
        Ok(Box::new(Self {
            lives_script: self.lives_script.clone(),
            screen_len: self.screen_len,
            ram_len: self.ram_len,
            reward_per_act: self.reward_per_act,
            stochastic_reward: self.stochastic_reward,
            legal: self.legal.clone(),
            minimal: self.minimal.clone(),
            fail_after: self.fail_after,
            noise_seed: self.noise_seed,
            acts: 0,
            resets: 0,
            total_applies: 0,
            noise: self.noise_seed,
            logger_mode: self.logger_mode,
            log: self.log.clone(),
        }))
    }

    fn set_logger_mode(&mut self, mode: LoggerMode) {
        self.logger_mode = mode;
    }
}
