//! Frame-skip and reset no-op count policies.
//!
//! A [`SkipPolicy`] decides how many primitive actions a lane applies per
//! orchestrated step ([`step_count`](SkipPolicy::step_count)) or how many
//! no-ops it applies after a reset
//! ([`reset_noop_count`](SkipPolicy::reset_noop_count)). Stochastic draws
//! come from the lane's own seeded stream, never a shared RNG, so per-lane
//! replay of a seed reproduces the exact count sequence.

use std::error::Error;
use std::fmt;

use rand::Rng;

// ── PolicyError ─────────────────────────────────────────────────

/// Errors detected when constructing a skip policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// Stochastic range with `min > max`.
    InvertedRange {
        /// Lower bound as configured.
        min: u32,
        /// Upper bound as configured.
        max: u32,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvertedRange { min, max } => {
                write!(f, "stochastic range inverted: min {min} > max {max}")
            }
        }
    }
}

impl Error for PolicyError {}

// ── UniformRange ────────────────────────────────────────────────

/// A validated inclusive `[min, max]` range for stochastic draws.
///
/// Construction is the only place range validity is checked; draws can
/// therefore never fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformRange {
    min: u32,
    max: u32,
}

impl UniformRange {
    /// Build a range, rejecting `min > max`.
    pub fn new(min: u32, max: u32) -> Result<Self, PolicyError> {
        if min > max {
            return Err(PolicyError::InvertedRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Inclusive lower bound.
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Inclusive upper bound.
    pub fn max(&self) -> u32 {
        self.max
    }

    fn draw(&self, rng: &mut impl Rng) -> u32 {
        // Degenerate ranges skip the RNG so they consume no stream state,
        // keeping Stochastic(n, n) bit-identical to Constant(n).
        if self.min == self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }
}

// ── SkipPolicy ──────────────────────────────────────────────────

/// How many primitive actions to apply per orchestrated step or reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipPolicy {
    /// No skipping: one action per step, zero no-ops per reset.
    None,
    /// A fixed count.
    Constant(u32),
    /// A uniform random count in the given inclusive range, drawn from
    /// the lane's private stream.
    Stochastic(UniformRange),
}

impl SkipPolicy {
    /// Convenience constructor for [`SkipPolicy::Stochastic`].
    pub fn stochastic(min: u32, max: u32) -> Result<Self, PolicyError> {
        Ok(Self::Stochastic(UniformRange::new(min, max)?))
    }

    /// Number of times to apply the caller's action for one orchestrated
    /// step. [`SkipPolicy::None`] means exactly one application.
    pub fn step_count(&self, rng: &mut impl Rng) -> u32 {
        match self {
            Self::None => 1,
            Self::Constant(n) => *n,
            Self::Stochastic(range) => range.draw(rng),
        }
    }

    /// Number of no-op actions to apply immediately after a reset.
    /// [`SkipPolicy::None`] means none.
    pub fn reset_noop_count(&self, rng: &mut impl Rng) -> u32 {
        match self {
            Self::None => 0,
            Self::Constant(n) => *n,
            Self::Stochastic(range) => range.draw(rng),
        }
    }

    /// The smallest count [`step_count`](Self::step_count) can return.
    /// Used by config validation to reject zero-action steps.
    pub fn min_step_count(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Constant(n) => *n,
            Self::Stochastic(range) => range.min(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    // ── Construction ─────────────────────────────────────────

    #[test]
    fn inverted_range_rejected() {
        assert_eq!(
            SkipPolicy::stochastic(5, 2),
            Err(PolicyError::InvertedRange { min: 5, max: 2 })
        );
    }

    #[test]
    fn degenerate_range_accepted() {
        assert!(SkipPolicy::stochastic(3, 3).is_ok());
    }

    // ── Counts ───────────────────────────────────────────────

    #[test]
    fn none_steps_once_and_noops_zero() {
        let mut r = rng(0);
        assert_eq!(SkipPolicy::None.step_count(&mut r), 1);
        assert_eq!(SkipPolicy::None.reset_noop_count(&mut r), 0);
    }

    #[test]
    fn constant_returns_its_count_everywhere() {
        let mut r = rng(0);
        assert_eq!(SkipPolicy::Constant(4).step_count(&mut r), 4);
        assert_eq!(SkipPolicy::Constant(4).reset_noop_count(&mut r), 4);
    }

    #[test]
    fn stochastic_draws_stay_in_range() {
        let policy = SkipPolicy::stochastic(2, 5).unwrap();
        let mut r = rng(42);
        for _ in 0..200 {
            let n = policy.step_count(&mut r);
            assert!((2..=5).contains(&n), "draw {n} out of [2, 5]");
        }
    }

    #[test]
    fn stochastic_degenerate_matches_constant() {
        let stochastic = SkipPolicy::stochastic(2, 2).unwrap();
        let constant = SkipPolicy::Constant(2);
        let mut r1 = rng(7);
        let mut r2 = rng(7);
        for _ in 0..100 {
            assert_eq!(stochastic.step_count(&mut r1), constant.step_count(&mut r2));
        }
        // Neither consumed the stream: follow-on draws agree too.
        assert_eq!(r1.random_range(0u32..=100), r2.random_range(0u32..=100));
    }

    #[test]
    fn same_seed_reproduces_draw_sequence() {
        let policy = SkipPolicy::stochastic(0, 30).unwrap();
        let a: Vec<u32> = {
            let mut r = rng(99);
            (0..50).map(|_| policy.reset_noop_count(&mut r)).collect()
        };
        let b: Vec<u32> = {
            let mut r = rng(99);
            (0..50).map(|_| policy.reset_noop_count(&mut r)).collect()
        };
        assert_eq!(a, b);
    }
}
