//! Fixed-capacity ring buffer of recent raw frames, presented as one
//! stacked observation.
//!
//! [`FrameStack`] keeps the most recent `depth` raw observations for a
//! lane. [`stacked()`](FrameStack::stacked) concatenates them oldest-first
//! into one contiguous byte buffer, left-padding with the oldest available
//! frame until the ring has filled. The padding rule makes the stack
//! contents immediately after a reset unambiguous: one pushed frame yields
//! `depth` copies of that frame.

/// Ring buffer of the most recent `depth` raw frames.
///
/// Pushes are constant-time: once the ring is full, the oldest frame's
/// slot is overwritten in place. The chronological window is reconstructed
/// from the ring's write index on demand.
#[derive(Clone, Debug)]
pub struct FrameStack {
    /// Frame slots, indexed by push position modulo `depth`.
    slots: Vec<Vec<u8>>,
    /// Next slot to write. Wraps at `depth`.
    write_idx: usize,
    /// Total frames pushed since construction or the last clear,
    /// saturating at `depth`.
    filled: usize,
    depth: usize,
}

impl FrameStack {
    /// Create an empty stack holding up to `depth` frames.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is zero. Depth is validated by
    /// [`EnvConfig::validate()`](crate::config::EnvConfig::validate) before
    /// any stack is built.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "FrameStack depth must be at least 1");
        Self {
            slots: vec![Vec::new(); depth],
            write_idx: 0,
            filled: 0,
            depth,
        }
    }

    /// Configured stack depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Push a raw frame, overwriting the oldest once the ring is full.
    pub fn push(&mut self, frame: Vec<u8>) {
        self.slots[self.write_idx] = frame;
        self.write_idx = (self.write_idx + 1) % self.depth;
        if self.filled < self.depth {
            self.filled += 1;
        }
    }

    /// Drop all frames, returning the stack to its freshly-built state.
    ///
    /// Called on full episode resets so the next push repopulates the
    /// whole window.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.write_idx = 0;
        self.filled = 0;
    }

    /// The chronological window: exactly `depth` frame references, oldest
    /// first, most recent last.
    ///
    /// Before the ring fills, the oldest pushed frame is repeated to
    /// left-pad the window.
    ///
    /// # Panics
    ///
    /// Panics if no frame has ever been pushed. Lanes always push an
    /// observation before exposing their stack.
    pub fn frames(&self) -> Vec<&[u8]> {
        assert!(self.filled > 0, "FrameStack read before first push");
        let mut out = Vec::with_capacity(self.depth);
        if self.filled < self.depth {
            // Slots [0, filled) hold the pushed frames in order; slot 0 is
            // the oldest and pads the missing leading positions.
            for _ in 0..self.depth - self.filled {
                out.push(self.slots[0].as_slice());
            }
            for slot in &self.slots[..self.filled] {
                out.push(slot.as_slice());
            }
        } else {
            // Full ring: write_idx points at the oldest frame.
            for i in 0..self.depth {
                out.push(self.slots[(self.write_idx + i) % self.depth].as_slice());
            }
        }
        out
    }

    /// The stacked observation: the chronological window concatenated into
    /// one contiguous buffer (frames along the trailing axis).
    pub fn stacked(&self) -> Vec<u8> {
        let frames = self.frames();
        let total: usize = frames.iter().map(|f| f.len()).sum();
        let mut out = Vec::with_capacity(total);
        for frame in frames {
            out.extend_from_slice(frame);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(v: u8) -> Vec<u8> {
        vec![v; 4]
    }

    // ── Padding before the ring fills ────────────────────────

    #[test]
    fn single_push_pads_to_depth_copies() {
        let mut stack = FrameStack::new(4);
        stack.push(frame(7));
        assert_eq!(stack.stacked(), vec![frame(7); 4].concat());
    }

    #[test]
    fn partial_fill_pads_with_oldest() {
        let mut stack = FrameStack::new(4);
        stack.push(frame(1));
        stack.push(frame(2));
        let expected = [frame(1), frame(1), frame(1), frame(2)].concat();
        assert_eq!(stack.stacked(), expected);
    }

    // ── Chronological order at and past capacity ─────────────

    #[test]
    fn exactly_depth_pushes_in_order() {
        let mut stack = FrameStack::new(3);
        for v in 1..=3 {
            stack.push(frame(v));
        }
        assert_eq!(stack.stacked(), [frame(1), frame(2), frame(3)].concat());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut stack = FrameStack::new(3);
        for v in 1..=4 {
            stack.push(frame(v));
        }
        assert_eq!(stack.stacked(), [frame(2), frame(3), frame(4)].concat());
    }

    #[test]
    fn long_sequence_keeps_sliding_window() {
        let mut stack = FrameStack::new(2);
        for v in 0..100 {
            stack.push(frame(v));
        }
        assert_eq!(stack.stacked(), [frame(98), frame(99)].concat());
    }

    // ── Clear ────────────────────────────────────────────────

    #[test]
    fn clear_restores_padding_behaviour() {
        let mut stack = FrameStack::new(3);
        for v in 1..=5 {
            stack.push(frame(v));
        }
        stack.clear();
        stack.push(frame(9));
        assert_eq!(stack.stacked(), vec![frame(9); 3].concat());
    }

    #[test]
    #[should_panic(expected = "before first push")]
    fn read_before_push_panics() {
        let stack = FrameStack::new(2);
        let _ = stack.frames();
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn zero_depth_panics() {
        let _ = FrameStack::new(0);
    }

    // ── Properties ───────────────────────────────────────────

    proptest! {
        /// The window always has exactly `depth` frames and ends with the
        /// most recent push, regardless of how many frames went in.
        #[test]
        fn window_shape_invariant(
            depth in 1usize..8,
            values in prop::collection::vec(0u8..255, 1..40),
        ) {
            let mut stack = FrameStack::new(depth);
            for &v in &values {
                stack.push(frame(v));
            }
            let newest = frame(*values.last().unwrap());
            let frames = stack.frames();
            prop_assert_eq!(frames.len(), depth);
            prop_assert_eq!(frames[depth - 1], newest.as_slice());
        }

        /// Once at least `depth` frames have been pushed, the window is the
        /// last `depth` values in push order.
        #[test]
        fn full_window_matches_tail(
            depth in 1usize..8,
            values in prop::collection::vec(0u8..255, 8..40),
        ) {
            let mut stack = FrameStack::new(depth);
            for &v in &values {
                stack.push(frame(v));
            }
            let tail = &values[values.len() - depth..];
            let expected: Vec<u8> = tail.iter().flat_map(|&v| frame(v)).collect();
            prop_assert_eq!(stack.stacked(), expected);
        }
    }
}
