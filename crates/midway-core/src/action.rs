//! The primitive action type.

use std::fmt;

/// A primitive emulator action code.
///
/// Action codes are emulator-defined. The only code with universal meaning
/// is [`Action::NOOP`] (code 0), which every supported emulator treats as
/// "do nothing" — the engine applies it during reset no-op sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action(pub u32);

impl Action {
    /// The no-op action (code 0).
    pub const NOOP: Action = Action(0);
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Action {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_is_code_zero() {
        assert_eq!(Action::NOOP, Action(0));
        assert_eq!(Action::from(0), Action::NOOP);
    }

    #[test]
    fn display_shows_code() {
        assert_eq!(format!("{}", Action(17)), "17");
    }
}
