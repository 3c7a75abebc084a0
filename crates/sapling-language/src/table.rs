use crate::{StateId, Symbol};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProductionId(pub u16);

impl ProductionId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Production {
    pub lhs: Symbol,
    /// Number of non-extra children the reduction pops.
    pub child_count: u16,
    /// Bias used to pick between alternatives that are otherwise equal.
    pub dynamic_precedence: i16,
}

/// One entry of an action list. Lists put reductions first and the shift,
/// if any, last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseAction {
    Shift(StateId),
    /// Shift a visible extra without leaving the current state.
    ShiftExtra,
    Reduce(ProductionId),
    Accept,
}

impl ParseAction {
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shift(_) | Self::ShiftExtra)
    }
}
