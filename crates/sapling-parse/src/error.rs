use sapling_input::Length;
use sapling_tree::Tree;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The budget ran out. `partial` holds everything parsed up to `at`,
    /// followed by an `UNPARSED` leaf covering the rest of the text.
    #[error("parse budget exhausted at byte {}", u32::from(.at.bytes))]
    BudgetExceeded { partial: Box<Tree>, at: Length },
    #[error("old tree was parsed as `{found}`, not `{expected}`")]
    LanguageMismatch { expected: String, found: String },
}

impl ParseError {
    /// The partial tree of a parse that ran out of budget.
    pub fn into_partial(self) -> Option<Tree> {
        match self {
            Self::BudgetExceeded { partial, .. } => Some(*partial),
            Self::LanguageMismatch { .. } => None,
        }
    }
}
