use thiserror::Error;

use crate::{ProductionId, StateId, Symbol};

/// A compiled language whose tables do not fit together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("a language needs at least the error and start states, found {0}")]
    TooFewStates(usize),
    #[error("symbol 0 must be the end-of-input terminal")]
    MissingEnd,
    #[error("{table} table has {found} entries, expected {expected}")]
    TableSize { table: &'static str, expected: usize, found: usize },
    #[error("symbol {0:?} collides with a reserved symbol")]
    ReservedSymbol(Symbol),
    #[error("symbol {symbol:?} is listed as {expected} but is not")]
    SymbolKind { symbol: Symbol, expected: &'static str },
    #[error("state {state:?} refers to undefined state {target:?}")]
    UndefinedState { state: StateId, target: StateId },
    #[error("state {state:?} refers to undefined production {production:?}")]
    UndefinedProduction { state: StateId, production: ProductionId },
    #[error("state {state:?} orders its actions on {symbol:?} with a shift before a reduction")]
    ActionOrder { state: StateId, symbol: Symbol },
    #[error("lexer state {state} refers to undefined lexer state {target}")]
    UndefinedLexState { state: u32, target: u32 },
    #[error("lexer state {0} has overlapping or unsorted transitions")]
    UnsortedTransitions(u32),
    #[error("external tokens are declared without a scanner, or a scanner without tokens")]
    ScannerMismatch,
}
