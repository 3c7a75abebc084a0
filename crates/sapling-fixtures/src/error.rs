use sapling_language::LanguageError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("the grammar has no rules")]
    NoRules,
    #[error("`{0}` is defined more than once")]
    DuplicateSymbol(String),
    #[error("rule `{rule}` refers to undefined symbol `{symbol}`")]
    UndefinedSymbol { rule: String, symbol: String },
    #[error("extra `{0}` is not a token")]
    ExtraNotToken(String),
    #[error("token `{0}` matches the empty string")]
    EmptyToken(String),
    #[error("the grammar defines {0} symbols, more than a language can hold")]
    TooManySymbols(usize),
    #[error(transparent)]
    Language(#[from] LanguageError),
}
