//! Incremental GLR parsing.
//!
//! [`Parser`] turns text into a [`sapling_tree::Tree`] using the tables of a
//! [`sapling_language::Language`]. Given the edited tree of a previous
//! version of the text, it reuses every subtree the edits left intact.
//! Grammars may be ambiguous: conflicting actions fork the parse stack, and
//! error recovery picks the cheapest repair when the input is invalid.

mod config;
mod error;
mod parser;
mod reusable;
mod stack;

pub use config::{ParseBudget, ParserConfig, RecoveryConfig};
pub use error::ParseError;
pub use parser::{Parser, Reparse};

#[cfg(test)]
mod tests;
