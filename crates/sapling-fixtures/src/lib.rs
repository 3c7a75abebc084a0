//! Compiles small grammars into languages for tests and benchmarks.
//!
//! This is not a grammar toolchain: it builds canonical LR(1) tables and a
//! single lexer automaton, which is all the runtime needs to be exercised
//! on real tables.

mod dfa;
mod error;
mod grammar;
pub mod languages;
mod lr;
mod pattern;

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub use error::GrammarError;
pub use grammar::{Alternative, Assoc, Grammar, alt};
pub use pattern::Pattern;

type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;
type FxIndexSet<T> = indexmap::IndexSet<T, BuildHasherDefault<FxHasher>>;
