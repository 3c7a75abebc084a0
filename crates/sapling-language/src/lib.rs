//! The compiled language artifact consumed by the runtime.
//!
//! A `Language` is produced once, offline, by a grammar compiler. It is
//! validated on construction and then shared, immutable, by every parse of
//! that language.

mod error;
mod external;
mod language;
mod lex;
mod symbol;
mod symbol_set;
mod table;

pub use error::LanguageError;
pub use external::{ExternalScanner, ExternalScannerDef, ScanCursor, ScannerFactory};
pub use language::{Language, LanguageData};
pub use lex::{LexMode, LexState, LexTransition};
pub use symbol::{StateId, Symbol, SymbolKind, SymbolMetadata};
pub use symbol_set::SymbolSet;
pub use table::{ParseAction, Production, ProductionId};
