use std::fmt;
use std::sync::Arc;

use crate::{Symbol, SymbolSet};

/// The lexer as seen by an external scanner.
///
/// `advance` consumes the lookahead character into the token, `skip`
/// consumes it as whitespace before the token. The token ends at the last
/// `mark_end`, or at the current position if `mark_end` was never called.
pub trait ScanCursor {
    fn lookahead(&self) -> Option<char>;
    fn advance(&mut self);
    fn skip(&mut self);
    fn mark_end(&mut self);
    /// Zero-based column of the lookahead, in bytes.
    fn column(&self) -> u32;
    fn is_at_end(&self) -> bool {
        self.lookahead().is_none()
    }
}

/// Hand-written lexing for tokens a finite automaton cannot describe.
///
/// Scanner state travels with the tokens it produced: after each token the
/// parser serializes the scanner and restores it before scanning again from
/// that token, so parse versions never observe each other's state.
pub trait ExternalScanner: Send {
    /// Tries to recognise one of the `valid` external tokens at the input.
    fn scan(&mut self, cursor: &mut dyn ScanCursor, valid: &SymbolSet) -> Option<Symbol>;
    fn serialize(&self, buffer: &mut Vec<u8>);
    /// Restores state written by `serialize`. An empty slice means the
    /// initial state.
    fn deserialize(&mut self, state: &[u8]);
}

pub type ScannerFactory = dyn Fn() -> Box<dyn ExternalScanner> + Send + Sync;

/// The external tokens of a language and a way to create scanners for them.
#[derive(Clone)]
pub struct ExternalScannerDef {
    /// Terminals the scanner may return, in the order it knows them.
    pub tokens: Vec<Symbol>,
    pub factory: Arc<ScannerFactory>,
}

impl ExternalScannerDef {
    pub fn new(
        tokens: Vec<Symbol>,
        factory: impl Fn() -> Box<dyn ExternalScanner> + Send + Sync + 'static,
    ) -> Self {
        Self { tokens, factory: Arc::new(factory) }
    }

    pub fn create(&self) -> Box<dyn ExternalScanner> {
        (self.factory)()
    }
}

impl fmt::Debug for ExternalScannerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalScannerDef").field("tokens", &self.tokens).finish_non_exhaustive()
    }
}
