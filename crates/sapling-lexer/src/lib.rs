//! Context-aware lexing over a compiled language's automaton.
//!
//! The lexer is driven by the parser: every request names the parse state
//! the token is for, and only the terminals valid in that state (plus the
//! language's extras) take part in maximal munch.

mod cursor;
mod external;

use std::sync::Arc;

use cursor::Cursor;
use external::ExternalCursor;
use sapling_input::{Length, TextSize, TextSource};
use sapling_language::{ExternalScanner, Language, StateId, Symbol, SymbolSet};

/// Serialized external scanner state, as it was right after a token.
pub type ExternalState = Arc<[u8]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    /// Trivia skipped before the token.
    pub padding: Length,
    pub size: Length,
    /// How many bytes past the end of the token the lexer examined.
    pub lookahead_bytes: u32,
    /// The parse state the token was lexed for.
    pub parse_state: StateId,
    /// A visible extra, shifted without changing state.
    pub extra: bool,
    /// Set on tokens produced by the external scanner.
    pub external_state: Option<ExternalState>,
}

impl Token {
    /// An unrecognised character.
    pub fn is_error(&self) -> bool {
        self.symbol == Symbol::ERROR
    }

    pub fn is_end(&self) -> bool {
        self.symbol == Symbol::END
    }

    pub fn total(&self) -> Length {
        self.padding + self.size
    }
}

pub struct Lexer<'s, S: ?Sized> {
    language: Language,
    cursor: Cursor<'s, S>,
    scanner: Option<Box<dyn ExternalScanner>>,
    scanner_state: Vec<u8>,
}

impl<'s, S: TextSource + ?Sized> Lexer<'s, S> {
    pub fn new(language: &Language, source: &'s S) -> Self {
        Self {
            language: language.clone(),
            cursor: Cursor::new(source),
            scanner: language.new_external_scanner(),
            scanner_state: Vec::new(),
        }
    }

    pub fn source(&self) -> &'s S {
        self.cursor.source()
    }

    pub fn source_len(&self) -> TextSize {
        self.cursor.source().len()
    }

    /// Position of the end of the text, measured by reading on from
    /// `position`.
    pub fn end_from(&mut self, position: Length) -> Length {
        self.cursor.reset(position);
        while self.cursor.advance().is_some() {}
        self.cursor.position()
    }

    /// Lexes the next token at `position` for parse `state`.
    ///
    /// `external_state` is the scanner state left by the last external token
    /// before `position`; it is restored before the scanner runs.
    pub fn next_token(
        &mut self,
        position: Length,
        state: StateId,
        external_state: Option<&[u8]>,
    ) -> Token {
        self.cursor.start_at(position);
        self.scanner_state.clear();
        self.scanner_state.extend_from_slice(external_state.unwrap_or_default());

        let language = self.language.clone();
        let valid = language.valid_terminals(state);
        let valid_external = language.valid_external_tokens(state);
        let lex_state = language.lex_mode(state).lex_state;

        let mut token_start = position;
        loop {
            let external = if valid_external.is_empty() {
                None
            } else {
                self.scan_external(token_start, state, valid_external)
            };
            if let Some((symbol, start, end)) = external {
                if language.is_trivia(symbol) {
                    token_start = end;
                    continue;
                }
                let external_state = Some(ExternalState::from(&self.scanner_state[..]));
                return self.token(symbol, position, start, end, state, external_state);
            }

            match self.scan_automaton(token_start, lex_state, valid) {
                Some((symbol, end)) if language.is_trivia(symbol) => token_start = end,
                Some((symbol, end)) => {
                    return self.token(symbol, position, token_start, end, state, None);
                }
                None => {
                    self.cursor.reset(token_start);
                    let symbol = match self.cursor.advance() {
                        Some(_) => Symbol::ERROR,
                        None => Symbol::END,
                    };
                    let end = self.cursor.position();
                    return self.token(symbol, position, token_start, end, state, None);
                }
            }
        }
    }

    fn token(
        &self,
        symbol: Symbol,
        position: Length,
        start: Length,
        end: Length,
        parse_state: StateId,
        external_state: Option<ExternalState>,
    ) -> Token {
        let lookahead_bytes =
            u32::from(self.cursor.furthest()).saturating_sub(u32::from(end.bytes));
        Token {
            symbol,
            padding: start - position,
            size: end - start,
            lookahead_bytes,
            parse_state,
            extra: symbol != Symbol::END && self.language.is_extra(symbol),
            external_state,
        }
    }

    /// Maximal munch from `start`. Prefers the longest match among the
    /// allowed terminals and falls back to the longest match of any terminal.
    fn scan_automaton(
        &mut self,
        start: Length,
        lex_state: u32,
        valid: &SymbolSet,
    ) -> Option<(Symbol, Length)> {
        self.cursor.reset(start);
        let mut state = self.language.lex_state(lex_state);
        let mut best_allowed = None;
        let mut best_any = None;

        loop {
            let position = self.cursor.position();
            if position.bytes > start.bytes {
                let allowed = state
                    .accepts
                    .iter()
                    .find(|&&symbol| valid.contains(symbol) || self.language.is_extra(symbol));
                if let Some(&symbol) = allowed {
                    best_allowed = Some((symbol, position));
                }
                if let Some(&symbol) = state.accepts.first() {
                    best_any = Some((symbol, position));
                }
            }

            if state.transitions.is_empty() {
                break;
            }
            let Some(next) = self.cursor.peek().and_then(|ch| state.next(ch)) else {
                break;
            };
            self.cursor.advance();
            state = self.language.lex_state(next);
        }

        best_allowed.or(best_any)
    }

    fn scan_external(
        &mut self,
        start: Length,
        state: StateId,
        valid: &SymbolSet,
    ) -> Option<(Symbol, Length, Length)> {
        let scanner = self.scanner.as_mut()?;
        scanner.deserialize(&self.scanner_state);

        let mut cursor = ExternalCursor::new(&mut self.cursor, start);
        let symbol = scanner.scan(&mut cursor, valid)?;
        let (token_start, end) = (cursor.token_start, cursor.token_end());

        let known = valid.contains(symbol) || self.language.is_extra(symbol);
        let empty = end.bytes <= token_start.bytes;
        // Empty tokens in the error state or empty trivia would never advance.
        if !known || (empty && (state == StateId::ERROR || self.language.is_trivia(symbol))) {
            return None;
        }

        self.scanner_state.clear();
        scanner.serialize(&mut self.scanner_state);
        Some((symbol, token_start, end))
    }
}

#[cfg(test)]
mod tests;
