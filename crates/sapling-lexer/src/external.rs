use sapling_input::{Length, TextSource};
use sapling_language::ScanCursor;

use crate::cursor::Cursor;

/// The lexer cursor as handed to an external scanner.
pub(crate) struct ExternalCursor<'a, 's, S: ?Sized> {
    cursor: &'a mut Cursor<'s, S>,
    lookahead: Option<char>,
    pub(crate) token_start: Length,
    pub(crate) marked_end: Option<Length>,
}

impl<'a, 's, S: TextSource + ?Sized> ExternalCursor<'a, 's, S> {
    pub(crate) fn new(cursor: &'a mut Cursor<'s, S>, start: Length) -> Self {
        cursor.reset(start);
        let lookahead = cursor.peek();
        Self { cursor, lookahead, token_start: start, marked_end: None }
    }

    pub(crate) fn token_end(&self) -> Length {
        self.marked_end.unwrap_or_else(|| self.cursor.position())
    }
}

impl<S: TextSource + ?Sized> ScanCursor for ExternalCursor<'_, '_, S> {
    fn lookahead(&self) -> Option<char> {
        self.lookahead
    }

    fn advance(&mut self) {
        self.cursor.advance();
        self.lookahead = self.cursor.peek();
    }

    fn skip(&mut self) {
        self.advance();
        self.token_start = self.cursor.position();
    }

    fn mark_end(&mut self) {
        self.marked_end = Some(self.cursor.position());
    }

    fn column(&self) -> u32 {
        self.cursor.position().extent.column
    }
}
