use sapling_input::{Decoded, Encoding, Length, Point, TextSize, TextSource};

/// Character reader over a `TextSource`.
///
/// The character under the cursor is decoded lazily, so the cursor can tell
/// exactly how far into the text the lexer has looked.
pub(crate) struct Cursor<'s, S: ?Sized> {
    source: &'s S,
    encoding: Encoding,
    position: Length,
    /// `None` until the character at `position` is decoded.
    lookahead: Option<Option<(char, u32)>>,
    furthest: TextSize,
}

impl<'s, S: TextSource + ?Sized> Cursor<'s, S> {
    pub(crate) fn new(source: &'s S) -> Self {
        Self {
            source,
            encoding: source.encoding(),
            position: Length::ZERO,
            lookahead: None,
            furthest: TextSize::new(0),
        }
    }

    pub(crate) fn source(&self) -> &'s S {
        self.source
    }

    pub(crate) fn position(&self) -> Length {
        self.position
    }

    /// End of the furthest character examined so far. Looking at the end of
    /// the text counts as examining one byte past it.
    pub(crate) fn furthest(&self) -> TextSize {
        self.furthest
    }

    /// Moves to `position` and forgets how far earlier scans looked.
    pub(crate) fn start_at(&mut self, position: Length) {
        self.furthest = position.bytes;
        self.reset(position);
    }

    pub(crate) fn reset(&mut self, position: Length) {
        self.position = position;
        self.lookahead = None;
    }

    pub(crate) fn peek(&mut self) -> Option<char> {
        self.decoded().map(|(ch, _)| ch)
    }

    /// Consumes the character under the cursor.
    pub(crate) fn advance(&mut self) -> Option<char> {
        let (ch, len) = self.decoded()?;
        let extent = if ch == '\n' { Point::new(1, 0) } else { Point::new(0, len) };
        self.position += Length::new(TextSize::new(len), extent);
        self.lookahead = None;
        Some(ch)
    }

    fn decoded(&mut self) -> Option<(char, u32)> {
        if let Some(lookahead) = self.lookahead {
            return lookahead;
        }
        let lookahead = decode_at(self.source, self.encoding, self.position.bytes);
        let examined = lookahead.map_or(1, |(_, len)| len);
        self.furthest = self.furthest.max(self.position.bytes + TextSize::new(examined));
        self.lookahead = Some(lookahead);
        lookahead
    }
}

/// Decodes the character starting at `byte`, stitching it together from
/// several chunks when it straddles a chunk boundary.
fn decode_at<S: TextSource + ?Sized>(
    source: &S,
    encoding: Encoding,
    byte: TextSize,
) -> Option<(char, u32)> {
    match encoding.decode(source.read(byte)) {
        Decoded::Char { ch, len } => return Some((ch, len)),
        Decoded::End => return None,
        Decoded::Incomplete => {}
    }

    let max = encoding.max_char_len();
    let mut buffer = [0; 4];
    let mut filled = 0;
    while filled < max {
        let chunk = source.read(byte + TextSize::new(filled as u32));
        if chunk.is_empty() {
            break;
        }
        let take = chunk.len().min(max - filled);
        buffer[filled..filled + take].copy_from_slice(&chunk[..take]);
        filled += take;
    }

    match encoding.decode(&buffer[..filled]) {
        Decoded::Char { ch, len } => Some((ch, len)),
        // The text ends in the middle of a character.
        Decoded::Incomplete => Some((char::REPLACEMENT_CHARACTER, filled as u32)),
        Decoded::End => None,
    }
}
