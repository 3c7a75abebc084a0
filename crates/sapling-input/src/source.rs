//! Random-access text sources.
//!
//! A source hands out contiguous chunks of encoded bytes. Chunks may end at
//! any byte, including in the middle of a character; readers stitch
//! characters back together across chunk boundaries.

use text_size::{TextRange, TextSize};

/// Character encoding of the bytes a `TextSource` hands out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Utf8,
    /// Little-endian UTF-16; surrogate pairs occupy four bytes.
    Utf16Le,
    /// One byte per character.
    Latin1,
}

/// Result of decoding one character from the start of a byte slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    Char { ch: char, len: u32 },
    /// The slice ends in the middle of a character.
    Incomplete,
    End,
}

impl Encoding {
    /// Upper bound on the bytes one character can occupy.
    pub const fn max_char_len(self) -> usize {
        match self {
            Self::Utf8 | Self::Utf16Le => 4,
            Self::Latin1 => 1,
        }
    }

    /// Decodes the first character of `bytes`. Malformed input decodes to
    /// U+FFFD and consumes one code unit, so decoding always progresses.
    pub fn decode(self, bytes: &[u8]) -> Decoded {
        if bytes.is_empty() {
            return Decoded::End;
        }
        match self {
            Self::Latin1 => Decoded::Char { ch: char::from(bytes[0]), len: 1 },
            Self::Utf8 => decode_utf8(bytes),
            Self::Utf16Le => decode_utf16le(bytes),
        }
    }

    /// Number of bytes `ch` occupies in this encoding.
    pub fn char_len(self, ch: char) -> u32 {
        match self {
            Self::Utf8 => ch.len_utf8() as u32,
            Self::Utf16Le => 2 * ch.len_utf16() as u32,
            Self::Latin1 => 1,
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> Decoded {
    let width = match bytes[0] {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return Decoded::Char { ch: char::REPLACEMENT_CHARACTER, len: 1 },
    };
    if bytes.len() < width {
        // A continuation byte that is already wrong cannot become valid.
        if bytes[1..].iter().any(|&byte| byte & 0xc0 != 0x80) {
            return Decoded::Char { ch: char::REPLACEMENT_CHARACTER, len: 1 };
        }
        return Decoded::Incomplete;
    }
    match std::str::from_utf8(&bytes[..width]) {
        Ok(text) => match text.chars().next() {
            Some(ch) => Decoded::Char { ch, len: width as u32 },
            None => Decoded::End,
        },
        Err(_) => Decoded::Char { ch: char::REPLACEMENT_CHARACTER, len: 1 },
    }
}

fn decode_utf16le(bytes: &[u8]) -> Decoded {
    if bytes.len() < 2 {
        return Decoded::Incomplete;
    }
    let first = u16::from_le_bytes([bytes[0], bytes[1]]);
    if !(0xd800..=0xdbff).contains(&first) {
        let ch = char::from_u32(u32::from(first)).unwrap_or(char::REPLACEMENT_CHARACTER);
        return Decoded::Char { ch, len: 2 };
    }
    if bytes.len() < 4 {
        return Decoded::Incomplete;
    }
    let second = u16::from_le_bytes([bytes[2], bytes[3]]);
    match char::decode_utf16([first, second]).next() {
        Some(Ok(ch)) => Decoded::Char { ch, len: 4 },
        _ => Decoded::Char { ch: char::REPLACEMENT_CHARACTER, len: 2 },
    }
}

/// Text the lexer can scan without materialising the whole document.
pub trait TextSource {
    fn encoding(&self) -> Encoding;

    /// Total length in bytes.
    fn len(&self) -> TextSize;

    fn is_empty(&self) -> bool {
        self.len() == TextSize::new(0)
    }

    /// Returns a chunk of bytes starting exactly at `byte`. The chunk is empty
    /// at or past the end of the text and non-empty everywhere else.
    fn read(&self, byte: TextSize) -> &[u8];

    /// Copies the bytes of `range` out of the source.
    fn bytes_in(&self, range: TextRange) -> Vec<u8> {
        let mut out = Vec::with_capacity(usize::from(range.len()));
        let mut offset = range.start();
        while offset < range.end() {
            let chunk = self.read(offset);
            if chunk.is_empty() {
                break;
            }
            let wanted = usize::from(range.end() - offset).min(chunk.len());
            out.extend_from_slice(&chunk[..wanted]);
            offset += TextSize::new(wanted as u32);
        }
        out
    }

    /// Decodes `range` into a `String`.
    fn text_in(&self, range: TextRange) -> String {
        let bytes = self.bytes_in(range);
        let encoding = self.encoding();
        let mut text = String::with_capacity(bytes.len());
        let mut rest = &bytes[..];
        while let Decoded::Char { ch, len } = encoding.decode(rest) {
            text.push(ch);
            rest = &rest[len as usize..];
        }
        text
    }
}

impl TextSource for str {
    fn encoding(&self) -> Encoding {
        Encoding::Utf8
    }

    fn len(&self) -> TextSize {
        TextSize::new(self.len() as u32)
    }

    fn read(&self, byte: TextSize) -> &[u8] {
        self.as_bytes().get(usize::from(byte)..).unwrap_or_default()
    }
}

impl TextSource for String {
    fn encoding(&self) -> Encoding {
        Encoding::Utf8
    }

    fn len(&self) -> TextSize {
        TextSize::new(self.as_str().len() as u32)
    }

    fn read(&self, byte: TextSize) -> &[u8] {
        self.as_str().read(byte)
    }
}

impl<T: TextSource + ?Sized> TextSource for &T {
    fn encoding(&self) -> Encoding {
        (**self).encoding()
    }

    fn len(&self) -> TextSize {
        (**self).len()
    }

    fn read(&self, byte: TextSize) -> &[u8] {
        (**self).read(byte)
    }
}

/// Text stored as little-endian UTF-16.
#[derive(Clone, Debug, Default)]
pub struct Utf16Source {
    bytes: Vec<u8>,
}

impl Utf16Source {
    pub fn new(text: &str) -> Self {
        Self { bytes: text.encode_utf16().flat_map(u16::to_le_bytes).collect() }
    }

    pub fn from_units(units: &[u16]) -> Self {
        Self { bytes: units.iter().copied().flat_map(u16::to_le_bytes).collect() }
    }
}

impl TextSource for Utf16Source {
    fn encoding(&self) -> Encoding {
        Encoding::Utf16Le
    }

    fn len(&self) -> TextSize {
        TextSize::new(self.bytes.len() as u32)
    }

    fn read(&self, byte: TextSize) -> &[u8] {
        self.bytes.get(usize::from(byte)..).unwrap_or_default()
    }
}

/// Single-byte text: every byte is one character.
#[derive(Clone, Debug, Default)]
pub struct Latin1Source {
    bytes: Vec<u8>,
}

impl Latin1Source {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }
}

impl TextSource for Latin1Source {
    fn encoding(&self) -> Encoding {
        Encoding::Latin1
    }

    fn len(&self) -> TextSize {
        TextSize::new(self.bytes.len() as u32)
    }

    fn read(&self, byte: TextSize) -> &[u8] {
        self.bytes.get(usize::from(byte)..).unwrap_or_default()
    }
}

/// Text split into arbitrary chunks, the way a rope or piece table stores it.
#[derive(Clone, Debug)]
pub struct ChunkedSource {
    encoding: Encoding,
    chunks: Vec<Box<[u8]>>,
    /// Start offset of every chunk.
    starts: Vec<TextSize>,
    len: TextSize,
}

impl ChunkedSource {
    pub fn new(encoding: Encoding, chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let mut starts = Vec::new();
        let mut len = TextSize::new(0);
        let chunks = chunks
            .into_iter()
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                starts.push(len);
                len += TextSize::new(chunk.len() as u32);
                chunk.into_boxed_slice()
            })
            .collect();
        Self { encoding, chunks, starts, len }
    }

    /// Splits UTF-8 `text` every `chunk_len` bytes, ignoring char boundaries.
    pub fn from_str_chunks(text: &str, chunk_len: usize) -> Self {
        let chunk_len = chunk_len.max(1);
        Self::new(Encoding::Utf8, text.as_bytes().chunks(chunk_len).map(<[u8]>::to_vec))
    }
}

impl TextSource for ChunkedSource {
    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn len(&self) -> TextSize {
        self.len
    }

    fn read(&self, byte: TextSize) -> &[u8] {
        if byte >= self.len {
            return &[];
        }
        let index = self.starts.partition_point(|&start| start <= byte) - 1;
        let offset = usize::from(byte - self.starts[index]);
        &self.chunks[index][offset..]
    }
}
