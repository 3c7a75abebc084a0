//! Text positions, edits and the text-source abstraction the lexer reads from.

mod edit;
mod length;
mod source;

pub use edit::InputEdit;
pub use length::{Length, Point};
pub use source::{ChunkedSource, Decoded, Encoding, Latin1Source, TextSource, Utf16Source};
pub use text_size::{TextLen, TextRange, TextSize};
