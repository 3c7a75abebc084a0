use std::ops::Range;

use line_index::LineIndex;
use text_size::{TextRange, TextSize};

use crate::{Length, Point};

/// A single text mutation, described in the coordinates of the text it is
/// applied to.
///
/// `start..old_end` is the replaced range of the old text and `start..new_end`
/// the range the replacement occupies in the new text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEdit {
    pub start_byte: TextSize,
    pub old_end_byte: TextSize,
    pub new_end_byte: TextSize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl InputEdit {
    /// Builds the edit that replaces `range` of `old_text` with `replacement`.
    pub fn splice(old_text: &str, range: Range<usize>, replacement: &str) -> Self {
        let index = LineIndex::new(old_text);
        let point_at = |offset: usize| {
            let line_col = index.line_col(TextSize::new(offset as u32));
            Point::new(line_col.line, line_col.col)
        };

        let start = Length::new(TextSize::new(range.start as u32), point_at(range.start));
        let old_end = Length::new(TextSize::new(range.end as u32), point_at(range.end));
        let new_end = start + Length::of_str(replacement);
        Self::from_lengths(start, old_end, new_end)
    }

    pub fn insert(old_text: &str, offset: usize, text: &str) -> Self {
        Self::splice(old_text, offset..offset, text)
    }

    pub fn delete(old_text: &str, range: Range<usize>) -> Self {
        Self::splice(old_text, range, "")
    }

    pub fn from_lengths(start: Length, old_end: Length, new_end: Length) -> Self {
        Self {
            start_byte: start.bytes,
            old_end_byte: old_end.bytes,
            new_end_byte: new_end.bytes,
            start_point: start.extent,
            old_end_point: old_end.extent,
            new_end_point: new_end.extent,
        }
    }

    pub fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_point)
    }

    pub fn old_end(&self) -> Length {
        Length::new(self.old_end_byte, self.old_end_point)
    }

    pub fn new_end(&self) -> Length {
        Length::new(self.new_end_byte, self.new_end_point)
    }

    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.start_byte, self.old_end_byte)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.start_byte, self.new_end_byte)
    }

    /// Maps a byte offset of the old text into the new text. Offsets inside
    /// the replaced range snap to the end of the replacement.
    pub fn translate(&self, offset: TextSize) -> TextSize {
        if offset < self.start_byte {
            offset
        } else if offset < self.old_end_byte {
            self.new_end_byte
        } else {
            offset - self.old_end_byte + self.new_end_byte
        }
    }

    /// Applies the edit to `text`, given the replacement it was built from.
    pub fn apply(&self, text: &mut String, replacement: &str) {
        debug_assert_eq!(
            u32::from(self.new_end_byte - self.start_byte) as usize,
            replacement.len()
        );
        let range = usize::from(self.start_byte)..usize::from(self.old_end_byte);
        text.replace_range(range, replacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_computes_points() {
        let text = "a\nbc\nd";
        let edit = InputEdit::splice(text, 3..6, "x\ny\nz");

        assert_eq!(edit.start_point, Point::new(1, 1));
        assert_eq!(edit.old_end_point, Point::new(2, 1));
        assert_eq!(edit.new_end_point, Point::new(3, 1));
        assert_eq!(edit.new_end_byte, TextSize::new(8));
    }

    #[test]
    fn translate_offsets() {
        let edit = InputEdit::splice("1+2*3", 2..3, "20");

        assert_eq!(edit.translate(TextSize::new(1)), TextSize::new(1));
        assert_eq!(edit.translate(TextSize::new(2)), TextSize::new(4));
        assert_eq!(edit.translate(TextSize::new(3)), TextSize::new(4));
        assert_eq!(edit.translate(TextSize::new(4)), TextSize::new(5));
    }

    #[test]
    fn apply_to_text() {
        let mut text = String::from("1+2*3");
        let edit = InputEdit::splice(&text, 2..3, "20");
        edit.apply(&mut text, "20");
        assert_eq!(text, "1+20*3");
    }
}
