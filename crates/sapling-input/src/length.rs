//! Byte and row/column extents.
//!
//! Columns are counted in bytes of the source encoding, so a `Point` can be
//! derived from the bytes alone without knowing how characters render.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use text_size::TextSize;

/// A zero-based row/column position.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Self = Self { row: 0, column: 0 };

    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

impl Add for Point {
    type Output = Self;

    /// Appends an extent: a non-zero row in `rhs` resets the column.
    fn add(self, rhs: Self) -> Self {
        if rhs.row > 0 {
            Self { row: self.row + rhs.row, column: rhs.column }
        } else {
            Self { row: self.row, column: self.column + rhs.column }
        }
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if self.row > rhs.row {
            Self { row: self.row - rhs.row, column: self.column }
        } else {
            Self { row: 0, column: self.column.saturating_sub(rhs.column) }
        }
    }
}

/// A span measured both in bytes and in rows/columns.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Length {
    pub bytes: TextSize,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Self = Self { bytes: TextSize::new(0), extent: Point::ZERO };

    pub const fn new(bytes: TextSize, extent: Point) -> Self {
        Self { bytes, extent }
    }

    /// Measures a UTF-8 string.
    pub fn of_str(text: &str) -> Self {
        let bytes = TextSize::new(text.len() as u32);
        let extent = match text.rfind('\n') {
            Some(last_newline) => Point {
                row: text.bytes().filter(|&byte| byte == b'\n').count() as u32,
                column: (text.len() - last_newline - 1) as u32,
            },
            None => Point { row: 0, column: text.len() as u32 },
        };
        Self { bytes, extent }
    }

    pub fn is_empty(self) -> bool {
        self.bytes == TextSize::new(0)
    }

    /// `self - rhs`, or zero when `rhs` is not smaller.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.bytes < self.bytes { self - rhs } else { Self::ZERO }
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}b{:?}", u32::from(self.bytes), self.extent)
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { bytes: self.bytes + rhs.bytes, extent: self.extent + rhs.extent }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Length {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self { bytes: self.bytes - rhs.bytes, extent: self.extent - rhs.extent }
    }
}
