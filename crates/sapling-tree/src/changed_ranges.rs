//! Comparing an edited tree with its reparsed successor.

use std::hash::{Hash as _, Hasher as _};

use rustc_hash::FxHasher;
use sapling_input::{TextRange, TextSize};

use crate::Subtree;

struct Entry<'a> {
    subtree: &'a Subtree,
    /// Where the subtree's padding starts.
    start: TextSize,
    /// Hash of the symbols of the visible ancestors.
    ancestry: u64,
}

impl Entry<'_> {
    fn content(&self) -> TextRange {
        let start = self.start + self.subtree.padding().bytes;
        TextRange::new(start, self.start + self.subtree.total().bytes)
    }

    fn end(&self) -> TextSize {
        self.start + self.subtree.total().bytes
    }

    fn same_as(&self, other: &Entry<'_>) -> bool {
        self.start == other.start && self.ancestry == other.ancestry && {
            let (a, b) = (self.subtree, other.subtree);
            a.ptr_eq(b)
                || (a.is_leaf()
                    && b.is_leaf()
                    && !a.has_changes()
                    && !b.has_changes()
                    && a.symbol() == b.symbol()
                    && a.padding() == b.padding()
                    && a.size() == b.size()
                    && a.is_missing() == b.is_missing()
                    && a.extra() == b.extra())
        }
    }
}

/// Subtrees still to visit, in document order from the top of the stack.
struct Walker<'a> {
    stack: Vec<Entry<'a>>,
}

impl<'a> Walker<'a> {
    fn new(root: &'a Subtree) -> Self {
        Self { stack: vec![Entry { subtree: root, start: TextSize::new(0), ancestry: 0 }] }
    }

    fn peek(&self) -> Option<&Entry<'a>> {
        self.stack.last()
    }

    fn skip(&mut self) -> Option<Entry<'a>> {
        self.stack.pop()
    }

    fn descend(&mut self) {
        let Some(entry) = self.stack.pop() else { return };
        let ancestry = if entry.subtree.visible() {
            let mut hasher = FxHasher::default();
            entry.ancestry.hash(&mut hasher);
            entry.subtree.navigation_symbol().hash(&mut hasher);
            hasher.finish()
        } else {
            entry.ancestry
        };

        let ambiguous = entry.subtree.is_ambiguous();
        let mut start = entry.start;
        let mut children = Vec::with_capacity(entry.subtree.child_count());
        for child in entry.subtree.children() {
            children.push(Entry { subtree: child, start, ancestry });
            if !ambiguous {
                start += child.total().bytes;
            }
        }
        self.stack.extend(children.into_iter().rev());
    }
}

/// Byte ranges whose syntactic meaning differs between `old`, an edited
/// tree, and `new`, the tree reparsed from it. Ranges are sorted and
/// disjoint.
pub(crate) fn changed_ranges(old: &Subtree, new: &Subtree) -> Vec<TextRange> {
    let mut ranges: Vec<TextRange> = Vec::new();
    let mut record = |range: TextRange| match ranges.last_mut() {
        Some(last) if range.start() <= last.end() => *last = last.cover(range),
        _ => ranges.push(range),
    };

    let mut old = Walker::new(old);
    let mut new = Walker::new(new);
    loop {
        match (old.peek(), new.peek()) {
            (None, None) => break,
            (Some(a), Some(b)) if a.same_as(b) => {
                old.skip();
                new.skip();
            }
            (Some(a), Some(b)) => {
                let a_leaf = a.subtree.child_count() == 0;
                let b_leaf = b.subtree.child_count() == 0;
                if !a_leaf || !b_leaf {
                    let descend_old = !a_leaf && (b_leaf || a.start <= b.start);
                    let descend_new = !b_leaf && (a_leaf || b.start <= a.start);
                    if descend_old {
                        old.descend();
                    }
                    if descend_new {
                        new.descend();
                    }
                    continue;
                }

                record(a.content().cover(b.content()));
                let (a_end, b_end) = (a.end(), b.end());
                if a_end <= b_end {
                    old.skip();
                }
                if b_end <= a_end {
                    new.skip();
                }
            }
            (Some(_), None) => {
                if let Some(entry) = old.skip() {
                    record(entry.content());
                }
            }
            (None, Some(_)) => {
                if let Some(entry) = new.skip() {
                    record(entry.content());
                }
            }
        }
    }

    ranges.sort_by_key(|range| range.start());
    let mut merged: Vec<TextRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start() <= last.end() => *last = last.cover(range),
            _ => merged.push(range),
        }
    }
    merged
}
