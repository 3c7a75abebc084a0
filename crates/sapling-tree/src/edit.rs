//! Rewriting subtree positions after a text edit.
//!
//! Only the subtrees the edit touches are copied; everything else stays
//! shared with the tree that was edited.

use sapling_input::{InputEdit, Length, TextSize};

use crate::Subtree;

/// An edit in coordinates relative to the start of a subtree's padding.
#[derive(Clone, Copy, Debug)]
struct Edit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

impl Edit {
    fn new(edit: &InputEdit) -> Self {
        Self { start: edit.start(), old_end: edit.old_end(), new_end: edit.new_end() }
    }

    fn relative_to(self, offset: Length) -> Self {
        Self {
            start: self.start.saturating_sub(offset),
            old_end: self.old_end.saturating_sub(offset),
            new_end: self.new_end.saturating_sub(offset),
        }
    }

    fn is_pure_insertion(&self) -> bool {
        self.old_end.bytes == self.start.bytes
    }
}

/// A subtree whose children are being edited.
struct Frame {
    node: Subtree,
    pending: std::vec::IntoIter<(Subtree, Option<Edit>)>,
    done: Vec<Subtree>,
}

enum Step {
    Done(Subtree),
    Descend(Frame),
}

pub(crate) fn edit_subtree(root: Subtree, edit: &InputEdit) -> Subtree {
    let mut stack = match apply(root, Edit::new(edit)) {
        Step::Done(root) => return root,
        Step::Descend(frame) => vec![frame],
    };

    while let Some(mut frame) = stack.pop() {
        match frame.pending.next() {
            Some((child, None)) => {
                frame.done.push(child);
                stack.push(frame);
            }
            Some((child, Some(edit))) => match apply(child, edit) {
                Step::Done(child) => {
                    frame.done.push(child);
                    stack.push(frame);
                }
                Step::Descend(child_frame) => {
                    stack.push(frame);
                    stack.push(child_frame);
                }
            },
            None => {
                let mut node = frame.node;
                node.restore_children(frame.done);
                match stack.last_mut() {
                    Some(parent) => parent.done.push(node),
                    None => return node,
                }
            }
        }
    }
    unreachable!("the outermost frame returns the edited root")
}

/// Resizes one subtree and works out which of its children the edit
/// reaches.
fn apply(mut subtree: Subtree, edit: Edit) -> Step {
    let mut padding = subtree.padding();
    let mut size = subtree.size();
    let total = padding + size;
    let end_byte = total.bytes + TextSize::new(subtree.lookahead_bytes());
    let is_pure_insertion = edit.is_pure_insertion();
    let is_noop = is_pure_insertion && edit.new_end.bytes == edit.start.bytes;

    if edit.start.bytes > end_byte || (is_noop && edit.start.bytes == end_byte) {
        return Step::Done(subtree);
    }

    if edit.old_end.bytes <= padding.bytes {
        // Entirely within the padding: shift the content over.
        padding = edit.new_end + (padding - edit.old_end);
    } else if edit.start.bytes < padding.bytes {
        // Starts in the padding and eats into the content.
        size = size.saturating_sub(edit.old_end - padding);
        padding = edit.new_end;
    } else if edit.start.bytes < total.bytes
        || (edit.start.bytes == total.bytes && is_pure_insertion)
    {
        size = (edit.new_end - padding) + total.saturating_sub(edit.old_end);
    }
    subtree.set_edited_span(padding, size);

    let children = subtree.take_children();
    if children.is_empty() {
        return Step::Done(subtree);
    }

    let pending = if subtree.is_ambiguous() {
        children.into_iter().map(|alternative| (alternative, Some(edit))).collect()
    } else {
        child_edits(children, edit)
    };
    Step::Descend(Frame { node: subtree, pending: Vec::into_iter(pending), done: Vec::new() })
}

fn child_edits(children: Vec<Subtree>, mut edit: Edit) -> Vec<(Subtree, Option<Edit>)> {
    let is_pure_insertion = edit.is_pure_insertion();
    let count = children.len();
    let mut pending = Vec::with_capacity(count);
    let mut child_right = Length::ZERO;
    let mut stopped = false;

    for (index, child) in children.into_iter().enumerate() {
        let child_left = child_right;
        child_right = child_left + child.total();
        if stopped {
            pending.push((child, None));
            continue;
        }

        let absorbed = edit.new_end.bytes == edit.start.bytes;
        let lookahead_end = u32::from(child_right.bytes) + child.lookahead_bytes();
        let start = u32::from(edit.start.bytes);
        // A child that never looked at the edited bytes is untouched, unless it
        // is the last one left to take text inserted at its end.
        let is_last = index + 1 == count;
        let touched = lookahead_end > start
            || (is_last && is_pure_insertion && !absorbed && child_right.bytes == edit.start.bytes);
        if !touched {
            pending.push((child, None));
            continue;
        }

        if child_left.bytes > edit.old_end.bytes
            || (child_left.bytes == edit.old_end.bytes
                && !child.total().is_empty()
                && index > 0
                && absorbed)
        {
            stopped = true;
            pending.push((child, None));
            continue;
        }

        let child_edit = edit.relative_to(child_left);
        // Inserted text goes to the first child that reaches the edit; later
        // children only shrink.
        if child_right.bytes > edit.start.bytes
            || (child_right.bytes == edit.start.bytes && is_pure_insertion)
        {
            edit.new_end = edit.start;
        }
        pending.push((child, Some(child_edit)));
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_edit_clamps_at_zero() {
        let edit = Edit {
            start: Length::of_str("ab"),
            old_end: Length::of_str("abc"),
            new_end: Length::of_str("abcd"),
        };
        let relative = edit.relative_to(Length::of_str("abc"));
        assert!(relative.start.is_empty());
        assert!(relative.old_end.is_empty());
        assert_eq!(relative.new_end, Length::of_str("d"));
    }
}
