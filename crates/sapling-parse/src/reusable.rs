//! A walk over the previous tree that offers its subtrees for reuse, in
//! text order.

use sapling_input::TextSize;
use sapling_lexer::ExternalState;
use sapling_tree::Subtree;

#[derive(Clone, Copy)]
struct Entry<'t> {
    tree: &'t Subtree,
    child_index: usize,
    /// Start of the subtree's padding.
    offset: TextSize,
}

pub(crate) struct ReusableNode<'t> {
    stack: Vec<Entry<'t>>,
    /// State of the last external token the walk has moved past.
    last_external_state: Option<&'t ExternalState>,
}

impl<'t> ReusableNode<'t> {
    pub(crate) fn new(root: Option<&'t Subtree>) -> Self {
        let stack = root
            .map(|tree| Entry { tree, child_index: 0, offset: TextSize::new(0) })
            .into_iter()
            .collect();
        Self { stack, last_external_state: None }
    }

    pub(crate) fn tree(&self) -> Option<&'t Subtree> {
        self.stack.last().map(|entry| entry.tree)
    }

    /// The current subtree and where its padding starts.
    pub(crate) fn current(&self) -> Option<(&'t Subtree, TextSize)> {
        self.stack.last().map(|entry| (entry.tree, entry.offset))
    }

    pub(crate) fn last_external_state(&self) -> Option<&'t ExternalState> {
        self.last_external_state
    }

    /// Moves to the first child. Ambiguous nodes are entered through their
    /// first alternative.
    pub(crate) fn descend(&mut self) -> bool {
        let Some(&last) = self.stack.last() else {
            return false;
        };
        match last.tree.children().first() {
            Some(child) => {
                self.stack.push(Entry { tree: child, child_index: 0, offset: last.offset });
                true
            }
            None => false,
        }
    }

    /// Moves past the current subtree to whatever follows it.
    pub(crate) fn advance(&mut self) {
        let Some(last) = self.stack.last().copied() else {
            return;
        };
        let offset = last.offset + last.tree.total().bytes;
        if last.tree.has_external_tokens() {
            self.last_external_state = last.tree.last_external_state();
        }

        loop {
            let Some(popped) = self.stack.pop() else {
                return;
            };
            let Some(parent) = self.tree() else {
                return;
            };
            let next_index = popped.child_index + 1;
            // Alternatives overlap; the one entered is the only one walked.
            if parent.is_ambiguous() {
                continue;
            }
            if let Some(next) = parent.children().get(next_index) {
                self.stack.push(Entry { tree: next, child_index: next_index, offset });
                return;
            }
        }
    }

    pub(crate) fn advance_past_leaf(&mut self) {
        while self.descend() {}
        self.advance();
    }
}
