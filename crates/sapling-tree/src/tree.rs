use std::fmt::{self, Write as _};

use sapling_input::{InputEdit, Length, TextRange};
use sapling_language::Language;

use crate::changed_ranges::changed_ranges;
use crate::edit::edit_subtree;
use crate::{Node, Subtree, TreeCursor, WalkEvent};

/// A complete syntax tree. Cloning shares all subtrees.
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
}

impl Tree {
    pub fn new(root: Subtree, language: Language) -> Self {
        Self { root, language }
    }

    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, Length::ZERO)
    }

    pub fn root(&self) -> &Subtree {
        &self.root
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn has_error(&self) -> bool {
        self.root.has_error()
    }

    /// Length of the text the tree covers.
    pub fn len(&self) -> Length {
        self.root.total()
    }

    pub fn is_empty(&self) -> bool {
        self.len().is_empty()
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    /// Moves every position after the edit and marks the subtrees the edit
    /// reaches as changed. Subtrees shared with other trees are copied, not
    /// mutated.
    pub fn edit(&mut self, edit: &InputEdit) {
        self.root = edit_subtree(self.root.clone(), edit);
    }

    pub fn edited(&self, edit: &InputEdit) -> Self {
        Self { root: edit_subtree(self.root.clone(), edit), language: self.language.clone() }
    }

    /// Ranges where `new`, reparsed from the edited `old`, differs from it.
    pub fn changed_ranges(old: &Self, new: &Self) -> Vec<TextRange> {
        changed_ranges(&old.root, &new.root)
    }

    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    /// Every visible node on its own line, anonymous ones quoted.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut depth = 0;
        for event in self.root_node().preorder() {
            match event {
                WalkEvent::Enter(node) => {
                    let range = node.byte_range();
                    let _ = write!(out, "{:indent$}", "", indent = depth * 2);
                    if node.is_missing() {
                        out.push_str("MISSING ");
                    }
                    if node.is_named() {
                        out.push_str(node.kind());
                    } else {
                        let _ = write!(out, "{:?}", node.kind());
                    }
                    let (start, end) = (u32::from(range.start()), u32::from(range.end()));
                    let _ = write!(out, "@{start}..{end}");
                    if node.is_extra() {
                        out.push_str(" extra");
                    }
                    out.push('\n');
                    depth += 1;
                }
                WalkEvent::Leave(_) => depth -= 1,
            }
        }
        out
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("language", &self.language.name())
            .field("root", &self.root_node())
            .finish()
    }
}
