use std::fmt;

use sapling_input::{Length, Point, TextRange, TextSize};
use sapling_language::Symbol;

use crate::{Preorder, Subtree, Tree, TreeCursor, WalkEvent};

/// A borrowed view of a visible node. Hidden nodes are never returned;
/// their children are spliced into the nearest visible ancestor.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    /// Where the node's padding starts.
    position: Length,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(tree: &'tree Tree, subtree: &'tree Subtree, position: Length) -> Self {
        Self { tree, subtree, position }
    }

    pub fn tree(self) -> &'tree Tree {
        self.tree
    }

    pub fn subtree(self) -> &'tree Subtree {
        self.subtree
    }

    /// The symbol's name, `ERROR` or `AMBIGUITY`.
    pub fn kind(self) -> &'tree str {
        self.tree.language().symbol_name(self.symbol())
    }

    pub fn symbol(self) -> Symbol {
        self.subtree.navigation_symbol()
    }

    /// The grammar symbol, also for ambiguous nodes.
    pub fn grammar_symbol(self) -> Symbol {
        self.subtree.symbol()
    }

    pub fn is_named(self) -> bool {
        self.subtree.named()
    }

    pub fn is_extra(self) -> bool {
        self.subtree.extra()
    }

    pub fn is_error(self) -> bool {
        self.subtree.is_error()
    }

    pub fn is_missing(self) -> bool {
        self.subtree.is_missing()
    }

    pub fn is_ambiguous(self) -> bool {
        self.subtree.is_ambiguous()
    }

    pub fn has_error(self) -> bool {
        self.subtree.has_error()
    }

    pub fn has_changes(self) -> bool {
        self.subtree.has_changes()
    }

    /// Identity of the underlying subtree. Reused subtrees keep their id
    /// across reparses.
    pub fn id(self) -> usize {
        self.subtree.id()
    }

    pub fn start(self) -> Length {
        self.position + self.subtree.padding()
    }

    pub fn end(self) -> Length {
        self.position + self.subtree.total()
    }

    pub fn start_byte(self) -> TextSize {
        self.start().bytes
    }

    pub fn end_byte(self) -> TextSize {
        self.end().bytes
    }

    pub fn byte_range(self) -> TextRange {
        TextRange::new(self.start_byte(), self.end_byte())
    }

    pub fn start_position(self) -> Point {
        self.start().extent
    }

    pub fn end_position(self) -> Point {
        self.end().extent
    }

    /// The node's text, given the UTF-8 text the tree was parsed from.
    pub fn utf8_text(self, source: &str) -> &str {
        source.get(std::ops::Range::<usize>::from(self.byte_range())).unwrap_or_default()
    }

    pub fn child_count(self) -> usize {
        self.subtree.visible_child_count() as usize
    }

    pub fn named_child_count(self) -> usize {
        self.subtree.named_child_count() as usize
    }

    pub fn children(self) -> Children<'tree> {
        Children::new(self)
    }

    pub fn named_children(self) -> impl Iterator<Item = Self> + 'tree {
        self.children().filter(|child| child.is_named())
    }

    pub fn child(self, index: usize) -> Option<Self> {
        self.children().nth(index)
    }

    pub fn named_child(self, index: usize) -> Option<Self> {
        self.named_children().nth(index)
    }

    /// Found by descending from the root, since nodes do not store parent
    /// links.
    pub fn parent(self) -> Option<Self> {
        let mut stack = vec![self.tree.root_node()];
        while let Some(candidate) = stack.pop() {
            for child in candidate.children() {
                if child == self {
                    return Some(candidate);
                }
                if child.subtree.child_count() > 0 && child.encloses(self) {
                    stack.push(child);
                }
            }
        }
        None
    }

    fn encloses(self, other: Self) -> bool {
        self.position.bytes <= other.position.bytes && other.end_byte() <= self.end_byte()
    }

    fn sibling(self, offset: isize, named: bool) -> Option<Self> {
        let parent = self.parent()?;
        let siblings: Vec<Self> = parent.children().collect();
        let mut index = siblings.iter().position(|&sibling| sibling == self)?;
        loop {
            index = index.checked_add_signed(offset)?;
            let sibling = *siblings.get(index)?;
            if !named || sibling.is_named() {
                return Some(sibling);
            }
        }
    }

    pub fn next_sibling(self) -> Option<Self> {
        self.sibling(1, false)
    }

    pub fn prev_sibling(self) -> Option<Self> {
        self.sibling(-1, false)
    }

    pub fn next_named_sibling(self) -> Option<Self> {
        self.sibling(1, true)
    }

    pub fn prev_named_sibling(self) -> Option<Self> {
        self.sibling(-1, true)
    }

    /// The smallest node that spans `start..end`.
    pub fn descendant_for_byte_range(self, start: TextSize, end: TextSize) -> Option<Self> {
        self.descendant_for_range(start, end, false)
    }

    /// The smallest named node that spans `start..end`.
    pub fn named_descendant_for_byte_range(self, start: TextSize, end: TextSize) -> Option<Self> {
        self.descendant_for_range(start, end, true)
    }

    fn descendant_for_range(self, start: TextSize, end: TextSize, named: bool) -> Option<Self> {
        if start < self.start_byte() || self.end_byte() < end {
            return None;
        }
        let mut node = self;
        let mut found = self;
        'descend: loop {
            for child in node.children() {
                let child_end = child.end_byte();
                // The child must reach the end of the range and go past its start.
                if child_end < end || child_end <= start {
                    continue;
                }
                if start < child.start_byte() {
                    break;
                }
                node = child;
                if !named || child.is_named() {
                    found = child;
                }
                continue 'descend;
            }
            return Some(found);
        }
    }

    pub fn walk(self) -> TreeCursor<'tree> {
        TreeCursor::new(self)
    }

    pub fn preorder(self) -> Preorder<'tree> {
        Preorder::new(self)
    }

    /// S-expression of the named nodes below and including this one.
    pub fn to_sexp(self) -> String {
        let mut out = String::new();
        for event in self.preorder() {
            match event {
                WalkEvent::Enter(node) if node.is_missing() => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str("(MISSING ");
                    if node.is_named() {
                        out.push_str(node.kind());
                    } else {
                        out.push('"');
                        out.push_str(node.kind());
                        out.push('"');
                    }
                    out.push(')');
                }
                WalkEvent::Enter(node) if node.is_named() => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push('(');
                    out.push_str(node.kind());
                }
                WalkEvent::Leave(node) if node.is_named() && !node.is_missing() => out.push(')'),
                WalkEvent::Enter(_) | WalkEvent::Leave(_) => {}
            }
        }
        out
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree)
            && self.subtree.ptr_eq(other.subtree)
            && self.position.bytes == other.position.bytes
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.kind(), self.byte_range())
    }
}

/// Visible children of a node, with hidden nodes flattened.
#[derive(Clone)]
pub struct Children<'tree> {
    tree: &'tree Tree,
    stack: Vec<Frame<'tree>>,
}

#[derive(Clone)]
struct Frame<'tree> {
    subtrees: std::slice::Iter<'tree, Subtree>,
    position: Length,
    /// Alternatives of an ambiguous node all start at the same position and
    /// are all shown.
    alternatives: bool,
}

impl<'tree> Children<'tree> {
    fn new(node: Node<'tree>) -> Self {
        let frame = Frame {
            subtrees: node.subtree.children().iter(),
            position: node.position,
            alternatives: node.subtree.is_ambiguous(),
        };
        Self { tree: node.tree, stack: vec![frame] }
    }
}

impl<'tree> Iterator for Children<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(child) = frame.subtrees.next() else {
                self.stack.pop();
                continue;
            };
            let position = frame.position;
            if frame.alternatives || child.visible() {
                if !frame.alternatives {
                    frame.position += child.total();
                }
                return Some(Node::new(self.tree, child, position));
            }
            frame.position += child.total();
            if child.child_count() > 0 {
                let subtrees = child.children().iter();
                self.stack.push(Frame { subtrees, position, alternatives: false });
            }
        }
    }
}
