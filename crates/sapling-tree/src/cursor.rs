use crate::Node;
use crate::node::Children;

/// A stateful walker over visible nodes.
pub struct TreeCursor<'tree> {
    node: Node<'tree>,
    /// Each ancestor with the iterator over the siblings still ahead.
    ancestors: Vec<(Node<'tree>, Children<'tree>)>,
}

impl<'tree> TreeCursor<'tree> {
    pub fn new(node: Node<'tree>) -> Self {
        Self { node, ancestors: Vec::new() }
    }

    pub fn node(&self) -> Node<'tree> {
        self.node
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn goto_first_child(&mut self) -> bool {
        let mut children = self.node.children();
        match children.next() {
            Some(child) => {
                self.ancestors.push((self.node, children));
                self.node = child;
                true
            }
            None => false,
        }
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        let next = self.ancestors.last_mut().and_then(|(_, siblings)| siblings.next());
        match next {
            Some(sibling) => {
                self.node = sibling;
                true
            }
            None => false,
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        match self.ancestors.pop() {
            Some((parent, _)) => {
                self.node = parent;
                true
            }
            None => false,
        }
    }
}

/// Enter/leave events of a depth-first walk.
pub struct Preorder<'tree> {
    start: Node<'tree>,
    ancestors: Vec<(Node<'tree>, Children<'tree>)>,
    last: Option<WalkEvent<'tree>>,
    started: bool,
    skip_subtree: bool,
}

impl<'tree> Preorder<'tree> {
    pub fn new(start: Node<'tree>) -> Self {
        Self { start, ancestors: Vec::new(), last: None, started: false, skip_subtree: false }
    }

    /// Do not descend into the node most recently entered.
    pub fn skip_subtree(&mut self) {
        self.skip_subtree = true;
    }
}

impl<'tree> Iterator for Preorder<'tree> {
    type Item = WalkEvent<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.last.take() {
            None if !self.started => {
                self.started = true;
                WalkEvent::Enter(self.start)
            }
            None => return None,
            Some(WalkEvent::Enter(node)) => {
                let skip = std::mem::take(&mut self.skip_subtree);
                let mut children = node.children();
                match children.next() {
                    Some(child) if !skip => {
                        self.ancestors.push((node, children));
                        WalkEvent::Enter(child)
                    }
                    _ => WalkEvent::Leave(node),
                }
            }
            Some(WalkEvent::Leave(_)) => {
                let (parent, siblings) = self.ancestors.last_mut()?;
                match siblings.next() {
                    Some(sibling) => WalkEvent::Enter(sibling),
                    None => {
                        let parent = *parent;
                        self.ancestors.pop();
                        WalkEvent::Leave(parent)
                    }
                }
            }
        };
        self.last = Some(event);
        Some(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent<'tree> {
    Enter(Node<'tree>),
    Leave(Node<'tree>),
}
