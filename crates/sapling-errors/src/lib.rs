//! Diagnostics for the error and missing nodes of a parsed tree.

use std::fmt::Display;

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
use sapling_language::Symbol;
use sapling_tree::{Node, Tree, WalkEvent};
pub use text_size::TextRange;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
    range: TextRange,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn error(message: impl Into<String>, range: TextRange) -> Self {
        Self { message: message.into(), range }
    }

    /// One diagnostic per outermost error node, missing node and unparsed
    /// tail, in text order.
    pub fn collect(tree: &Tree) -> Vec<Self> {
        let mut diagnostics = Vec::new();
        let root = tree.root_node();
        let mut preorder = root.preorder();
        while let Some(event) = preorder.next() {
            let WalkEvent::Enter(node) = event else {
                continue;
            };
            // An unparsed tail only ever sits directly under the root.
            if node != root && !node.has_error() && node.symbol() != Symbol::UNPARSED {
                preorder.skip_subtree();
                continue;
            }
            if let Some(diagnostic) = Self::for_node(node) {
                diagnostics.push(diagnostic);
                preorder.skip_subtree();
            }
        }
        diagnostics
    }

    fn for_node(node: Node<'_>) -> Option<Self> {
        let message = if node.symbol() == Symbol::UNPARSED {
            "input left unparsed".to_owned()
        } else if node.is_missing() {
            format!("missing {}", describe(node))
        } else if node.is_error() {
            match node.children().next() {
                Some(first) => format!("unexpected {}", describe(first)),
                None => "unexpected character".to_owned(),
            }
        } else {
            return None;
        };
        Some(Self::error(message, node.byte_range()))
    }

    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let message = Level::Error.title(&self.message).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(Level::Error.span(self.range.into()).label("here"))
                .fold(true),
        );
        renderer.render(message)
    }
}

fn describe(node: Node<'_>) -> String {
    if node.is_named() { node.kind().to_owned() } else { format!("`{}`", node.kind()) }
}
