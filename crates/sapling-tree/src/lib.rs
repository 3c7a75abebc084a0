//! Persistent concrete syntax trees.
//!
//! Trees are built from immutable, reference-counted subtrees that are
//! shared freely between a tree, its edited copies and the trees reparsed
//! from them. Navigation goes through borrowed `Node` handles that present
//! only visible nodes.

mod changed_ranges;
mod cursor;
mod edit;
mod node;
mod subtree;
mod tree;

pub use cursor::{Preorder, TreeCursor, WalkEvent};
pub use node::{Children, Node};
pub use subtree::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE, Subtree,
};
pub use tree::Tree;
