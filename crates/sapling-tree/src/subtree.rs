//! Immutable, shared syntax subtrees.
//!
//! Positions are relative: a subtree only knows its own `padding` and
//! `size`, so the same subtree can be shared between trees at different
//! absolute offsets.

use std::fmt;

use sapling_input::Length;
use sapling_language::{Language, ProductionId, StateId, Symbol};
use sapling_lexer::{ExternalState, Token};
use triomphe::Arc;

pub const ERROR_COST_PER_RECOVERY: u32 = 500;
pub const ERROR_COST_PER_MISSING_TREE: u32 = 110;
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

/// A reference-counted handle to an immutable subtree. Cloning is cheap.
#[derive(Clone)]
pub struct Subtree(Arc<SubtreeData>);

#[derive(Clone, Debug)]
struct SubtreeData {
    symbol: Symbol,
    padding: Length,
    size: Length,
    lookahead_bytes: u32,
    parse_state: Option<StateId>,
    error_cost: u32,
    visible: bool,
    named: bool,
    extra: bool,
    fragile: bool,
    has_changes: bool,
    has_error: bool,
    kind: SubtreeKind,
}

#[derive(Clone, Debug)]
enum SubtreeKind {
    Leaf { external_state: Option<ExternalState> },
    Missing,
    Node(Children),
    /// Alternatives for the same span; `symbol` is their common symbol.
    Ambiguous(Children),
}

#[derive(Clone, Debug)]
struct Children {
    production: Option<ProductionId>,
    subtrees: Vec<Subtree>,
    visible_child_count: u32,
    named_child_count: u32,
    node_count: u32,
    /// Precedence of the production itself.
    rule_precedence: i32,
    /// Sum over the whole subtree.
    dynamic_precedence: i32,
    has_external_tokens: bool,
}

impl Subtree {
    pub fn leaf(token: &Token, language: &Language) -> Self {
        if token.is_error() {
            let Token { padding, size, lookahead_bytes, parse_state, .. } = *token;
            return Self::error_leaf(padding, size, lookahead_bytes, parse_state);
        }
        Self(Arc::new(SubtreeData {
            symbol: token.symbol,
            padding: token.padding,
            size: token.size,
            lookahead_bytes: token.lookahead_bytes,
            parse_state: Some(token.parse_state),
            error_cost: 0,
            visible: language.is_visible(token.symbol),
            named: language.is_named(token.symbol),
            extra: token.extra,
            fragile: false,
            has_changes: false,
            has_error: false,
            kind: SubtreeKind::Leaf { external_state: token.external_state.clone() },
        }))
    }

    /// A character no token matched.
    pub fn error_leaf(
        padding: Length,
        size: Length,
        lookahead_bytes: u32,
        parse_state: StateId,
    ) -> Self {
        let error_cost = ERROR_COST_PER_RECOVERY
            + ERROR_COST_PER_SKIPPED_CHAR * u32::from(size.bytes)
            + ERROR_COST_PER_SKIPPED_LINE * size.extent.row;
        Self(Arc::new(SubtreeData {
            symbol: Symbol::ERROR,
            padding,
            size,
            lookahead_bytes,
            parse_state: Some(parse_state),
            error_cost,
            visible: true,
            named: true,
            extra: false,
            fragile: false,
            has_changes: false,
            has_error: true,
            kind: SubtreeKind::Leaf { external_state: None },
        }))
    }

    /// A zero-width token the parser pretended to see.
    pub fn missing_leaf(
        symbol: Symbol,
        padding: Length,
        lookahead_bytes: u32,
        language: &Language,
    ) -> Self {
        Self(Arc::new(SubtreeData {
            symbol,
            padding,
            size: Length::ZERO,
            lookahead_bytes,
            parse_state: None,
            error_cost: ERROR_COST_PER_MISSING_TREE + ERROR_COST_PER_RECOVERY,
            visible: language.is_visible(symbol),
            named: language.is_named(symbol),
            extra: false,
            fragile: true,
            has_changes: false,
            has_error: true,
            kind: SubtreeKind::Missing,
        }))
    }

    /// Covers input a parse never reached.
    pub fn unparsed(padding: Length, size: Length) -> Self {
        Self(Arc::new(SubtreeData {
            symbol: Symbol::UNPARSED,
            padding,
            size,
            lookahead_bytes: 0,
            parse_state: None,
            error_cost: 0,
            visible: true,
            named: true,
            extra: false,
            fragile: true,
            has_changes: false,
            has_error: false,
            kind: SubtreeKind::Leaf { external_state: None },
        }))
    }

    /// The result of reducing `production` over `children`.
    pub fn node(production: ProductionId, children: Vec<Self>, language: &Language) -> Self {
        let rule = language.production(production);
        let dynamic_precedence = i32::from(rule.dynamic_precedence);
        Self::with_children(rule.lhs, Some(production), dynamic_precedence, children, language)
    }

    /// An internal node without a production, such as the root of a
    /// partial tree.
    pub fn synthetic(symbol: Symbol, children: Vec<Self>, language: &Language) -> Self {
        Self::with_children(symbol, None, 0, children, language)
    }

    /// Wraps skipped input.
    pub fn error_node(children: Vec<Self>, language: &Language) -> Self {
        Self::with_children(Symbol::ERROR, None, 0, children, language)
    }

    /// Hidden accumulator of skipped tokens inside an `ERROR` node.
    pub fn error_repeat(children: Vec<Self>, language: &Language) -> Self {
        Self::with_children(Symbol::ERROR_REPEAT, None, 0, children, language)
    }

    /// Combines interpretations of the same span. A single alternative is
    /// returned unchanged.
    pub fn ambiguous(mut alternatives: Vec<Self>) -> Self {
        debug_assert!(!alternatives.is_empty());
        if alternatives.len() == 1 {
            return alternatives.swap_remove(0);
        }

        let first = &alternatives[0];
        let named_count = alternatives.iter().filter(|alternative| alternative.named()).count();
        let children = Children {
            production: None,
            visible_child_count: alternatives.len() as u32,
            named_child_count: named_count as u32,
            node_count: 1 + alternatives.iter().map(Self::node_count).sum::<u32>(),
            rule_precedence: 0,
            dynamic_precedence: alternatives
                .iter()
                .map(Self::dynamic_precedence)
                .max()
                .unwrap_or(0),
            has_external_tokens: alternatives.iter().any(Self::has_external_tokens),
            subtrees: Vec::new(),
        };
        let data = SubtreeData {
            symbol: first.symbol(),
            padding: first.padding(),
            size: first.size(),
            lookahead_bytes: alternatives.iter().map(Self::lookahead_bytes).max().unwrap_or(0),
            parse_state: None,
            error_cost: alternatives.iter().map(Self::error_cost).min().unwrap_or(0),
            visible: true,
            named: true,
            extra: first.extra(),
            fragile: true,
            has_changes: false,
            has_error: alternatives.iter().all(Self::has_error),
            kind: SubtreeKind::Ambiguous(Children { subtrees: alternatives, ..children }),
        };
        Self(Arc::new(data))
    }

    fn with_children(
        symbol: Symbol,
        production: Option<ProductionId>,
        dynamic_precedence: i32,
        subtrees: Vec<Self>,
        language: &Language,
    ) -> Self {
        let mut data = SubtreeData {
            symbol,
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 0,
            parse_state: None,
            error_cost: 0,
            visible: language.is_visible(symbol),
            named: language.is_named(symbol),
            extra: false,
            fragile: false,
            has_changes: false,
            has_error: symbol == Symbol::ERROR,
            kind: SubtreeKind::Node(Children {
                production,
                subtrees,
                visible_child_count: 0,
                named_child_count: 0,
                node_count: 1,
                rule_precedence: dynamic_precedence,
                dynamic_precedence,
                has_external_tokens: false,
            }),
        };
        data.summarize();
        Self(Arc::new(data))
    }

    /// Returns a copy with `trailing` appended to the children and the
    /// summaries recomputed. Ambiguous nodes append to every alternative.
    pub fn with_trailing(self, trailing: Vec<Self>) -> Self {
        self.with_surrounding(Vec::new(), trailing)
    }

    /// Returns a copy with `leading` put before the children and `trailing`
    /// after them.
    pub fn with_surrounding(mut self, leading: Vec<Self>, trailing: Vec<Self>) -> Self {
        if leading.is_empty() && trailing.is_empty() {
            return self;
        }
        if self.is_ambiguous() {
            let alternatives = self
                .children()
                .iter()
                .map(|alternative| {
                    alternative.clone().with_surrounding(leading.clone(), trailing.clone())
                })
                .collect();
            return Self::ambiguous(alternatives);
        }

        let data = Arc::make_mut(&mut self.0);
        match &mut data.kind {
            SubtreeKind::Node(children) => {
                children.subtrees.splice(0..0, leading);
                children.subtrees.extend(trailing);
            }
            _ => panic!("cannot add children to a leaf"),
        }
        data.summarize();
        self
    }

    pub fn symbol(&self) -> Symbol {
        self.0.symbol
    }

    /// The symbol shown when navigating: ambiguous nodes show as
    /// `AMBIGUITY`.
    pub fn navigation_symbol(&self) -> Symbol {
        if self.is_ambiguous() { Symbol::AMBIGUITY } else { self.0.symbol }
    }

    pub fn padding(&self) -> Length {
        self.0.padding
    }

    pub fn size(&self) -> Length {
        self.0.size
    }

    /// Padding plus size.
    pub fn total(&self) -> Length {
        self.0.padding + self.0.size
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.0.lookahead_bytes
    }

    /// For internal nodes, the state the node was pushed onto; for leaves,
    /// the state they were lexed in. `None` when the node is fragile.
    pub fn parse_state(&self) -> Option<StateId> {
        self.0.parse_state
    }

    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    pub fn visible(&self) -> bool {
        self.0.visible
    }

    pub fn named(&self) -> bool {
        self.0.named
    }

    pub fn extra(&self) -> bool {
        self.0.extra
    }

    pub fn fragile(&self) -> bool {
        self.0.fragile
    }

    pub fn has_changes(&self) -> bool {
        self.0.has_changes
    }

    pub fn has_error(&self) -> bool {
        self.0.has_error
    }

    pub fn is_error(&self) -> bool {
        self.0.symbol == Symbol::ERROR
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.0.kind, SubtreeKind::Missing)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.0.kind, SubtreeKind::Leaf { .. } | SubtreeKind::Missing)
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self.0.kind, SubtreeKind::Ambiguous(_))
    }

    fn children_data(&self) -> Option<&Children> {
        match &self.0.kind {
            SubtreeKind::Node(children) | SubtreeKind::Ambiguous(children) => Some(children),
            SubtreeKind::Leaf { .. } | SubtreeKind::Missing => None,
        }
    }

    /// Direct children, hidden ones included. For ambiguous nodes, the
    /// alternatives.
    pub fn children(&self) -> &[Self] {
        self.children_data().map_or(&[], |children| &children.subtrees)
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Children as seen through hidden nodes.
    pub fn visible_child_count(&self) -> u32 {
        self.children_data().map_or(0, |children| children.visible_child_count)
    }

    pub fn named_child_count(&self) -> u32 {
        self.children_data().map_or(0, |children| children.named_child_count)
    }

    pub fn node_count(&self) -> u32 {
        self.children_data().map_or(1, |children| children.node_count)
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.children_data().map_or(0, |children| children.dynamic_precedence)
    }

    pub fn production(&self) -> Option<ProductionId> {
        self.children_data().and_then(|children| children.production)
    }

    pub fn external_state(&self) -> Option<&ExternalState> {
        match &self.0.kind {
            SubtreeKind::Leaf { external_state } => external_state.as_ref(),
            _ => None,
        }
    }

    pub fn has_external_tokens(&self) -> bool {
        match &self.0.kind {
            SubtreeKind::Leaf { external_state } => external_state.is_some(),
            SubtreeKind::Missing => false,
            SubtreeKind::Node(children) | SubtreeKind::Ambiguous(children) => {
                children.has_external_tokens
            }
        }
    }

    /// State of the last external token inside this subtree.
    pub fn last_external_state(&self) -> Option<&ExternalState> {
        let mut subtree = self;
        loop {
            if let Some(state) = subtree.external_state() {
                return Some(state);
            }
            subtree = subtree.children().iter().rev().find(|child| child.has_external_tokens())?;
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared data; stable for the subtree's lifetime.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Number of handles sharing this subtree.
    pub fn ref_count(&self) -> usize {
        Arc::count(&self.0)
    }

    pub fn into_extra(self) -> Self {
        self.with_extra(true)
    }

    pub fn with_extra(mut self, extra: bool) -> Self {
        if self.0.extra != extra {
            Arc::make_mut(&mut self.0).extra = extra;
        }
        self
    }

    /// Records the state the node was pushed onto, or marks it fragile.
    pub fn with_parse_state(mut self, parse_state: Option<StateId>) -> Self {
        let data = Arc::make_mut(&mut self.0);
        data.parse_state = parse_state;
        data.fragile = parse_state.is_none();
        self
    }

    /// Widens the lookahead so that it reaches `end` bytes past the start of
    /// this subtree's padding.
    pub fn with_lookahead_end(mut self, end: u32) -> Self {
        let total = u32::from(self.total().bytes);
        let lookahead = end.saturating_sub(total);
        if lookahead > self.0.lookahead_bytes {
            Arc::make_mut(&mut self.0).lookahead_bytes = lookahead;
        }
        self
    }

    /// Takes the children out of a uniquely owned copy of this subtree.
    pub(crate) fn take_children(&mut self) -> Vec<Self> {
        match &mut Arc::make_mut(&mut self.0).kind {
            SubtreeKind::Node(children) | SubtreeKind::Ambiguous(children) => {
                std::mem::take(&mut children.subtrees)
            }
            SubtreeKind::Leaf { .. } | SubtreeKind::Missing => Vec::new(),
        }
    }

    /// Puts edited children back and derives the span from them.
    pub(crate) fn restore_children(&mut self, subtrees: Vec<Self>) {
        let padding = subtrees.first().map_or(Length::ZERO, Self::padding);
        let total = if self.is_ambiguous() {
            subtrees.first().map_or(Length::ZERO, Self::total)
        } else {
            subtrees.iter().fold(Length::ZERO, |total, child| total + child.total())
        };

        let data = Arc::make_mut(&mut self.0);
        if let SubtreeKind::Node(children) | SubtreeKind::Ambiguous(children) = &mut data.kind {
            children.subtrees = subtrees;
            data.padding = padding;
            data.size = total - padding;
        }
    }

    pub(crate) fn set_edited_span(&mut self, padding: Length, size: Length) {
        let data = Arc::make_mut(&mut self.0);
        data.padding = padding;
        data.size = size;
        data.has_changes = true;
    }
}

/// Releases deep trees without recursing once per level: children of a
/// subtree owned only by the one being dropped are moved to a worklist
/// before their own handle goes away.
impl Drop for SubtreeData {
    fn drop(&mut self) {
        let mut pending = match &mut self.kind {
            SubtreeKind::Node(children) | SubtreeKind::Ambiguous(children) => {
                std::mem::take(&mut children.subtrees)
            }
            SubtreeKind::Leaf { .. } | SubtreeKind::Missing => return,
        };
        while let Some(mut subtree) = pending.pop() {
            let Some(data) = Arc::get_mut(&mut subtree.0) else {
                continue;
            };
            if let SubtreeKind::Node(children) | SubtreeKind::Ambiguous(children) = &mut data.kind {
                pending.append(&mut children.subtrees);
            }
        }
    }
}

impl SubtreeData {
    /// Recomputes everything derived from the children.
    fn summarize(&mut self) {
        let symbol = self.symbol;
        let is_error_node = symbol == Symbol::ERROR || symbol == Symbol::ERROR_REPEAT;
        let SubtreeKind::Node(children) = &mut self.kind else {
            return;
        };

        let mut total = Length::ZERO;
        let mut lookahead_end = 0;
        let mut error_cost = 0;
        let mut has_error = symbol == Symbol::ERROR;
        children.visible_child_count = 0;
        children.named_child_count = 0;
        children.node_count = 1;
        children.has_external_tokens = false;
        let mut dynamic_precedence = children.rule_precedence;

        for (index, child) in children.subtrees.iter().enumerate() {
            let child_end = total + child.total();
            lookahead_end = lookahead_end.max(u32::from(child_end.bytes) + child.lookahead_bytes());

            error_cost += child.error_cost();
            let skips_tree = !child.extra()
                && child.symbol() != Symbol::ERROR_REPEAT
                && !(child.is_error() && child.is_leaf());
            if is_error_node && skips_tree {
                let skipped_trees = if child.visible() { 1 } else { child.visible_child_count() };
                let skipped = if index == 0 { child.size() } else { child.total() };
                error_cost += ERROR_COST_PER_SKIPPED_TREE * skipped_trees
                    + ERROR_COST_PER_SKIPPED_CHAR * u32::from(skipped.bytes)
                    + ERROR_COST_PER_SKIPPED_LINE * skipped.extent.row;
            }

            has_error |= child.has_error();
            dynamic_precedence += child.dynamic_precedence();
            children.node_count += child.node_count();
            children.has_external_tokens |= child.has_external_tokens();

            if child.visible() {
                children.visible_child_count += 1;
                children.named_child_count += u32::from(child.named());
            } else if !child.is_leaf() && !child.is_ambiguous() {
                children.visible_child_count += child.visible_child_count();
                children.named_child_count += child.named_child_count();
            }

            total = child_end;
        }

        if symbol == Symbol::ERROR {
            error_cost += ERROR_COST_PER_RECOVERY;
        }

        let padding = children.subtrees.first().map_or(Length::ZERO, Subtree::padding);
        children.dynamic_precedence = dynamic_precedence;
        self.padding = padding;
        self.size = total - padding;
        self.lookahead_bytes = lookahead_end.saturating_sub(u32::from(total.bytes));
        self.error_cost = error_cost;
        self.has_error = has_error;
    }
}

impl fmt::Debug for Subtree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subtree")
            .field("symbol", &self.0.symbol)
            .field("padding", &self.0.padding)
            .field("size", &self.0.size)
            .field("children", &self.children().len())
            .finish_non_exhaustive()
    }
}
