//! The GLR driver.
//!
//! A parse keeps a set of stack versions and advances them one lookahead at
//! a time. Conflicting actions split a version; versions that reach the same
//! state at the same position merge again. When every version is stuck, the
//! cheapest one enters error recovery (see `recovery`).

mod recovery;

use sapling_input::{InputEdit, Length, TextRange, TextSize, TextSource};
use sapling_language::{Language, ParseAction, ProductionId, StateId, Symbol};
use sapling_lexer::{ExternalState, Lexer};
use sapling_tree::{Subtree, Tree};

use crate::reusable::ReusableNode;
use crate::stack::{Stack, same_external_state, select_subtree};
use crate::{ParseError, ParserConfig};

/// Parses text in one language. A parser holds no state between parses, so
/// one parser can serve any number of them.
#[derive(Clone, Debug)]
pub struct Parser {
    language: Language,
    config: ParserConfig,
}

/// The result of reparsing edited text.
#[derive(Debug)]
pub struct Reparse {
    pub tree: Tree,
    /// Byte ranges, in the new text, whose syntax differs from the old tree.
    pub changed_ranges: Vec<TextRange>,
}

impl Parser {
    pub fn new(language: Language) -> Self {
        Self { language, config: ParserConfig::default() }
    }

    pub fn with_config(self, config: ParserConfig) -> Self {
        Self { config, ..self }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ParserConfig) {
        self.config = config;
    }

    /// Parses `source`. With `old_tree`, an edited tree of the previous
    /// version of the text, unchanged parts of it are reused.
    pub fn parse<S: TextSource + ?Sized>(
        &self,
        source: &S,
        old_tree: Option<&Tree>,
    ) -> Result<Tree, ParseError> {
        if let Some(old_tree) = old_tree {
            if old_tree.language() != &self.language {
                return Err(ParseError::LanguageMismatch {
                    expected: self.language.name().to_owned(),
                    found: old_tree.language().name().to_owned(),
                });
            }
        }

        let mut run = ParseRun::new(&self.language, self.config, source, old_tree.map(Tree::root));
        run.run()
    }

    /// Applies `edits` to a copy of `old`, in order, and parses `source`
    /// against it.
    pub fn reparse<S: TextSource + ?Sized>(
        &self,
        old: &Tree,
        edits: &[InputEdit],
        source: &S,
    ) -> Result<Reparse, ParseError> {
        let mut edited = old.clone();
        for edit in edits {
            edited.edit(edit);
        }
        let tree = self.parse(source, Some(&edited))?;
        let changed_ranges = Tree::changed_ranges(&edited, &tree);
        Ok(Reparse { tree, changed_ranges })
    }
}

struct CachedToken {
    position: TextSize,
    external_state: Option<ExternalState>,
    token: Subtree,
}

/// The state of one parse.
struct ParseRun<'a, S: ?Sized> {
    language: &'a Language,
    config: ParserConfig,
    lexer: Lexer<'a, S>,
    stack: Stack,
    reusable: ReusableNode<'a>,
    cached_token: Option<CachedToken>,
    finished: Option<Subtree>,
    accept_count: usize,
    operations: u64,
}

impl<'a, S: TextSource + ?Sized> ParseRun<'a, S> {
    fn new(
        language: &'a Language,
        config: ParserConfig,
        source: &'a S,
        old_root: Option<&'a Subtree>,
    ) -> Self {
        Self {
            language,
            config,
            lexer: Lexer::new(language, source),
            stack: Stack::new(config.recovery.max_pop_paths),
            reusable: ReusableNode::new(old_root),
            cached_token: None,
            finished: None,
            accept_count: 0,
            operations: 0,
        }
    }

    fn run(&mut self) -> Result<Tree, ParseError> {
        let mut last_position = TextSize::new(0);
        loop {
            let mut version = 0;
            while version < self.stack.version_count() {
                let allow_reuse = self.stack.version_count() == 1;
                while self.stack.is_active(version) {
                    self.operations += 1;
                    if self.config.budget.is_exhausted(self.operations) {
                        return Err(self.budget_exceeded());
                    }

                    self.advance(version, allow_reuse);

                    let position = self.stack.position(version).bytes;
                    if position > last_position || (version > 0 && position == last_position) {
                        last_position = position;
                        break;
                    }
                }
                version += 1;
            }

            let min_error_cost = self.condense();
            let freed = self.stack.collect_garbage();
            if freed > 0 {
                tracing::trace!(freed, "collect_garbage");
            }
            if self.finished.as_ref().is_some_and(|tree| tree.error_cost() < min_error_cost) {
                break;
            }
            if self.stack.version_count() == 0 {
                break;
            }
        }

        let Some(root) = self.finished.take() else {
            unreachable!("every stack version was dropped without accepting");
        };
        tracing::debug!(
            language = self.language.name(),
            error_cost = root.error_cost(),
            operations = self.operations,
            "parse finished"
        );
        Ok(Tree::new(root, self.language.clone()))
    }

    /// Wraps what version 0 has parsed so far, followed by the unread rest
    /// of the text.
    fn budget_exceeded(&mut self) -> ParseError {
        let language = self.language;
        let at = self.stack.position(0);
        let mut children =
            self.stack.pop_all(0).into_iter().next().map_or_else(Vec::new, |slice| slice.subtrees);
        let end = self.lexer.end_from(at);
        children.push(Subtree::unparsed(Length::ZERO, end - at));

        let symbol = language.start_symbol().unwrap_or(Symbol::ERROR);
        let root = Subtree::synthetic(symbol, children, language).with_parse_state(None);
        tracing::debug!(at = u32::from(at.bytes), operations = self.operations, "budget exceeded");
        ParseError::BudgetExceeded { partial: Box::new(Tree::new(root, language.clone())), at }
    }

    fn advance(&mut self, version: usize, allow_reuse: bool) {
        let language = self.language;
        let mut state = self.stack.state(version);
        let position = self.stack.position(version);
        let last_external = self.stack.last_external_state(version).cloned();

        let reused = if allow_reuse {
            self.reuse_node(version, &mut state, position.bytes, last_external.as_ref())
        } else {
            None
        };
        let mut did_reuse = reused.is_some();
        let mut lookahead = match reused {
            Some(subtree) => subtree,
            None => match self.cached_token(state, position.bytes, last_external.as_ref()) {
                Some(token) => token,
                None => self.lex(state, position, last_external.as_ref()),
            },
        };

        loop {
            let leaf = first_leaf(&lookahead);
            let lookahead_end = position.bytes + leaf.total().bytes;
            let actions = language.actions(state, leaf.symbol());

            let mut last_reduction_version = None;
            for &action in actions {
                let (extra, mut next_state) = match action {
                    ParseAction::Shift(next_state) => (false, next_state),
                    ParseAction::ShiftExtra => (true, state),
                    ParseAction::Reduce(production) => {
                        let fragile = actions.len() > 1;
                        let reduction =
                            self.reduce(version, production, fragile, Some(lookahead_end));
                        if let Some(reduction) = reduction {
                            last_reduction_version = Some(reduction);
                        }
                        continue;
                    }
                    ParseAction::Accept => {
                        self.accept(version, lookahead);
                        return;
                    }
                };

                if !lookahead.is_leaf() {
                    lookahead = self.breakdown_lookahead(lookahead, state);
                    if !extra {
                        next_state = language
                            .next_state(state, lookahead.symbol())
                            .unwrap_or(StateId::ERROR);
                    }
                }
                self.shift(version, next_state, lookahead, extra);
                if did_reuse {
                    self.reusable.advance();
                }
                return;
            }

            // Carry on with one of the reduced versions, same lookahead.
            if let Some(reduction) = last_reduction_version {
                self.stack.renumber_version(reduction, version);
                state = self.stack.state(version);
                continue;
            }

            if state == StateId::ERROR {
                if !lookahead.is_leaf() {
                    lookahead = self.breakdown_lookahead(lookahead, StateId::ERROR);
                }
                self.recover(version, lookahead);
                return;
            }

            // A reused subtree on top of the stack may not fit the text that
            // follows it; retry with its children.
            if self.breakdown_top_of_stack(version) {
                state = self.stack.state(version);
                lookahead = self.lex(state, position, last_external.as_ref());
                did_reuse = false;
                continue;
            }

            tracing::trace!(
                version,
                state = state.0,
                lookahead = language.symbol_name(lookahead.symbol()),
                "detect_error"
            );
            self.stack.pause(version, lookahead);
            return;
        }
    }

    fn lex(
        &mut self,
        state: StateId,
        position: Length,
        external_state: Option<&ExternalState>,
    ) -> Subtree {
        let token = self.lexer.next_token(position, state, external_state.map(|state| &state[..]));
        tracing::trace!(
            symbol = self.language.symbol_name(token.symbol),
            start = u32::from((position + token.padding).bytes),
            size = u32::from(token.size.bytes),
            "lex"
        );
        let leaf = Subtree::leaf(&token, self.language);
        self.cached_token = Some(CachedToken {
            position: position.bytes,
            external_state: external_state.cloned(),
            token: leaf.clone(),
        });
        leaf
    }

    fn cached_token(
        &self,
        state: StateId,
        position: TextSize,
        external_state: Option<&ExternalState>,
    ) -> Option<Subtree> {
        let cached = self.cached_token.as_ref()?;
        if cached.position != position
            || !same_external_state(cached.external_state.as_ref(), external_state)
        {
            return None;
        }
        let has_actions = self.language.has_actions(state, cached.token.symbol());
        self.can_reuse_first_leaf(state, &cached.token, has_actions).then(|| cached.token.clone())
    }

    /// Whether the first leaf of `tree` would be lexed the same way in
    /// `state`.
    fn can_reuse_first_leaf(&self, state: StateId, tree: &Subtree, has_actions: bool) -> bool {
        let language = self.language;
        let leaf = first_leaf(tree);
        let lexed_alike =
            leaf.parse_state().is_some_and(|leaf_state| lexes_alike(language, leaf_state, state));
        if has_actions && lexed_alike {
            return true;
        }
        // Empty tokens depend on the lookahead set they were lexed with.
        if leaf.size().bytes == TextSize::new(0) && leaf.symbol() != Symbol::END {
            return false;
        }
        language.valid_external_tokens(state).is_empty()
            && language.is_reusable_token(state, leaf.symbol())
    }

    /// Looks for a subtree of the old tree starting at `position` that can
    /// be taken over as is.
    fn reuse_node(
        &mut self,
        version: usize,
        state: &mut StateId,
        position: TextSize,
        last_external: Option<&ExternalState>,
    ) -> Option<Subtree> {
        let language = self.language;
        while let Some((tree, offset)) = self.reusable.current() {
            let end = if tree.is_leaf() && tree.symbol() == Symbol::END {
                TextSize::new(u32::MAX)
            } else {
                offset + tree.total().bytes
            };
            if offset > position {
                break;
            }
            if offset < position {
                if end <= position || !self.reusable.descend() {
                    self.reusable.advance();
                }
                continue;
            }

            if !same_external_state(self.reusable.last_external_state(), last_external) {
                self.reusable.advance();
                continue;
            }

            let reason = if tree.has_changes() {
                Some("has_changes")
            } else if tree.is_error() {
                Some("is_error")
            } else if tree.is_missing() {
                Some("is_missing")
            } else if tree.fragile() {
                Some("is_fragile")
            } else if tree.has_error() {
                Some("has_error")
            } else if !tree.is_leaf() && tree.child_count() == 0 {
                Some("is_empty")
            } else {
                None
            };
            if let Some(reason) = reason {
                let symbol = language.symbol_name(tree.symbol());
                tracing::trace!(symbol, reason, "cant_reuse_node");
                if !self.reusable.descend() {
                    self.reusable.advance();
                    self.breakdown_top_of_stack(version);
                    *state = self.stack.state(version);
                }
                continue;
            }

            let has_actions = language.has_actions(*state, first_leaf(tree).symbol());
            if !self.can_reuse_first_leaf(*state, tree, has_actions) {
                let symbol = language.symbol_name(tree.symbol());
                tracing::trace!(symbol, "cant_reuse_first_leaf");
                self.reusable.advance_past_leaf();
                break;
            }

            tracing::trace!(
                symbol = language.symbol_name(tree.symbol()),
                start = u32::from(offset),
                size = u32::from(tree.total().bytes),
                "reuse_node"
            );
            return Some(tree.clone());
        }
        None
    }

    /// Descends the reuse walk from a reused lookahead to the first subtree
    /// that was built on top of `state`.
    fn breakdown_lookahead(&mut self, lookahead: Subtree, state: StateId) -> Subtree {
        if !self.reusable.tree().is_some_and(|tree| tree.ptr_eq(&lookahead)) {
            return lookahead;
        }
        let mut descended = false;
        while let Some(tree) = self.reusable.tree() {
            if tree.is_leaf() || tree.parse_state() == Some(state) || !self.reusable.descend() {
                break;
            }
            descended = true;
        }
        match self.reusable.tree() {
            Some(tree) if descended => {
                let symbol = self.language.symbol_name(tree.symbol());
                tracing::trace!(symbol, "state_mismatch");
                tree.clone()
            }
            _ => lookahead,
        }
    }

    fn shift(&mut self, version: usize, state: StateId, lookahead: Subtree, extra: bool) {
        let subtree = lookahead.with_extra(extra);
        let pending = !subtree.is_leaf();
        tracing::trace!(
            version,
            state = state.0,
            symbol = self.language.symbol_name(subtree.symbol()),
            extra,
            "shift"
        );
        let external_state = subtree
            .has_external_tokens()
            .then(|| subtree.last_external_state().cloned())
            .flatten();
        self.stack.push(version, Some(subtree), pending, state);
        if external_state.is_some() {
            self.stack.set_last_external_state(version, external_state);
        }
    }

    /// Reduces `production` on every path of `version`. The paths' results
    /// land in new versions; returns the first of them.
    fn reduce(
        &mut self,
        version: usize,
        production: ProductionId,
        fragile: bool,
        lookahead_end: Option<TextSize>,
    ) -> Option<usize> {
        let language = self.language;
        let rule = *language.production(production);
        let recovery = self.config.recovery;
        let initial_version_count = self.stack.version_count();
        let max_version = recovery.max_version_count
            + recovery.max_version_count_overflow
            + self.stack.halted_version_count();

        tracing::trace!(
            version,
            symbol = language.symbol_name(rule.lhs),
            child_count = rule.child_count,
            "reduce"
        );

        let slices = self.stack.pop_count(version, u32::from(rule.child_count));
        let path_count = slices.len();
        let mut removed = 0;
        let mut slices = slices.into_iter().peekable();
        while let Some(slice) = slices.next() {
            let slice_version = slice.version - removed;
            if slice_version > max_version {
                tracing::trace!(version = slice_version, "too many versions, dropping reduction");
                self.stack.remove_version(slice_version);
                removed += 1;
                while slices.next_if(|next| next.version == slice.version).is_some() {}
                continue;
            }

            let (children, mut trailing) = split_trailing_extras(slice.subtrees);
            let mut parent_children = children.clone();
            let mut parent = Subtree::node(production, children, language);

            // Paths that meet again below the popped subtrees land in the
            // same version; keep one parent for all of them.
            while let Some(next) = slices.next_if(|next| next.version == slice.version) {
                let (next_children, next_trailing) = split_trailing_extras(next.subtrees);
                if same_subtrees(&parent_children, &next_children) {
                    continue;
                }
                let candidate = Subtree::node(production, next_children.clone(), language);
                let selected = select_subtree(parent, candidate.clone());
                if selected.ptr_eq(&candidate) {
                    trailing = next_trailing;
                    parent_children = next_children;
                }
                parent = selected;
            }

            let state = self.stack.state(slice_version);
            let next_state = language.next_state(state, rule.lhs).unwrap_or(StateId::ERROR);
            let shared = fragile || path_count > 1 || initial_version_count > 1;
            let parse_state = if shared { None } else { Some(state) };
            let mut parent = parent.with_parse_state(parse_state);
            if let Some(end) = lookahead_end {
                let start = u32::from(self.stack.position(slice_version).bytes);
                parent = parent.with_lookahead_end(u32::from(end).saturating_sub(start));
            }

            self.stack.push(slice_version, Some(parent), false, next_state);
            for extra in trailing {
                self.stack.push(slice_version, Some(extra), false, next_state);
            }

            for other in 0..slice_version {
                if other != version && self.stack.merge(other, slice_version) {
                    removed += 1;
                    break;
                }
            }
        }

        (self.stack.version_count() > initial_version_count).then_some(initial_version_count)
    }

    fn accept(&mut self, version: usize, lookahead: Subtree) {
        debug_assert_eq!(lookahead.symbol(), Symbol::END);
        let language = self.language;
        self.stack.push(version, Some(lookahead.with_extra(true)), false, StateId::START);

        let slices = self.stack.pop_all(version);
        let first_version = slices.first().map(|slice| slice.version);
        for slice in slices {
            let mut trees = slice.subtrees;
            let Some(index) = trees.iter().rposition(|tree| !tree.extra()) else {
                continue;
            };
            let trailing = trees.split_off(index + 1);
            let Some(tree) = trees.pop() else {
                continue;
            };

            let root = if tree.is_leaf() {
                trees.push(tree);
                trees.extend(trailing);
                Subtree::error_node(trees, language)
            } else {
                tree.with_surrounding(trees, trailing)
            };
            let root = root.with_parse_state(None);

            self.accept_count += 1;
            tracing::trace!(
                version,
                symbol = language.symbol_name(root.symbol()),
                error_cost = root.error_cost(),
                "accept"
            );
            self.finished = Some(match self.finished.take() {
                Some(finished) => select_subtree(finished, root),
                None => root,
            });
        }

        if let Some(first_version) = first_version {
            self.stack.remove_version(first_version);
        }
        self.stack.halt(version);
    }

    /// Replaces a pending subtree on top of the stack with its children.
    fn breakdown_top_of_stack(&mut self, version: usize) -> bool {
        let language = self.language;
        let mut did_break_down = false;
        loop {
            let slices = self.stack.pop_pending(version);
            if slices.is_empty() {
                break;
            }
            did_break_down = true;

            let mut pending = false;
            for slice in slices {
                let mut state = self.stack.state(slice.version);
                let mut subtrees = slice.subtrees.into_iter();
                let Some(parent) = subtrees.next() else {
                    continue;
                };

                for child in parent.children() {
                    pending = !child.is_leaf() && !child.is_ambiguous();
                    if child.is_error() {
                        state = StateId::ERROR;
                    } else if !child.extra() {
                        state =
                            language.next_state(state, child.symbol()).unwrap_or(StateId::ERROR);
                    }
                    self.stack.push(slice.version, Some(child.clone()), pending, state);
                }
                for extra in subtrees {
                    self.stack.push(slice.version, Some(extra), false, state);
                }
                let symbol = language.symbol_name(parent.symbol());
                tracing::trace!(symbol, "breakdown_top_of_stack");
            }

            if !pending {
                break;
            }
        }
        did_break_down
    }
}

fn first_leaf(tree: &Subtree) -> &Subtree {
    let mut leaf = tree;
    while let Some(child) = leaf.children().first() {
        leaf = child;
    }
    leaf
}

/// States whose tokens are lexed from the same automaton state against the
/// same set of valid terminals.
fn lexes_alike(language: &Language, left: StateId, right: StateId) -> bool {
    left == right
        || (language.lex_mode(left) == language.lex_mode(right)
            && language.valid_terminals(left) == language.valid_terminals(right)
            && language.valid_external_tokens(left) == language.valid_external_tokens(right))
}

/// Splits off the extras at the end, which stay outside a reduced node.
fn split_trailing_extras(mut subtrees: Vec<Subtree>) -> (Vec<Subtree>, Vec<Subtree>) {
    let keep = subtrees.iter().rposition(|subtree| !subtree.extra()).map_or(0, |index| index + 1);
    let trailing = subtrees.split_off(keep);
    (subtrees, trailing)
}

fn same_subtrees(left: &[Subtree], right: &[Subtree]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(left, right)| left.ptr_eq(right))
}
