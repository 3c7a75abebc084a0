//! Error recovery and pruning of stack versions.
//!
//! A stuck version either pretends a missing token was there, returns to a
//! state further down the stack and wraps what lies in between in an
//! `ERROR` node, or skips the lookahead. Every option carries a cost, and
//! `condense` keeps the versions whose costs are competitive.

use sapling_input::{Length, TextSource};
use sapling_language::{Language, ParseAction, StateId, Symbol};
use sapling_tree::{
    ERROR_COST_PER_SKIPPED_CHAR, ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE, Subtree,
};

use super::{ParseRun, first_leaf, split_trailing_extras};
use crate::stack::same_external_state;

#[derive(Clone, Copy, Debug)]
struct ErrorStatus {
    cost: u32,
    node_count: u32,
    dynamic_precedence: i32,
    in_error: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparison {
    TakeLeft,
    PreferLeft,
    None,
    PreferRight,
    TakeRight,
}

impl<S: TextSource + ?Sized> ParseRun<'_, S> {
    fn version_status(&mut self, version: usize) -> ErrorStatus {
        let paused = self.stack.is_paused(version);
        let mut cost = self.stack.error_cost(version);
        if paused {
            cost += ERROR_COST_PER_SKIPPED_TREE;
        }
        ErrorStatus {
            cost,
            node_count: self.stack.node_count_since_error(version),
            dynamic_precedence: self.stack.dynamic_precedence(version),
            in_error: paused || self.stack.state(version) == StateId::ERROR,
        }
    }

    fn compare_versions(&self, left: ErrorStatus, right: ErrorStatus) -> Comparison {
        let max_cost_difference = self.config.recovery.max_cost_difference;
        if !left.in_error && right.in_error {
            return if left.cost < right.cost {
                Comparison::TakeLeft
            } else {
                Comparison::PreferLeft
            };
        }
        if left.in_error && !right.in_error {
            return if right.cost < left.cost {
                Comparison::TakeRight
            } else {
                Comparison::PreferRight
            };
        }
        if left.cost < right.cost {
            let scaled = (right.cost - left.cost).saturating_mul(1 + left.node_count);
            return if scaled > max_cost_difference {
                Comparison::TakeLeft
            } else {
                Comparison::PreferLeft
            };
        }
        if right.cost < left.cost {
            let scaled = (left.cost - right.cost).saturating_mul(1 + right.node_count);
            return if scaled > max_cost_difference {
                Comparison::TakeRight
            } else {
                Comparison::PreferRight
            };
        }
        match left.dynamic_precedence.cmp(&right.dynamic_precedence) {
            std::cmp::Ordering::Greater => Comparison::PreferLeft,
            std::cmp::Ordering::Less => Comparison::PreferRight,
            std::cmp::Ordering::Equal => Comparison::None,
        }
    }

    /// Whether spending `cost` on `version` is pointless because another
    /// version, or a finished tree, is already doing better.
    fn better_version_exists(&mut self, version: usize, in_error: bool, cost: u32) -> bool {
        if self.finished.as_ref().is_some_and(|tree| tree.error_cost() <= cost) {
            return true;
        }

        let position = self.stack.position(version).bytes;
        let status = ErrorStatus {
            cost,
            node_count: self.stack.node_count_since_error(version),
            dynamic_precedence: self.stack.dynamic_precedence(version),
            in_error,
        };
        for other in 0..self.stack.version_count() {
            if other == version
                || !self.stack.is_active(other)
                || self.stack.position(other).bytes < position
            {
                continue;
            }
            let other_status = self.version_status(other);
            match self.compare_versions(status, other_status) {
                Comparison::TakeRight => return true,
                Comparison::PreferRight if self.stack.can_merge(other, version) => return true,
                _ => {}
            }
        }
        false
    }

    /// Starts recovery on a version that no action could move forward.
    pub(super) fn handle_error(&mut self, version: usize, lookahead: Subtree) {
        let language = self.language;
        let previous_version_count = self.stack.version_count();

        // Reduce whatever can be reduced regardless of the lookahead, so the
        // recovery sees every state the version could be in.
        self.do_all_potential_reductions(version, Symbol::END);
        let version_count = self.stack.version_count();
        let lookahead_symbol = first_leaf(&lookahead).symbol();

        let mut did_insert_missing = false;
        let mut current = version;
        while current < version_count {
            if !did_insert_missing {
                did_insert_missing = self.insert_missing(current, &lookahead, lookahead_symbol);
            }

            self.stack.push(current, None, false, StateId::ERROR);
            current = if current == version { previous_version_count } else { current + 1 };
        }

        for _ in previous_version_count..version_count {
            let merged = self.stack.merge(version, previous_version_count);
            debug_assert!(merged, "versions pushed into the error state must merge");
            if !merged {
                break;
            }
        }

        self.stack.record_summary(version, self.config.recovery.max_summary_depth);

        let lookahead = if lookahead.is_leaf() {
            lookahead
        } else {
            self.breakdown_lookahead(lookahead, StateId::ERROR)
        };
        tracing::trace!(
            version,
            lookahead = language.symbol_name(lookahead.symbol()),
            "handle_error"
        );
        self.recover(version, lookahead);
    }

    /// Tries every token that would let `version` continue with
    /// `lookahead_symbol` once inserted. Keeps the first that works as a new
    /// version.
    fn insert_missing(
        &mut self,
        version: usize,
        lookahead: &Subtree,
        lookahead_symbol: Symbol,
    ) -> bool {
        let language = self.language;
        let state = self.stack.state(version);
        let lookahead_bytes = u32::from(lookahead.total().bytes) + lookahead.lookahead_bytes();

        for symbol in (1..language.token_count()).map(|symbol| Symbol(symbol as u16)) {
            let Some(state_after_missing) = language.next_state(state, symbol) else {
                continue;
            };
            if state_after_missing == state
                || state_after_missing == StateId::ERROR
                || !has_reduce_action(language, state_after_missing, lookahead_symbol)
            {
                continue;
            }

            let copy = self.stack.copy_version(version);
            let missing = Subtree::missing_leaf(symbol, Length::ZERO, lookahead_bytes, language);
            self.stack.push(copy, Some(missing), false, state_after_missing);
            if self.do_all_potential_reductions(copy, lookahead_symbol) {
                let symbol = language.symbol_name(symbol);
                tracing::trace!(version, symbol, "recover_with_missing");
                return true;
            }
        }
        false
    }

    /// Performs every reduction valid before `lookahead`, or before any
    /// terminal when it is `END`. Returns whether some resulting version can
    /// shift the lookahead.
    fn do_all_potential_reductions(&mut self, start: usize, lookahead: Symbol) -> bool {
        let language = self.language;
        let max_version_count = self.config.recovery.max_version_count;
        let initial_version_count = self.stack.version_count();
        let mut can_shift = false;
        let mut version = start;
        let mut iteration = 0;

        loop {
            let version_count = self.stack.version_count();
            if version >= version_count {
                break;
            }
            let round = iteration;
            iteration += 1;

            if (initial_version_count..version).any(|other| self.stack.merge(other, version)) {
                continue;
            }

            let state = self.stack.state(version);
            let symbols = if lookahead == Symbol::END {
                1..language.token_count() as u16
            } else {
                lookahead.0..lookahead.0 + 1
            };

            let mut has_shift = false;
            let mut reductions = Vec::new();
            for symbol in symbols.map(Symbol) {
                for &action in language.actions(state, symbol) {
                    match action {
                        ParseAction::Shift(_) => has_shift = true,
                        ParseAction::Reduce(production) => {
                            let child_count = language.production(production).child_count;
                            if child_count > 0 && !reductions.contains(&production) {
                                reductions.push(production);
                            }
                        }
                        ParseAction::ShiftExtra | ParseAction::Accept => {}
                    }
                }
            }

            let mut reduction_version = None;
            for production in reductions {
                reduction_version = self.reduce(version, production, true, None);
            }

            if has_shift {
                can_shift = true;
            } else if let Some(reduction_version) =
                reduction_version.filter(|_| round < max_version_count)
            {
                self.stack.renumber_version(reduction_version, version);
                continue;
            } else if lookahead != Symbol::END {
                self.stack.remove_version(version);
            }

            version = if version == start { version_count } else { version + 1 };
        }
        can_shift
    }

    /// Recovers `version`, which is in the error state, from `lookahead`:
    /// either by returning to a summarized state that accepts it, or by
    /// skipping it.
    pub(super) fn recover(&mut self, version: usize, lookahead: Subtree) {
        let language = self.language;
        let max_version_count = self.config.recovery.max_version_count;
        let previous_version_count = self.stack.version_count();
        let position = self.stack.position(version);
        let node_count_since_error = self.stack.node_count_since_error(version);
        let current_error_cost = self.stack.error_cost(version);

        let mut did_recover = false;
        let summary = if lookahead.is_error() {
            None
        } else {
            self.stack.summary(version).map(<[_]>::to_vec)
        };
        for entry in summary.into_iter().flatten() {
            if entry.state == StateId::ERROR || entry.position.bytes == position.bytes {
                continue;
            }
            let depth = if node_count_since_error > 0 { entry.depth + 1 } else { entry.depth };

            let would_merge = (0..previous_version_count).any(|other| {
                self.stack.state(other) == entry.state
                    && self.stack.position(other).bytes == position.bytes
            });
            if would_merge {
                continue;
            }

            let skipped = position.saturating_sub(entry.position);
            let skipped_chars = u32::from(skipped.bytes);
            let new_cost = current_error_cost
                .saturating_add(entry.depth.saturating_mul(ERROR_COST_PER_SKIPPED_TREE))
                .saturating_add(skipped_chars.saturating_mul(ERROR_COST_PER_SKIPPED_CHAR))
                .saturating_add(skipped.extent.row.saturating_mul(ERROR_COST_PER_SKIPPED_LINE));
            if self.better_version_exists(version, false, new_cost) {
                break;
            }

            if language.has_actions(entry.state, lookahead.symbol())
                && self.recover_to_state(version, depth, entry.state)
            {
                did_recover = true;
                tracing::trace!(version, state = entry.state.0, depth, "recover_to_previous");
                break;
            }
        }

        let mut other = previous_version_count;
        while other < self.stack.version_count() {
            if self.stack.is_active(other) {
                other += 1;
            } else {
                self.stack.remove_version(other);
            }
        }

        if did_recover && self.stack.version_count() > max_version_count {
            self.stack.halt(version);
            return;
        }
        if did_recover
            && lookahead.has_external_tokens()
            && !same_external_state(
                lookahead.last_external_state(),
                self.stack.last_external_state(version),
            )
        {
            self.stack.halt(version);
            return;
        }

        if lookahead.symbol() == Symbol::END {
            tracing::trace!(version, "recover_eof");
            let parent = Subtree::error_node(Vec::new(), language);
            self.stack.push(version, Some(parent), false, StateId::START);
            self.accept(version, lookahead);
            return;
        }

        let total = lookahead.total();
        let new_cost = current_error_cost
            .saturating_add(ERROR_COST_PER_SKIPPED_TREE)
            .saturating_add(u32::from(total.bytes).saturating_mul(ERROR_COST_PER_SKIPPED_CHAR))
            .saturating_add(total.extent.row.saturating_mul(ERROR_COST_PER_SKIPPED_LINE));
        if self.better_version_exists(version, false, new_cost) {
            self.stack.halt(version);
            return;
        }

        // Tokens that are extras in the start state stay extras while skipped.
        let lookahead = match language.actions(StateId::START, lookahead.symbol()).last() {
            Some(ParseAction::ShiftExtra) => lookahead.into_extra(),
            _ => lookahead,
        };
        tracing::trace!(version, symbol = language.symbol_name(lookahead.symbol()), "skip_token");

        let external_state = lookahead
            .has_external_tokens()
            .then(|| lookahead.last_external_state().cloned())
            .flatten();
        let mut error_repeat = Subtree::error_repeat(vec![lookahead], language);

        // Extend the previous run of skipped tokens instead of starting a
        // new one.
        if node_count_since_error > 0 {
            let mut slices = self.stack.pop_count(version, 1).into_iter();
            if let Some(first) = slices.next() {
                while self.stack.version_count() > first.version + 1 {
                    self.stack.remove_version(first.version + 1);
                }
                self.stack.renumber_version(first.version, version);
                let mut children = first.subtrees;
                children.push(error_repeat);
                error_repeat = Subtree::error_repeat(children, language);
            }
        }

        self.stack.push(version, Some(error_repeat), false, StateId::ERROR);
        if external_state.is_some() {
            self.stack.set_last_external_state(version, external_state);
        }
    }

    /// Pops `depth` subtrees and, where that lands in `goal`, wraps them in
    /// an `ERROR` node.
    fn recover_to_state(&mut self, version: usize, depth: u32, goal: StateId) -> bool {
        let language = self.language;
        let slices = self.stack.pop_count(version, depth);
        let mut previous_version = None;

        for slice in slices {
            if previous_version == Some(slice.version) {
                continue;
            }
            if self.stack.state(slice.version) != goal {
                self.stack.halt(slice.version);
                continue;
            }

            let mut subtrees = slice.subtrees;
            if let Some(error) = self.stack.pop_error(slice.version).into_iter().next() {
                subtrees.splice(0..0, error.children().iter().cloned());
            }

            let (children, trailing) = split_trailing_extras(subtrees);
            if !children.is_empty() {
                let error = Subtree::error_node(children, language).into_extra();
                self.stack.push(slice.version, Some(error), false, goal);
            }
            for extra in trailing {
                self.stack.push(slice.version, Some(extra), false, goal);
            }
            previous_version = Some(slice.version);
        }

        previous_version.is_some()
    }

    /// Drops halted and hopeless versions, merges equivalent ones and
    /// starts recovery on a paused one if nothing else is active. Returns
    /// the lowest error cost among versions that are not recovering.
    pub(super) fn condense(&mut self) -> u32 {
        let max_version_count = self.config.recovery.max_version_count;
        let mut made_changes = false;
        let mut min_error_cost = u32::MAX;

        let mut i = 0;
        while i < self.stack.version_count() {
            if self.stack.is_halted(i) {
                self.stack.remove_version(i);
                continue;
            }

            let mut status_i = self.version_status(i);
            if !status_i.in_error && status_i.cost < min_error_cost {
                min_error_cost = status_i.cost;
            }

            let mut removed_i = false;
            let mut j = 0;
            while j < i {
                let status_j = self.version_status(j);
                match self.compare_versions(status_j, status_i) {
                    Comparison::TakeLeft => {
                        made_changes = true;
                        self.stack.remove_version(i);
                        removed_i = true;
                        break;
                    }
                    Comparison::PreferLeft | Comparison::None => {
                        if self.stack.merge(j, i) {
                            made_changes = true;
                            removed_i = true;
                            break;
                        }
                    }
                    Comparison::PreferRight => {
                        made_changes = true;
                        if self.stack.merge(j, i) {
                            removed_i = true;
                            break;
                        }
                        self.stack.swap_versions(i, j);
                        status_i = self.version_status(i);
                    }
                    Comparison::TakeRight => {
                        made_changes = true;
                        self.stack.remove_version(j);
                        i -= 1;
                        continue;
                    }
                }
                j += 1;
            }
            if !removed_i {
                i += 1;
            }
        }

        while self.stack.version_count() > max_version_count {
            self.stack.remove_version(max_version_count);
            made_changes = true;
        }

        // Only one paused version at a time gets to recover, and only while
        // no version can make progress without recovering.
        let mut has_unpaused = false;
        let mut count = self.stack.version_count();
        let mut i = 0;
        while i < count {
            if !self.stack.is_paused(i) {
                has_unpaused = true;
                i += 1;
                continue;
            }
            if !has_unpaused && self.accept_count < max_version_count {
                min_error_cost = self.stack.error_cost(i);
                if let Some(lookahead) = self.stack.resume(i) {
                    self.handle_error(i, lookahead);
                }
                has_unpaused = true;
                i += 1;
            } else {
                self.stack.remove_version(i);
                count -= 1;
                made_changes = true;
            }
        }

        if made_changes {
            tracing::trace!(version_count = self.stack.version_count(), min_error_cost, "condense");
        }
        min_error_cost
    }
}

fn has_reduce_action(language: &Language, state: StateId, symbol: Symbol) -> bool {
    language.actions(state, symbol).iter().any(|action| matches!(action, ParseAction::Reduce(_)))
}
