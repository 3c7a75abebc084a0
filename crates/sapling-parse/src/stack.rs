//! The graph-structured stack.
//!
//! Every stack version is a head pointing into a shared arena of nodes.
//! Nodes link back to their predecessors; a node with several links is a
//! point where versions merged. Nodes no head can reach any more are
//! reclaimed, together with the subtrees their links hold, once the arena
//! has grown to twice its size after the previous collection.

use std::cmp::Ordering;
use std::mem;

use la_arena::{Arena, Idx, RawIdx};
use sapling_input::Length;
use sapling_language::StateId;
use sapling_lexer::ExternalState;
use sapling_tree::{ERROR_COST_PER_RECOVERY, Subtree};

const MAX_LINK_COUNT: usize = 8;
/// Arenas smaller than this are never collected.
const MIN_COLLECTED_NODES: usize = 256;

pub(crate) type NodeId = Idx<StackNode>;

#[derive(Debug)]
pub(crate) struct StackNode {
    pub(crate) state: StateId,
    pub(crate) position: Length,
    links: Vec<Link>,
    error_cost: u32,
    node_count: u32,
    dynamic_precedence: i32,
}

#[derive(Clone, Debug)]
struct Link {
    node: NodeId,
    /// `None` marks the point where a version entered the error state.
    subtree: Option<Subtree>,
    pending: bool,
}

#[derive(Debug)]
enum Status {
    Active,
    /// Holds the lookahead that no action accepted.
    Paused(Subtree),
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SummaryEntry {
    pub(crate) state: StateId,
    pub(crate) depth: u32,
    pub(crate) position: Length,
}

#[derive(Debug)]
struct Head {
    node: NodeId,
    status: Status,
    last_external: Option<ExternalState>,
    summary: Option<Vec<SummaryEntry>>,
    node_count_at_last_error: u32,
}

/// Subtrees popped off one path, oldest first, and the version left
/// standing where the path ended.
#[derive(Debug)]
pub(crate) struct StackSlice {
    pub(crate) version: usize,
    pub(crate) subtrees: Vec<Subtree>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Continue,
    Stop,
    Pop,
    PopAndStop,
}

#[derive(Clone)]
struct Path {
    node: NodeId,
    /// Newest first while walking.
    subtrees: Vec<Subtree>,
    subtree_count: u32,
    pending: bool,
}

impl Path {
    fn follow(&mut self, link: &Link, include_subtrees: bool) {
        self.node = link.node;
        match &link.subtree {
            Some(subtree) => {
                if include_subtrees {
                    self.subtrees.push(subtree.clone());
                }
                if !subtree.extra() {
                    self.subtree_count += 1;
                    if !link.pending {
                        self.pending = false;
                    }
                }
            }
            None => {
                self.subtree_count += 1;
                self.pending = false;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct Stack {
    nodes: Arena<StackNode>,
    heads: Vec<Head>,
    max_pop_paths: usize,
    /// Nodes left standing by the last collection.
    live_after_collection: usize,
}

impl Stack {
    pub(crate) fn new(max_pop_paths: usize) -> Self {
        let mut nodes = Arena::new();
        let base = nodes.alloc(StackNode {
            state: StateId::START,
            position: Length::ZERO,
            links: Vec::new(),
            error_cost: 0,
            node_count: 0,
            dynamic_precedence: 0,
        });
        let head = Head {
            node: base,
            status: Status::Active,
            last_external: None,
            summary: None,
            node_count_at_last_error: 0,
        };
        Self {
            nodes,
            heads: vec![head],
            max_pop_paths: max_pop_paths.max(1),
            live_after_collection: 1,
        }
    }

    pub(crate) fn version_count(&self) -> usize {
        self.heads.len()
    }

    pub(crate) fn halted_version_count(&self) -> usize {
        self.heads.iter().filter(|head| matches!(head.status, Status::Halted)).count()
    }

    fn top(&self, version: usize) -> &StackNode {
        &self.nodes[self.heads[version].node]
    }

    pub(crate) fn state(&self, version: usize) -> StateId {
        self.top(version).state
    }

    pub(crate) fn position(&self, version: usize) -> Length {
        self.top(version).position
    }

    pub(crate) fn last_external_state(&self, version: usize) -> Option<&ExternalState> {
        self.heads[version].last_external.as_ref()
    }

    pub(crate) fn set_last_external_state(&mut self, version: usize, state: Option<ExternalState>) {
        self.heads[version].last_external = state;
    }

    pub(crate) fn summary(&self, version: usize) -> Option<&[SummaryEntry]> {
        self.heads[version].summary.as_deref()
    }

    pub(crate) fn is_active(&self, version: usize) -> bool {
        matches!(self.heads[version].status, Status::Active)
    }

    pub(crate) fn is_paused(&self, version: usize) -> bool {
        matches!(self.heads[version].status, Status::Paused(_))
    }

    pub(crate) fn is_halted(&self, version: usize) -> bool {
        matches!(self.heads[version].status, Status::Halted)
    }

    /// Error cost of everything on the version, plus the cost of the
    /// recovery it is about to start or has just started.
    pub(crate) fn error_cost(&self, version: usize) -> u32 {
        let head = &self.heads[version];
        let node = &self.nodes[head.node];
        let entering_error = node.state == StateId::ERROR
            && node.links.first().is_some_and(|link| link.subtree.is_none());
        if matches!(head.status, Status::Paused(_)) || entering_error {
            node.error_cost + ERROR_COST_PER_RECOVERY
        } else {
            node.error_cost
        }
    }

    pub(crate) fn node_count_since_error(&mut self, version: usize) -> u32 {
        let node_count = self.nodes[self.heads[version].node].node_count;
        let head = &mut self.heads[version];
        head.node_count_at_last_error = head.node_count_at_last_error.min(node_count);
        node_count - head.node_count_at_last_error
    }

    pub(crate) fn dynamic_precedence(&self, version: usize) -> i32 {
        self.top(version).dynamic_precedence
    }

    /// Pushes `subtree` in `state`; `None` marks entering the error state.
    pub(crate) fn push(
        &mut self,
        version: usize,
        subtree: Option<Subtree>,
        pending: bool,
        state: StateId,
    ) {
        let previous_id = self.heads[version].node;
        let previous = &self.nodes[previous_id];
        let mut node = StackNode {
            state,
            position: previous.position,
            links: Vec::new(),
            error_cost: previous.error_cost,
            node_count: previous.node_count,
            dynamic_precedence: previous.dynamic_precedence,
        };
        if let Some(subtree) = &subtree {
            node.error_cost += subtree.error_cost();
            node.position += subtree.total();
            node.node_count += subtree.node_count();
            node.dynamic_precedence += subtree.dynamic_precedence();
        }
        let entered_error = subtree.is_none();
        node.links.push(Link { node: previous_id, subtree, pending });

        let node_count = node.node_count;
        let id = self.nodes.alloc(node);
        let head = &mut self.heads[version];
        head.node = id;
        if entered_error {
            head.node_count_at_last_error = node_count;
        }
    }

    /// All paths down to `count` non-extra subtrees below the top.
    pub(crate) fn pop_count(&mut self, version: usize, count: u32) -> Vec<StackSlice> {
        self.iterate(version, true, |path, _| {
            if path.subtree_count == count { Visit::PopAndStop } else { Visit::Continue }
        })
    }

    /// Pops the topmost subtree if it was pushed as pending, together with
    /// the extras above it.
    pub(crate) fn pop_pending(&mut self, version: usize) -> Vec<StackSlice> {
        let mut slices = self.iterate(version, true, |path, _| match path.subtree_count {
            0 => Visit::Continue,
            _ if path.pending => Visit::PopAndStop,
            _ => Visit::Stop,
        });
        if let Some(first) = slices.first_mut() {
            self.renumber_version(first.version, version);
            first.version = version;
        }
        slices
    }

    /// Pops the `ERROR` node right below the top, if there is one.
    pub(crate) fn pop_error(&mut self, version: usize) -> Vec<Subtree> {
        let top = self.top(version);
        let has_error =
            top.links.iter().any(|link| link.subtree.as_ref().is_some_and(Subtree::is_error));
        if !has_error {
            return Vec::new();
        }

        let mut found = false;
        let mut slices = self.iterate(version, true, |path, _| match path.subtrees.first() {
            None => Visit::Continue,
            Some(subtree) if !found && subtree.is_error() => {
                found = true;
                Visit::PopAndStop
            }
            Some(_) => Visit::Stop,
        });
        debug_assert!(slices.len() <= 1);
        match slices.first_mut() {
            Some(first) => {
                let popped = first.version;
                let subtrees = mem::take(&mut first.subtrees);
                self.renumber_version(popped, version);
                subtrees
            }
            None => Vec::new(),
        }
    }

    /// Every path down to the bottom of the stack.
    pub(crate) fn pop_all(&mut self, version: usize) -> Vec<StackSlice> {
        self.iterate(version, true, |_, node| {
            if node.links.is_empty() { Visit::Pop } else { Visit::Continue }
        })
    }

    /// Records the states below the top, up to `max_depth` non-extra
    /// subtrees deep, for error recovery to return to.
    pub(crate) fn record_summary(&mut self, version: usize, max_depth: u32) {
        let mut summary: Vec<SummaryEntry> = Vec::new();
        self.iterate(version, false, |path, node| {
            let depth = path.subtree_count;
            if depth > max_depth {
                return Visit::Stop;
            }
            let seen = summary
                .iter()
                .rev()
                .take_while(|entry| entry.depth >= depth)
                .any(|entry| entry.depth == depth && entry.state == node.state);
            if !seen {
                summary.push(SummaryEntry { state: node.state, depth, position: node.position });
            }
            Visit::Continue
        });
        self.heads[version].summary = Some(summary);
    }

    fn iterate(
        &mut self,
        version: usize,
        include_subtrees: bool,
        mut visit: impl FnMut(&Path, &StackNode) -> Visit,
    ) -> Vec<StackSlice> {
        let mut slices = Vec::new();
        let mut paths = vec![Path {
            node: self.heads[version].node,
            subtrees: Vec::new(),
            subtree_count: 0,
            pending: true,
        }];

        while !paths.is_empty() {
            let mut index = 0;
            let mut size = paths.len();
            while index < size {
                let node_id = paths[index].node;
                let node = &self.nodes[node_id];
                let action = visit(&paths[index], node);
                let should_pop = matches!(action, Visit::Pop | Visit::PopAndStop);
                let should_stop =
                    matches!(action, Visit::Stop | Visit::PopAndStop) || node.links.is_empty();
                let links = if should_stop { Vec::new() } else { node.links.clone() };

                if should_pop {
                    let mut subtrees = if should_stop {
                        mem::take(&mut paths[index].subtrees)
                    } else {
                        paths[index].subtrees.clone()
                    };
                    subtrees.reverse();
                    self.add_slice(&mut slices, version, node_id, subtrees);
                }

                if should_stop {
                    paths.remove(index);
                    size -= 1;
                    continue;
                }

                for link in &links[1..] {
                    if paths.len() >= self.max_pop_paths {
                        break;
                    }
                    let mut branch = paths[index].clone();
                    branch.follow(link, include_subtrees);
                    paths.push(branch);
                }
                paths[index].follow(&links[0], include_subtrees);
                index += 1;
            }
        }
        slices
    }

    /// Slices ending at the same node share a version; the first slice
    /// reaching a node creates it.
    fn add_slice(
        &mut self,
        slices: &mut Vec<StackSlice>,
        original: usize,
        node: NodeId,
        subtrees: Vec<Subtree>,
    ) {
        let existing = slices.iter().rposition(|slice| self.heads[slice.version].node == node);
        if let Some(index) = existing {
            let version = slices[index].version;
            slices.insert(index + 1, StackSlice { version, subtrees });
            return;
        }
        let version = self.add_version(original, node);
        slices.push(StackSlice { version, subtrees });
    }

    fn add_version(&mut self, original: usize, node: NodeId) -> usize {
        let original = &self.heads[original];
        let head = Head {
            node,
            status: Status::Active,
            last_external: original.last_external.clone(),
            summary: None,
            node_count_at_last_error: original.node_count_at_last_error,
        };
        self.heads.push(head);
        self.heads.len() - 1
    }

    /// Frees unreachable nodes once the arena has doubled since the last
    /// collection. Returns how many were freed.
    pub(crate) fn collect_garbage(&mut self) -> usize {
        if self.nodes.len() < 2 * self.live_after_collection.max(MIN_COLLECTED_NODES) {
            return 0;
        }
        self.compact()
    }

    /// Rebuilds the arena with only the nodes reachable from a head. Node
    /// ids are reassigned, so no `Path` may be alive across this call.
    fn compact(&mut self) -> usize {
        let index = |id: NodeId| u32::from(id.into_raw()) as usize;

        let mut reachable = vec![false; self.nodes.len()];
        let mut work: Vec<NodeId> = self.heads.iter().map(|head| head.node).collect();
        while let Some(id) = work.pop() {
            if mem::replace(&mut reachable[index(id)], true) {
                continue;
            }
            work.extend(self.nodes[id].links.iter().map(|link| link.node));
        }

        let mut new_ids = Vec::with_capacity(reachable.len());
        let mut live = 0u32;
        for &is_live in &reachable {
            new_ids.push(NodeId::from_raw(RawIdx::from(live)));
            live += u32::from(is_live);
        }

        let old = mem::take(&mut self.nodes);
        let freed = old.len() - live as usize;
        for ((_, mut node), is_live) in old.into_iter().zip(reachable) {
            if !is_live {
                continue;
            }
            for link in &mut node.links {
                link.node = new_ids[index(link.node)];
            }
            self.nodes.alloc(node);
        }
        for head in &mut self.heads {
            head.node = new_ids[index(head.node)];
        }
        self.live_after_collection = live as usize;
        freed
    }

    pub(crate) fn copy_version(&mut self, version: usize) -> usize {
        let head = &self.heads[version];
        let status = match &head.status {
            Status::Active => Status::Active,
            Status::Paused(lookahead) => Status::Paused(lookahead.clone()),
            Status::Halted => Status::Halted,
        };
        let copy = Head {
            node: head.node,
            status,
            last_external: head.last_external.clone(),
            summary: None,
            node_count_at_last_error: head.node_count_at_last_error,
        };
        self.heads.push(copy);
        self.heads.len() - 1
    }

    /// Moves version `from` into slot `to`, dropping what was there.
    pub(crate) fn renumber_version(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        debug_assert!(to < from);
        let mut source = self.heads.remove(from);
        let target = &mut self.heads[to];
        if source.summary.is_none() {
            source.summary = target.summary.take();
        }
        *target = source;
    }

    pub(crate) fn swap_versions(&mut self, left: usize, right: usize) {
        self.heads.swap(left, right);
    }

    pub(crate) fn remove_version(&mut self, version: usize) {
        self.heads.remove(version);
    }

    pub(crate) fn pause(&mut self, version: usize, lookahead: Subtree) {
        let node_count = self.top(version).node_count;
        let head = &mut self.heads[version];
        head.status = Status::Paused(lookahead);
        head.node_count_at_last_error = node_count;
    }

    /// Reactivates a paused version and hands back its lookahead.
    pub(crate) fn resume(&mut self, version: usize) -> Option<Subtree> {
        let head = &mut self.heads[version];
        match mem::replace(&mut head.status, Status::Active) {
            Status::Paused(lookahead) => Some(lookahead),
            status => {
                head.status = status;
                None
            }
        }
    }

    pub(crate) fn halt(&mut self, version: usize) {
        self.heads[version].status = Status::Halted;
    }

    pub(crate) fn can_merge(&self, left: usize, right: usize) -> bool {
        let (left_head, right_head) = (&self.heads[left], &self.heads[right]);
        let (left_node, right_node) = (&self.nodes[left_head.node], &self.nodes[right_head.node]);
        matches!(left_head.status, Status::Active)
            && matches!(right_head.status, Status::Active)
            && left_node.state == right_node.state
            && left_node.position.bytes == right_node.position.bytes
            && left_node.error_cost == right_node.error_cost
            && same_external_state(
                left_head.last_external.as_ref(),
                right_head.last_external.as_ref(),
            )
    }

    /// Folds version `right` into `left`. Both must be mergeable.
    pub(crate) fn merge(&mut self, left: usize, right: usize) -> bool {
        if !self.can_merge(left, right) {
            return false;
        }
        let target = self.heads[left].node;
        let links = self.nodes[self.heads[right].node].links.clone();
        for link in links {
            self.add_link(target, link);
        }
        if self.nodes[target].state == StateId::ERROR {
            self.heads[left].node_count_at_last_error = self.nodes[target].node_count;
        }
        self.remove_version(right);
        true
    }

    fn add_link(&mut self, target: NodeId, link: Link) {
        let mut work = vec![(target, link)];
        while let Some((target, link)) = work.pop() {
            if link.node == target {
                continue;
            }

            let mut handled = false;
            for index in 0..self.nodes[target].links.len() {
                let existing = &self.nodes[target].links[index];
                if !is_equivalent(existing.subtree.as_ref(), link.subtree.as_ref()) {
                    continue;
                }

                if existing.node == link.node {
                    self.combine_link(target, index, link.subtree.clone());
                    handled = true;
                    break;
                }

                let existing_node = &self.nodes[existing.node];
                let incoming_node = &self.nodes[link.node];
                if existing_node.state == incoming_node.state
                    && existing_node.position.bytes == incoming_node.position.bytes
                    && existing_node.error_cost == incoming_node.error_cost
                {
                    let predecessor = existing.node;
                    let next_links = incoming_node.links.iter().rev();
                    work.extend(next_links.map(|next| (predecessor, next.clone())));
                    let dynamic_precedence = incoming_node.dynamic_precedence
                        + link.subtree.as_ref().map_or(0, Subtree::dynamic_precedence);
                    let node = &mut self.nodes[target];
                    node.dynamic_precedence = node.dynamic_precedence.max(dynamic_precedence);
                    handled = true;
                    break;
                }
            }
            if handled || self.nodes[target].links.len() >= MAX_LINK_COUNT {
                continue;
            }

            let predecessor = &self.nodes[link.node];
            let mut node_count = predecessor.node_count;
            let mut dynamic_precedence = predecessor.dynamic_precedence;
            if let Some(subtree) = &link.subtree {
                node_count += subtree.node_count();
                dynamic_precedence += subtree.dynamic_precedence();
            }
            let node = &mut self.nodes[target];
            node.links.push(link);
            node.node_count = node.node_count.max(node_count);
            node.dynamic_precedence = node.dynamic_precedence.max(dynamic_precedence);
        }
    }

    /// Two links between the same pair of nodes carry parses of the same
    /// span; keep one subtree for both.
    fn combine_link(&mut self, target: NodeId, index: usize, incoming: Option<Subtree>) {
        let link = &self.nodes[target].links[index];
        let (Some(existing), Some(incoming)) = (link.subtree.clone(), incoming) else {
            return;
        };
        let predecessor_precedence = self.nodes[link.node].dynamic_precedence;
        let selected = select_subtree(existing, incoming);
        let dynamic_precedence = predecessor_precedence + selected.dynamic_precedence();

        let node = &mut self.nodes[target];
        node.links[index].subtree = Some(selected);
        node.dynamic_precedence = node.dynamic_precedence.max(dynamic_precedence);
    }
}

fn is_equivalent(left: Option<&Subtree>, right: Option<&Subtree>) -> bool {
    let (left, right) = match (left, right) {
        (None, None) => return true,
        (Some(left), Some(right)) => (left, right),
        _ => return false,
    };
    if left.ptr_eq(right) {
        return true;
    }
    if left.symbol() != right.symbol() {
        return false;
    }
    if left.error_cost() > 0 && right.error_cost() > 0 {
        return true;
    }
    let same_shape = left.is_ambiguous()
        || right.is_ambiguous()
        || left.child_count() == right.child_count();
    left.padding().bytes == right.padding().bytes
        && left.size().bytes == right.size().bytes
        && same_shape
        && left.extra() == right.extra()
        && same_external_state(left.last_external_state(), right.last_external_state())
}

/// Scanner states compare by content; no state and an empty one are the
/// same.
pub(crate) fn same_external_state(
    left: Option<&ExternalState>,
    right: Option<&ExternalState>,
) -> bool {
    left.map_or(&[][..], |state| &state[..]) == right.map_or(&[][..], |state| &state[..])
}

/// Chooses between two parses of the same span: the cheaper one, then the
/// one with the higher dynamic precedence. Error-free ties are kept side by
/// side in an ambiguous node.
pub(crate) fn select_subtree(left: Subtree, right: Subtree) -> Subtree {
    if left.ptr_eq(&right) {
        return left;
    }
    match left.error_cost().cmp(&right.error_cost()) {
        Ordering::Less => return left,
        Ordering::Greater => return right,
        Ordering::Equal => {}
    }
    match left.dynamic_precedence().cmp(&right.dynamic_precedence()) {
        Ordering::Greater => return left,
        Ordering::Less => return right,
        Ordering::Equal => {}
    }
    if left.error_cost() > 0 {
        return left;
    }

    let mut alternatives = into_alternatives(left);
    for alternative in into_alternatives(right) {
        if !alternatives.iter().any(|known| known.ptr_eq(&alternative)) {
            alternatives.push(alternative);
        }
    }
    Subtree::ambiguous(alternatives)
}

fn into_alternatives(subtree: Subtree) -> Vec<Subtree> {
    if subtree.is_ambiguous() { subtree.children().to_vec() } else { vec![subtree] }
}

#[cfg(test)]
mod tests {
    use sapling_fixtures::languages::arithmetic;
    use sapling_input::{Length, TextSize};
    use sapling_language::{Language, StateId, Symbol};
    use sapling_lexer::Token;
    use sapling_tree::{ERROR_COST_PER_RECOVERY, Subtree};

    use super::*;

    const NUMBER: Symbol = Symbol(1);
    const PLUS: Symbol = Symbol(2);

    fn leaf(language: &Language, symbol: Symbol, text: &str) -> Subtree {
        let token = Token {
            symbol,
            padding: Length::ZERO,
            size: Length::of_str(text),
            lookahead_bytes: 0,
            parse_state: StateId::START,
            extra: false,
            external_state: None,
        };
        Subtree::leaf(&token, language)
    }

    fn sum(language: &Language, children: Vec<Subtree>) -> Subtree {
        let symbol = language.symbol_for_name("sum", true).unwrap();
        Subtree::synthetic(symbol, children, language)
    }

    #[test]
    fn pop_count_skips_extras() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        stack.push(0, Some(leaf(&language, PLUS, "+").with_extra(true)), false, StateId(2));
        assert_eq!(stack.position(0).bytes, TextSize::new(2));

        let slices = stack.pop_count(0, 1);
        assert_eq!(slices.len(), 1);
        let symbols: Vec<_> = slices[0].subtrees.iter().map(Subtree::symbol).collect();
        assert_eq!(symbols, [NUMBER, PLUS]);
        assert_eq!(slices[0].version, 1);
        assert_eq!(stack.state(1), StateId::START);
        assert_eq!(stack.position(1), Length::ZERO);
    }

    #[test]
    fn merged_versions_pop_along_every_path() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        let copy = stack.copy_version(0);
        stack.push(0, Some(leaf(&language, PLUS, "+")), false, StateId(3));
        stack.push(copy, Some(leaf(&language, NUMBER, "2")), false, StateId(4));
        stack.push(0, Some(leaf(&language, NUMBER, "2")), false, StateId(5));
        stack.push(copy, Some(leaf(&language, PLUS, "+")), false, StateId(5));

        assert!(stack.merge(0, copy));
        assert_eq!(stack.version_count(), 1);

        let slices = stack.pop_count(0, 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].version, slices[1].version);
        let symbols =
            |slice: &StackSlice| slice.subtrees.iter().map(Subtree::symbol).collect::<Vec<_>>();
        assert_eq!(symbols(&slices[0]), [PLUS, NUMBER]);
        assert_eq!(symbols(&slices[1]), [NUMBER, PLUS]);
    }

    #[test]
    fn equal_parses_between_the_same_nodes_become_ambiguous() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        let copy = stack.copy_version(0);
        let left = sum(&language, vec![leaf(&language, NUMBER, "12")]);
        let right = sum(&language, vec![leaf(&language, NUMBER, "12")]);
        assert!(!left.ptr_eq(&right));
        stack.push(0, Some(left), false, StateId(4));
        stack.push(copy, Some(right), false, StateId(4));

        assert!(stack.merge(0, copy));
        let slices = stack.pop_count(0, 1);
        assert_eq!(slices.len(), 1);
        let combined = &slices[0].subtrees[0];
        assert!(combined.is_ambiguous());
        assert_eq!(combined.child_count(), 2);
    }

    #[test]
    fn versions_in_different_states_do_not_merge() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        let copy = stack.copy_version(0);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        stack.push(copy, Some(leaf(&language, NUMBER, "1")), false, StateId(3));
        assert!(!stack.can_merge(0, copy));
        assert!(!stack.merge(0, copy));
        assert_eq!(stack.version_count(), 2);
    }

    #[test]
    fn pausing_charges_a_recovery() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        assert_eq!(stack.error_cost(0), 0);

        stack.pause(0, leaf(&language, PLUS, "+"));
        assert!(stack.is_paused(0));
        assert_eq!(stack.error_cost(0), ERROR_COST_PER_RECOVERY);

        let lookahead = stack.resume(0).unwrap();
        assert_eq!(lookahead.symbol(), PLUS);
        assert!(stack.is_active(0));
        assert!(stack.resume(0).is_none());

        stack.push(0, None, false, StateId::ERROR);
        assert_eq!(stack.error_cost(0), ERROR_COST_PER_RECOVERY);
        assert_eq!(stack.node_count_since_error(0), 0);
    }

    #[test]
    fn summary_lists_states_by_depth() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        stack.push(0, Some(leaf(&language, PLUS, "+")), false, StateId(3));
        stack.push(0, Some(leaf(&language, NUMBER, "2")), false, StateId(4));
        stack.record_summary(0, 2);

        let summary: Vec<_> =
            stack.summary(0).unwrap().iter().map(|entry| (entry.depth, entry.state)).collect();
        assert_eq!(summary, [(0, StateId(4)), (1, StateId(3)), (2, StateId(2))]);
    }

    #[test]
    fn error_below_the_top_pops_into_the_same_version() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        let error = Subtree::error_node(vec![leaf(&language, PLUS, "+")], &language);
        stack.push(0, Some(error), false, StateId::ERROR);

        let popped = stack.pop_error(0);
        assert_eq!(popped.len(), 1);
        assert!(popped[0].is_error());
        assert_eq!(stack.version_count(), 1);
        assert_eq!(stack.state(0), StateId(2));
        assert!(stack.pop_error(0).is_empty());
    }

    #[test]
    fn removed_versions_release_their_subtrees() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        let copy = stack.copy_version(0);
        let plus = leaf(&language, PLUS, "+");
        stack.push(copy, Some(plus.clone()), false, StateId(3));
        assert_eq!(plus.ref_count(), 2);

        stack.remove_version(copy);
        assert_eq!(stack.collect_garbage(), 0);
        assert_eq!(stack.compact(), 1);
        assert_eq!(plus.ref_count(), 1);

        assert_eq!(stack.state(0), StateId(2));
        assert_eq!(stack.position(0).bytes, TextSize::new(1));
        let slices = stack.pop_count(0, 1);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].subtrees[0].symbol(), NUMBER);
        assert_eq!(stack.state(slices[0].version), StateId::START);
    }

    #[test]
    fn pending_subtrees_pop_in_place() {
        let language = arithmetic();
        let mut stack = Stack::new(64);
        let node = sum(&language, vec![leaf(&language, NUMBER, "1")]);
        stack.push(0, Some(node), true, StateId(4));
        stack.push(0, Some(leaf(&language, PLUS, "+").with_extra(true)), false, StateId(4));

        let slices = stack.pop_pending(0);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].version, 0);
        assert_eq!(slices[0].subtrees.len(), 2);
        assert_eq!(stack.version_count(), 1);
        assert_eq!(stack.state(0), StateId::START);

        stack.push(0, Some(leaf(&language, NUMBER, "1")), false, StateId(2));
        assert!(stack.pop_pending(0).is_empty());
    }
}
