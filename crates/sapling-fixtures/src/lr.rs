//! Canonical LR(1) tables. Conflicts precedence cannot settle are kept, so
//! the runtime explores them with several stack versions.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use sapling_language::{ParseAction, Production, ProductionId, StateId, Symbol, SymbolSet};

use crate::FxIndexSet;
use crate::grammar::Assoc;

#[derive(Clone, Debug)]
pub(crate) struct Rule {
    pub(crate) lhs: Symbol,
    pub(crate) rhs: Vec<Symbol>,
    pub(crate) precedence: i32,
    pub(crate) assoc: Assoc,
    pub(crate) dynamic_precedence: i16,
}

pub(crate) struct Tables {
    pub(crate) state_count: usize,
    pub(crate) actions: Vec<Box<[ParseAction]>>,
    pub(crate) gotos: Vec<Option<StateId>>,
    pub(crate) productions: Vec<Production>,
}

/// `rule` indexes the grammar's rules; `rules.len()` stands for the
/// augmented start rule.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
struct Item {
    rule: usize,
    dot: usize,
    lookahead: Symbol,
}

struct Builder<'a> {
    rules: &'a [Rule],
    start_rhs: [Symbol; 1],
    token_count: usize,
    first: Vec<SymbolSet>,
    nullable: Vec<bool>,
}

impl Builder<'_> {
    fn rhs(&self, rule: usize) -> &[Symbol] {
        match self.rules.get(rule) {
            Some(rule) => &rule.rhs,
            None => &self.start_rhs,
        }
    }

    fn next_symbol(&self, item: Item) -> Option<Symbol> {
        self.rhs(item.rule).get(item.dot).copied()
    }

    fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.token_count
    }

    fn first_of(&self, symbols: &[Symbol], lookahead: Symbol) -> SymbolSet {
        let mut first = SymbolSet::new();
        for &symbol in symbols {
            if self.is_terminal(symbol) {
                first.insert(symbol);
                return first;
            }
            let index = symbol.index() - self.token_count;
            first.union_with(&self.first[index]);
            if !self.nullable[index] {
                return first;
            }
        }
        first.insert(lookahead);
        first
    }

    fn closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut seen: FxHashSet<Item> = kernel.iter().copied().collect();
        let mut stack = kernel.to_vec();
        while let Some(item) = stack.pop() {
            let next = self.next_symbol(item);
            let Some(symbol) = next.filter(|&symbol| !self.is_terminal(symbol)) else {
                continue;
            };
            let lookaheads = self.first_of(&self.rhs(item.rule)[item.dot + 1..], item.lookahead);
            for (rule, _) in self.rules.iter().enumerate().filter(|(_, rule)| rule.lhs == symbol) {
                for lookahead in lookaheads.iter() {
                    let item = Item { rule, dot: 0, lookahead };
                    if seen.insert(item) {
                        stack.push(item);
                    }
                }
            }
        }
        let mut items: Vec<Item> = seen.into_iter().collect();
        items.sort_unstable();
        items
    }
}

fn first_sets(
    rules: &[Rule],
    token_count: usize,
    symbol_count: usize,
) -> (Vec<SymbolSet>, Vec<bool>) {
    let non_terminal_count = symbol_count - token_count;
    let mut first = vec![SymbolSet::new(); non_terminal_count];
    let mut nullable = vec![false; non_terminal_count];

    let mut changed = true;
    while changed {
        changed = false;
        for rule in rules {
            let lhs = rule.lhs.index() - token_count;
            let mut rule_nullable = true;
            for &symbol in &rule.rhs {
                if symbol.index() < token_count {
                    changed |= first[lhs].insert(symbol);
                    rule_nullable = false;
                    break;
                }
                let index = symbol.index() - token_count;
                let before = first[lhs].len();
                let other = first[index].clone();
                first[lhs].union_with(&other);
                changed |= first[lhs].len() != before;
                if !nullable[index] {
                    rule_nullable = false;
                    break;
                }
            }
            if rule_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }
    (first, nullable)
}

pub(crate) fn build(rules: &[Rule], token_count: usize, symbol_count: usize) -> Tables {
    let (first, nullable) = first_sets(rules, token_count, symbol_count);
    let start = rules.first().map_or(Symbol(token_count as u16), |rule| rule.lhs);
    let builder = Builder { rules, start_rhs: [start], token_count, first, nullable };
    let augmented = rules.len();
    let non_terminal_count = symbol_count - token_count;

    // Parse state `index + 1` is kernel `index`; state 0 is the error state.
    let mut kernels: FxIndexSet<Vec<Item>> = FxIndexSet::default();
    kernels.insert(vec![Item { rule: augmented, dot: 0, lookahead: Symbol::END }]);
    let mut rows: Vec<Vec<Vec<ParseAction>>> = vec![vec![Vec::new(); token_count]];
    let mut gotos = vec![None; non_terminal_count];

    let mut next = 0;
    while let Some(kernel) = kernels.get_index(next).cloned() {
        next += 1;
        let items = builder.closure(&kernel);

        let mut successors: BTreeMap<Symbol, Vec<Item>> = BTreeMap::new();
        for &item in &items {
            if let Some(symbol) = builder.next_symbol(item) {
                successors.entry(symbol).or_default().push(Item { dot: item.dot + 1, ..item });
            }
        }

        let mut row = vec![Vec::new(); token_count];
        let mut state_gotos = vec![None; non_terminal_count];
        let mut shifts = BTreeMap::new();
        for (symbol, mut successor) in successors {
            successor.sort_unstable();
            successor.dedup();
            let (index, _) = kernels.insert_full(successor);
            let target = StateId(index as u16 + 1);
            if builder.is_terminal(symbol) {
                shifts.insert(symbol, target);
            } else {
                state_gotos[symbol.index() - token_count] = Some(target);
            }
        }

        for (terminal, actions) in row.iter_mut().enumerate() {
            let terminal = Symbol(terminal as u16);
            *actions = resolve(&builder, &items, terminal, shifts.get(&terminal).copied());
        }
        rows.push(row);
        gotos.extend(state_gotos);
    }

    let state_count = rows.len();
    let actions = rows.into_iter().flatten().map(Vec::into_boxed_slice).collect();
    let productions = rules
        .iter()
        .map(|rule| Production {
            lhs: rule.lhs,
            child_count: rule.rhs.len() as u16,
            dynamic_precedence: rule.dynamic_precedence,
        })
        .collect();
    Tables { state_count, actions, gotos, productions }
}

/// Actions on `terminal`, reductions first. Precedence and associativity
/// settle shift/reduce conflicts; anything they cannot settle is kept.
fn resolve(
    builder: &Builder<'_>,
    items: &[Item],
    terminal: Symbol,
    shift: Option<StateId>,
) -> Vec<ParseAction> {
    let rules = builder.rules;
    let complete = items
        .iter()
        .filter(|item| item.lookahead == terminal && builder.next_symbol(**item).is_none());

    let mut accept = false;
    let mut reductions: Vec<usize> = Vec::new();
    for item in complete {
        if item.rule == rules.len() {
            accept = true;
        } else {
            reductions.push(item.rule);
        }
    }
    reductions.sort_unstable();
    reductions.dedup();

    let shift_precedence = shift.map(|_| {
        items
            .iter()
            .filter(|&&item| builder.next_symbol(item) == Some(terminal) && item.rule < rules.len())
            .map(|item| rules[item.rule].precedence)
            .max()
            .unwrap_or(0)
    });

    let mut keep_shift = shift.is_some();
    if let Some(shift_precedence) = shift_precedence {
        reductions.retain(|&rule| {
            let rule = &rules[rule];
            match (rule.precedence.cmp(&shift_precedence), rule.assoc) {
                (Ordering::Greater, _) | (Ordering::Equal, Assoc::Left) => {
                    keep_shift = false;
                    true
                }
                (Ordering::Less, _) | (Ordering::Equal, Assoc::Right) => false,
                (Ordering::Equal, Assoc::None) => true,
            }
        });
    }
    if let Some(highest) = reductions.iter().map(|&rule| rules[rule].precedence).max() {
        reductions.retain(|&rule| rules[rule].precedence == highest);
    }

    let mut actions: Vec<ParseAction> =
        reductions.into_iter().map(|rule| ParseAction::Reduce(ProductionId(rule as u16))).collect();
    if accept {
        actions.push(ParseAction::Accept);
    }
    if let Some(target) = shift.filter(|_| keep_shift) {
        actions.push(ParseAction::Shift(target));
    }
    actions
}
