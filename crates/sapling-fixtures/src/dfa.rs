//! Subset construction of the lexer automaton shared by every parse state.

use sapling_language::{LexState, LexTransition, Symbol, SymbolSet};

use crate::FxIndexSet;
use crate::pattern::{Nfa, NfaState, Pattern, char_range};

pub(crate) struct Lexer {
    pub(crate) states: Vec<LexState>,
    /// For every input token, the tokens that compete with it for some text.
    pub(crate) conflicts: Vec<SymbolSet>,
}

/// Builds a DFA recognising every token. `tokens` is in priority order:
/// states accepting several tokens list them in the same order.
pub(crate) fn build(tokens: &[(Symbol, &Pattern)]) -> Lexer {
    let mut nfa = Nfa::new();
    let start = nfa.start();
    for (index, (_, pattern)) in tokens.iter().enumerate() {
        nfa.add_token(start, pattern, index);
    }

    let mut sets: FxIndexSet<Vec<NfaState>> = FxIndexSet::default();
    sets.insert(nfa.closure([start]));
    let mut accepted: Vec<Vec<usize>> = Vec::new();
    let mut edges: Vec<Vec<(u32, u32, usize)>> = Vec::new();

    let mut next = 0;
    while let Some(current) = sets.get_index(next).cloned() {
        next += 1;

        let mut accepts: Vec<usize> =
            current.iter().filter_map(|&state| nfa.accepts[state]).collect();
        accepts.sort_unstable();
        accepts.dedup();
        accepted.push(accepts);

        let moves: Vec<(u32, u32, NfaState)> = current
            .iter()
            .flat_map(|&state| nfa.moves[state].iter())
            .map(|&((start, end), target)| (u32::from(start), u32::from(end), target))
            .collect();
        let mut bounds: Vec<u32> =
            moves.iter().flat_map(|&(start, end, _)| [start, end + 1]).collect();
        bounds.sort_unstable();
        bounds.dedup();

        let mut state_edges: Vec<(u32, u32, usize)> = Vec::new();
        for window in bounds.windows(2) {
            let (low, high) = (window[0], window[1] - 1);
            let targets = moves
                .iter()
                .filter(|&&(start, end, _)| start <= low && high <= end)
                .map(|&(_, _, target)| target);
            let closure = nfa.closure(targets);
            if closure.is_empty() {
                continue;
            }
            let (target, _) = sets.insert_full(closure);
            match state_edges.last_mut() {
                Some(last) if last.2 == target && last.1 + 1 == low => last.1 = high,
                _ => state_edges.push((low, high, target)),
            }
        }
        edges.push(state_edges);
    }

    let conflicts = conflicts(tokens.len(), &accepted, &edges, tokens);
    let states = accepted
        .iter()
        .zip(&edges)
        .map(|(accepts, state_edges)| LexState {
            accepts: accepts.iter().map(|&token| tokens[token].0).collect(),
            transitions: state_edges
                .iter()
                .flat_map(|&(low, high, target)| {
                    let target = target as u32;
                    char_range(low, high)
                        .into_iter()
                        .map(move |(start, end)| LexTransition { start, end, target })
                })
                .collect(),
        })
        .collect();
    Lexer { states, conflicts }
}

/// Two tokens conflict when a state accepting one can still go on to match
/// the other.
fn conflicts(
    token_count: usize,
    accepted: &[Vec<usize>],
    edges: &[Vec<(u32, u32, usize)>],
    tokens: &[(Symbol, &Pattern)],
) -> Vec<SymbolSet> {
    let mut live: Vec<Vec<bool>> = accepted
        .iter()
        .map(|accepts| {
            let mut live = vec![false; token_count];
            accepts.iter().for_each(|&token| live[token] = true);
            live
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for state in 0..live.len() {
            for &(_, _, target) in &edges[state] {
                for token in 0..token_count {
                    if live[target][token] && !live[state][token] {
                        live[state][token] = true;
                        changed = true;
                    }
                }
            }
        }
    }

    let mut conflicts = vec![SymbolSet::new(); token_count];
    // The start state accepts nothing and sees every token.
    for (state, accepts) in accepted.iter().enumerate().skip(1) {
        for &token in accepts {
            for other in (0..token_count).filter(|&other| other != token && live[state][other]) {
                conflicts[token].insert(tokens[other].0);
                conflicts[other].insert(tokens[token].0);
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBER: Symbol = Symbol(1);
    const PLUS: Symbol = Symbol(2);
    const PLUS_PLUS: Symbol = Symbol(3);

    fn run(lexer: &Lexer, text: &str) -> Option<Vec<Symbol>> {
        let mut state = &lexer.states[0];
        for ch in text.chars() {
            state = &lexer.states[state.next(ch)? as usize];
        }
        Some(state.accepts.to_vec())
    }

    #[test]
    fn longest_tokens_and_conflicts() {
        let number = Pattern::range('0', '9').repeat1();
        let plus = Pattern::string("+");
        let plus_plus = Pattern::string("++");
        let lexer = build(&[(NUMBER, &number), (PLUS, &plus), (PLUS_PLUS, &plus_plus)]);

        assert_eq!(run(&lexer, "123"), Some(vec![NUMBER]));
        assert_eq!(run(&lexer, "+"), Some(vec![PLUS]));
        assert_eq!(run(&lexer, "++"), Some(vec![PLUS_PLUS]));
        assert_eq!(run(&lexer, "+++"), None);
        assert_eq!(run(&lexer, "1+"), None);

        assert!(lexer.conflicts[1].contains(PLUS_PLUS));
        assert!(lexer.conflicts[2].contains(PLUS));
        assert!(lexer.conflicts[0].is_empty());
    }

    #[test]
    fn keywords_overlap_identifiers() {
        let keyword = Pattern::string("let");
        let identifier = Pattern::range('a', 'z').repeat1();
        let lexer = build(&[(Symbol(1), &keyword), (Symbol(2), &identifier)]);

        assert_eq!(run(&lexer, "let"), Some(vec![Symbol(1), Symbol(2)]));
        assert_eq!(run(&lexer, "le"), Some(vec![Symbol(2)]));
        assert!(lexer.conflicts[0].contains(Symbol(2)));
        assert!(lexer.conflicts[1].contains(Symbol(1)));
    }

    #[test]
    fn transitions_are_sorted_and_disjoint() {
        let comment = Pattern::seq([Pattern::char('#'), Pattern::none_of("\n").repeat()]);
        let lexer = build(&[(Symbol(1), &comment)]);

        for state in &lexer.states {
            assert!(state.transitions.windows(2).all(|pair| pair[0].end < pair[1].start));
        }
        assert_eq!(run(&lexer, "# note ✓"), Some(vec![Symbol(1)]));
        assert_eq!(run(&lexer, "#\n"), None);
    }
}
