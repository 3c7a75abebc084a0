use crate::Symbol;

/// A range of characters leading to another lexer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LexTransition {
    pub start: char,
    pub end: char,
    pub target: u32,
}

/// A state of the lexer's deterministic automaton.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LexState {
    /// Terminals accepted here, most preferred first.
    pub accepts: Box<[Symbol]>,
    /// Sorted, non-overlapping character ranges.
    pub transitions: Box<[LexTransition]>,
}

impl LexState {
    pub fn next(&self, ch: char) -> Option<u32> {
        let index = self.transitions.partition_point(|transition| transition.end < ch);
        self.transitions
            .get(index)
            .filter(|transition| transition.start <= ch)
            .map(|transition| transition.target)
    }
}

/// How to lex in a given parse state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LexMode {
    pub lex_state: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_by_range() {
        let state = LexState {
            accepts: Box::new([]),
            transitions: Box::new([
                LexTransition { start: '0', end: '9', target: 1 },
                LexTransition { start: 'a', end: 'z', target: 2 },
            ]),
        };
        assert_eq!(state.next('5'), Some(1));
        assert_eq!(state.next('z'), Some(2));
        assert_eq!(state.next('A'), None);
        assert_eq!(state.next('~'), None);
    }
}
