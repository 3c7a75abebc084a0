//! Token patterns and their compilation into a Thompson NFA.

/// A regular pattern over characters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// Any character inside one of the inclusive ranges.
    Class(Vec<(char, char)>),
    Seq(Vec<Pattern>),
    Choice(Vec<Pattern>),
    /// Zero or more.
    Repeat(Box<Pattern>),
    /// One or more.
    Repeat1(Box<Pattern>),
    Optional(Box<Pattern>),
}

impl Pattern {
    pub fn string(text: &str) -> Self {
        Self::Seq(text.chars().map(|ch| Self::Class(vec![(ch, ch)])).collect())
    }

    pub fn char(ch: char) -> Self {
        Self::Class(vec![(ch, ch)])
    }

    pub fn range(start: char, end: char) -> Self {
        Self::Class(vec![(start, end)])
    }

    pub fn one_of(chars: &str) -> Self {
        Self::Class(chars.chars().map(|ch| (ch, ch)).collect())
    }

    /// Any character except the given ones.
    pub fn none_of(chars: &str) -> Self {
        let mut excluded: Vec<u32> = chars.chars().map(u32::from).collect();
        excluded.sort_unstable();
        excluded.dedup();

        let mut ranges = Vec::new();
        let mut next = 0;
        for code in excluded {
            if code > next {
                ranges.extend(char_range(next, code - 1));
            }
            next = code + 1;
        }
        ranges.extend(char_range(next, u32::from(char::MAX)));
        Self::Class(ranges)
    }

    pub fn seq(parts: impl IntoIterator<Item = Self>) -> Self {
        Self::Seq(parts.into_iter().collect())
    }

    pub fn choice(parts: impl IntoIterator<Item = Self>) -> Self {
        Self::Choice(parts.into_iter().collect())
    }

    pub fn repeat(self) -> Self {
        Self::Repeat(Box::new(self))
    }

    pub fn repeat1(self) -> Self {
        Self::Repeat1(Box::new(self))
    }

    pub fn optional(self) -> Self {
        Self::Optional(Box::new(self))
    }

    pub fn matches_empty(&self) -> bool {
        match self {
            Self::Class(_) => false,
            Self::Seq(parts) => parts.iter().all(Self::matches_empty),
            Self::Choice(parts) => parts.iter().any(Self::matches_empty),
            Self::Repeat(_) | Self::Optional(_) => true,
            Self::Repeat1(inner) => inner.matches_empty(),
        }
    }
}

/// Converts `start..=end` to a char range, stepping around the surrogate gap.
pub(crate) fn char_range(start: u32, end: u32) -> Vec<(char, char)> {
    const SURROGATES: (u32, u32) = (0xd800, 0xdfff);
    let mut ranges = Vec::new();
    let pieces = [(start, end.min(SURROGATES.0 - 1)), (start.max(SURROGATES.1 + 1), end)];
    for (start, end) in pieces {
        if start > end {
            continue;
        }
        if let (Some(start), Some(end)) = (char::from_u32(start), char::from_u32(end)) {
            ranges.push((start, end));
        }
    }
    ranges
}

pub(crate) type NfaState = usize;

#[derive(Debug, Default)]
pub(crate) struct Nfa {
    /// Epsilon moves of every state.
    pub(crate) epsilon: Vec<Vec<NfaState>>,
    /// Character moves of every state.
    pub(crate) moves: Vec<Vec<((char, char), NfaState)>>,
    /// Token accepted by a state, by token index.
    pub(crate) accepts: Vec<Option<usize>>,
}

impl Nfa {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn add_state(&mut self) -> NfaState {
        self.epsilon.push(Vec::new());
        self.moves.push(Vec::new());
        self.accepts.push(None);
        self.epsilon.len() - 1
    }

    /// Adds `pattern` as an alternative of `start` accepting `token`.
    pub(crate) fn add_token(&mut self, start: NfaState, pattern: &Pattern, token: usize) {
        let (entry, exit) = self.compile(pattern);
        self.epsilon[start].push(entry);
        self.accepts[exit] = Some(token);
    }

    pub(crate) fn start(&mut self) -> NfaState {
        if self.epsilon.is_empty() { self.add_state() } else { 0 }
    }

    fn compile(&mut self, pattern: &Pattern) -> (NfaState, NfaState) {
        match pattern {
            Pattern::Class(ranges) => {
                let (entry, exit) = (self.add_state(), self.add_state());
                for &range in ranges {
                    self.moves[entry].push((range, exit));
                }
                (entry, exit)
            }
            Pattern::Seq(parts) => {
                let entry = self.add_state();
                let mut exit = entry;
                for part in parts {
                    let (part_entry, part_exit) = self.compile(part);
                    self.epsilon[exit].push(part_entry);
                    exit = part_exit;
                }
                (entry, exit)
            }
            Pattern::Choice(parts) => {
                let (entry, exit) = (self.add_state(), self.add_state());
                for part in parts {
                    let (part_entry, part_exit) = self.compile(part);
                    self.epsilon[entry].push(part_entry);
                    self.epsilon[part_exit].push(exit);
                }
                (entry, exit)
            }
            Pattern::Repeat(inner) | Pattern::Repeat1(inner) | Pattern::Optional(inner) => {
                let (entry, exit) = (self.add_state(), self.add_state());
                let (inner_entry, inner_exit) = self.compile(inner);
                self.epsilon[entry].push(inner_entry);
                self.epsilon[inner_exit].push(exit);
                if !matches!(pattern, Pattern::Repeat1(_)) {
                    self.epsilon[entry].push(exit);
                }
                if !matches!(pattern, Pattern::Optional(_)) {
                    self.epsilon[inner_exit].push(inner_entry);
                }
                (entry, exit)
            }
        }
    }

    /// Sorted epsilon closure of `states`.
    pub(crate) fn closure(&self, states: impl IntoIterator<Item = NfaState>) -> Vec<NfaState> {
        let mut seen = vec![false; self.epsilon.len()];
        let mut stack: Vec<NfaState> = states.into_iter().collect();
        let mut closure = Vec::new();
        while let Some(state) = stack.pop() {
            if std::mem::replace(&mut seen[state], true) {
                continue;
            }
            closure.push(state);
            stack.extend(self.epsilon[state].iter().copied());
        }
        closure.sort_unstable();
        closure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_of_skips_excluded_chars() {
        let Pattern::Class(ranges) = Pattern::none_of("\n") else { panic!("expected a class") };
        assert_eq!(ranges[0], ('\0', '\t'));
        assert_eq!(ranges[1], ('\u{b}', '\u{d7ff}'));
        assert_eq!(ranges[2], ('\u{e000}', char::MAX));
    }

    #[test]
    fn empty_matches() {
        assert!(Pattern::range('0', '9').repeat().matches_empty());
        assert!(!Pattern::range('0', '9').repeat1().matches_empty());
        assert!(!Pattern::string("if").matches_empty());
        assert!(Pattern::string("").matches_empty());
    }
}
