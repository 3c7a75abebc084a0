use std::fmt;

/// A grammar symbol. Terminals come first, then non-terminals; the topmost
/// values are reserved for symbols the runtime creates itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub u16);

impl Symbol {
    /// End of input. Always terminal zero.
    pub const END: Self = Self(0);
    /// A region the parser could not make sense of.
    pub const ERROR: Self = Self(u16::MAX);
    /// Hidden accumulator for tokens skipped during recovery.
    pub const ERROR_REPEAT: Self = Self(u16::MAX - 1);
    /// Alternatives of equal standing for the same span.
    pub const AMBIGUITY: Self = Self(u16::MAX - 2);
    /// Input left unread when a parse stopped early.
    pub const UNPARSED: Self = Self(u16::MAX - 3);

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_builtin(self) -> bool {
        self.0 >= Self::UNPARSED.0
    }

    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0 || self.0 == Self::ERROR_REPEAT.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ERROR => f.write_str("ERROR"),
            Self::ERROR_REPEAT => f.write_str("ERROR_REPEAT"),
            Self::AMBIGUITY => f.write_str("AMBIGUITY"),
            Self::UNPARSED => f.write_str("UNPARSED"),
            Self(index) => write!(f, "#{index}"),
        }
    }
}

/// A parse-table state.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u16);

impl StateId {
    /// The state error recovery runs in. Never reached by a table action.
    pub const ERROR: Self = Self(0);
    pub const START: Self = Self(1);

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Recognised by the lexer's state machine.
    Terminal,
    /// Recognised by the language's external scanner.
    External,
    NonTerminal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub name: Box<str>,
    pub kind: SymbolKind,
    /// Visible symbols appear as nodes; hidden ones are flattened into
    /// their parent.
    pub visible: bool,
    pub named: bool,
    /// May appear anywhere between tokens. Hidden extras are trivia.
    pub extra: bool,
}

impl SymbolMetadata {
    pub fn terminal(name: &str, named: bool) -> Self {
        Self { name: name.into(), kind: SymbolKind::Terminal, visible: true, named, extra: false }
    }

    pub fn non_terminal(name: &str, visible: bool) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::NonTerminal,
            visible,
            named: true,
            extra: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind != SymbolKind::NonTerminal
    }
}
