use std::fmt;
use std::sync::Arc;

use crate::{
    ExternalScanner, ExternalScannerDef, LanguageError, LexMode, LexState, ParseAction,
    Production, ProductionId, StateId, Symbol, SymbolKind, SymbolMetadata, SymbolSet,
};

/// The raw tables of a compiled language.
///
/// Symbols `0..token_count` are terminals (symbol 0 is end of input) and the
/// rest are non-terminals. Action lists are indexed by
/// `state * token_count + terminal`, gotos by
/// `state * non_terminal_count + (symbol - token_count)`.
#[derive(Clone, Debug, Default)]
pub struct LanguageData {
    pub name: String,
    pub symbols: Vec<SymbolMetadata>,
    pub token_count: usize,
    pub state_count: usize,
    pub actions: Vec<Box<[ParseAction]>>,
    pub gotos: Vec<Option<StateId>>,
    pub productions: Vec<Production>,
    pub lex_states: Vec<LexState>,
    /// Lex mode of every parse state.
    pub lex_modes: Vec<LexMode>,
    /// For every terminal, the terminals whose matches can overlap its own.
    pub token_conflicts: Vec<SymbolSet>,
    pub external_scanner: Option<ExternalScannerDef>,
}

struct LanguageInner {
    data: LanguageData,
    valid_terminals: Vec<SymbolSet>,
    valid_externals: Vec<SymbolSet>,
    extras: SymbolSet,
}

/// A validated, immutable language shared by every tree parsed with it.
#[derive(Clone)]
pub struct Language(Arc<LanguageInner>);

impl Language {
    pub fn new(data: LanguageData) -> Result<Self, LanguageError> {
        validate(&data)?;

        let mut valid_terminals = Vec::with_capacity(data.state_count);
        let mut valid_externals = Vec::with_capacity(data.state_count);
        for state in 0..data.state_count {
            let mut terminals = SymbolSet::with_capacity(data.token_count);
            let mut externals = SymbolSet::new();
            for terminal in 0..data.token_count {
                let row = &data.actions[state * data.token_count + terminal];
                if state == StateId::ERROR.index() || !row.is_empty() {
                    let symbol = Symbol(terminal as u16);
                    terminals.insert(symbol);
                    if data.symbols[terminal].kind == SymbolKind::External {
                        externals.insert(symbol);
                    }
                }
            }
            valid_terminals.push(terminals);
            valid_externals.push(externals);
        }

        let extras = data
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, metadata)| metadata.extra)
            .map(|(index, _)| Symbol(index as u16))
            .collect();

        Ok(Self(Arc::new(LanguageInner { data, valid_terminals, valid_externals, extras })))
    }

    fn data(&self) -> &LanguageData {
        &self.0.data
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn symbol_count(&self) -> usize {
        self.data().symbols.len()
    }

    pub fn token_count(&self) -> usize {
        self.data().token_count
    }

    pub fn state_count(&self) -> usize {
        self.data().state_count
    }

    /// Metadata of a grammar symbol; `None` for the runtime's own symbols.
    pub fn metadata(&self, symbol: Symbol) -> Option<&SymbolMetadata> {
        self.data().symbols.get(symbol.index())
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::ERROR => "ERROR",
            Symbol::ERROR_REPEAT => "_ERROR",
            Symbol::AMBIGUITY => "AMBIGUITY",
            Symbol::UNPARSED => "UNPARSED",
            _ => self.metadata(symbol).map_or("<unknown>", |metadata| &metadata.name),
        }
    }

    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        if named && name == "ERROR" {
            return Some(Symbol::ERROR);
        }
        self.data()
            .symbols
            .iter()
            .position(|metadata| {
                metadata.visible && metadata.named == named && &*metadata.name == name
            })
            .map(|index| Symbol(index as u16))
    }

    pub fn is_visible(&self, symbol: Symbol) -> bool {
        match symbol {
            Symbol::ERROR | Symbol::AMBIGUITY | Symbol::UNPARSED => true,
            Symbol::END | Symbol::ERROR_REPEAT => false,
            _ => self.metadata(symbol).is_some_and(|metadata| metadata.visible),
        }
    }

    pub fn is_named(&self, symbol: Symbol) -> bool {
        match symbol {
            Symbol::ERROR | Symbol::AMBIGUITY | Symbol::UNPARSED => true,
            Symbol::END | Symbol::ERROR_REPEAT => false,
            _ => self.metadata(symbol).is_some_and(|metadata| metadata.named),
        }
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.0.extras.contains(symbol)
    }

    /// Hidden extras: folded into the padding of the following token.
    pub fn is_trivia(&self, symbol: Symbol) -> bool {
        self.is_extra(symbol) && !self.is_visible(symbol)
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.data().token_count
    }

    pub fn is_external(&self, symbol: Symbol) -> bool {
        self.metadata(symbol).is_some_and(|metadata| metadata.kind == SymbolKind::External)
    }

    pub fn extras(&self) -> &SymbolSet {
        &self.0.extras
    }

    /// Actions for a terminal lookahead, reductions first. Empty for
    /// non-terminals and for combinations the grammar does not allow.
    pub fn actions(&self, state: StateId, symbol: Symbol) -> &[ParseAction] {
        let data = self.data();
        if !self.is_terminal(symbol) || state.index() >= data.state_count {
            return &[];
        }
        &data.actions[state.index() * data.token_count + symbol.index()]
    }

    pub fn has_actions(&self, state: StateId, symbol: Symbol) -> bool {
        !self.actions(state, symbol).is_empty()
    }

    /// The state reached by shifting a terminal or by the goto on a
    /// non-terminal.
    pub fn next_state(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        let data = self.data();
        if self.is_terminal(symbol) {
            return self.actions(state, symbol).iter().rev().find_map(|action| match action {
                ParseAction::Shift(target) => Some(*target),
                _ => None,
            });
        }
        if symbol.is_builtin() || state.index() >= data.state_count {
            return None;
        }
        let non_terminal_count = data.symbols.len() - data.token_count;
        let column = symbol.index().checked_sub(data.token_count)?;
        data.gotos.get(state.index() * non_terminal_count + column).copied().flatten()
    }

    /// The non-terminal a complete parse reduces to: the one whose goto
    /// from the start state accepts at end of input.
    pub fn start_symbol(&self) -> Option<Symbol> {
        (self.token_count()..self.symbol_count()).map(|index| Symbol(index as u16)).find(|&symbol| {
            self.next_state(StateId::START, symbol).is_some_and(|state| {
                self.actions(state, Symbol::END).contains(&ParseAction::Accept)
            })
        })
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.data().productions[id.index()]
    }

    pub fn lex_mode(&self, state: StateId) -> LexMode {
        self.data().lex_modes.get(state.index()).copied().unwrap_or_default()
    }

    pub fn lex_state(&self, id: u32) -> &LexState {
        &self.data().lex_states[id as usize]
    }

    /// Terminals with at least one action in `state`. In the error state
    /// every terminal is valid.
    pub fn valid_terminals(&self, state: StateId) -> &SymbolSet {
        &self.0.valid_terminals[state.index()]
    }

    pub fn valid_external_tokens(&self, state: StateId) -> &SymbolSet {
        &self.0.valid_externals[state.index()]
    }

    /// Terminals that can match some of the same text as `symbol`.
    pub fn conflicts(&self, symbol: Symbol) -> Option<&SymbolSet> {
        self.data().token_conflicts.get(symbol.index())
    }

    /// Whether a previously lexed `symbol` can be reused in `state` without
    /// lexing again: it must be valid there and nothing valid there may
    /// compete with it for the same text.
    pub fn is_reusable_token(&self, state: StateId, symbol: Symbol) -> bool {
        let valid = self.valid_terminals(state);
        valid.contains(symbol)
            && self.conflicts(symbol).is_some_and(|conflicts| conflicts.is_disjoint(valid))
    }

    pub fn external_scanner(&self) -> Option<&ExternalScannerDef> {
        self.data().external_scanner.as_ref()
    }

    pub fn new_external_scanner(&self) -> Option<Box<dyn ExternalScanner>> {
        self.external_scanner().map(ExternalScannerDef::create)
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Language {}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("symbols", &self.symbol_count())
            .field("states", &self.state_count())
            .finish_non_exhaustive()
    }
}

fn check_len(table: &'static str, expected: usize, found: usize) -> Result<(), LanguageError> {
    if expected == found {
        Ok(())
    } else {
        Err(LanguageError::TableSize { table, expected, found })
    }
}

fn validate(data: &LanguageData) -> Result<(), LanguageError> {
    if data.state_count < 2 {
        return Err(LanguageError::TooFewStates(data.state_count));
    }
    if data.symbols.first().is_none_or(|end| end.kind == SymbolKind::NonTerminal) {
        return Err(LanguageError::MissingEnd);
    }
    if data.symbols.len() >= Symbol::UNPARSED.index() {
        return Err(LanguageError::ReservedSymbol(Symbol(data.symbols.len() as u16)));
    }
    if data.token_count > data.symbols.len() {
        return Err(LanguageError::TableSize {
            table: "symbol",
            expected: data.token_count,
            found: data.symbols.len(),
        });
    }

    for (index, metadata) in data.symbols.iter().enumerate() {
        let terminal = index < data.token_count;
        if terminal != metadata.is_terminal() {
            let expected = if terminal { "terminal" } else { "non-terminal" };
            return Err(LanguageError::SymbolKind { symbol: Symbol(index as u16), expected });
        }
    }

    let non_terminal_count = data.symbols.len() - data.token_count;
    check_len("action", data.state_count * data.token_count, data.actions.len())?;
    check_len("goto", data.state_count * non_terminal_count, data.gotos.len())?;
    check_len("lex mode", data.state_count, data.lex_modes.len())?;
    check_len("token conflict", data.token_count, data.token_conflicts.len())?;

    let state_exists =
        |target: StateId| target != StateId::ERROR && target.index() < data.state_count;
    for (index, row) in data.actions.iter().enumerate() {
        let state = StateId((index / data.token_count.max(1)) as u16);
        let symbol = Symbol((index % data.token_count.max(1)) as u16);
        let mut shifted = false;
        for action in row.iter() {
            match *action {
                ParseAction::Shift(target) if !state_exists(target) => {
                    return Err(LanguageError::UndefinedState { state, target });
                }
                ParseAction::Reduce(production) if production.index() >= data.productions.len() => {
                    return Err(LanguageError::UndefinedProduction { state, production });
                }
                ParseAction::Reduce(_) if shifted => {
                    return Err(LanguageError::ActionOrder { state, symbol });
                }
                action => shifted |= action.is_shift(),
            }
        }
    }

    for (index, target) in data.gotos.iter().enumerate() {
        let state = StateId((index / non_terminal_count.max(1)) as u16);
        match *target {
            Some(target) if !state_exists(target) => {
                return Err(LanguageError::UndefinedState { state, target });
            }
            _ => {}
        }
    }

    for production in &data.productions {
        let lhs = production.lhs;
        if lhs.index() < data.token_count || lhs.index() >= data.symbols.len() {
            return Err(LanguageError::SymbolKind { symbol: lhs, expected: "non-terminal" });
        }
    }

    let lex_state_count = data.lex_states.len() as u32;
    for (id, lex_state) in data.lex_states.iter().enumerate() {
        let id = id as u32;
        let transitions = &lex_state.transitions;
        let sorted = transitions.iter().all(|transition| transition.start <= transition.end)
            && transitions.windows(2).all(|pair| pair[0].end < pair[1].start);
        if !sorted {
            return Err(LanguageError::UnsortedTransitions(id));
        }
        if let Some(transition) =
            lex_state.transitions.iter().find(|transition| transition.target >= lex_state_count)
        {
            return Err(LanguageError::UndefinedLexState { state: id, target: transition.target });
        }
    }
    for mode in &data.lex_modes {
        if mode.lex_state >= lex_state_count {
            let target = mode.lex_state;
            return Err(LanguageError::UndefinedLexState { state: u32::MAX, target });
        }
    }

    let is_external = |symbol: &Symbol| {
        data.symbols.get(symbol.index()).is_some_and(|m| m.kind == SymbolKind::External)
    };
    let has_external_symbols =
        data.symbols.iter().any(|metadata| metadata.kind == SymbolKind::External);
    match &data.external_scanner {
        Some(scanner) => {
            if let Some(&symbol) = scanner.tokens.iter().find(|symbol| !is_external(symbol)) {
                return Err(LanguageError::SymbolKind { symbol, expected: "external" });
            }
            if !has_external_symbols {
                return Err(LanguageError::ScannerMismatch);
            }
        }
        None if has_external_symbols => return Err(LanguageError::ScannerMismatch),
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LexTransition;

    const X: Symbol = Symbol(1);
    const S: Symbol = Symbol(2);

    /// `S := 'x'`
    fn tiny() -> LanguageData {
        let none: Box<[ParseAction]> = Box::new([]);
        LanguageData {
            name: "tiny".into(),
            symbols: vec![
                SymbolMetadata::terminal("end", false),
                SymbolMetadata::terminal("x", false),
                SymbolMetadata::non_terminal("S", true),
            ],
            token_count: 2,
            state_count: 4,
            actions: vec![
                none.clone(),
                none.clone(),
                none.clone(),
                Box::new([ParseAction::Shift(StateId(2))]),
                Box::new([ParseAction::Reduce(ProductionId(0))]),
                none.clone(),
                Box::new([ParseAction::Accept]),
                none,
            ],
            gotos: vec![None, Some(StateId(3)), None, None],
            productions: vec![Production { lhs: S, child_count: 1, dynamic_precedence: 0 }],
            lex_states: vec![
                LexState {
                    accepts: Box::new([]),
                    transitions: Box::new([LexTransition { start: 'x', end: 'x', target: 1 }]),
                },
                LexState { accepts: Box::new([X]), transitions: Box::new([]) },
            ],
            lex_modes: vec![LexMode::default(); 4],
            token_conflicts: vec![SymbolSet::new(), SymbolSet::new()],
            external_scanner: None,
        }
    }

    #[test]
    fn lookup_tables() {
        let language = Language::new(tiny()).unwrap();

        assert_eq!(language.actions(StateId::START, X), [ParseAction::Shift(StateId(2))]);
        assert_eq!(language.next_state(StateId::START, X), Some(StateId(2)));
        assert_eq!(language.next_state(StateId::START, S), Some(StateId(3)));
        assert_eq!(language.next_state(StateId(2), S), None);
        assert_eq!(language.start_symbol(), Some(S));
        assert!(language.actions(StateId::START, S).is_empty());

        assert!(language.valid_terminals(StateId::START).contains(X));
        assert!(!language.valid_terminals(StateId::START).contains(Symbol::END));
        assert!(language.valid_terminals(StateId::ERROR).contains(Symbol::END));
        assert!(language.is_reusable_token(StateId::START, X));
        assert!(!language.is_reusable_token(StateId(2), X));

        assert_eq!(language.symbol_name(S), "S");
        assert_eq!(language.symbol_name(Symbol::ERROR), "ERROR");
        assert_eq!(language.symbol_for_name("S", true), Some(S));
        assert_eq!(language.symbol_for_name("x", false), Some(X));
        assert!(language.is_visible(Symbol::ERROR));
        assert!(!language.is_visible(Symbol::ERROR_REPEAT));
    }

    #[test]
    fn rejects_undefined_shift_target() {
        let mut data = tiny();
        data.actions[3] = Box::new([ParseAction::Shift(StateId(9))]);
        assert_eq!(
            Language::new(data).unwrap_err(),
            LanguageError::UndefinedState { state: StateId(1), target: StateId(9) }
        );
    }

    #[test]
    fn rejects_shift_before_reduce() {
        let mut data = tiny();
        data.actions[3] =
            Box::new([ParseAction::Shift(StateId(2)), ParseAction::Reduce(ProductionId(0))]);
        assert_eq!(Language::new(data).unwrap_err(), LanguageError::ActionOrder {
            state: StateId(1),
            symbol: X
        });
    }

    #[test]
    fn rejects_bad_tables() {
        let mut data = tiny();
        data.gotos.pop();
        assert_eq!(Language::new(data).unwrap_err(), LanguageError::TableSize {
            table: "goto",
            expected: 4,
            found: 3
        });

        let mut data = tiny();
        data.lex_states[0].transitions =
            Box::new([LexTransition { start: 'y', end: 'z', target: 1 }, LexTransition {
                start: 'x',
                end: 'x',
                target: 1,
            }]);
        assert_eq!(Language::new(data).unwrap_err(), LanguageError::UnsortedTransitions(0));

        let mut data = tiny();
        data.symbols[1].kind = SymbolKind::External;
        assert_eq!(Language::new(data).unwrap_err(), LanguageError::ScannerMismatch);
    }

    #[test]
    fn language_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Language>();
    }
}
