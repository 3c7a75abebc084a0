use sapling_language::{
    ExternalScanner, ExternalScannerDef, Language, LanguageData, LexMode, ParseAction, Symbol,
    SymbolKind, SymbolMetadata, SymbolSet,
};

use crate::lr::{Rule, Tables};
use crate::{FxIndexMap, GrammarError, Pattern, dfa, lr};

type ScannerFactory = Box<dyn Fn() -> Box<dyn ExternalScanner> + Send + Sync>;

/// How a production binds against the operator that follows it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Assoc {
    #[default]
    None,
    Left,
    Right,
}

/// One right-hand side of a rule. Symbols are referred to by name; literal
/// tokens by their text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alternative {
    pub(crate) symbols: Vec<String>,
    pub(crate) precedence: i32,
    pub(crate) assoc: Assoc,
    pub(crate) dynamic_precedence: i16,
}

impl Alternative {
    pub fn new<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            symbols: symbols.into_iter().map(str::to_owned).collect(),
            precedence: 0,
            assoc: Assoc::None,
            dynamic_precedence: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn prec(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn prec_left(self, precedence: i32) -> Self {
        Self { assoc: Assoc::Left, ..self.prec(precedence) }
    }

    pub fn prec_right(self, precedence: i32) -> Self {
        Self { assoc: Assoc::Right, ..self.prec(precedence) }
    }

    /// Bias applied at run time when the parse is ambiguous.
    pub fn dynamic(mut self, precedence: i16) -> Self {
        self.dynamic_precedence = precedence;
        self
    }
}

/// Shorthand for `Alternative::new`.
pub fn alt<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Alternative {
    Alternative::new(symbols)
}

#[derive(Debug)]
enum TokenKind {
    Pattern(Pattern),
    External,
}

#[derive(Debug)]
struct TokenDef {
    kind: TokenKind,
    named: bool,
}

/// A context-free grammar with its tokens, compiled into a `Language` by
/// `build`. The first rule is the start rule. Names starting with `_` are
/// hidden.
#[derive(Default)]
pub struct Grammar {
    name: String,
    tokens: FxIndexMap<String, TokenDef>,
    rules: FxIndexMap<String, Vec<Alternative>>,
    extras: Vec<String>,
    scanner: Option<ScannerFactory>,
    duplicates: Vec<String>,
}

impl Grammar {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), ..Self::default() }
    }

    /// A named token.
    pub fn token(self, name: &str, pattern: Pattern) -> Self {
        self.add_token(name, TokenDef { kind: TokenKind::Pattern(pattern), named: true })
    }

    /// An anonymous token matching `text` exactly, referred to by its text.
    pub fn literal(self, text: &str) -> Self {
        let kind = TokenKind::Pattern(Pattern::string(text));
        self.add_token(text, TokenDef { kind, named: false })
    }

    /// A named token produced by the external scanner.
    pub fn external(self, name: &str) -> Self {
        self.add_token(name, TokenDef { kind: TokenKind::External, named: true })
    }

    fn add_token(mut self, name: &str, token: TokenDef) -> Self {
        if self.tokens.insert(name.to_owned(), token).is_some() {
            self.duplicates.push(name.to_owned());
        }
        self
    }

    /// Marks a token as allowed anywhere. Hidden extras become padding,
    /// visible ones are kept in the tree.
    pub fn extra(mut self, name: &str) -> Self {
        self.extras.push(name.to_owned());
        self
    }

    pub fn rule(mut self, name: &str, alternatives: impl IntoIterator<Item = Alternative>) -> Self {
        self.rules.entry(name.to_owned()).or_default().extend(alternatives);
        self
    }

    pub fn scanner(
        mut self,
        factory: impl Fn() -> Box<dyn ExternalScanner> + Send + Sync + 'static,
    ) -> Self {
        self.scanner = Some(Box::new(factory));
        self
    }

    pub fn build(self) -> Result<Language, GrammarError> {
        if let Some(name) = self.duplicates.first() {
            return Err(GrammarError::DuplicateSymbol(name.clone()));
        }
        if self.rules.is_empty() {
            return Err(GrammarError::NoRules);
        }
        if let Some(name) = self.rules.keys().find(|name| self.tokens.contains_key(*name)) {
            return Err(GrammarError::DuplicateSymbol(name.clone()));
        }

        let symbol_count = 1 + self.tokens.len() + self.rules.len();
        if symbol_count >= usize::from(Symbol::UNPARSED.0) {
            return Err(GrammarError::TooManySymbols(symbol_count));
        }
        let token_count = 1 + self.tokens.len();
        let symbol_of = |name: &str| -> Option<Symbol> {
            match self.tokens.get_index_of(name) {
                Some(index) => Some(Symbol(index as u16 + 1)),
                None => {
                    self.rules.get_index_of(name).map(|index| Symbol((token_count + index) as u16))
                }
            }
        };

        let end = SymbolMetadata { visible: false, ..SymbolMetadata::terminal("end", false) };
        let mut symbols = vec![end];
        let mut extras = SymbolSet::new();
        for name in &self.extras {
            match self.tokens.get_index_of(name.as_str()) {
                Some(index) => extras.insert(Symbol(index as u16 + 1)),
                None => return Err(GrammarError::ExtraNotToken(name.clone())),
            };
        }
        for (index, (name, token)) in self.tokens.iter().enumerate() {
            let mut metadata = SymbolMetadata::terminal(name, token.named);
            metadata.visible = !name.starts_with('_');
            metadata.extra = extras.contains(Symbol(index as u16 + 1));
            if let TokenKind::External = token.kind {
                metadata.kind = SymbolKind::External;
            }
            symbols.push(metadata);
        }
        for name in self.rules.keys() {
            symbols.push(SymbolMetadata::non_terminal(name, !name.starts_with('_')));
        }

        let mut rules = Vec::new();
        for (index, (name, alternatives)) in self.rules.iter().enumerate() {
            let lhs = Symbol((token_count + index) as u16);
            for alternative in alternatives {
                let rhs = alternative
                    .symbols
                    .iter()
                    .map(|symbol| {
                        symbol_of(symbol).ok_or_else(|| GrammarError::UndefinedSymbol {
                            rule: name.clone(),
                            symbol: symbol.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                rules.push(Rule {
                    lhs,
                    rhs,
                    precedence: alternative.precedence,
                    assoc: alternative.assoc,
                    dynamic_precedence: alternative.dynamic_precedence,
                });
            }
        }

        let mut patterns: Vec<(Symbol, &Pattern, bool)> = Vec::new();
        for (index, (name, token)) in self.tokens.iter().enumerate() {
            if let TokenKind::Pattern(pattern) = &token.kind {
                if pattern.matches_empty() {
                    return Err(GrammarError::EmptyToken(name.clone()));
                }
                patterns.push((Symbol(index as u16 + 1), pattern, token.named));
            }
        }
        // Literals win over patterns matching the same text.
        patterns.sort_by_key(|&(_, _, named)| named);
        let patterns: Vec<(Symbol, &Pattern)> =
            patterns.into_iter().map(|(symbol, pattern, _)| (symbol, pattern)).collect();
        let lexer = dfa::build(&patterns);

        let mut token_conflicts = vec![SymbolSet::new(); token_count];
        for ((symbol, _), conflicts) in patterns.iter().zip(lexer.conflicts) {
            token_conflicts[symbol.index()] = conflicts;
        }

        let Tables { state_count, mut actions, gotos, productions } =
            lr::build(&rules, token_count, symbols.len());
        let visible_extras: Vec<Symbol> =
            extras.iter().filter(|extra| symbols[extra.index()].visible).collect();
        for state in 1..state_count {
            for &extra in &visible_extras {
                let row = &mut actions[state * token_count + extra.index()];
                if row.is_empty() {
                    *row = Box::new([ParseAction::ShiftExtra]);
                }
            }
        }

        let external_tokens: Vec<Symbol> = symbols
            .iter()
            .enumerate()
            .filter(|(_, metadata)| metadata.kind == SymbolKind::External)
            .map(|(index, _)| Symbol(index as u16))
            .collect();
        let external_scanner =
            self.scanner.map(|factory| ExternalScannerDef::new(external_tokens, factory));

        let data = LanguageData {
            name: self.name,
            symbols,
            token_count,
            state_count,
            actions,
            gotos,
            productions,
            lex_states: lexer.states,
            lex_modes: vec![LexMode::default(); state_count],
            token_conflicts,
            external_scanner,
        };
        Ok(Language::new(data)?)
    }
}

#[cfg(test)]
mod tests {
    use sapling_language::{LanguageError, StateId};

    use super::*;

    fn sums() -> Grammar {
        Grammar::new("sums")
            .token("number", Pattern::range('0', '9').repeat1())
            .literal("+")
            .token("_whitespace", Pattern::one_of(" \n").repeat1())
            .extra("_whitespace")
            .rule("program", [alt(["_expr"])])
            .rule("_expr", [alt(["sum"]), alt(["number"])])
            .rule("sum", [alt(["_expr", "+", "_expr"]).prec_left(1)])
    }

    #[test]
    fn symbols_follow_declaration_order() {
        let language = sums().build().unwrap();

        assert_eq!(language.token_count(), 4);
        assert_eq!(language.symbol_name(Symbol(1)), "number");
        assert_eq!(language.symbol_name(Symbol(2)), "+");
        assert_eq!(language.symbol_for_name("sum", true), Some(Symbol(6)));
        assert!(language.is_trivia(Symbol(3)));
        assert!(!language.is_visible(Symbol(5)));
        assert!(!language.is_named(Symbol(2)));
        assert!(language.valid_terminals(StateId::START).contains(Symbol(1)));
        assert!(!language.valid_terminals(StateId::START).contains(Symbol(2)));
    }

    #[test]
    fn reports_grammar_mistakes() {
        let undefined = sums().rule("sum", [alt(["_expr", "-", "_expr"])]).build();
        assert_eq!(undefined.unwrap_err(), GrammarError::UndefinedSymbol {
            rule: "sum".to_owned(),
            symbol: "-".to_owned(),
        });

        let duplicate = sums().literal("+").build();
        assert_eq!(duplicate.unwrap_err(), GrammarError::DuplicateSymbol("+".to_owned()));

        let empty = sums().token("blank", Pattern::char(' ').repeat()).build();
        assert_eq!(empty.unwrap_err(), GrammarError::EmptyToken("blank".to_owned()));

        let extra = sums().extra("comment").build();
        assert_eq!(extra.unwrap_err(), GrammarError::ExtraNotToken("comment".to_owned()));

        let scanner = sums().external("indent").rule("program", [alt(["indent"])]).build();
        assert_eq!(scanner.unwrap_err(), GrammarError::Language(LanguageError::ScannerMismatch));

        assert_eq!(Grammar::new("empty").build().unwrap_err(), GrammarError::NoRules);
    }
}
