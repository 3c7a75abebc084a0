//! Ready-made languages. Each is compiled once per process and shared.

use std::sync::LazyLock;

use sapling_language::{ExternalScanner, Language, ScanCursor, Symbol, SymbolSet};

use crate::{Alternative, Grammar, Pattern, alt};

fn compile(grammar: Grammar) -> Language {
    match grammar.build() {
        Ok(language) => language,
        Err(error) => panic!("built-in grammar does not compile: {error}"),
    }
}

fn whitespace() -> Pattern {
    Pattern::one_of(" \t\r\n").repeat1()
}

fn number() -> Pattern {
    Pattern::range('0', '9').repeat1()
}

/// Sums, products and parentheses over integers. `*` binds tighter than
/// `+`; both associate to the left.
pub fn arithmetic_grammar() -> Grammar {
    Grammar::new("arithmetic")
        .token("number", number())
        .literal("+")
        .literal("*")
        .literal("(")
        .literal(")")
        .token("_whitespace", whitespace())
        .extra("_whitespace")
        .rule("program", [alt(["_expr"])])
        .rule("_expr", [alt(["sum"]), alt(["product"]), alt(["parenthesized"]), alt(["number"])])
        .rule("sum", [alt(["_expr", "+", "_expr"]).prec_left(1)])
        .rule("product", [alt(["_expr", "*", "_expr"]).prec_left(2)])
        .rule("parenthesized", [alt(["(", "_expr", ")"])])
}

pub fn arithmetic() -> Language {
    static LANGUAGE: LazyLock<Language> = LazyLock::new(|| compile(arithmetic_grammar()));
    LANGUAGE.clone()
}

/// Sums without precedence: `1+2+3` has two parses.
pub fn ambiguous() -> Language {
    static LANGUAGE: LazyLock<Language> = LazyLock::new(|| {
        compile(
            Grammar::new("ambiguous")
                .token("number", number())
                .literal("+")
                .token("_whitespace", whitespace())
                .extra("_whitespace")
                .rule("program", [alt(["_expr"])])
                .rule("_expr", [alt(["sum"]), alt(["number"])])
                .rule("sum", [alt(["_expr", "+", "_expr"])]),
        )
    });
    LANGUAGE.clone()
}

/// `let` bindings and expression statements with `#` line comments, which
/// stay in the tree as extras.
pub fn statements() -> Language {
    static LANGUAGE: LazyLock<Language> = LazyLock::new(|| {
        let identifier = Pattern::seq([
            Pattern::choice([Pattern::range('a', 'z'), Pattern::char('_')]),
            Pattern::choice([
                Pattern::range('a', 'z'),
                Pattern::range('0', '9'),
                Pattern::char('_'),
            ])
            .repeat(),
        ]);
        let comment = Pattern::seq([Pattern::char('#'), Pattern::none_of("\n").repeat()]);
        compile(
            Grammar::new("statements")
                .token("number", number())
                .token("identifier", identifier)
                .token("comment", comment)
                .literal("let")
                .literal("=")
                .literal(";")
                .literal("+")
                .literal("*")
                .literal("(")
                .literal(")")
                .token("_whitespace", whitespace())
                .extra("_whitespace")
                .extra("comment")
                .rule("program", [Alternative::empty(), alt(["_statements"])])
                .rule("_statements", [alt(["_statement"]), alt(["_statements", "_statement"])])
                .rule("_statement", [alt(["let_statement"]), alt(["expression_statement"])])
                .rule("let_statement", [alt(["let", "identifier", "=", "_expr", ";"])])
                .rule("expression_statement", [alt(["_expr", ";"])])
                .rule("_expr", [
                    alt(["sum"]),
                    alt(["product"]),
                    alt(["parenthesized"]),
                    alt(["number"]),
                    alt(["identifier"]),
                ])
                .rule("sum", [alt(["_expr", "+", "_expr"]).prec_left(1)])
                .rule("product", [alt(["_expr", "*", "_expr"]).prec_left(2)])
                .rule("parenthesized", [alt(["(", "_expr", ")"])]),
        )
    });
    LANGUAGE.clone()
}

/// Symbols of `fenced`, in declaration order.
pub const OPEN_FENCE: Symbol = Symbol(2);
pub const CLOSE_FENCE: Symbol = Symbol(3);

/// Runs of backticks around numbers. A fence closes only with a run of the
/// same length, so the scanner keeps the open lengths as its state.
pub fn fenced() -> Language {
    static LANGUAGE: LazyLock<Language> = LazyLock::new(|| {
        compile(
            Grammar::new("fenced")
                .token("number", number())
                .external("open_fence")
                .external("close_fence")
                .token("_whitespace", whitespace())
                .extra("_whitespace")
                .rule("program", [alt(["_blocks"])])
                .rule("_blocks", [alt(["block"]), alt(["_blocks", "block"])])
                .rule("block", [
                    alt(["open_fence", "_numbers", "close_fence"]),
                    alt(["open_fence", "close_fence"]),
                ])
                .rule("_numbers", [alt(["number"]), alt(["_numbers", "number"])])
                .scanner(|| Box::new(FenceScanner::default())),
        )
    });
    LANGUAGE.clone()
}

#[derive(Debug, Default)]
struct FenceScanner {
    open: Vec<u8>,
}

impl ExternalScanner for FenceScanner {
    fn scan(&mut self, cursor: &mut dyn ScanCursor, valid: &SymbolSet) -> Option<Symbol> {
        while matches!(cursor.lookahead(), Some(' ' | '\t' | '\r' | '\n')) {
            cursor.skip();
        }
        let mut length = 0u8;
        while cursor.lookahead() == Some('`') {
            cursor.advance();
            length = length.saturating_add(1);
        }
        if length == 0 {
            return None;
        }
        cursor.mark_end();

        if valid.contains(CLOSE_FENCE) && self.open.last() == Some(&length) {
            self.open.pop();
            return Some(CLOSE_FENCE);
        }
        if valid.contains(OPEN_FENCE) {
            self.open.push(length);
            return Some(OPEN_FENCE);
        }
        None
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.open);
    }

    fn deserialize(&mut self, state: &[u8]) {
        self.open.clear();
        self.open.extend_from_slice(state);
    }
}

#[cfg(test)]
mod tests {
    use sapling_language::{ParseAction, StateId};

    use super::*;

    #[test]
    fn built_in_languages_compile() {
        for language in [arithmetic(), ambiguous(), statements(), fenced()] {
            assert!(language.state_count() > 2, "{}", language.name());
        }
        assert_eq!(arithmetic(), arithmetic());
    }

    #[test]
    fn arithmetic_has_no_conflicts() {
        let language = arithmetic();
        for state in 0..language.state_count() {
            for terminal in 0..language.token_count() {
                let actions = language.actions(StateId(state as u16), Symbol(terminal as u16));
                assert!(actions.len() <= 1, "state {state} terminal {terminal}: {actions:?}");
            }
        }
    }

    #[test]
    fn keywords_conflict_with_identifiers() {
        let language = statements();
        let identifier = language.symbol_for_name("identifier", true).unwrap();
        let keyword = language.symbol_for_name("let", false).unwrap();
        let number = language.symbol_for_name("number", true).unwrap();

        assert!(language.conflicts(keyword).unwrap().contains(identifier));
        assert!(!language.conflicts(number).unwrap().contains(identifier));
    }

    #[test]
    fn comments_shift_as_extras() {
        let language = statements();
        let comment = language.symbol_for_name("comment", true).unwrap();

        assert!(language.is_extra(comment) && !language.is_trivia(comment));
        assert_eq!(language.actions(StateId::START, comment), [ParseAction::ShiftExtra]);
    }

    #[test]
    fn fences_match_by_length() {
        let language = fenced();
        assert_eq!(language.symbol_name(OPEN_FENCE), "open_fence");
        assert_eq!(language.symbol_name(CLOSE_FENCE), "close_fence");
        assert!(language.external_scanner().is_some());
    }
}
