use std::fmt::Write as _;

use expect_test::{Expect, expect};
use sapling_input::{ChunkedSource, Point, Utf16Source};
use sapling_language::{
    ExternalScannerDef, LanguageData, LexMode, LexState, LexTransition, ParseAction, ScanCursor,
    SymbolKind, SymbolMetadata,
};

use super::*;

const NUMBER: Symbol = Symbol(1);
const PLUS: Symbol = Symbol(2);
const PLUS_PLUS: Symbol = Symbol(3);
const WHITESPACE: Symbol = Symbol(4);
const COMMENT: Symbol = Symbol(5);
const TILDE: Symbol = Symbol(6);

const ANY: StateId = StateId(1);
const PLUS_ONLY: StateId = StateId(2);

/// Counts the runs of `~` it has produced.
#[derive(Default)]
struct TildeScanner {
    produced: u8,
}

impl ExternalScanner for TildeScanner {
    fn scan(&mut self, cursor: &mut dyn ScanCursor, valid: &SymbolSet) -> Option<Symbol> {
        if !valid.contains(TILDE) || cursor.lookahead() != Some('~') {
            return None;
        }
        while cursor.lookahead() == Some('~') {
            cursor.advance();
        }
        cursor.mark_end();
        self.produced += 1;
        Some(TILDE)
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.produced);
    }

    fn deserialize(&mut self, state: &[u8]) {
        self.produced = state.first().copied().unwrap_or(0);
    }
}

fn transition(start: char, end: char, target: u32) -> LexTransition {
    LexTransition { start, end, target }
}

fn language() -> Language {
    let extra = |mut metadata: SymbolMetadata, visible| {
        metadata.extra = true;
        metadata.visible = visible;
        metadata
    };
    let mut tilde = SymbolMetadata::terminal("tilde", true);
    tilde.kind = SymbolKind::External;

    let token_count = 7;
    let mut actions = vec![Box::<[ParseAction]>::default(); 3 * token_count];
    for symbol in [NUMBER, PLUS, PLUS_PLUS, TILDE] {
        actions[ANY.index() * token_count + symbol.index()] = Box::new([ParseAction::Shift(ANY)]);
    }
    actions[PLUS_ONLY.index() * token_count + PLUS.index()] = Box::new([ParseAction::Shift(ANY)]);

    let mut token_conflicts = vec![SymbolSet::new(); token_count];
    token_conflicts[PLUS.index()].insert(PLUS_PLUS);
    token_conflicts[PLUS_PLUS.index()].insert(PLUS);

    let data = LanguageData {
        name: "tokens".into(),
        symbols: vec![
            SymbolMetadata::terminal("end", false),
            SymbolMetadata::terminal("number", true),
            SymbolMetadata::terminal("+", false),
            SymbolMetadata::terminal("++", false),
            extra(SymbolMetadata::terminal("whitespace", true), false),
            extra(SymbolMetadata::terminal("comment", true), true),
            tilde,
        ],
        token_count,
        state_count: 3,
        actions,
        gotos: Vec::new(),
        productions: Vec::new(),
        lex_states: vec![
            LexState {
                accepts: Box::new([]),
                transitions: Box::new([
                    transition('\n', '\n', 1),
                    transition(' ', ' ', 1),
                    transition('#', '#', 5),
                    transition('+', '+', 3),
                    transition('0', '9', 2),
                ]),
            },
            LexState {
                accepts: Box::new([WHITESPACE]),
                transitions: Box::new([transition('\n', '\n', 1), transition(' ', ' ', 1)]),
            },
            LexState {
                accepts: Box::new([NUMBER]),
                transitions: Box::new([transition('0', '9', 2)]),
            },
            LexState {
                accepts: Box::new([PLUS]),
                transitions: Box::new([transition('+', '+', 4)]),
            },
            LexState { accepts: Box::new([PLUS_PLUS]), transitions: Box::new([]) },
            LexState {
                accepts: Box::new([COMMENT]),
                transitions: Box::new([
                    transition('\0', '\t', 5),
                    transition('\u{b}', char::MAX, 5),
                ]),
            },
        ],
        lex_modes: vec![LexMode::default(); 3],
        token_conflicts,
        external_scanner: Some(ExternalScannerDef::new(vec![TILDE], || {
            Box::new(TildeScanner::default())
        })),
    };
    Language::new(data).unwrap()
}

fn dump<S: TextSource + ?Sized>(source: &S, state: StateId) -> String {
    let language = language();
    let mut lexer = Lexer::new(&language, source);
    let mut position = Length::ZERO;
    let mut external: Option<ExternalState> = None;
    let mut out = String::new();

    loop {
        let token = lexer.next_token(position, state, external.as_deref());
        let start = position + token.padding;
        let end = start + token.size;
        write!(
            out,
            "{} {}..{} lookahead={}",
            language.symbol_name(token.symbol),
            u32::from(start.bytes),
            u32::from(end.bytes),
            token.lookahead_bytes
        )
        .unwrap();
        if token.extra {
            out.push_str(" extra");
        }
        if let Some(state) = &token.external_state {
            write!(out, " state={:?}", &state[..]).unwrap();
            external = Some(state.clone());
        }
        out.push('\n');

        if token.is_end() {
            break;
        }
        position = end;
    }
    out
}

fn check(text: &str, state: StateId, expect: Expect) {
    expect.assert_eq(&dump(text, state));
}

#[test]
fn tokens_with_padding() {
    check("12 + 3", ANY, expect![[r#"
        number 0..2 lookahead=1
        + 3..4 lookahead=1
        number 5..6 lookahead=1
        end 6..6 lookahead=1
    "#]]);
}

#[test]
fn longest_match_is_restricted_to_valid_tokens() {
    check("++", ANY, expect![[r#"
        ++ 0..2 lookahead=0
        end 2..2 lookahead=1
    "#]]);
    check("++", PLUS_ONLY, expect![[r#"
        + 0..1 lookahead=1
        + 1..2 lookahead=1
        end 2..2 lookahead=1
    "#]]);
}

#[test]
fn unexpected_token_is_still_returned() {
    check("7", PLUS_ONLY, expect![[r#"
        number 0..1 lookahead=1
        end 1..1 lookahead=1
    "#]]);
}

#[test]
fn unrecognised_character_becomes_error_token() {
    check("1 @ 2", ANY, expect![[r#"
        number 0..1 lookahead=1
        ERROR 2..3 lookahead=0
        number 4..5 lookahead=1
        end 5..5 lookahead=1
    "#]]);
}

#[test]
fn visible_extras_are_tokens() {
    check("1 # hi\n2", ANY, expect![[r#"
        number 0..1 lookahead=1
        comment 2..6 lookahead=1 extra
        number 7..8 lookahead=1
        end 8..8 lookahead=1
    "#]]);
}

#[test]
fn padding_tracks_rows() {
    let language = language();
    let mut lexer = Lexer::new(&language, "1 # hi\n  2");
    let comment_end = Length::of_str("1 # hi");

    let token = lexer.next_token(comment_end, ANY, None);
    assert_eq!(token.symbol, NUMBER);
    assert_eq!(token.padding, Length::of_str("\n  "));
    assert_eq!((comment_end + token.padding).extent, Point::new(1, 2));
}

#[test]
fn external_scanner_state_travels_with_tokens() {
    check("~~ 1 ~", ANY, expect![[r#"
        tilde 0..2 lookahead=1 state=[1]
        number 3..4 lookahead=1
        tilde 5..6 lookahead=1 state=[2]
        end 6..6 lookahead=1
    "#]]);
}

#[test]
fn external_tokens_only_where_valid() {
    check("~", PLUS_ONLY, expect![[r#"
        ERROR 0..1 lookahead=0
        end 1..1 lookahead=1
    "#]]);
}

#[test]
fn utf16_offsets_are_in_bytes() {
    expect![[r#"
        number 0..4 lookahead=2
        + 6..8 lookahead=2
        number 10..12 lookahead=1
        end 12..12 lookahead=1
    "#]]
    .assert_eq(&dump(&Utf16Source::new("12 + 3"), ANY));
}

#[test]
fn chunk_boundaries_do_not_split_characters() {
    expect![[r#"
        comment 0..3 lookahead=1 extra
        number 4..5 lookahead=1
        end 5..5 lookahead=1
    "#]]
    .assert_eq(&dump(&ChunkedSource::from_str_chunks("#é\n1", 1), ANY));
}

#[test]
fn end_is_measured_in_rows() {
    let text = "1 +\n22\n3";
    let mut lexer = Lexer::new(&language(), text);
    let start = Length::of_str("1 +");

    assert_eq!(lexer.end_from(start), Length::of_str(text));
    assert_eq!(lexer.end_from(Length::of_str(text)), Length::of_str(text));
}
