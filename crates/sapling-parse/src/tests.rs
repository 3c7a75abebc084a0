use std::fs;
use std::path::{Path, PathBuf};

use expect_test::{expect, expect_file};
use sapling_fixtures::languages;
use sapling_input::{ChunkedSource, InputEdit, Latin1Source, TextSize, Utf16Source};
use sapling_language::{Language, Symbol};
use sapling_tree::{Node, Tree, WalkEvent};

use crate::{ParseBudget, ParseError, Parser, ParserConfig};

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct TestCase {
    language: String,
    input: PathBuf,
    expected: PathBuf,
    text: String,
}

impl TestCase {
    /// Cases live in `test_data/<language>/`, one `.txt` input per case.
    fn list() -> Vec<Self> {
        let test_data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data");

        let mut cases = fs::read_dir(&test_data_dir)
            .unwrap_or_else(|err| {
                panic!("Cannot read directory {}: {err}", test_data_dir.display())
            })
            .filter_map(|entry| entry.ok())
            .flat_map(|language_dir| {
                let language = language_dir.file_name().to_string_lossy().into_owned();
                let entries = fs::read_dir(language_dir.path()).into_iter().flatten();
                entries.filter_map(move |entry| {
                    let path = entry.ok()?.path();
                    if path.extension()? == "txt" {
                        let expected = path.with_extension("tree");
                        let text = fs::read_to_string(&path).ok()?;
                        Some(Self { language: language.clone(), input: path, expected, text })
                    } else {
                        None
                    }
                })
            })
            .collect::<Vec<_>>();

        cases.sort();
        cases
    }
}

fn language_named(name: &str) -> Language {
    match name {
        "arithmetic" => languages::arithmetic(),
        "ambiguous" => languages::ambiguous(),
        "statements" => languages::statements(),
        "fenced" => languages::fenced(),
        _ => panic!("no language called {name}"),
    }
}

fn parse(language: Language, text: &str) -> Tree {
    Parser::new(language).parse(text, None).unwrap()
}

fn find<'t>(tree: &'t Tree, kind: &str, start: u32) -> Node<'t> {
    tree.root_node()
        .preorder()
        .filter_map(|event| match event {
            WalkEvent::Enter(node) => Some(node),
            WalkEvent::Leave(_) => None,
        })
        .find(|node| node.kind() == kind && node.byte_range().start() == TextSize::new(start))
        .unwrap_or_else(|| panic!("no {kind} at {start} in\n{}", tree.dump()))
}

#[test]
fn parse_test_data() {
    let test_cases = TestCase::list();
    assert!(!test_cases.is_empty());

    for case in test_cases {
        let tree = parse(language_named(&case.language), &case.text);
        assert!(!tree.has_error(), "{}:\n{}", case.input.display(), tree.dump());
        let len = u32::from(tree.len().bytes) as usize;
        assert_eq!(len, case.text.len(), "{}", case.input.display());
        expect_file![&case.expected].assert_eq(&tree.dump());
    }
}

#[test]
fn products_bind_tighter_than_sums() {
    let tree = parse(languages::arithmetic(), "1+2*3");
    expect!["(program (sum (number) (product (number) (number))))"].assert_eq(&tree.to_sexp());
}

#[test]
fn sums_associate_to_the_left() {
    let tree = parse(languages::arithmetic(), "1+2+3");
    expect!["(program (sum (sum (number) (number)) (number)))"].assert_eq(&tree.to_sexp());
}

#[test]
fn incomplete_input_gets_a_missing_token() {
    let tree = parse(languages::arithmetic(), "1+");
    expect!["(program (sum (number) (MISSING number)))"].assert_eq(&tree.to_sexp());
    assert!(tree.has_error());
    assert_eq!(u32::from(tree.len().bytes), 2);

    let sum = find(&tree, "sum", 0);
    assert!(sum.has_error());
    assert_eq!(u32::from(sum.byte_range().end()), 2);
    assert!(!find(&tree, "number", 0).has_error());
}

#[test]
fn unexpected_token_is_wrapped_in_an_error() {
    let tree = parse(languages::arithmetic(), "1)");
    expect![[r#"
        program@0..2
          number@0..1
          ERROR@1..2 extra
            ")"@1..2
    "#]]
    .assert_eq(&tree.dump());
}

#[test]
fn ambiguous_input_keeps_both_parses() {
    let tree = parse(languages::ambiguous(), "1+2+3");
    assert!(!tree.has_error());

    let ambiguities: Vec<Node<'_>> = tree
        .root_node()
        .preorder()
        .filter_map(|event| match event {
            WalkEvent::Enter(node) if node.is_ambiguous() => Some(node),
            _ => None,
        })
        .collect();
    assert_eq!(ambiguities.len(), 1, "{}", tree.dump());
    assert_eq!(ambiguities[0].kind(), "AMBIGUITY");
    assert_eq!(ambiguities[0].children().count(), 2);

    let sexp = tree.to_sexp();
    assert!(sexp.contains("(sum (sum (number) (number)) (number))"), "{sexp}");
    assert!(sexp.contains("(sum (number) (sum (number) (number)))"), "{sexp}");
}

#[test]
fn errors_stay_inside_their_statement() {
    let tree = parse(languages::statements(), "let x = 1;\nlet y = = 2;\nx + y;\n");
    assert!(tree.has_error());
    assert!(!find(&tree, "let_statement", 0).has_error(), "{}", tree.dump());
    assert!(find(&tree, "let_statement", 11).has_error(), "{}", tree.dump());
    assert!(!find(&tree, "expression_statement", 24).has_error(), "{}", tree.dump());
}

#[test]
fn deep_trees_parse_and_drop() {
    let text = format!("1{}", "+1".repeat(20_000));
    let tree = parse(languages::arithmetic(), &text);
    assert!(!tree.has_error());
    assert_eq!(u32::from(tree.len().bytes) as usize, text.len());
    drop(tree);
}

#[test]
fn reparse_reuses_untouched_subtrees() {
    let language = languages::arithmetic();
    let parser = Parser::new(language);
    let old_text = "1+2*3";
    let old = parser.parse(old_text, None).unwrap();

    let edit = InputEdit::splice(old_text, 2..3, "20");
    let new_text = "1+20*3";
    let reparse = parser.reparse(&old, &[edit], new_text).unwrap();
    let fresh = parser.parse(new_text, None).unwrap();

    assert_eq!(reparse.tree.dump(), fresh.dump());
    assert_eq!(find(&reparse.tree, "number", 0).id(), find(&old, "number", 0).id());
    assert_eq!(find(&reparse.tree, "+", 1).id(), find(&old, "+", 1).id());
    assert_ne!(find(&reparse.tree, "product", 2).id(), find(&old, "product", 2).id());

    let two = TextSize::new(2);
    assert!(
        reparse.changed_ranges.iter().any(|range| range.start() <= two && two < range.end()),
        "{:?}",
        reparse.changed_ranges
    );
}

#[test]
fn reparse_through_external_tokens() {
    let parser = Parser::new(languages::fenced());
    let old_text = "`` 1 ``\n` 3 `\n";
    let old = parser.parse(old_text, None).unwrap();
    assert!(!old.has_error(), "{}", old.dump());

    let edit = InputEdit::insert(old_text, 4, "2");
    let new_text = "`` 12 ``\n` 3 `\n";
    let reparse = parser.reparse(&old, &[edit], new_text).unwrap();
    let fresh = parser.parse(new_text, None).unwrap();

    assert!(!fresh.has_error(), "{}", fresh.dump());
    assert_eq!(reparse.tree.dump(), fresh.dump());
}

#[test]
fn reparse_after_deleting_a_statement() {
    let parser = Parser::new(languages::statements());
    let old_text = "let x = 1;\nlet y = 2; # two\nx + y;\n";
    let old = parser.parse(old_text, None).unwrap();

    let edit = InputEdit::delete(old_text, 11..28);
    let new_text = "let x = 1;\nx + y;\n";
    let reparse = parser.reparse(&old, &[edit], new_text).unwrap();
    let fresh = parser.parse(new_text, None).unwrap();

    assert!(!fresh.has_error());
    assert_eq!(reparse.tree.dump(), fresh.dump());
}

#[test]
fn sources_in_other_encodings_parse_alike() {
    let language = languages::arithmetic();
    let parser = Parser::new(language);
    let text = "(1 + 2) * 3\n";
    let expected = parser.parse(text, None).unwrap();

    let latin1 = parser.parse(&Latin1Source::new(text.as_bytes()), None).unwrap();
    assert_eq!(latin1.dump(), expected.dump());

    for chunk_len in [1, 2, 5] {
        let chunked = parser.parse(&ChunkedSource::from_str_chunks(text, chunk_len), None).unwrap();
        assert_eq!(chunked.dump(), expected.dump(), "chunks of {chunk_len}");
    }

    let utf16 = parser.parse(&Utf16Source::new(text), None).unwrap();
    assert_eq!(utf16.to_sexp(), expected.to_sexp());
    assert_eq!(u32::from(utf16.len().bytes), 2 * text.len() as u32);
    assert_eq!(utf16.len().extent, expected.len().extent);
}

#[test]
fn exhausted_budget_returns_a_partial_tree() {
    let budget = ParseBudget::unlimited().with_max_operations(1);
    let config = ParserConfig::default().with_budget(budget);
    let parser = Parser::new(languages::arithmetic()).with_config(config);

    let error = parser.parse("1+2", None).unwrap_err();
    expect!["parse budget exhausted at byte 1"].assert_eq(&error.to_string());

    let partial = error.into_partial().unwrap();
    assert_eq!(u32::from(partial.len().bytes), 3);
    let root = partial.root();
    assert_eq!(root.symbol(), partial.language().start_symbol().unwrap());
    let last = root.children().last().unwrap();
    assert_eq!(last.symbol(), Symbol::UNPARSED);
    assert_eq!(u32::from(last.total().bytes), 2);
}

#[test]
fn old_tree_must_come_from_the_same_language() {
    let old = parse(languages::arithmetic(), "1");
    let error = Parser::new(languages::statements()).parse("1;", Some(&old)).unwrap_err();
    let ParseError::LanguageMismatch { expected, found } = error else {
        panic!("expected a language mismatch");
    };
    assert_eq!(expected, "statements");
    assert_eq!(found, "arithmetic");
}

#[test]
fn empty_program() {
    let tree = parse(languages::statements(), "  # nothing\n");
    assert!(!tree.has_error(), "{}", tree.dump());
    expect![[r#"
        program@2..12
          comment@2..11 extra
    "#]]
    .assert_eq(&tree.dump());
}
