//! Reparsing an edited tree must give the same tree as parsing the new text
//! from scratch.

use proptest::prelude::*;
use sapling_fixtures::languages;
use sapling_input::InputEdit;
use sapling_language::Language;
use sapling_parse::Parser;

/// Tokens of a valid arithmetic expression: numbers at even indices,
/// operators at odd ones, each possibly followed by a space.
fn expression() -> impl Strategy<Value = Vec<String>> {
    let number = (0u32..1000, any::<bool>())
        .prop_map(|(n, space)| format!("{n}{}", if space { " " } else { "" }));
    let operator = (prop::sample::select(vec!["+", "*"]), any::<bool>())
        .prop_map(|(op, space)| format!("{op}{}", if space { " " } else { "" }));
    (number.clone(), prop::collection::vec((operator, number), 0..8)).prop_map(|(first, rest)| {
        let mut tokens = vec![first];
        for (operator, number) in rest {
            tokens.push(operator);
            tokens.push(number);
        }
        tokens
    })
}

#[derive(Clone, Debug)]
enum Edit {
    /// Replace the token at `index` with another of the same kind.
    Replace { index: prop::sample::Index, number: u32, multiply: bool },
    /// Remove an operator and the number after it.
    DropTail { index: prop::sample::Index },
    /// Put another operator and number after the token at `index`.
    Extend { index: prop::sample::Index, number: u32, multiply: bool },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<prop::sample::Index>(), 0u32..1000, any::<bool>())
            .prop_map(|(index, number, multiply)| Edit::Replace { index, number, multiply }),
        any::<prop::sample::Index>().prop_map(|index| Edit::DropTail { index }),
        (any::<prop::sample::Index>(), 0u32..1000, any::<bool>())
            .prop_map(|(index, number, multiply)| Edit::Extend { index, number, multiply }),
    ]
}

fn offset_of(tokens: &[String], index: usize) -> usize {
    tokens[..index].iter().map(String::len).sum()
}

/// Applies `edit` to `tokens`; returns the byte range replaced in the old
/// text and the replacement.
fn apply(tokens: &mut Vec<String>, edit: &Edit) -> (std::ops::Range<usize>, String) {
    match *edit {
        Edit::Replace { index, number, multiply } => {
            let index = index.index(tokens.len());
            let replacement = if index % 2 == 0 {
                number.to_string()
            } else if multiply {
                "*".to_owned()
            } else {
                "+".to_owned()
            };
            let start = offset_of(tokens, index);
            let range = start..start + tokens[index].len();
            tokens[index] = replacement.clone();
            (range, replacement)
        }
        Edit::DropTail { index } => {
            if tokens.len() < 3 {
                return (0..0, String::new());
            }
            let pairs = (tokens.len() - 1) / 2;
            let operator = 1 + 2 * index.index(pairs);
            let start = offset_of(tokens, operator);
            let end = offset_of(tokens, operator + 2);
            tokens.drain(operator..operator + 2);
            (start..end, String::new())
        }
        Edit::Extend { index, number, multiply } => {
            let numbers = tokens.len().div_ceil(2);
            let after = 2 * index.index(numbers) + 1;
            let operator = if multiply { "*" } else { "+" };
            let start = offset_of(tokens, after);
            tokens.insert(after, operator.to_owned());
            tokens.insert(after + 1, number.to_string());
            (start..start, format!("{operator}{number}"))
        }
    }
}

proptest! {
    #[test]
    fn reparse_matches_fresh_parse(
        mut tokens in expression(),
        edits in prop::collection::vec(edit(), 1..4),
    ) {
        let parser = Parser::new(languages::arithmetic());
        let mut text = tokens.concat();
        let mut tree = parser.parse(text.as_str(), None).unwrap();
        prop_assert!(!tree.has_error(), "{text:?}\n{}", tree.dump());

        for edit in &edits {
            let (range, replacement) = apply(&mut tokens, edit);
            let input_edit = InputEdit::splice(&text, range.clone(), &replacement);
            text.replace_range(range, &replacement);
            prop_assert_eq!(&text, &tokens.concat());

            let reparse = parser.reparse(&tree, &[input_edit], text.as_str()).unwrap();
            let fresh = parser.parse(text.as_str(), None).unwrap();
            prop_assert_eq!(reparse.tree.dump(), fresh.dump(), "{:?}", text);
            prop_assert_eq!(u32::from(reparse.tree.len().bytes) as usize, text.len());
            tree = reparse.tree;
        }
    }

    #[test]
    fn unedited_reparse_reuses_everything(tokens in expression()) {
        let parser = Parser::new(languages::arithmetic());
        let text = tokens.concat();
        let tree = parser.parse(text.as_str(), None).unwrap();

        let reparse = parser.reparse(&tree, &[], text.as_str()).unwrap();
        prop_assert_eq!(reparse.tree.dump(), tree.dump());
        prop_assert!(reparse.changed_ranges.is_empty(), "{:?}", reparse.changed_ranges);
    }
}

/// Splices `replacement` over up to `removed` bytes at `at`, reparses, and
/// checks the result against a fresh parse of the new text.
fn check_splice(
    language: Language,
    text: &str,
    at: prop::sample::Index,
    removed: usize,
    replacement: &str,
) {
    let parser = Parser::new(language);
    let old = parser.parse(text, None).unwrap();

    let start = at.index(text.len() + 1);
    let range = start..(start + removed).min(text.len());
    let edit = InputEdit::splice(text, range.clone(), replacement);
    let mut new_text = text.to_owned();
    new_text.replace_range(range, replacement);

    let reparse = parser.reparse(&old, &[edit], new_text.as_str()).unwrap();
    let fresh = parser.parse(new_text.as_str(), None).unwrap();
    assert_eq!(reparse.tree.dump(), fresh.dump(), "{text:?} -> {new_text:?}");
    assert_eq!(u32::from(reparse.tree.len().bytes) as usize, new_text.len());
}

proptest! {
    #[test]
    fn reparse_of_malformed_statements_matches_fresh_parse(
        text in "[0-9+*() ]{0,14}",
        at in any::<prop::sample::Index>(),
        removed in 0usize..4,
        replacement in "[0-9+*() ]{0,4}",
    ) {
        check_splice(languages::statements(), &text, at, removed, &replacement);
    }

    #[test]
    fn reparse_of_malformed_fences_matches_fresh_parse(
        text in "[0-9+*() ]{0,14}",
        at in any::<prop::sample::Index>(),
        removed in 0usize..4,
        replacement in "[0-9+*() ]{0,4}",
    ) {
        check_splice(languages::fenced(), &text, at, removed, &replacement);
    }
}
