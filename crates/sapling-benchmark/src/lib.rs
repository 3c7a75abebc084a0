//! Inputs shared by the benches.

/// A long arithmetic expression mixing both operators and parentheses.
pub fn arithmetic_source(terms: usize) -> String {
    let mut source = String::new();
    for i in 0..terms {
        if i > 0 {
            source.push_str(if i % 3 == 0 { " * " } else { " + " });
        }
        if i % 7 == 0 {
            source.push_str(&format!("({i} + {})", i + 1));
        } else {
            source.push_str(&i.to_string());
        }
    }
    source.push('\n');
    source
}

/// A program of `count` statements with comments sprinkled in.
pub fn statements_source(count: usize) -> String {
    let mut source = String::new();
    for i in 0..count {
        source.push_str(&format!("let x{i} = {i} * 2 + 1;"));
        if i % 4 == 0 {
            source.push_str(" # note");
        }
        source.push('\n');
    }
    source
}
