use radiation::parser::{self, NodeEdit, Span};

// --- parse ---

#[test]
fn parses_valid_module() {
    let source = "def add(a, b):\n    return a + b\n";
    let tree = parser::parse(source).unwrap();
    assert_eq!(tree.root().kind(), "module");
    assert_eq!(tree.root().text(), source);
}

#[test]
fn rejects_source_with_syntax_error() {
    let err = parser::parse("def broken(:\n    return 1\n").err().unwrap();
    assert!(err.starts_with("syntax error at line 1"), "got {}", err);
}

#[test]
fn empty_source_parses() {
    let tree = parser::parse("").unwrap();
    assert_eq!(tree.root().preorder().count(), 1);
}

// --- nodes ---

#[test]
fn preorder_visits_parent_before_children_left_to_right() {
    let tree = parser::parse("x = a + b\n").unwrap();
    let kinds: Vec<&str> = tree.root().preorder().map(|n| n.kind()).collect();
    let assign = kinds.iter().position(|k| *k == "assignment").unwrap();
    let binary = kinds.iter().position(|k| *k == "binary_operator").unwrap();
    assert!(assign < binary);
    let texts: Vec<&str> = tree
        .root()
        .preorder()
        .filter(|n| n.kind() == "identifier")
        .map(|n| n.text())
        .collect();
    assert_eq!(texts, vec!["x", "a", "b"]);
}

#[test]
fn node_positions_are_one_indexed() {
    let source = "\ndef check(x):\n    return x > 0\n";
    let tree = parser::parse(source).unwrap();
    let cmp = tree
        .root()
        .preorder()
        .find(|n| n.kind() == "comparison_operator")
        .unwrap();
    assert_eq!(cmp.line(), 3);
    assert_eq!(cmp.column(), 12);
    assert_eq!(cmp.text(), "x > 0");
}

#[test]
fn operator_field_exposes_token() {
    let tree = parser::parse("a // b\n").unwrap();
    let binary = tree
        .root()
        .preorder()
        .find(|n| n.kind() == "binary_operator")
        .unwrap();
    let op = binary.field("operator").unwrap();
    assert_eq!(op.text(), "//");
    assert_eq!(op.span(), Span { start_byte: 2, end_byte: 4 });
    assert!(binary.contains(op.span()));
}

#[test]
fn text_with_applies_edit_relative_to_node() {
    let source = "y = 1\nx = a + b\n";
    let tree = parser::parse(source).unwrap();
    let binary = tree
        .root()
        .preorder()
        .find(|n| n.kind() == "binary_operator")
        .unwrap();
    let op = binary.field("operator").unwrap();
    let edit = NodeEdit {
        span: op.span(),
        replacement: "-".into(),
    };
    assert_eq!(binary.text_with(&edit), "a - b");
}

// --- unparse ---

#[test]
fn splice_replaces_at_offset() {
    let span = Span { start_byte: 5, end_byte: 6 };
    assert_eq!(parser::splice("if x > 0:", span, ">="), "if x >= 0:");
    let start = Span { start_byte: 0, end_byte: 1 };
    assert_eq!(parser::splice("> 0", start, ">="), ">= 0");
}

#[test]
fn unparse_keeps_untouched_bytes() {
    let source = "# header\nx = a + b   # trailing\n\n\ny = 'unchanged'\n";
    let at = source.find('+').unwrap();
    let edit = NodeEdit {
        span: Span { start_byte: at, end_byte: at + 1 },
        replacement: "-".into(),
    };
    let mutated = parser::unparse_with(source, &edit).unwrap();
    assert_eq!(mutated, source.replacen('+', "-", 1));
}

#[test]
fn unparse_rejects_invalid_result() {
    let source = "x = a + b\n";
    let at = source.find('+').unwrap();
    let edit = NodeEdit {
        span: Span { start_byte: at, end_byte: at + 1 },
        replacement: ")".into(),
    };
    assert!(parser::unparse_with(source, &edit).is_err());
}

#[test]
fn unparse_rejects_out_of_range_span() {
    let edit = NodeEdit {
        span: Span { start_byte: 3, end_byte: 40 },
        replacement: "-".into(),
    };
    let err = parser::unparse_with("x = 1\n", &edit).unwrap_err();
    assert!(err.contains("outside the source"));
}
