use pretty_assertions::assert_eq;

use crate::bnf::compile_rule;
use crate::{ErrorInfo, NodeKind, Span};

#[test]
fn sequence() {
    let tree = compile_rule("'if' '(' Expr ')'").unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Sequence);
    assert_eq!(root.span(), Span(0..17));

    let branches: Vec<_> = root.branches().collect();

    assert_eq!(
        branches.iter().map(|b| b.kind()).collect::<Vec<_>>(),
        vec![
            NodeKind::Token,
            NodeKind::Token,
            NodeKind::Identifier,
            NodeKind::Token
        ]
    );

    assert_eq!(branches[0].literal(), Some("if"));
    assert_eq!(branches[0].span(), Span(0..4));
    assert_eq!(branches[0].as_str(), "'if'");
    assert_eq!(branches[2].name(), Some("Expr"));
    assert_eq!(branches[2].literal(), None);
    assert_eq!(branches[3].literal(), Some(")"));
}

#[test]
fn choice_is_flattened() {
    let tree = compile_rule("a | b | c").unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Choice);
    assert_eq!(root.span(), Span(0..9));
    assert_eq!(
        root.branches().map(|b| (b.name(), b.span())).collect::<Vec<_>>(),
        vec![
            (Some("a"), Span(0..1)),
            (Some("b"), Span(4..5)),
            (Some("c"), Span(8..9)),
        ]
    );
}

#[test]
fn choice_has_lower_precedence() {
    let tree = compile_rule("a b | c").unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Choice);

    let first = root.branch(0).unwrap();
    assert_eq!(first.kind(), NodeKind::Sequence);
    assert_eq!(first.as_str(), "a b");
    assert_eq!(root.branch(1).unwrap().name(), Some("c"));
    assert!(root.branch(2).is_none());
}

#[test]
fn groups() {
    let tree = compile_rule("( a  b )").unwrap();
    let root = tree.root();

    // The group doesn't produce a node of its own, but the span of the
    // grouped expression includes the brackets.
    assert_eq!(root.kind(), NodeKind::Sequence);
    assert_eq!(root.span(), Span(0..8));
    assert_eq!(
        root.branches().map(|b| b.span()).collect::<Vec<_>>(),
        vec![Span(2..3), Span(5..6)]
    );
}

#[test]
fn optional_and_repetition() {
    let tree = compile_rule("[ 'x' ] { y }").unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Sequence);

    let optional = root.branch(0).unwrap();
    assert_eq!(optional.kind(), NodeKind::Optional);
    assert_eq!(optional.span(), Span(0..7));
    assert_eq!(optional.branch(0).unwrap().literal(), Some("x"));
    assert_eq!(optional.branch(0).unwrap().span(), Span(2..5));

    let repetition = root.branch(1).unwrap();
    assert_eq!(repetition.kind(), NodeKind::Repetition);
    assert_eq!(repetition.span(), Span(8..13));
    assert_eq!(repetition.branch(0).unwrap().name(), Some("y"));
}

#[test]
fn mixed_whitespace() {
    let tree = compile_rule("a\t|\n  b\n c").unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Choice);
    assert_eq!(root.branch(0).unwrap().name(), Some("a"));

    let seq = root.branch(1).unwrap();
    assert_eq!(seq.kind(), NodeKind::Sequence);
    assert_eq!(seq.span(), Span(6..10));
    assert_eq!(
        seq.branches().map(|b| b.name()).collect::<Vec<_>>(),
        vec![Some("b"), Some("c")]
    );
}

#[test]
fn whitespace_before_closing_brackets() {
    let tree = compile_rule("[a ] {b\t} (c\n)").unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Sequence);
    assert_eq!(
        root.branches().map(|b| b.kind()).collect::<Vec<_>>(),
        vec![NodeKind::Optional, NodeKind::Repetition, NodeKind::Identifier]
    );
}

#[test]
fn reserved_words() {
    let tree = compile_rule("TOKEN IDENTIFIER NEW_LINE Other").unwrap();

    assert_eq!(
        tree.root().branches().map(|b| b.kind()).collect::<Vec<_>>(),
        vec![
            NodeKind::TokenKeyword,
            NodeKind::IdentifierKeyword,
            NodeKind::NewlineKeyword,
            NodeKind::Identifier,
        ]
    );
}

#[test]
fn escaped_literals() {
    let tree = compile_rule(r"'\'' '\\' '|' ' '").unwrap();

    assert_eq!(
        tree.root().branches().map(|b| b.literal()).collect::<Vec<_>>(),
        vec![Some("'"), Some("\\"), Some("|"), Some(" ")]
    );
}

#[test]
fn brackets_inside_literals() {
    let tree = compile_rule("'(' [ ']' ] '{'").unwrap();
    let root = tree.root();

    assert_eq!(root.branches().len(), 3);
    assert_eq!(root.branch(1).unwrap().kind(), NodeKind::Optional);
}

#[test]
fn idempotence() {
    let text = "'class' IDENTIFIER [ 'extends' Type ] '{' { Member } '}' | ';'";
    assert_eq!(compile_rule(text).unwrap(), compile_rule(text).unwrap());
}

#[test]
fn errors() {
    let tests = vec![
        (line!(), "", "expecting an expression", Span(0..0)),
        (line!(), "(a", "unclosed `(`", Span(0..1)),
        (line!(), "a)", "unmatched `)`", Span(1..2)),
        (line!(), "(a]", "`]` doesn't match `(`", Span(2..3)),
        (line!(), "'abc", "unterminated literal", Span(0..4)),
        (line!(), "a |", "expecting an expression", Span(3..3)),
        (line!(), "| a", "expecting an expression before `|`", Span(0..1)),
        (line!(), "a-b", "unexpected `-` in rule name `a-b`", Span(1..2)),
        (line!(), "'a'b", "unexpected text after literal", Span(3..4)),
        (line!(), "(a)b", "unexpected text after closing bracket", Span(3..4)),
        (line!(), "()", "expecting an expression", Span(1..1)),
    ];

    for (line, text, expected_msg, expected_span) in tests {
        let err = compile_rule(text).expect_err(&format!("line {}", line));
        assert_eq!(err.code(), "E001", "line {}", line);
        match err.info() {
            ErrorInfo::InvalidBnf { error_msg, error_span, .. } => {
                assert_eq!(error_msg, expected_msg, "line {}", line);
                assert_eq!(error_span, &expected_span, "line {}", line);
            }
            _ => panic!("line {}: unexpected error {:?}", line, err),
        }
    }
}

#[test]
fn error_report() {
    let err = compile_rule("a (b").unwrap_err();

    assert_eq!(
        err.to_string(),
        r#"error[E001]: invalid BNF expression
 --> line:1:3
  |
1 | a (b
  |   ^ unclosed `(`
  |"#
    );
}
