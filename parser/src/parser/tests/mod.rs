use std::fs;
use std::io::BufWriter;
use std::io::Write;

use pretty_assertions::assert_eq;
use rayon::prelude::*;

use crate::hooks::{
    CommentSkipper, ExtensionHook, KeywordSet, LiteralKind, Literals,
};
use crate::parser::DEFAULT_MAX_DEPTH;
use crate::{ErrorInfo, Grammar, NodeKind, Parser, Position, SourceCode, Span};

fn texts(tree: &crate::ParseTree, id: crate::NodeId) -> Vec<String> {
    tree.children(id).map(|child| tree.node(child).as_str().to_owned()).collect()
}

#[test]
fn greeting() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();
    let tree = grammar.parse("Greeting", "hello world").unwrap();
    let root = tree.node(tree.root());

    assert_eq!(root.kind(), NodeKind::Sequence);
    assert_eq!(root.span(), Span(0..11));
    assert_eq!(root.definition_name(), "Greeting");
    assert_eq!(texts(&tree, tree.root()), vec!["hello", "world"]);
    assert_eq!(
        tree.children(tree.root())
            .map(|child| tree.node(child).kind())
            .collect::<Vec<_>>(),
        vec![NodeKind::Token, NodeKind::Identifier]
    );
}

#[test]
fn greeting_syntax_error() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();
    let err = grammar.parse("Greeting", "hello 123").unwrap_err();

    assert_eq!(err.code(), "E004");
    assert!(err.is_parse_error());

    match err.info() {
        ErrorInfo::SyntaxError {
            error_msg,
            error_span,
            recognized_up_to,
            farthest,
            ..
        } => {
            assert_eq!(error_span, &Span(6..6));
            assert_eq!(error_msg, "identifier expected at line 1, column 7");
            assert_eq!(recognized_up_to, &Position { line: 1, column: 7 });
            assert_eq!(farthest, &Position { line: 1, column: 6 });
        }
        info => panic!("unexpected error: {:?}", info),
    }
}

#[test]
fn origin_in_report() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();
    let err = grammar
        .parse(
            "Greeting",
            SourceCode::from("\nhello 123").with_origin("greeting.txt"),
        )
        .unwrap_err();

    assert!(err.to_string().contains("--> greeting.txt:2:"));
}

#[test]
fn trailing_input() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();

    // Whitespace at the end is fine.
    assert!(grammar.parse("Greeting", "hello world \n").is_ok());

    let err = grammar.parse("Greeting", "hello world !").unwrap_err();

    match err.info() {
        ErrorInfo::SyntaxError { error_msg, error_span, recognized_up_to, .. } => {
            assert_eq!(error_span, &Span(12..13));
            assert_eq!(
                error_msg,
                "unexpected input after the end of `Greeting` at line 1, column 13"
            );
            assert_eq!(recognized_up_to, &Position { line: 1, column: 12 });
        }
        info => panic!("unexpected error: {:?}", info),
    }
}

#[test]
fn left_recursion() {
    let grammar: Grammar = "A: A 'x'".parse().unwrap();
    let err = grammar.parse("A", "xx").unwrap_err();

    assert_eq!(err.code(), "E005");

    match err.info() {
        ErrorInfo::InfiniteRecursion { rule, error_span, .. } => {
            assert_eq!(rule, "A");
            assert_eq!(error_span, &Span(0..0));
        }
        info => panic!("unexpected error: {:?}", info),
    }
}

#[test]
fn left_recursion_in_choice() {
    // The recursive alternative fails, the other one can still match.
    let grammar: Grammar = "A: A 'x' | 'y'".parse().unwrap();
    let tree = grammar.parse("A", "y").unwrap();
    let root = tree.node(tree.root());

    assert_eq!(root.kind(), NodeKind::Choice);
    assert_eq!(root.branches().len(), 2);
    assert!(root.branches()[0].is_none());
    assert_eq!(tree.to_string(), "y");
}

#[test]
fn choice_is_ordered() {
    let grammar: Grammar = "A: 'x' | 'xy'".parse().unwrap();
    let err = grammar.parse("A", "xy").unwrap_err();

    match err.info() {
        ErrorInfo::SyntaxError { error_span, .. } => {
            assert_eq!(error_span, &Span(1..2));
        }
        info => panic!("unexpected error: {:?}", info),
    }

    let grammar: Grammar = "A: 'xy' | 'x'".parse().unwrap();
    let tree = grammar.parse("A", "xy").unwrap();

    assert_eq!(tree.node(tree.root()).span(), Span(0..2));
    assert_eq!(tree.node(tree.root()).branches()[1], None);
}

#[test]
fn choice_messages() {
    let grammar: Grammar = "A: 'x' | 'y' | 'x'".parse().unwrap();
    let err = grammar.parse("A", "z").unwrap_err();

    match err.info() {
        ErrorInfo::SyntaxError { error_msg, .. } => {
            assert_eq!(
                error_msg,
                "`x` expected at line 1, column 1\n\
                 `y` expected at line 1, column 1\n\
                 `x` expected at line 1, column 1"
            );
        }
        info => panic!("unexpected error: {:?}", info),
    }
}

#[test]
fn many_alternatives() {
    let alternatives: Vec<String> =
        (0..40).map(|i| format!("'k{}'", i)).collect();
    let grammar: Grammar =
        format!("A: {}", alternatives.join(" | ")).parse().unwrap();

    let err = grammar.parse("A", "z").unwrap_err();

    match err.info() {
        ErrorInfo::SyntaxError { error_msg, .. } => {
            // Every alternative is listed in the error message.
            assert_eq!(error_msg.lines().count(), 40);
            assert_eq!(
                error_msg.lines().last(),
                Some("`k39` expected at line 1, column 1")
            );
        }
        info => panic!("unexpected error: {:?}", info),
    }

    // The report lists the first 16 and summarizes the rest.
    let report = err.to_string();
    assert!(report.contains("`k15` expected"));
    assert!(!report.contains("`k16` expected"));
    assert!(report.contains("... and 24 more"));
}

#[test]
fn empty_matches() {
    let grammar: Grammar = "A: 'a' {'b'} ['c']".parse().unwrap();
    let tree = grammar.parse("A", "a").unwrap();
    let children: Vec<_> = tree.children(tree.root()).collect();

    assert_eq!(children.len(), 3);

    let repetition = tree.node(children[1]);
    assert_eq!(repetition.kind(), NodeKind::Repetition);
    assert_eq!(repetition.span(), Span(1..1));
    assert!(repetition.branches().is_empty());

    let optional = tree.node(children[2]);
    assert_eq!(optional.kind(), NodeKind::Optional);
    assert_eq!(optional.span(), Span(1..1));
    assert!(optional.branches().is_empty());

    assert_eq!(tree.node(tree.root()).span(), Span(0..1));
}

#[test]
fn repetition_and_optional() {
    let grammar: Grammar = "A: 'a' {'b'} ['c']".parse().unwrap();
    let tree = grammar.parse("A", "a b b  c").unwrap();
    let children: Vec<_> = tree.children(tree.root()).collect();

    assert_eq!(texts(&tree, children[1]), vec!["b", "b"]);
    assert_eq!(tree.node(children[1]).span(), Span(2..5));
    assert_eq!(texts(&tree, children[2]), vec!["c"]);
    assert_eq!(tree.node(children[2]).span(), Span(7..8));
}

#[test]
fn repetition_of_empty_match() {
    // The repeated item can match the empty string, the repetition must
    // stop instead of looping forever.
    let grammar: Grammar = "A: { ['x'] } 'y'".parse().unwrap();
    let tree = grammar.parse("A", "x x y").unwrap();

    assert_eq!(tree.to_string(), "x x y");

    let repetition = tree.children(tree.root()).next().unwrap();
    assert_eq!(tree.node(repetition).branches().len(), 2);
}

#[test]
fn empty_literal() {
    let grammar: Grammar = "A: 'a' ( 'b' | '' ) 'c'".parse().unwrap();

    assert!(grammar.parse("A", "a b c").is_ok());
    assert!(grammar.parse("A", "a c").is_ok());
    assert!(grammar.parse("A", "a d c").is_err());
}

#[test]
fn literal_in_longer_word() {
    let grammar: Grammar = "A: 'for' IDENTIFIER | IDENTIFIER".parse().unwrap();

    let tree = grammar.parse("A", "format").unwrap();
    let root = tree.node(tree.root());
    assert!(root.branches()[0].is_none());
    assert_eq!(tree.node(root.branches()[1].unwrap()).as_str(), "format");

    let tree = grammar.parse("A", "for x").unwrap();
    assert!(tree.node(tree.root()).branches()[1].is_none());
}

#[test]
fn keywords() {
    let grammar: Grammar = "Stmt: 'return' IDENTIFIER ';' | IDENTIFIER ';'"
        .parse()
        .unwrap();

    let keywords = KeywordSet::from_grammar(&grammar);
    assert!(keywords.contains("return"));
    assert_eq!(keywords.len(), 1);

    let mut parser = Parser::new();
    parser.keywords(&keywords);

    let tree = parser.parse(&grammar, "Stmt", "return x;").unwrap();
    assert_eq!(tree.node(tree.root()).branches()[1], None);

    // Not a keyword, but an identifier that starts with one.
    let tree = parser.parse(&grammar, "Stmt", "return1;").unwrap();
    assert_eq!(tree.node(tree.root()).branches()[0], None);

    let tree = parser.parse(&grammar, "Stmt", "returnx;").unwrap();
    assert_eq!(tree.node(tree.root()).branches()[0], None);

    // Keywords can't be used as identifiers.
    assert_eq!(
        parser.parse(&grammar, "Stmt", "return;").unwrap_err().code(),
        "E004"
    );

    // Without the keyword hook `return` is a valid identifier.
    assert!(grammar.parse("Stmt", "return;").is_ok());
}

#[test]
fn extension_closure() {
    let grammar: Grammar = "Sum: Number '+' Number\nNumber:".parse().unwrap();

    let digits = |_: &str, text: &str, begin: usize, end: usize| {
        let len = text[begin..end].bytes().take_while(u8::is_ascii_digit).count();
        (len > 0).then_some(begin + len)
    };

    let tree = Parser::new().extension(&digits).parse(&grammar, "Sum", "1 + 23").unwrap();

    assert_eq!(texts(&tree, tree.root()), vec!["1", "+", "23"]);
    assert_eq!(
        tree.children(tree.root())
            .map(|child| tree.node(child).kind())
            .collect::<Vec<_>>(),
        vec![NodeKind::Token, NodeKind::Token, NodeKind::Token]
    );

    // Results beyond the end of the input are ignored.
    let greedy = |_: &str, _: &str, _: usize, end: usize| Some(end + 5);

    assert!(Parser::new().extension(&greedy).parse(&grammar, "Sum", "1 + 2").is_err());

    // Without hook extension points never match.
    assert_eq!(grammar.parse("Sum", "1 + 2").unwrap_err().code(), "E004");
}

#[test]
fn literals() {
    let literals = Literals::c_family();

    let tests = vec![
        (line!(), "IntegerLiteral", "42", Some(2)),
        (line!(), "IntegerLiteral", "42L;", Some(3)),
        (line!(), "IntegerLiteral", "-7", Some(2)),
        (line!(), "IntegerLiteral", "0x1F)", Some(4)),
        (line!(), "IntegerLiteral", "0xg", None),
        (line!(), "IntegerLiteral", "12abc", None),
        (line!(), "IntegerLiteral", "x", None),
        (line!(), "FloatingPointLiteral", "1.5", Some(3)),
        (line!(), "FloatingPointLiteral", "1.", Some(2)),
        (line!(), "FloatingPointLiteral", ".5e-3", Some(5)),
        (line!(), "FloatingPointLiteral", "2f", Some(2)),
        (line!(), "FloatingPointLiteral", "1e", None),
        (line!(), "StringLiteral", r#""a\"b" rest"#, Some(6)),
        (line!(), "StringLiteral", "\"abc", None),
        (line!(), "StringLiteral", "\"a\nb\"", None),
        (line!(), "CharacterLiteral", r"'\''", Some(4)),
        (line!(), "CharacterLiteral", "'a'", Some(3)),
        (line!(), "Unknown", "'a'", None),
    ];

    for (line, rule, text, expected) in tests {
        assert_eq!(
            literals.extend(rule, text, 0, text.len()),
            expected,
            "test at line {}",
            line
        );
    }

    let literals =
        Literals::new().with("Number", LiteralKind::Integer);

    assert_eq!(literals.extend("Number", "123", 0, 2), Some(2));
    assert_eq!(literals.extend("IntegerLiteral", "123", 0, 3), None);
}

#[test]
fn literals_as_extension() {
    let grammar = Grammar::load([
        "Call: IDENTIFIER '(' [ Args ] ')'",
        "Args: Value { ',' Value }",
        "Value: IntegerLiteral | StringLiteral",
        "IntegerLiteral:",
        "StringLiteral:",
    ])
    .unwrap();

    let literals = Literals::c_family();
    let mut parser = Parser::new();
    parser.extension(&literals);

    let tree = parser.parse(&grammar, "Call", r#"f(1, 0x1F, "a,b")"#).unwrap();
    assert_eq!(tree.to_string(), r#"f(1, 0x1F, "a,b")"#);

    assert!(parser.parse(&grammar, "Call", "f()").is_ok());
    assert!(parser.parse(&grammar, "Call", "f(12abc)").is_err());
}

#[test]
fn comments() {
    let grammar: Grammar = "Pair: IDENTIFIER IDENTIFIER".parse().unwrap();
    let skipper = CommentSkipper::new();

    let mut parser = Parser::new();
    parser.whitespace(&skipper);

    let tree = parser.parse(&grammar, "Pair", "/* a */ a /* b */ c // d").unwrap();

    assert_eq!(tree.to_string(), "a /* b */ c");
    assert_eq!(texts(&tree, tree.root()), vec!["a", "c"]);

    // Unterminated block comments extend up to the end.
    assert!(parser.parse(&grammar, "Pair", "a /* b c").is_err());

    // Comments are not whitespace by default.
    assert!(grammar.parse("Pair", "a /* b */ c").is_err());
}

#[test]
fn new_line() {
    let grammar: Grammar = "Lines: IDENTIFIER NEW_LINE IDENTIFIER".parse().unwrap();
    let tree = grammar.parse("Lines", "a\nb").unwrap();

    assert_eq!(texts(&tree, tree.root()), vec!["a", "\n", "b"]);
    assert_eq!(
        tree.children(tree.root())
            .map(|child| tree.node(child).kind())
            .collect::<Vec<_>>(),
        vec![NodeKind::Identifier, NodeKind::Token, NodeKind::Identifier]
    );

    assert!(grammar.parse("Lines", "a b").is_err());
}

#[test]
fn any_token() {
    let grammar: Grammar = "Quoted: TOKEN { TOKEN }".parse().unwrap();
    let tree = grammar.parse("Quoted", r"'it\'s' 'x'").unwrap();
    let first = tree.children(tree.root()).next().unwrap();

    assert_eq!(tree.node(first).as_str(), r"'it\'s'");
    assert_eq!(tree.node(first).kind(), NodeKind::Token);

    assert!(grammar.parse("Quoted", "abc").is_err());
    assert!(grammar.parse("Quoted", "'abc").is_err());
}

#[test]
fn unknown_rule() {
    let grammar = Grammar::load(["A: B", "B:"]).unwrap();

    let err = grammar.parse("C", "x").unwrap_err();
    assert_eq!(err.code(), "E003");
    assert!(matches!(err.info(), ErrorInfo::UnknownRule { rule, .. } if rule == "C"));

    // Extension points can't be used as start rules.
    assert_eq!(grammar.parse("B", "x").unwrap_err().code(), "E003");
}

#[test]
fn invalid_utf8() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();
    let err = grammar
        .parse("Greeting", b"hello \xFFworld".as_slice())
        .unwrap_err();

    assert_eq!(err.code(), "E008");
    assert!(matches!(
        err.info(),
        ErrorInfo::InvalidUtf8 { error_span, .. } if *error_span == Span(6..9)
    ));

    // Valid UTF-8 given as bytes is fine.
    assert!(grammar.parse("Greeting", b"hello world".as_slice()).is_ok());
}

#[test]
fn max_depth() {
    let grammar: Grammar = "Nested: '(' [ Nested ] ')'".parse().unwrap();

    assert!(grammar.parse("Nested", "((()))").is_ok());

    let err = Parser::new()
        .max_depth(5)
        .parse(&grammar, "Nested", "((()))")
        .unwrap_err();

    assert_eq!(err.code(), "E006");
    assert!(matches!(
        err.info(),
        ErrorInfo::TooDeeplyNested { max_depth: 5, .. }
    ));
}

#[test]
fn pathological_nesting() {
    // Make sure that deeply nested inputs are rejected instead of
    // overflowing the stack. The default limit needs more stack than the
    // one given to test threads.
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let grammar: Grammar =
                "Nested: '(' [ Nested ] ')'".parse().unwrap();
            let src = format!(
                "{}{}",
                "(".repeat(DEFAULT_MAX_DEPTH),
                ")".repeat(DEFAULT_MAX_DEPTH)
            );
            grammar.parse("Nested", src.as_str()).unwrap_err().code()
        })
        .unwrap();

    assert_eq!(handle.join().unwrap(), "E006");
}

#[test]
fn tab_width() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();

    let err = Parser::new()
        .tab_width(4)
        .parse(&grammar, "Greeting", "\thello 1")
        .unwrap_err();

    match err.info() {
        ErrorInfo::SyntaxError { recognized_up_to, .. } => {
            assert_eq!(recognized_up_to, &Position { line: 1, column: 11 });
        }
        info => panic!("unexpected error: {:?}", info),
    }
}

#[test]
fn tab_width_lower_bound() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();

    for width in [0, 1, 2] {
        let err = Parser::new()
            .tab_width(width)
            .parse(&grammar, "Greeting", "\thello 1")
            .unwrap_err();

        match err.info() {
            ErrorInfo::SyntaxError { recognized_up_to, .. } => {
                assert_eq!(
                    recognized_up_to,
                    &Position { line: 1, column: 9 },
                    "tab width {}",
                    width
                );
            }
            info => panic!("unexpected error: {:?}", info),
        }
    }
}

#[test]
fn input_too_large() {
    let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();

    let mut parser = Parser::new();
    parser.max_input_size(11);

    assert!(parser.parse(&grammar, "Greeting", "hello world").is_ok());

    let err = parser
        .parse(
            &grammar,
            "Greeting",
            SourceCode::from("hello world!").with_origin("big.txt"),
        )
        .unwrap_err();

    assert_eq!(err.code(), "E009");
    assert!(err.is_parse_error());
    assert!(matches!(
        err.info(),
        ErrorInfo::InputTooLarge { size: 12, max_size: 11, .. }
    ));

    // The last setting wins.
    let err = Parser::new()
        .max_input_size(usize::MAX)
        .max_input_size(3)
        .parse(&grammar, "Greeting", "hello world")
        .unwrap_err();

    assert_eq!(err.code(), "E009");
}

#[test]
fn shared_grammar() {
    let grammar: Grammar = "List: '[' [ IDENTIFIER { ',' IDENTIFIER } ] ']'"
        .parse()
        .unwrap();

    let inputs: Vec<String> = (0..64)
        .map(|i| {
            let items: Vec<String> = (0..i).map(|j| format!("x{}", j)).collect();
            format!("[{}]", items.join(", "))
        })
        .collect();

    inputs.par_iter().for_each(|input| {
        let tree = grammar.parse("List", input.as_str()).unwrap();
        assert_eq!(&tree.to_string(), input);
    });
}

#[test]
fn golden() {
    let grammar =
        Grammar::from_file("src/parser/tests/testdata/statements.bnf").unwrap();

    let files: Vec<_> = globwalk::glob("src/parser/tests/testdata/*.in")
        .unwrap()
        .flatten()
        .map(|entry| entry.into_path())
        .collect();

    assert!(!files.is_empty());

    files.into_par_iter().for_each(|path| {
        let mut mint = goldenfile::Mint::new(".");
        // Path to the .out file, replace the .in extension with .out.
        let output_path = path.with_extension("out");
        let output_file = mint.new_goldenfile(output_path).unwrap();

        let source = fs::read_to_string(&path).unwrap();
        let literals = Literals::c_family();
        let skipper = CommentSkipper::new();

        let mut tree = Parser::new()
            .extension(&literals)
            .whitespace(&skipper)
            .parse(&grammar, "Program", source.as_str())
            .unwrap();

        let statements: Vec<_> = tree
            .dfs(tree.root())
            .filter_map(|event| match event {
                crate::tree::DFSEvent::Enter(id) => Some(id),
                _ => None,
            })
            .filter(|id| {
                let node = tree.node(*id);
                grammar.is_definition_root(node.definition())
            })
            .map(|id| (id, tree.node(id).definition_name().to_owned()))
            .collect();

        for (id, name) in statements {
            match name.as_str() {
                "Call" => {
                    tree.set_prefix(id, "<call>").set_suffix(id, "</call>");
                }
                "Assignment" => {
                    tree.set_prefix(id, "let ");
                }
                _ => {}
            }
        }

        let mut w = BufWriter::new(output_file);
        writeln!(&mut w, "{}", tree).unwrap();
    });
}
