/*! Capabilities that adapt the parser to a particular language.

The parser knows nothing about the language being parsed besides its
grammar. Three hooks allow customizing the aspects that can't be expressed in
the grammar itself:

* [`KeywordHook`] tells which words are reserved, they can't be matched by
  `IDENTIFIER` and tokens that are keywords can't be immediately followed by
  identifier characters.
* [`ExtensionHook`] matches rules with an empty body, like literals whose
  syntax is too involved for the BNF dialect.
* [`WhitespaceHook`] skips the text that separates tokens, including
  comments if the language has them.

Hooks are implemented for closures with the right signature, so simple
cases don't need a dedicated type:

```
use bnf_rewrite_parser::{Grammar, Parser};

let grammar: Grammar = "Stmt: IDENTIFIER ';'".parse().unwrap();
let is_keyword = |word: &str| word == "return";

assert!(Parser::new().keywords(&is_keyword).parse(&grammar, "Stmt", "foo;").is_ok());
assert!(Parser::new().keywords(&is_keyword).parse(&grammar, "Stmt", "return;").is_err());
```
 */
use rustc_hash::{FxHashMap, FxHashSet};

use crate::Grammar;

/// Decides whether a word is a keyword.
pub trait KeywordHook {
    fn is_keyword(&self, word: &str) -> bool;
}

/// Matches rules that are extension points.
pub trait ExtensionHook {
    /// Tries to match the rule named `rule` at offset `begin` in `text`,
    /// without going beyond `end`. Whitespace at `begin` has been skipped
    /// already.
    ///
    /// Returns the offset where the match ends, or `None` if the rule
    /// doesn't match. Matches must be non-empty and end at a character
    /// boundary not greater than `end`, otherwise they are ignored.
    fn extend(
        &self,
        rule: &str,
        text: &str,
        begin: usize,
        end: usize,
    ) -> Option<usize>;
}

/// Skips text between tokens.
pub trait WhitespaceHook {
    /// Returns the offset of the first character at or after `begin` that
    /// is not part of whitespace, or `end` if there is none.
    fn skip_whitespace(&self, text: &str, begin: usize, end: usize) -> usize;
}

impl<F> KeywordHook for F
where
    F: Fn(&str) -> bool,
{
    fn is_keyword(&self, word: &str) -> bool {
        self(word)
    }
}

impl<F> ExtensionHook for F
where
    F: Fn(&str, &str, usize, usize) -> Option<usize>,
{
    fn extend(
        &self,
        rule: &str,
        text: &str,
        begin: usize,
        end: usize,
    ) -> Option<usize> {
        self(rule, text, begin, end)
    }
}

impl<F> WhitespaceHook for F
where
    F: Fn(&str, usize, usize) -> usize,
{
    fn skip_whitespace(&self, text: &str, begin: usize, end: usize) -> usize {
        self(text, begin, end)
    }
}

/// Hooks used when no others are provided: there are no keywords, no
/// extension matches anything, and whitespace is any Unicode whitespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl KeywordHook for DefaultHooks {
    fn is_keyword(&self, _word: &str) -> bool {
        false
    }
}

impl ExtensionHook for DefaultHooks {
    fn extend(&self, _: &str, _: &str, _: usize, _: usize) -> Option<usize> {
        None
    }
}

impl WhitespaceHook for DefaultHooks {
    fn skip_whitespace(&self, text: &str, begin: usize, end: usize) -> usize {
        skip_blanks(text, begin, end)
    }
}

fn skip_blanks(text: &str, begin: usize, end: usize) -> usize {
    text[begin..end]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| begin + i)
        .unwrap_or(end)
}

/// A set of keywords.
///
/// ```
/// use bnf_rewrite_parser::Grammar;
/// use bnf_rewrite_parser::hooks::{KeywordHook, KeywordSet};
///
/// let grammar: Grammar = "Stmt: 'return' IDENTIFIER ';'".parse().unwrap();
/// let keywords = KeywordSet::from_grammar(&grammar);
///
/// assert!(keywords.is_keyword("return"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct KeywordSet(FxHashSet<String>);

impl KeywordSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set with all the keywords used by a grammar, as returned
    /// by [`Grammar::keywords`].
    pub fn from_grammar(grammar: &Grammar) -> Self {
        grammar.keywords().into_iter().collect()
    }

    /// Adds a keyword to the set.
    pub fn insert<S: Into<String>>(&mut self, keyword: S) -> &mut Self {
        self.0.insert(keyword.into());
        self
    }

    /// Returns true if the set contains the given word.
    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(|s| s.into()).collect())
    }
}

impl KeywordHook for KeywordSet {
    fn is_keyword(&self, word: &str) -> bool {
        self.contains(word)
    }
}

/// Skips whitespace and comments.
///
/// By default it recognizes C-style comments, `/* block comments */` and
/// `// line comments`. Block comments that are not closed extend up to the
/// end of the input.
///
/// ```
/// use bnf_rewrite_parser::hooks::{CommentSkipper, WhitespaceHook};
///
/// let skipper = CommentSkipper::new().line_comment("#");
/// let text = "  # comment\n  /* another */ x";
///
/// assert_eq!(skipper.skip_whitespace(text, 0, text.len()), text.len() - 1);
/// ```
#[derive(Clone, Debug)]
pub struct CommentSkipper {
    block: Vec<(String, String)>,
    line: Vec<String>,
}

impl Default for CommentSkipper {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentSkipper {
    /// Creates a skipper for C-style comments.
    pub fn new() -> Self {
        Self {
            block: vec![("/*".to_owned(), "*/".to_owned())],
            line: vec!["//".to_owned()],
        }
    }

    /// Creates a skipper that doesn't recognize any comment.
    pub fn without_comments() -> Self {
        Self { block: vec![], line: vec![] }
    }

    /// Adds a kind of block comment.
    pub fn block_comment(mut self, open: &str, close: &str) -> Self {
        self.block.push((open.to_owned(), close.to_owned()));
        self
    }

    /// Adds a kind of line comment.
    pub fn line_comment(mut self, start: &str) -> Self {
        self.line.push(start.to_owned());
        self
    }
}

impl WhitespaceHook for CommentSkipper {
    fn skip_whitespace(&self, text: &str, begin: usize, end: usize) -> usize {
        let mut pos = begin;
        'outer: loop {
            pos = skip_blanks(text, pos, end);
            let rest = &text[pos..end];

            for (open, close) in &self.block {
                if rest.starts_with(open.as_str()) {
                    pos = match rest[open.len()..].find(close.as_str()) {
                        Some(i) => pos + open.len() + i + close.len(),
                        None => end,
                    };
                    continue 'outer;
                }
            }

            for start in &self.line {
                if rest.starts_with(start.as_str()) {
                    pos = match rest.find('\n') {
                        Some(i) => pos + i + 1,
                        None => end,
                    };
                    continue 'outer;
                }
            }

            return pos;
        }
    }
}

/// Kinds of literals that can be matched by [`Literals`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LiteralKind {
    /// A string in double quotes, like `"foo\n"`. Raw newlines are not
    /// allowed.
    String,
    /// A character in single quotes, like `'a'` or `'\''`.
    Character,
    /// A decimal or hexadecimal integer, with optional sign and `L` suffix.
    Integer,
    /// A floating point number, like `1.5`, `.5e-3` or `2f`.
    Float,
}

/// Matches literals for rules that are extension points.
///
/// ```
/// use bnf_rewrite_parser::{Grammar, Parser};
/// use bnf_rewrite_parser::hooks::{LiteralKind, Literals};
///
/// let grammar: Grammar = "Call: IDENTIFIER '(' Str ')'\nStr:".parse().unwrap();
/// let literals = Literals::new().with("Str", LiteralKind::String);
///
/// let tree = Parser::new()
///     .extension(&literals)
///     .parse(&grammar, "Call", r#"print("hi")"#)
///     .unwrap();
///
/// assert_eq!(tree.to_string(), r#"print("hi")"#);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Literals {
    rules: FxHashMap<String, LiteralKind>,
}

impl Literals {
    /// Creates a [`Literals`] that doesn't match any rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`Literals`] with the rule names used by grammars of
    /// C-family languages: `StringLiteral`, `CharacterLiteral`,
    /// `IntegerLiteral` and `FloatingPointLiteral`.
    pub fn c_family() -> Self {
        Self::new()
            .with("StringLiteral", LiteralKind::String)
            .with("CharacterLiteral", LiteralKind::Character)
            .with("IntegerLiteral", LiteralKind::Integer)
            .with("FloatingPointLiteral", LiteralKind::Float)
    }

    /// Matches rule `rule` with literals of the given kind.
    pub fn with<S: Into<String>>(mut self, rule: S, kind: LiteralKind) -> Self {
        self.rules.insert(rule.into(), kind);
        self
    }
}

impl ExtensionHook for Literals {
    fn extend(
        &self,
        rule: &str,
        text: &str,
        begin: usize,
        end: usize,
    ) -> Option<usize> {
        let bytes = &text.as_bytes()[..end];
        match self.rules.get(rule)? {
            LiteralKind::String => scan_quoted(bytes, begin, b'"'),
            LiteralKind::Character => scan_quoted(bytes, begin, b'\''),
            LiteralKind::Integer => scan_number(bytes, begin, false),
            LiteralKind::Float => scan_number(bytes, begin, true),
        }
    }
}

fn scan_quoted(bytes: &[u8], begin: usize, quote: u8) -> Option<usize> {
    if bytes.get(begin) != Some(&quote) {
        return None;
    }
    let mut pos = begin + 1;
    while let Some(&b) = bytes.get(pos) {
        match b {
            b'\\' => pos += 1,
            b'\n' => return None,
            b if b == quote => return Some(pos + 1),
            _ => {}
        }
        pos += 1;
    }
    None
}

fn scan_number(bytes: &[u8], begin: usize, float: bool) -> Option<usize> {
    let digits_from = |mut pos: usize, hex: bool| {
        while bytes.get(pos).is_some_and(|b| {
            if hex {
                b.is_ascii_hexdigit()
            } else {
                b.is_ascii_digit()
            }
        }) {
            pos += 1;
        }
        pos
    };

    let mut pos = begin;

    if matches!(bytes.get(pos), Some(b'+' | b'-')) {
        pos += 1;
    }

    let mut period = false;

    if float && bytes.get(pos) == Some(&b'.') {
        period = true;
        pos += 1;
    }

    let hex = !float
        && bytes.get(pos) == Some(&b'0')
        && matches!(bytes.get(pos + 1), Some(b'x' | b'X'));

    if hex {
        pos += 2;
    }

    let digits_end = digits_from(pos, hex);
    let mut valid = digits_end > pos;
    pos = digits_end;

    if float && valid && !period && bytes.get(pos) == Some(&b'.') {
        pos = digits_from(pos + 1, false);
    }

    if float && valid && matches!(bytes.get(pos), Some(b'e' | b'E')) {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        let exponent_end = digits_from(pos, false);
        valid = exponent_end > pos;
        pos = exponent_end;
    }

    if valid {
        let suffix: &[u8] = if float { b"fFdD" } else { b"lL" };
        if bytes.get(pos).is_some_and(|b| suffix.contains(b)) {
            pos += 1;
        }
    }

    // A number immediately followed by a letter is not a number, as in
    // `123abc` or `0xfg`.
    if !valid || bytes.get(pos).is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }

    Some(pos)
}
