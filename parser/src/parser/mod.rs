use std::time::Instant;

use bstr::{BStr, ByteSlice};
use log::*;

use crate::bnf::RuleId;
use crate::errors::{Error, ErrorInfo};
use crate::parser::hooks::{
    DefaultHooks, ExtensionHook, KeywordHook, WhitespaceHook,
};
use crate::report::ReportBuilder;
use crate::tree::{NodeId, ParseTree};
use crate::{is_ident_char, is_ident_start, Grammar, NodeKind, Span};

pub(crate) use crate::parser::context::*;

pub mod hooks;

mod context;

#[cfg(test)]
mod tests;

/// A structure that describes some source code.
///
/// This structure contains a `&str` pointing to the code itself, and an
/// optional `origin` that tells where the source code came from. The
/// most common use for `origin` is indicating the path of the file from
/// where the source code was obtained, but it can contain any arbitrary
/// string. This string, if provided, will appear in error messages. For
/// example, in this error message `origin` was set to `Main.java`:
///
/// ```text
/// error[E004]: syntax error
///  --> Main.java:4:17
///   |
/// 4 | ... more details
/// ```
///
/// # Example
///
/// ```
/// use bnf_rewrite_parser::SourceCode;
/// let src = SourceCode::from("class Main {}").with_origin("Main.java");
/// ```
#[derive(Debug, Clone)]
pub struct SourceCode<'src> {
    /// A reference to the source code itself. This is a BStr because the
    /// source code could contain non-UTF8 content.
    pub(crate) raw: &'src BStr,
    /// A reference to the source code after validating that it is valid
    /// UTF-8.
    pub(crate) valid: Option<&'src str>,
    /// An optional string that tells which is the origin of the code. Usually
    /// a file path.
    pub(crate) origin: Option<String>,
}

impl<'src> SourceCode<'src> {
    /// Sets a string that describes the origin of the source code.
    ///
    /// This is usually the path of the file that contained the source code,
    /// but it can be an arbitrary string. The origin appears in error
    /// messages.
    pub fn with_origin(self, origin: &str) -> Self {
        Self {
            raw: self.raw,
            valid: self.valid,
            origin: Some(origin.to_owned()),
        }
    }

    /// Returns the source code as a `&str`.
    ///
    /// If the source code is not valid UTF-8 it will return an error.
    fn as_str(&mut self) -> Result<&'src str, bstr::Utf8Error> {
        match self.valid {
            Some(s) => Ok(s),
            None => {
                let src = self.raw.to_str()?;
                self.valid = Some(src);
                Ok(src)
            }
        }
    }
}

impl<'src> From<&'src str> for SourceCode<'src> {
    /// Creates a new [`SourceCode`] from a `&str`.
    fn from(src: &'src str) -> Self {
        Self { raw: BStr::new(src), valid: Some(src), origin: None }
    }
}

impl<'src> From<&'src String> for SourceCode<'src> {
    /// Creates a new [`SourceCode`] from a `&String`.
    fn from(src: &'src String) -> Self {
        Self::from(src.as_str())
    }
}

impl<'src> From<&'src [u8]> for SourceCode<'src> {
    /// Creates a new [`SourceCode`] from a `&[u8]`.
    ///
    /// As `src` is not guaranteed to be a valid UTF-8 string, the parser will
    /// verify it and return an error if invalid UTF-8 characters are found.
    fn from(src: &'src [u8]) -> Self {
        Self { raw: BStr::new(src), valid: None, origin: None }
    }
}

/// Default value for [`Parser::max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 2000;

/// Default value for [`Parser::tab_width`].
pub const DEFAULT_TAB_WIDTH: usize = 2;

/// Largest input accepted by the parser, in bytes. Offsets in parse trees
/// are 32-bit.
pub const MAX_INPUT_SIZE: usize = u32::MAX as usize;

static DEFAULT_HOOKS: DefaultHooks = DefaultHooks;

/// Parses source code according to a [`Grammar`], producing a
/// [`ParseTree`].
///
/// ```
/// use bnf_rewrite_parser::{Grammar, NodeKind, Parser};
///
/// let grammar: Grammar = "Greeting: 'hello' IDENTIFIER".parse().unwrap();
/// let tree = Parser::new().parse(&grammar, "Greeting", "hello world").unwrap();
///
/// let root = tree.node(tree.root());
/// assert_eq!(root.kind(), NodeKind::Sequence);
/// assert_eq!(root.as_str(), "hello world");
/// ```
pub struct Parser<'a> {
    keywords: &'a dyn KeywordHook,
    extension: &'a dyn ExtensionHook,
    whitespace: &'a dyn WhitespaceHook,
    report_builder: ReportBuilder,
    max_depth: usize,
    tab_width: usize,
    max_input_size: usize,
}

impl Default for Parser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new() -> Self {
        Self {
            keywords: &DEFAULT_HOOKS,
            extension: &DEFAULT_HOOKS,
            whitespace: &DEFAULT_HOOKS,
            report_builder: ReportBuilder::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            tab_width: DEFAULT_TAB_WIDTH,
            max_input_size: MAX_INPUT_SIZE,
        }
    }

    /// Specifies whether the parser should produce colorful error messages.
    ///
    /// Colorized error messages contain ANSI escape sequences that make them
    /// look nicer on compatible consoles. The default setting is `false`.
    pub fn colorize_errors(&mut self, yes: bool) -> &mut Self {
        self.report_builder.with_colors(yes);
        self
    }

    /// Maximum number of rules that can be nested while matching. Deeper
    /// inputs fail with [`ErrorInfo::TooDeeplyNested`]. The default is
    /// [`DEFAULT_MAX_DEPTH`].
    pub fn max_depth(&mut self, depth: usize) -> &mut Self {
        self.max_depth = depth;
        self
    }

    /// Number of columns a tab advances in error positions. The default is
    /// [`DEFAULT_TAB_WIDTH`].
    ///
    /// A tab is always wider than a regular character, values lower than 2
    /// are raised to 2.
    pub fn tab_width(&mut self, width: usize) -> &mut Self {
        self.tab_width = width.max(2);
        self
    }

    /// Maximum size of the input in bytes. Larger inputs fail with
    /// [`ErrorInfo::InputTooLarge`] before parsing starts. The default, and
    /// the highest accepted value, is [`MAX_INPUT_SIZE`].
    pub fn max_input_size(&mut self, size: usize) -> &mut Self {
        self.max_input_size = size.min(MAX_INPUT_SIZE);
        self
    }

    /// Sets the hook that decides which words are keywords.
    pub fn keywords(&mut self, hook: &'a dyn KeywordHook) -> &mut Self {
        self.keywords = hook;
        self
    }

    /// Sets the hook that matches extension points.
    pub fn extension(&mut self, hook: &'a dyn ExtensionHook) -> &mut Self {
        self.extension = hook;
        self
    }

    /// Sets the hook that skips whitespace between tokens.
    pub fn whitespace(&mut self, hook: &'a dyn WhitespaceHook) -> &mut Self {
        self.whitespace = hook;
        self
    }

    /// Parses `src` starting at the rule named `rule`.
    ///
    /// `src` can be any type that implements [`Into<SourceCode>`], which
    /// includes `&str`, `&[u8]`, and [`SourceCode`] itself. By passing a
    /// [`SourceCode`] you can provide additional information about the
    /// source code, like the path of the file that originally contained the
    /// code.
    ///
    /// The rule must match the whole input, except for whitespace at the
    /// end. The resulting tree holds references to both the grammar and the
    /// source code, which can't be dropped until the tree is dropped.
    pub fn parse<'g, 'src, S>(
        &self,
        grammar: &'g Grammar,
        rule: &str,
        src: S,
    ) -> Result<ParseTree<'g, 'src>, Error>
    where
        S: Into<SourceCode<'src>>,
    {
        let mut src = src.into();

        if src.raw.len() > self.max_input_size {
            return Err(Error::from(ErrorInfo::input_too_large(
                &self.report_builder,
                src.origin.as_deref(),
                src.raw.len(),
                self.max_input_size,
            )));
        }

        let text = match src.as_str() {
            Ok(text) => text,
            Err(err) => {
                let span_start = err.valid_up_to();
                let span_end = if let Some(error_len) = err.error_len() {
                    // `error_len` is the number of invalid UTF-8 bytes found
                    // after `span_start`. Round the number up to the next 3
                    // bytes boundary because invalid bytes are replaced with
                    // the Unicode replacement characters that takes 3 bytes.
                    // This way the span ends at a valid UTF-8 character
                    // boundary.
                    span_start + error_len.next_multiple_of(3)
                } else {
                    span_start
                };
                return Err(Error::from(ErrorInfo::invalid_utf8(
                    &self.report_builder,
                    &src,
                    Span::new(span_start, span_end),
                )));
            }
        };

        let body = match grammar.definition(rule) {
            Some(definition) => match definition.body {
                Some(body) => body,
                None => {
                    return Err(Error::from(ErrorInfo::unknown_rule(
                        &self.report_builder,
                        rule.to_owned(),
                        Some(format!(
                            "`{}` is an extension point, it doesn't have a body",
                            rule
                        )),
                    )))
                }
            },
            None => {
                return Err(Error::from(ErrorInfo::unknown_rule(
                    &self.report_builder,
                    rule.to_owned(),
                    None,
                )))
            }
        };

        let start = Instant::now();

        let mut ctx = Context::new(
            grammar,
            text,
            self.keywords,
            self.extension,
            self.whitespace,
            self.max_depth,
            self.tab_width,
        );

        let result = ctx.match_rule(body, 0, text.len());

        let root = match result {
            Ok(root) => root,
            Err(failure) => {
                trace!("Parsing with rule `{}` failed: {:?}", rule, failure);
                return Err(self.failure_to_error(&ctx, &src, failure));
            }
        };

        let root_end = ctx.span(root).end();
        let trailing = ctx.skip_whitespace(root_end, text.len());

        if trailing < text.len() {
            trace!(
                "Parsing with rule `{}` stopped at offset {} of {}",
                rule,
                root_end,
                text.len()
            );
            let next = ctx.char_at(trailing).map_or(1, |c| c.len_utf8());
            return Err(Error::from(ErrorInfo::syntax_error(
                &self.report_builder,
                &src,
                format!(
                    "unexpected input after the end of `{}` at {}",
                    rule,
                    ctx.position(trailing)
                ),
                Span::new(trailing, trailing + next),
                ctx.position(root_end),
                ctx.position(ctx.farthest),
            )));
        }

        debug!(
            "Parsed {} bytes with rule `{}` in {:?} ({} nodes)",
            text.len(),
            rule,
            start.elapsed(),
            ctx.nodes.len(),
        );

        Ok(ParseTree::new(grammar, text, ctx.nodes, root))
    }

    fn failure_to_error(
        &self,
        ctx: &Context,
        src: &SourceCode,
        failure: Failure,
    ) -> Error {
        Error::from(match failure {
            Failure::NoMatch { pos, messages } => ErrorInfo::syntax_error(
                &self.report_builder,
                src,
                messages.join("\n"),
                Span::new(pos, pos),
                ctx.position(pos),
                ctx.position(ctx.farthest),
            ),
            Failure::InfiniteRecursion { rule, pos } => {
                ErrorInfo::infinite_recursion(
                    &self.report_builder,
                    src,
                    ctx.grammar.definition_name(rule).to_owned(),
                    Span::new(pos, pos),
                )
            }
            Failure::TooDeep { pos } => ErrorInfo::too_deeply_nested(
                &self.report_builder,
                src,
                self.max_depth,
                Span::new(pos, pos),
            ),
        })
    }
}

/// Reasons why a rule didn't match.
#[derive(Debug)]
pub(crate) enum Failure {
    /// The input doesn't match the rule. `pos` is the offset where the
    /// mismatch was detected and `messages` describe what was expected.
    NoMatch { pos: usize, messages: Vec<String> },
    /// The rule was entered again at the same position while it was being
    /// matched.
    InfiniteRecursion { rule: RuleId, pos: usize },
    /// The nesting limit was reached. This failure is never recovered.
    TooDeep { pos: usize },
}

type MatchResult = Result<NodeId, Failure>;

impl Context<'_, '_, '_> {
    /// Matches `rule` against the text in `begin..end`.
    ///
    /// On success returns the root of the subtree that matched, which
    /// starts at `begin` or after some whitespace, and ends at or before
    /// `end`.
    pub(crate) fn match_rule(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let key = (rule, begin, end);

        if !self.in_progress.insert(key) {
            return Err(Failure::InfiniteRecursion { rule, pos: begin });
        }

        if self.depth >= self.max_depth {
            self.in_progress.remove(&key);
            return Err(Failure::TooDeep { pos: begin });
        }

        self.depth += 1;

        let result = match self.grammar.node(rule).kind {
            NodeKind::Token => self.match_token(rule, begin, end),
            NodeKind::Identifier => self.match_identifier(rule, begin, end),
            NodeKind::Sequence => self.match_sequence(rule, begin, end),
            NodeKind::Choice => self.match_choice(rule, begin, end),
            NodeKind::Optional => self.match_optional(rule, begin, end),
            NodeKind::Repetition => self.match_repetition(rule, begin, end),
            NodeKind::TokenKeyword => self.match_any_token(rule, begin, end),
            NodeKind::IdentifierKeyword => {
                self.match_any_identifier(rule, begin, end)
            }
            NodeKind::NewlineKeyword => self.match_newline(rule, begin, end),
        };

        self.depth -= 1;
        self.in_progress.remove(&key);

        result
    }

    fn no_match(&self, pos: usize, msg: String) -> MatchResult {
        Err(Failure::NoMatch { pos, messages: vec![msg] })
    }

    fn match_token(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let grammar = self.grammar;
        let literal = grammar.node(rule).value.as_deref().unwrap_or_default();

        // An empty literal matches the empty string anywhere.
        if literal.is_empty() {
            return Ok(self.push_leaf(NodeKind::Token, rule, begin, begin));
        }

        let begin = self.skip_whitespace(begin, end);

        if !self.text[begin..end].starts_with(literal) {
            return self.no_match(
                begin,
                format!(
                    "`{}` expected at {}",
                    literal,
                    self.position(begin)
                ),
            );
        }

        let token_end = begin + literal.len();

        // Literals that end with a letter can't match the beginning of a
        // longer word, `'for'` doesn't match `format`. Single letters are
        // exempt.
        let ends_with_letter = literal.chars().nth(1).is_some()
            && literal.chars().last().is_some_and(|c| c.is_alphabetic());

        if ends_with_letter
            && self.char_at(token_end).is_some_and(|c| c.is_alphabetic())
        {
            return self.no_match(
                token_end,
                format!(
                    "`{}` expected at {}, found a longer word",
                    literal,
                    self.position(begin)
                ),
            );
        }

        self.advance(token_end);

        if self.keywords.is_keyword(literal)
            && token_end < end
            && self.char_at(token_end).is_some_and(is_ident_char)
        {
            return self.no_match(
                token_end,
                format!(
                    "keyword `{}` can't be followed by identifier characters at {}",
                    literal,
                    self.position(token_end)
                ),
            );
        }

        Ok(self.push_leaf(NodeKind::Token, rule, begin, token_end))
    }

    fn match_identifier(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let grammar = self.grammar;
        let name = grammar.node(rule).value.as_deref().unwrap_or_default();

        match grammar.definition(name).map(|definition| definition.body) {
            Some(Some(body)) => self.match_rule(body, begin, end),
            Some(None) => {
                let begin = self.skip_whitespace(begin, end);
                let matched = if begin < end {
                    self.extension.extend(name, self.text, begin, end)
                } else {
                    None
                };
                match matched {
                    Some(match_end)
                        if match_end > begin
                            && match_end <= end
                            && self.text.is_char_boundary(match_end) =>
                    {
                        self.advance(match_end);
                        Ok(self.push_leaf(NodeKind::Token, rule, begin, match_end))
                    }
                    _ => self.no_match(
                        begin,
                        format!("`{}` expected at {}", name, self.position(begin)),
                    ),
                }
            }
            None => self.no_match(begin, format!("unknown rule `{}`", name)),
        }
    }

    fn match_sequence(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let grammar = self.grammar;
        let branches = &grammar.node(rule).branches;
        let mut children = Vec::with_capacity(branches.len());
        let mut pos = begin;

        for branch in branches {
            let child = self.match_rule(*branch, pos, end)?;
            pos = self.span(child).end();
            children.push(Some(child));
        }

        Ok(self.push_branch(NodeKind::Sequence, rule, begin, children))
    }

    fn match_choice(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let grammar = self.grammar;
        let branches = &grammar.node(rule).branches;
        let bookmark = self.bookmark();

        let mut messages = Vec::new();
        let mut pos = begin;
        let mut recursion = None;
        let mut all_recursive = true;

        for (index, branch) in branches.iter().enumerate() {
            match self.match_rule(*branch, begin, end) {
                Ok(child) => {
                    let mut children = vec![None; branches.len()];
                    children[index] = Some(child);
                    return Ok(self.push_branch(
                        NodeKind::Choice,
                        rule,
                        begin,
                        children,
                    ));
                }
                Err(failure @ Failure::TooDeep { .. }) => return Err(failure),
                Err(Failure::InfiniteRecursion { rule: recursive, pos: at }) => {
                    self.restore(bookmark);
                    messages.push(format!(
                        "infinite recursion in rule `{}` at {}",
                        grammar.definition_name(recursive),
                        self.position(at)
                    ));
                    if recursion.is_none() {
                        recursion = Some(Failure::InfiniteRecursion {
                            rule: recursive,
                            pos: at,
                        });
                    }
                    pos = pos.max(at);
                }
                Err(Failure::NoMatch { pos: at, messages: m }) => {
                    self.restore(bookmark);
                    all_recursive = false;
                    messages.extend(m);
                    pos = pos.max(at);
                }
            }
        }

        if all_recursive {
            if let Some(recursion) = recursion {
                return Err(recursion);
            }
        }

        Err(Failure::NoMatch { pos, messages })
    }

    fn match_optional(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let branch = self.grammar.node(rule).branches[0];
        let bookmark = self.bookmark();

        match self.match_rule(branch, begin, end) {
            Ok(child) => Ok(self.push_branch(
                NodeKind::Optional,
                rule,
                begin,
                vec![Some(child)],
            )),
            Err(failure @ Failure::TooDeep { .. }) => Err(failure),
            Err(_) => {
                self.restore(bookmark);
                Ok(self.push_branch(NodeKind::Optional, rule, begin, vec![]))
            }
        }
    }

    fn match_repetition(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let branch = self.grammar.node(rule).branches[0];
        let mut children = Vec::new();
        let mut pos = begin;

        loop {
            let bookmark = self.bookmark();
            match self.match_rule(branch, pos, end) {
                Ok(child) => {
                    let child_end = self.span(child).end();
                    // A match that doesn't consume anything would repeat
                    // forever, it ends the repetition and is discarded.
                    if child_end <= pos {
                        self.restore(bookmark);
                        break;
                    }
                    pos = child_end;
                    children.push(Some(child));
                }
                Err(failure @ Failure::TooDeep { .. }) => return Err(failure),
                Err(_) => {
                    self.restore(bookmark);
                    break;
                }
            }
        }

        Ok(self.push_branch(NodeKind::Repetition, rule, begin, children))
    }

    fn match_any_token(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let begin = self.skip_whitespace(begin, end);
        let text = self.text;
        let bytes = &text.as_bytes()[..end];

        if bytes.get(begin) != Some(&b'\'') {
            return self.no_match(
                begin,
                format!("quoted token expected at {}", self.position(begin)),
            );
        }

        let mut pos = begin + 1;

        while let Some(&b) = bytes.get(pos) {
            match b {
                b'\\' => pos += 1,
                b'\'' => {
                    self.advance(pos + 1);
                    return Ok(self.push_leaf(
                        NodeKind::Token,
                        rule,
                        begin,
                        pos + 1,
                    ));
                }
                _ => {}
            }
            pos += 1;
        }

        self.no_match(
            begin,
            format!("unterminated token at {}", self.position(begin)),
        )
    }

    fn match_any_identifier(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        let begin = self.skip_whitespace(begin, end);
        let source = self.text;
        let text = &source[begin..end];

        if !text.chars().next().is_some_and(is_ident_start) {
            return self.no_match(
                begin,
                format!("identifier expected at {}", self.position(begin)),
            );
        }

        let len = text
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(text.len());

        let word = &text[..len];

        if self.keywords.is_keyword(word) {
            return self.no_match(
                begin,
                format!(
                    "identifier expected at {}, found keyword `{}`",
                    self.position(begin),
                    word
                ),
            );
        }

        self.advance(begin + len);

        Ok(self.push_leaf(NodeKind::Identifier, rule, begin, begin + len))
    }

    fn match_newline(
        &mut self,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> MatchResult {
        if self.text[begin..end].starts_with('\n') {
            self.advance(begin + 1);
            Ok(self.push_leaf(NodeKind::Token, rule, begin, begin + 1))
        } else {
            self.no_match(
                begin,
                format!("new line expected at {}", self.position(begin)),
            )
        }
    }
}
