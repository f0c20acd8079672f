/*! Grammars, tables that map rule names to compiled rule trees.

A grammar is written as a sequence of definitions. Each definition starts
with a line of the form `Name: expression`, and every following line that
doesn't start a new definition is a continuation of the current one:

```text
ClassDeclaration: 'class' IDENTIFIER
    [ 'extends' Type ]
    ClassBody
```

Definitions with an empty body, like `StringLiteral:`, are extension points,
the parser delegates the matching of these rules to an extension hook.
 */
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use itertools::Itertools;
use log::*;

use crate::bnf::{Compiler, Rule, RuleId, RuleNode};
use crate::errors::{Error, ErrorInfo, LoadError};
use crate::parser::{Parser, SourceCode};
use crate::report::ReportBuilder;
use crate::tree::ParseTree;
use crate::{is_ident_char, NodeKind, Span};


/// A grammar definition.
#[derive(Clone, Debug)]
pub(crate) struct Definition {
    /// Span of the definition's name in the grammar text.
    pub name_span: Span,
    /// Root of the definition's body, `None` for extension points.
    pub body: Option<RuleId>,
}

/// A set of named rules compiled from a grammar.
///
/// A `Grammar` is immutable once loaded, it can be shared among any number
/// of parsers, including parsers running in different threads.
pub struct Grammar {
    /// Text of the whole grammar. Spans in rule nodes are relative to it.
    source: String,
    origin: Option<String>,
    nodes: Vec<RuleNode>,
    definitions: IndexMap<String, Definition>,
}

impl Grammar {
    /// Loads a grammar from its lines.
    ///
    /// ```
    /// use bnf_rewrite_parser::Grammar;
    ///
    /// let grammar = Grammar::load([
    ///     "Greeting: 'hello' Name",
    ///     "Name: IDENTIFIER",
    /// ]).unwrap();
    ///
    /// assert!(grammar.contains("Greeting"));
    /// ```
    pub fn load<I, S>(lines: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        GrammarBuilder::new().build(lines)
    }

    /// Loads a grammar from a file.
    ///
    /// The path of the file is used as the origin of the grammar in error
    /// reports.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| LoadError::Io {
            path: path.display().to_string(),
            err,
        })?;
        Ok(GrammarBuilder::new()
            .origin(path.display().to_string())
            .build(text.lines())?)
    }

    /// Returns a builder that allows customizing how the grammar is loaded.
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }

    /// Parses `src` starting at the rule named `rule`, using a [`Parser`]
    /// with the default settings.
    pub fn parse<'src, S>(
        &self,
        rule: &str,
        src: S,
    ) -> Result<ParseTree<'_, 'src>, Error>
    where
        S: Into<SourceCode<'src>>,
    {
        Parser::new().parse(self, rule, src)
    }

    /// Returns the body of the rule with the given name.
    ///
    /// Returns `None` if the rule doesn't exist or is an extension point.
    pub fn get(&self, name: &str) -> Option<Rule<'_>> {
        self.definitions
            .get(name)
            .and_then(|definition| definition.body)
            .map(|body| self.rule(body))
    }

    /// Returns true if the grammar has a definition with the given name,
    /// including extension points.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Returns true if the given name is an extension point.
    pub fn is_extension(&self, name: &str) -> bool {
        self.definitions.get(name).is_some_and(|d| d.body.is_none())
    }

    /// Names of all definitions in the grammar, in the order they were
    /// defined.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(|name| name.as_str())
    }

    /// Names of the definitions that are extension points.
    pub fn extension_points(&self) -> impl Iterator<Item = &str> {
        self.definitions
            .iter()
            .filter(|(_, definition)| definition.body.is_none())
            .map(|(name, _)| name.as_str())
    }

    /// Number of definitions in the grammar.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if the grammar has no definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the rule node with the given identifier.
    ///
    /// # Panics
    ///
    /// If the identifier doesn't belong to this grammar.
    pub fn rule(&self, id: RuleId) -> Rule<'_> {
        assert!(id.index() < self.nodes.len());
        Rule::new(id, &self.nodes, &self.source)
    }

    /// Returns the name of the definition containing the given rule node.
    ///
    /// Returns an empty string if the identifier doesn't belong to this
    /// grammar.
    pub fn definition_name(&self, id: RuleId) -> &str {
        self.nodes
            .get(id.index())
            .and_then(|node| self.definitions.get_index(node.definition as usize))
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    /// Returns true if the given rule node is the root of a definition's
    /// body. Returns false if the identifier doesn't belong to this grammar.
    pub fn is_definition_root(&self, id: RuleId) -> bool {
        self.nodes
            .get(id.index())
            .and_then(|node| self.definitions.get_index(node.definition as usize))
            .is_some_and(|(_, definition)| definition.body == Some(id))
    }

    /// Returns the literals of every token in the grammar that starts with
    /// a letter, sorted and without duplicates.
    ///
    /// These are the words that the grammar uses as keywords, like `class`
    /// or `while`.
    pub fn keywords(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Token)
            .filter_map(|node| node.value.as_deref())
            .filter(|literal| {
                literal.chars().next().is_some_and(|c| c.is_alphabetic())
            })
            .sorted()
            .dedup()
            .collect()
    }

    /// Text of the whole grammar.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Origin of the grammar, usually the path of the file it was loaded
    /// from.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    #[inline]
    pub(crate) fn node(&self, id: RuleId) -> &RuleNode {
        &self.nodes[id.index()]
    }

    /// Looks up a definition by name.
    #[inline]
    pub(crate) fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }
}

impl FromStr for Grammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::load(s.lines())
    }
}

impl Debug for Grammar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("origin", &self.origin)
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Configures and loads a [`Grammar`].
///
/// ```
/// use bnf_rewrite_parser::Grammar;
///
/// let grammar = Grammar::builder()
///     .origin("literals.bnf")
///     .declare_extension("Number")
///     .build(["Sum: Number { '+' Number }"])
///     .unwrap();
///
/// assert!(grammar.is_extension("Number"));
/// ```
#[derive(Default)]
pub struct GrammarBuilder {
    origin: Option<String>,
    extensions: Vec<String>,
    report_builder: ReportBuilder,
}

impl GrammarBuilder {
    /// Creates a new [`GrammarBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a string that describes the origin of the grammar, it appears
    /// in error reports.
    pub fn origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Declares an extension point that is not present in the grammar
    /// text.
    ///
    /// This is equivalent to adding a definition with an empty body. If the
    /// grammar already has a definition with the same name, the definition
    /// in the grammar prevails.
    pub fn declare_extension<S: Into<String>>(mut self, name: S) -> Self {
        self.extensions.push(name.into());
        self
    }

    /// Specifies whether error reports should have colors.
    pub fn colorize_errors(mut self, yes: bool) -> Self {
        self.report_builder.with_colors(yes);
        self
    }

    /// Loads the grammar from its lines.
    pub fn build<I, S>(self, lines: I) -> Result<Grammar, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source = lines.into_iter().map(|l| l.as_ref().to_owned()).join("\n");

        let mut grammar = Grammar {
            source,
            origin: self.origin,
            nodes: Vec::new(),
            definitions: IndexMap::new(),
        };

        let blocks = match split_definitions(&grammar.source) {
            Ok(blocks) => blocks,
            Err((msg, span)) => {
                return Err(bnf_error(&self.report_builder, &grammar, msg, span))
            }
        };

        let compiler = Compiler::new(&grammar.source);

        for block in blocks {
            let name = &grammar.source[block.name.clone()];

            if let Some(existing) = grammar.definitions.get(name) {
                return Err(Error::from(ErrorInfo::duplicate_rule(
                    &self.report_builder,
                    &grammar.source_code(),
                    name.to_owned(),
                    block.name.into(),
                    existing.name_span.clone(),
                )));
            }

            let index = grammar.definitions.len() as u32;
            let body = block.body.clone();
            let body_is_empty =
                grammar.source[body.clone()].trim_matches(char::is_whitespace).is_empty();

            let body = if body_is_empty {
                None
            } else {
                match compiler.compile(body, index, &mut grammar.nodes) {
                    Ok(root) => Some(root),
                    Err(err) => {
                        return Err(bnf_error(
                            &self.report_builder,
                            &grammar,
                            err.msg,
                            err.span,
                        ))
                    }
                }
            };

            grammar.definitions.insert(
                name.to_owned(),
                Definition { name_span: block.name.into(), body },
            );
        }

        for name in self.extensions {
            grammar.definitions.entry(name).or_insert(Definition {
                name_span: Span::default(),
                body: None,
            });
        }

        // Every rule referenced by some definition must be defined. All
        // missing names are reported at once, each one with the span where
        // it was used for the first time.
        let mut missing = BTreeMap::new();

        for node in &grammar.nodes {
            if node.kind != NodeKind::Identifier {
                continue;
            }
            if let Some(name) = node.value.as_deref() {
                if !grammar.definitions.contains_key(name) {
                    missing
                        .entry(name.to_owned())
                        .or_insert_with(|| node.span.clone());
                }
            }
        }

        if !missing.is_empty() {
            let (names, spans) = missing.into_iter().unzip();
            return Err(Error::from(ErrorInfo::missing_definitions(
                &self.report_builder,
                &grammar.source_code(),
                names,
                spans,
            )));
        }

        debug!(
            "Loaded grammar with {} definitions ({} extension points) from {}",
            grammar.len(),
            grammar.extension_points().count(),
            grammar.origin.as_deref().unwrap_or("<unknown>"),
        );

        Ok(grammar)
    }
}

impl Grammar {
    fn source_code(&self) -> SourceCode<'_> {
        let src = SourceCode::from(self.source.as_str());
        match &self.origin {
            Some(origin) => src.with_origin(origin),
            None => src,
        }
    }
}

fn bnf_error(
    report_builder: &ReportBuilder,
    grammar: &Grammar,
    msg: String,
    span: Span,
) -> Error {
    Error::from(ErrorInfo::invalid_bnf(
        report_builder,
        &grammar.source_code(),
        msg,
        span,
    ))
}

/// The ranges covered by a definition in the grammar text.
struct Block {
    name: std::ops::Range<usize>,
    body: std::ops::Range<usize>,
}

/// Splits the grammar text into definitions.
///
/// A line starts a new definition if it begins with an identifier followed
/// by a colon. Any other non-blank line is a continuation of the previous
/// definition.
fn split_definitions(
    source: &str,
) -> Result<Vec<Block>, (String, Span)> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut line_start = 0;

    for line in source.split('\n') {
        let line_end = line_start + line.len();
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if !trimmed.trim_end().is_empty() {
            let name_len = trimmed
                .char_indices()
                .find(|(_, c)| !is_ident_char(*c))
                .map(|(i, _)| i)
                .unwrap_or(trimmed.len());

            let is_definition =
                name_len > 0 && trimmed[name_len..].starts_with(':');

            if is_definition {
                let name_start = line_start + indent;
                blocks.push(Block {
                    name: name_start..name_start + name_len,
                    body: name_start + name_len + 1..line_end,
                });
            } else if let Some(block) = blocks.last_mut() {
                block.body.end = line_end;
            } else {
                let start = line_start + indent;
                return Err((
                    "expecting a definition like `Name: expression`".to_owned(),
                    Span::new(start, start + trimmed.trim_end().len()),
                ));
            }
        }

        line_start = line_end + 1;
    }

    Ok(blocks)
}
