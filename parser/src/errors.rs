use std::fmt::{Debug, Display, Formatter};
use std::io;

use thiserror::Error as ThisError;

use crate::parser::SourceCode;
use crate::report::{Level, ReportBuilder};
use crate::{Position, Span};

/// Maximum number of failed alternatives listed in the note of a syntax
/// error report, besides the one in the label.
const MAX_REPORTED_MESSAGES: usize = 15;

/// An error occurred while loading a grammar or parsing some input.
///
/// Each variant also contains additional pieces of information that are
/// relevant for that specific error. This information is usually contained
/// inside the detailed report itself, but having access to the individual
/// pieces is useful for applications that can't rely on text-based reports.
#[derive(Eq, PartialEq)]
pub struct Error(Box<ErrorInfo>);

impl Error {
    /// Returns a unique error code identifying the type of error.
    #[inline]
    pub fn code(&self) -> &'static str {
        self.0.code()
    }

    /// Returns additional information about the error.
    #[inline]
    pub fn info(&self) -> &ErrorInfo {
        self.0.as_ref()
    }

    /// Returns true if the error was found in a grammar, while loading it.
    pub fn is_grammar_error(&self) -> bool {
        matches!(
            self.info(),
            ErrorInfo::InvalidBnf { .. }
                | ErrorInfo::MissingDefinitions { .. }
                | ErrorInfo::DuplicateRule { .. }
        )
    }

    /// Returns true if the error was found while parsing some input.
    pub fn is_parse_error(&self) -> bool {
        !self.is_grammar_error()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Error {}

impl From<ErrorInfo> for Error {
    fn from(value: ErrorInfo) -> Self {
        Self(Box::new(value))
    }
}

/// Additional information about an error.
#[derive(Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorInfo {
    /// A grammar rule contains a malformed BNF expression.
    InvalidBnf {
        detailed_report: String,
        error_msg: String,
        error_span: Span,
    },

    /// Some rules are used in the grammar but never defined. The names are
    /// sorted and don't contain duplicates, `spans` contains the span of the
    /// first use of each name.
    MissingDefinitions {
        detailed_report: String,
        names: Vec<String>,
        spans: Vec<Span>,
    },

    /// Parsing was requested with a start rule that doesn't exist.
    UnknownRule { detailed_report: String, rule: String },

    /// The input doesn't match the grammar.
    ///
    /// `recognized_up_to` is the position where the match of the start rule
    /// ended, or where the mismatch was detected if it didn't match, and
    /// `farthest` is the farthest position ever consumed by the parser.
    SyntaxError {
        detailed_report: String,
        error_msg: String,
        error_span: Span,
        recognized_up_to: Position,
        farthest: Position,
    },

    /// A rule was re-entered at the same position without consuming any
    /// input, as in `A: A 'x'`.
    InfiniteRecursion {
        detailed_report: String,
        rule: String,
        error_span: Span,
    },

    /// The input is nested deeper than the configured limit.
    TooDeeplyNested {
        detailed_report: String,
        max_depth: usize,
        error_span: Span,
    },

    /// Two definitions in the same grammar have the same name.
    DuplicateRule {
        detailed_report: String,
        rule: String,
        new_rule_span: Span,
        existing_rule_span: Span,
    },

    /// The input is not valid UTF-8.
    InvalidUtf8 { detailed_report: String, error_span: Span },

    /// The input is larger than the parser accepts.
    InputTooLarge { detailed_report: String, size: usize, max_size: usize },
}

impl ErrorInfo {
    /// Returns a unique error code identifying the type of error.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorInfo::InvalidBnf { .. } => "E001",
            ErrorInfo::MissingDefinitions { .. } => "E002",
            ErrorInfo::UnknownRule { .. } => "E003",
            ErrorInfo::SyntaxError { .. } => "E004",
            ErrorInfo::InfiniteRecursion { .. } => "E005",
            ErrorInfo::TooDeeplyNested { .. } => "E006",
            ErrorInfo::DuplicateRule { .. } => "E007",
            ErrorInfo::InvalidUtf8 { .. } => "E008",
            ErrorInfo::InputTooLarge { .. } => "E009",
        }
    }

    /// Returns the full report describing the error.
    pub fn detailed_report(&self) -> &str {
        match self {
            ErrorInfo::InvalidBnf { detailed_report, .. }
            | ErrorInfo::MissingDefinitions { detailed_report, .. }
            | ErrorInfo::UnknownRule { detailed_report, .. }
            | ErrorInfo::SyntaxError { detailed_report, .. }
            | ErrorInfo::InfiniteRecursion { detailed_report, .. }
            | ErrorInfo::TooDeeplyNested { detailed_report, .. }
            | ErrorInfo::DuplicateRule { detailed_report, .. }
            | ErrorInfo::InvalidUtf8 { detailed_report, .. }
            | ErrorInfo::InputTooLarge { detailed_report, .. } => {
                detailed_report.as_str()
            }
        }
    }

    pub(crate) fn invalid_bnf(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        error_msg: String,
        error_span: Span,
    ) -> Self {
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E001",
            "invalid BNF expression",
            vec![(error_span.clone(), error_msg.clone(), Level::Error)],
            None,
        );
        Self::InvalidBnf { detailed_report, error_msg, error_span }
    }

    pub(crate) fn missing_definitions(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        names: Vec<String>,
        spans: Vec<Span>,
    ) -> Self {
        let title = format!(
            "missing definitions for {}",
            Self::join_with_and(&names, true)
        );
        let labels = names
            .iter()
            .zip(spans.iter())
            .map(|(name, span)| {
                (span.clone(), format!("`{}` is not defined", name), Level::Error)
            })
            .collect();
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E002",
            title.as_str(),
            labels,
            Some(
                "rules with an empty body are treated as parser extensions"
                    .to_owned(),
            ),
        );
        Self::MissingDefinitions { detailed_report, names, spans }
    }

    pub(crate) fn unknown_rule(
        report_builder: &ReportBuilder,
        rule: String,
        note: Option<String>,
    ) -> Self {
        let detailed_report = report_builder.create_report(
            &SourceCode::from(""),
            Level::Error,
            "E003",
            format!("unknown rule `{}`", rule).as_str(),
            vec![],
            note,
        );
        Self::UnknownRule { detailed_report, rule }
    }

    pub(crate) fn syntax_error(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        error_msg: String,
        error_span: Span,
        recognized_up_to: Position,
        farthest: Position,
    ) -> Self {
        // The message can contain one line per alternative that was tried,
        // the first one goes into the label and the rest into the note.
        let mut lines = error_msg.lines();
        let label = lines.next().unwrap_or("syntax error").to_owned();
        let rest: Vec<&str> = lines.collect();
        // The report shows a limited number of alternatives, `error_msg`
        // keeps all of them.
        let mut note = rest
            .iter()
            .take(MAX_REPORTED_MESSAGES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if rest.len() > MAX_REPORTED_MESSAGES {
            note.push_str(&format!(
                "\n... and {} more",
                rest.len() - MAX_REPORTED_MESSAGES
            ));
        }
        if !note.is_empty() {
            note.push('\n');
        }
        note.push_str(&format!(
            "recognized up to {}, the farthest position reached was {}",
            recognized_up_to, farthest
        ));
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E004",
            "syntax error",
            vec![(error_span.clone(), label, Level::Error)],
            Some(note),
        );
        Self::SyntaxError {
            detailed_report,
            error_msg,
            error_span,
            recognized_up_to,
            farthest,
        }
    }

    pub(crate) fn infinite_recursion(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        rule: String,
        error_span: Span,
    ) -> Self {
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E005",
            format!("infinite recursion in rule `{}`", rule).as_str(),
            vec![(
                error_span.clone(),
                format!("`{}` was entered again at this position", rule),
                Level::Error,
            )],
            Some(
                "left-recursive rules must consume some input before \
                 referencing themselves"
                    .to_owned(),
            ),
        );
        Self::InfiniteRecursion { detailed_report, rule, error_span }
    }

    pub(crate) fn too_deeply_nested(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        max_depth: usize,
        error_span: Span,
    ) -> Self {
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E006",
            "code is too deeply nested",
            vec![(error_span.clone(), "parser aborted here".to_owned(), Level::Error)],
            Some(format!(
                "the parser doesn't nest more than {} rules",
                max_depth
            )),
        );
        Self::TooDeeplyNested { detailed_report, max_depth, error_span }
    }

    pub(crate) fn duplicate_rule(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        rule: String,
        new_rule_span: Span,
        existing_rule_span: Span,
    ) -> Self {
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E007",
            format!("duplicate rule `{}`", rule).as_str(),
            vec![
                (
                    new_rule_span.clone(),
                    format!("duplicate declaration of `{}`", rule),
                    Level::Error,
                ),
                (
                    existing_rule_span.clone(),
                    format!("`{}` declared here for the first time", rule),
                    Level::Note,
                ),
            ],
            None,
        );
        Self::DuplicateRule {
            detailed_report,
            rule,
            new_rule_span,
            existing_rule_span,
        }
    }

    pub(crate) fn invalid_utf8(
        report_builder: &ReportBuilder,
        src: &SourceCode,
        error_span: Span,
    ) -> Self {
        let detailed_report = report_builder.create_report(
            src,
            Level::Error,
            "E008",
            "invalid UTF-8",
            vec![(error_span.clone(), "invalid UTF-8 character".to_owned(), Level::Error)],
            None,
        );
        Self::InvalidUtf8 { detailed_report, error_span }
    }

    pub(crate) fn input_too_large(
        report_builder: &ReportBuilder,
        origin: Option<&str>,
        size: usize,
        max_size: usize,
    ) -> Self {
        // The input itself is not included in the report.
        let mut src = SourceCode::from("");
        if let Some(origin) = origin {
            src = src.with_origin(origin);
        }
        let detailed_report = report_builder.create_report(
            &src,
            Level::Error,
            "E009",
            format!("input too large ({} bytes)", size).as_str(),
            vec![],
            Some(format!("the parser accepts up to {} bytes", max_size)),
        );
        Self::InputTooLarge { detailed_report, size, max_size }
    }

    /// Given a list of items, returns a string that joins them with commas
    /// and the word "and", as in "`A`, `B` and `C`".
    pub fn join_with_and<S: ToString>(s: &[S], quotes: bool) -> String {
        let strings = if quotes {
            s.iter()
                .map(|s| format!("`{}`", s.to_string()))
                .collect::<Vec<String>>()
        } else {
            s.iter().map(|s| s.to_string()).collect::<Vec<String>>()
        };

        match strings.len() {
            0 => String::new(),
            1 => strings[0].to_owned(),
            l => format!(
                "{} and {}",
                strings[..l - 1].join(", "),
                strings[l - 1]
            ),
        }
    }
}

impl Debug for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.detailed_report())
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.detailed_report())
    }
}

/// Errors returned while loading a grammar from a file.
#[derive(ThisError, Debug)]
pub enum LoadError {
    #[error("can't read grammar file `{path}`")]
    Io {
        path: String,
        #[source]
        err: io::Error,
    },

    #[error(transparent)]
    Grammar(#[from] Error),
}
