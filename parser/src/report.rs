use std::borrow::Cow;
use std::ops::Range;

use annotate_snippets::{Renderer, Snippet};

use crate::parser::SourceCode;
use crate::Span;

pub type Level = annotate_snippets::Level;

/// Builds error reports.
///
/// `ReportBuilder` creates error reports with annotated code snippets
/// obtained from a [`SourceCode`]. The same builder is used for reports about
/// grammar files and reports about the input being parsed, the only
/// difference is the source code passed to [`ReportBuilder::create_report`].
#[derive(Clone, Debug, Default)]
pub struct ReportBuilder {
    with_colors: bool,
}

impl ReportBuilder {
    /// Creates a new instance of [`ReportBuilder`].
    pub fn new() -> Self {
        Self { with_colors: false }
    }

    /// Indicates whether the reports should have colors. By default, this is
    /// `false`.
    pub fn with_colors(&mut self, yes: bool) -> &mut Self {
        self.with_colors = yes;
        self
    }

    /// Creates a new error report for the given source code.
    pub fn create_report(
        &self,
        src: &SourceCode,
        level: Level,
        code: &str,
        title: &str,
        labels: Vec<(Span, String, Level)>,
        note: Option<String>,
    ) -> String {
        let text = printable_source(src);
        let origin = src.origin.as_deref().unwrap_or("line");

        let mut message = level.title(title).id(code);

        // An empty source has nothing to annotate, the report consists of
        // the title and the note only.
        if !text.is_empty() {
            let mut snippet = Snippet::source(&text).origin(origin).fold(true);

            for (span, label, level) in &labels {
                snippet = snippet.annotation(
                    level
                        .span(clamp(span.range(), text.len()))
                        .label(label.as_str()),
                );
            }

            message = message.snippet(snippet);
        }

        if let Some(note) = &note {
            message = message.footer(Level::Note.title(note.as_str()));
        }

        let renderer = if self.with_colors {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let report = renderer.render(message);
        report.to_string()
    }
}

/// Returns the text that will be shown in reports for the given source.
///
/// Invalid UTF-8 sequences are replaced with the replacement character, and
/// tabs are replaced with a single space. Tabs don't affect code spans, as
/// the number of bytes remains the same, but they would cause the carets in
/// the report to be misaligned.
fn printable_source<'a>(src: &SourceCode<'a>) -> Cow<'a, str> {
    let text = match src.valid {
        Some(s) => Cow::Borrowed(s),
        None => String::from_utf8_lossy(src.raw.as_ref()),
    };
    if text.contains('\t') {
        Cow::Owned(text.replace('\t', " "))
    } else {
        text
    }
}

fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    range.start.min(len)..range.end.min(len)
}
