//! Error rendering using ariadne
//!
//! Script errors carry their location as a `<file>:<line>:` prefix. When that
//! prefix names the source being rendered, the offending line is shown with a
//! label; any other report is printed as a single line.

use crate::{ErrorCode, ErrorReport};
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;
use std::ops::Range;

/// Character set for rendering error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSet {
    /// Use Unicode characters for rich visual output.
    #[default]
    Unicode,
    /// Use ASCII-only characters for compatibility.
    Ascii,
}

/// Configuration for error rendering.
#[derive(Debug, Clone)]
pub struct RenderConfig<'a> {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
    /// The file name the script was compiled under.
    /// Defaults to "<unknown>" if not provided.
    pub filename: Option<&'a str>,
    /// The character set to use for rendering.
    /// Defaults to Unicode for rich visual output.
    pub charset: CharSet,
}

impl Default for RenderConfig<'_> {
    fn default() -> Self {
        RenderConfig::default()
    }
}

impl RenderConfig<'_> {
    const fn default() -> Self {
        Self {
            color: true,
            filename: None,
            charset: CharSet::Unicode,
        }
    }
}

/// Render a report to stderr using the default config.
///
/// # Example
/// ```no_run
/// use scriptvisor::{PreludeHooks, ScriptHost, render_error};
///
/// let host = ScriptHost::default();
/// let source = "return = 1";
/// let prelude = host
///     .compile_prelude(source, "<unknown>", PreludeHooks::default())
///     .unwrap()
///     .unwrap();
/// for report in host.errors(prelude).unwrap() {
///     render_error(&report, source);
/// }
/// ```
pub fn render_error(report: &ErrorReport, source: &str) {
    render_error_to(report, source, &mut std::io::stderr(), &RenderConfig::default()).ok();
}

/// Render a report about `source` to a writer with the given configuration.
pub fn render_error_to(
    report: &ErrorReport,
    source: &str,
    writer: &mut dyn Write,
    config: &RenderConfig,
) -> std::io::Result<()> {
    let filename = config.filename.unwrap_or("<unknown>");

    let message = match (report.code, &report.message) {
        (ErrorCode::ScriptException, Some(message)) => message,
        _ => return writeln!(writer, "{}: {report}", code_label(report.code)),
    };

    match locate(filename, message, source) {
        Some((span, detail)) => render_located(report.code, span, detail, source, writer, config, filename),
        None => writeln!(writer, "{}: {message}", code_label(report.code)),
    }
}

fn code_label(code: ErrorCode) -> String {
    format!("[E{:03}] Error", code.as_i32())
}

/// Split `<filename>:<line>: detail` into the span of that line in `source`
/// (without its indentation) and the detail.
fn locate<'m>(filename: &str, message: &'m str, source: &str) -> Option<(Range<usize>, &'m str)> {
    let rest = message.strip_prefix(filename)?.strip_prefix(':')?;
    let (line, detail) = rest.split_once(':')?;
    let line: usize = line.parse().ok()?;

    let mut offset = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let content = text.trim_end_matches(['\n', '\r']);
            let indent = content.len() - content.trim_start().len();
            if content.trim().is_empty() {
                return None;
            }
            let start = offset + indent;
            return Some((start..offset + content.len(), detail.trim_start()));
        }
        offset += text.len();
    }
    None
}

fn render_located(
    code: ErrorCode,
    span: Range<usize>,
    detail: &str,
    source: &str,
    writer: &mut dyn Write,
    config: &RenderConfig,
    filename: &str,
) -> std::io::Result<()> {
    let mut colors = ColorGenerator::new();
    colors.next(); // Skip the first color.

    let ariadne_charset = match config.charset {
        CharSet::Unicode => ariadne::CharSet::Unicode,
        CharSet::Ascii => ariadne::CharSet::Ascii,
    };
    let ariadne_config = ariadne::Config::default()
        .with_color(config.color)
        .with_char_set(ariadne_charset);

    let color = colors.next();
    Report::build(ReportKind::Error, (filename, span.clone()))
        .with_code(format!("E{:03}", code.as_i32()))
        .with_message(detail)
        .with_config(ariadne_config)
        .with_label(
            Label::new((filename, span))
                .with_message(detail)
                .with_color(color),
        )
        .finish()
        .write((filename, Source::from(source)), &mut *writer)
}
