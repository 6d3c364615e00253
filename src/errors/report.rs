//! Pretty error reporting using ariadne.
//!
//! Rendering is a consumer of extents: offsets index the original source
//! text byte-for-byte, exactly as the lexer recorded them.

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::lexer::Extents;

/// Report a single error with source context.
pub fn report_error(
    filename: &str,
    source: &str,
    extents: Extents,
    message: &str,
    help: Option<&str>,
) {
    let offset = extents.start;

    let mut report = Report::build(ReportKind::Error, filename, offset)
        .with_message(message)
        .with_label(
            Label::new((filename, offset..extents.end.max(offset + 1)))
                .with_message(message)
                .with_color(Color::Red),
        );

    if let Some(h) = help {
        report = report.with_help(h);
    }

    let _ = report.finish().print((filename, Source::from(source)));
}

/// Report a warning with source context.
pub fn report_warning(filename: &str, source: &str, extents: Extents, message: &str) {
    let offset = extents.start;

    let _ = Report::build(ReportKind::Warning, filename, offset)
        .with_message(message)
        .with_label(
            Label::new((filename, offset..extents.end.max(offset + 1)))
                .with_message(message)
                .with_color(Color::Yellow),
        )
        .finish()
        .print((filename, Source::from(source)));
}
