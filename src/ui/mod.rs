pub mod help;
pub mod popup;
pub mod report;
pub mod scroll;
pub mod viewport;

use std::io::Write;

use ratatui::style::Style;

/// Destination for the lines of one report.
///
/// Head lines stay pinned above the rule; body lines scroll. `resume`
/// continues the previous line instead of starting a new one.
pub trait ReportSink {
    fn add_header(&mut self, text: &str, style: Style, resume: bool);
    fn add_body(&mut self, text: &str, style: Style, resume: bool);
    fn body_row_count(&self) -> usize;
    fn is_windowed(&self) -> bool;
    /// Body rows that fit on screen below the current head lines.
    fn view_rows(&self) -> Option<usize> {
        None
    }
}

/// Collects a report as plain text for stdout; styles are dropped.
#[derive(Debug, Default)]
pub struct PlainSink {
    lines: Vec<String>,
    body_rows: usize,
}

impl PlainSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Writes the buffered report followed by a blank line and empties it.
    pub fn flush_to(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        for line in self.lines.drain(..) {
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;
        self.body_rows = 0;
        out.flush()
    }

    fn push(&mut self, text: &str, resume: bool) {
        match self.lines.last_mut() {
            Some(last) if resume => last.push_str(text),
            _ => self.lines.push(text.to_string()),
        }
    }
}

impl ReportSink for PlainSink {
    fn add_header(&mut self, text: &str, _style: Style, resume: bool) {
        self.push(text, resume);
    }

    fn add_body(&mut self, text: &str, _style: Style, resume: bool) {
        if !resume {
            self.body_rows += 1;
        }
        self.push(text, resume);
    }

    fn body_row_count(&self) -> usize {
        self.body_rows
    }

    fn is_windowed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests;
