use ratatui::style::{Modifier, Style};

use super::scroll::NAV_KEYS_BLURB;
use super::ReportSink;
use crate::options::{Options, SPINNER};

/// Fills `sink` with the help screen: navigation keys pinned in the head,
/// then one line per option with its choices, the current one reversed.
pub fn write_help(sink: &mut dyn ReportSink, opts: &Options, is_root: bool) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let reversed = Style::default().add_modifier(Modifier::REVERSED);

    sink.add_header(
        "-- HELP SCREEN ['?' or ENTER closes Help; Ctrl-C exits ] --",
        bold,
        false,
    );
    for line in NAV_KEYS_BLURB.lines() {
        sink.add_header(line, Style::default(), false);
    }
    if !is_root {
        sink.add_body("Hint: install with \"sudo\" to show all PIDs", bold, false);
    }
    for entry in &SPINNER {
        sink.add_body(
            &format!("{:>3} - {}:", entry.key, entry.descr),
            Style::default(),
            false,
        );
        let (values, current) = opts.values(entry.choice);
        for (idx, value) in values.iter().enumerate() {
            sink.add_body(" ", Style::default(), true);
            let style = if idx == current { reversed } else { Style::default() };
            sink.add_body(value, style, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::PlainSink;

    #[test]
    fn lists_every_option() {
        let mut sink = PlainSink::new();
        write_help(&mut sink, &Options::default(), false);
        let lines = sink.lines();
        assert!(lines[0].starts_with("-- HELP SCREEN"));
        assert!(lines.iter().any(|l| l.contains("sudo")));
        assert!(lines.iter().any(|l| l == "  u - memory units: MB mB KB human"));
        assert!(lines.iter().any(|l| l == "  g - group by: exe cmd pid"));
        assert_eq!(sink.body_row_count(), SPINNER.len() + 1);
    }
}
