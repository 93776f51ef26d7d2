use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::memory::summary::{Category, Summary};
use crate::options::Units;

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

/// Concise size: `512.0K`, `1.5G`; zero and below print as `0`.
pub fn human(bytes: f64) -> String {
    if bytes <= 0.0 {
        return "0".to_string();
    }
    let mut number = bytes / 1024.0;
    for suffix in ['K', 'M', 'G'] {
        if number < 999.95 {
            return format!("{number:.1}{suffix}");
        }
        number /= 1024.0;
    }
    format!("{number:.1}T")
}

pub fn with_commas(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// A KiB amount in the chosen display unit, without padding.
pub fn format_kb(kb: u64, units: Units) -> String {
    let bytes = kb as f64 * 1024.0;
    match units {
        Units::Human => human(bytes),
        _ => with_commas((bytes / units.divisor() as f64).round() as u64),
    }
}

/// One numeric column of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    CpuPct,
    Pswap,
    Category(Category),
    /// Every category but data, when collapsed.
    Other,
    Ptotal,
    Pss,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::CpuPct => "cpu_pct",
            Column::Pswap => "pswap",
            Column::Category(cat) => cat.label(),
            Column::Other => "other",
            Column::Ptotal => "ptotal",
            Column::Pss => "pss",
        }
    }

    fn kb(self, summary: &Summary) -> u64 {
        match self {
            Column::CpuPct => 0,
            Column::Pswap => summary.pswap,
            Column::Category(cat) => summary.category(cat),
            Column::Other => summary.other(),
            Column::Ptotal => summary.ptotal,
            Column::Pss => summary.pss,
        }
    }

    fn cell(self, summary: &Summary, units: Units) -> String {
        let width = units.field_width();
        match self {
            Column::CpuPct => format!("{:>width$.1}", summary.cpu_pct),
            _ => format!("{:>width$}", format_kb(self.kb(summary), units)),
        }
    }
}

/// The report columns, left to right.
pub fn columns(cpu: bool, light: bool, debug: bool) -> Vec<Column> {
    let mut cols = Vec::new();
    if cpu {
        cols.push(Column::CpuPct);
    }
    cols.push(Column::Pswap);
    if light {
        cols.push(Column::Other);
        cols.push(Column::Category(Category::Data));
    } else {
        cols.extend(Category::ALL.map(Column::Category));
    }
    cols.push(Column::Ptotal);
    if debug {
        cols.push(Column::Pss);
    }
    cols
}

pub fn header_line(cols: &[Column], units: Units, numbers: bool) -> String {
    let width = units.field_width();
    let mut line = String::new();
    if numbers {
        line.push_str("   #");
    }
    for col in cols {
        line.push_str(&format!("{:>width$}", col.header()));
    }
    line
}

/// `<numbers><cells> <lead> <count> <info>`
pub fn summary_line(
    cols: &[Column],
    units: Units,
    number: Option<usize>,
    lead: &str,
    summary: &Summary,
) -> String {
    let mut line = String::new();
    if let Some(number) = number {
        line.push_str(&format!("{number:>4}"));
    }
    for col in cols {
        line.push_str(&col.cell(summary, units));
    }
    line.push_str(&format!(" {lead} {} {}", summary.count_label(), summary.info));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_debug_snapshot;

    #[test]
    fn human_sizes() {
        assert_eq!(human(0.0), "0");
        assert_eq!(human(-5.0), "0");
        assert_eq!(human(1024.0), "1.0K");
        assert_eq!(human(1536.0 * 1024.0), "1.5M");
        assert_eq!(human(1023.0 * 1024.0 * 1024.0), "1.0G");
        assert_eq!(human(5.0 * 1024f64.powi(5)), "5120.0T");
    }

    #[test]
    fn commas() {
        assert_eq!(with_commas(0), "0");
        assert_eq!(with_commas(999), "999");
        assert_eq!(with_commas(1000), "1,000");
        assert_eq!(with_commas(1234567), "1,234,567");
    }

    #[test]
    fn kb_in_units() {
        assert_eq!(format_kb(2048, Units::Mebibytes), "2");
        assert_eq!(format_kb(2048, Units::Kibibytes), "2,048");
        assert_eq!(format_kb(1_000_000, Units::Megabytes), "1,024");
        assert_eq!(format_kb(1536, Units::Human), "1.5M");
    }

    #[test]
    fn column_layouts() {
        let light: Vec<&str> = columns(true, true, false).iter().map(|c| c.header()).collect();
        assert_debug_snapshot!(light, @r#"
        [
            "cpu_pct",
            "pswap",
            "other",
            "data",
            "ptotal",
        ]
        "#);
        let full: Vec<&str> = columns(false, false, true).iter().map(|c| c.header()).collect();
        assert_debug_snapshot!(full, @r#"
        [
            "pswap",
            "shSYSV",
            "shOth",
            "stack",
            "text",
            "data",
            "ptotal",
            "pss",
        ]
        "#);
    }

    #[test]
    fn summary_line_layout() {
        let mut summary = Summary::labeled("firefox");
        summary.cpu_pct = 3.3;
        summary.data = 4096;
        summary.text = 1024;
        summary.ptotal = 5120;
        summary.number = 3;
        let cols = columns(true, true, false);
        let line = summary_line(&cols, Units::Mebibytes, Some(7), "A", &summary);
        assert_eq!(
            line,
            "   7     3.3       0       1       4       5 A 3x firefox"
        );
        assert_eq!(
            header_line(&cols, Units::Mebibytes, false),
            " cpu_pct   pswap   other    data  ptotal"
        );
    }

    #[test]
    fn truncates_wide_text() {
        assert_eq!(truncate_unicode("hello", 10), "hello");
        assert_eq!(truncate_unicode("hello world", 6), "hello\u{2026}");
    }
}
