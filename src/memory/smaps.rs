use super::summary::{Category, Summary};

/// One mapping from a `/proc/<pid>/smaps` listing, sizes in KiB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryChunk {
    pub begin: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    /// Backing path or pseudo-name such as `[stack]`; empty for anonymous maps.
    pub tag: String,
    pub size_kb: u64,
    pub rss_kb: u64,
    pub pss_kb: u64,
    pub shared_kb: u64,
    pub private_kb: u64,
    pub swap_kb: u64,
    pub swap_pss_kb: u64,
    pub category: Option<Category>,
    pub effective_kb: u64,
}

/// A line that matched none of the known shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// 1-based.
    pub line_no: usize,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ParseOutcome<T> {
    pub value: T,
    pub anomalies: usize,
    pub first_anomaly: Option<Anomaly>,
}

impl<T> ParseOutcome<T> {
    fn record(&mut self, line_no: usize, line: &str) {
        if self.first_anomaly.is_none() {
            self.first_anomaly = Some(Anomaly {
                line_no,
                text: line.to_string(),
            });
        }
        self.anomalies += 1;
    }
}

#[derive(Debug, PartialEq)]
enum SmapsLine<'a> {
    Section(MemoryChunk),
    Item(&'a str, u64),
    Ignorable,
    Unknown,
}

const IGNORABLE_PREFIXES: [&str; 3] = ["thpeligible", "vmflags", "protectionkey"];

fn split_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(idx) => Some((&s[..idx], &s[idx..])),
        None => Some((s, "")),
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn parse_section(line: &str) -> Option<MemoryChunk> {
    let (range, rest) = split_field(line)?;
    let (perms, rest) = split_field(rest)?;
    let (offset, rest) = split_field(rest)?;
    let (_device, rest) = split_field(rest)?;
    let (inode, rest) = split_field(rest)?;

    let (begin, end) = range.split_once('-')?;
    let begin = u64::from_str_radix(begin, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    if !perms
        .chars()
        .all(|c| c.is_ascii_lowercase() || c == '-')
    {
        return None;
    }
    let offset = u64::from_str_radix(offset, 16).ok()?;
    if !inode.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(MemoryChunk {
        begin,
        end,
        perms: perms.to_string(),
        offset,
        tag: rest.trim().to_string(),
        ..MemoryChunk::default()
    })
}

fn parse_item(line: &str) -> Option<(&str, u64)> {
    let (tag, rest) = line.split_once(':')?;
    if !is_word(tag) {
        return None;
    }
    let mut words = rest.split_whitespace();
    let value = words.next()?.parse().ok()?;
    let unit = words.next()?;
    if !unit.eq_ignore_ascii_case("kb") || words.next().is_some() {
        return None;
    }
    Some((tag, value))
}

fn classify_line(line: &str) -> SmapsLine<'_> {
    if let Some((tag, value)) = parse_item(line) {
        return SmapsLine::Item(tag, value);
    }
    if let Some(chunk) = parse_section(line) {
        return SmapsLine::Section(chunk);
    }
    let lower = line.trim_start().to_ascii_lowercase();
    if IGNORABLE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return SmapsLine::Ignorable;
    }
    SmapsLine::Unknown
}

fn apply_item(chunk: &mut MemoryChunk, tag: &str, value: u64) {
    match tag {
        "Size" => chunk.size_kb = value,
        "Rss" => chunk.rss_kb = value,
        "Pss" => chunk.pss_kb = value,
        "Swap" => chunk.swap_kb = value,
        "SwapPss" => chunk.swap_pss_kb = value,
        t if t.starts_with("Shared") => chunk.shared_kb += value,
        t if t.starts_with("Private") => chunk.private_kb += value,
        _ => {}
    }
}

/// Parses a detailed smaps listing into chunks in address order.
///
/// Never fails: lines of unknown shape, and item lines seen before any
/// section line, are counted as anomalies and skipped.
pub fn parse_smaps(text: &str) -> ParseOutcome<Vec<MemoryChunk>> {
    let mut out: ParseOutcome<Vec<MemoryChunk>> = ParseOutcome::default();
    let mut current: Option<MemoryChunk> = None;

    for (idx, line) in text.lines().enumerate() {
        match classify_line(line) {
            SmapsLine::Section(chunk) => {
                if let Some(done) = current.replace(chunk) {
                    out.value.push(done);
                }
            }
            SmapsLine::Item(tag, value) => match current.as_mut() {
                Some(chunk) => apply_item(chunk, tag, value),
                None => out.record(idx + 1, line),
            },
            SmapsLine::Ignorable => {}
            SmapsLine::Unknown => {
                if !line.trim().is_empty() {
                    out.record(idx + 1, line);
                }
            }
        }
    }
    if let Some(done) = current {
        out.value.push(done);
    }
    out
}

/// Parses `/proc/<pid>/smaps_rollup` into a summary.
///
/// Swapped PSS only counts toward the total when compressed swap is in use,
/// since then it still occupies RAM.
pub fn parse_rollup(text: &str, pid: u32, zram_active: bool) -> ParseOutcome<Summary> {
    let mut out = ParseOutcome {
        value: Summary::for_pid(pid),
        anomalies: 0,
        first_anomaly: None,
    };

    for (idx, line) in text.lines().enumerate() {
        if !line.trim_end().ends_with("kB") {
            continue;
        }
        let Some((tag, value)) = parse_item(line) else {
            out.record(idx + 1, line);
            continue;
        };
        let summary = &mut out.value;
        match tag {
            "Pss_Anon" => {
                summary.data += value;
                summary.ptotal += value;
            }
            "Pss_File" => {
                summary.text += value;
                summary.ptotal += value;
            }
            "Pss_Shmem" => {
                summary.shared_other += value;
                summary.ptotal += value;
            }
            "SwapPss" => {
                summary.pswap += value;
                if zram_active {
                    summary.ptotal += value;
                }
            }
            _ => {}
        }
    }
    out.value.pss = out.value.ptotal;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const INETREP: &str = "\
00400000-004b8000 r-xp 00000000 fd:00 11143998     /opt/app/bin/inetrep
Size:                736 kB
Rss:                 592 kB
Pss:                  87 kB
Shared_Clean:        592 kB
Shared_Dirty:          0 kB
Private_Clean:         0 kB
Referenced:          592 kB
Anonymous:             0 kB
AnonHugePages:         0 kB
Swap:                  0 kB
KernelPageSize:        4 kB
MMUPageSize:           4 kB
VmFlags: rd ex mr mw me dw
";

    #[test]
    fn parses_section_and_items() {
        let out = parse_smaps(INETREP);
        assert_eq!(out.anomalies, 0);
        assert_eq!(out.value.len(), 1);
        let chunk = &out.value[0];
        assert_eq!(chunk.begin, 0x400000);
        assert_eq!(chunk.end, 0x4b8000);
        assert_eq!(chunk.perms, "r-xp");
        assert_eq!(chunk.tag, "/opt/app/bin/inetrep");
        assert_eq!(chunk.size_kb, 736);
        assert_eq!(chunk.rss_kb, 592);
        assert_eq!(chunk.pss_kb, 87);
        assert_eq!(chunk.shared_kb, 592);
        assert_eq!(chunk.private_kb, 0);
        assert_eq!(chunk.category, None);
    }

    #[test]
    fn section_without_path_has_empty_tag() {
        let out = parse_smaps("7f0000000000-7f0000004000 rw-p 00000000 00:00 0 \nRss: 16 kB\n");
        assert_eq!(out.value[0].tag, "");
        assert_eq!(out.value[0].rss_kb, 16);
    }

    #[test]
    fn path_with_spaces_is_kept_whole() {
        let out = parse_smaps("1000-2000 r--p 00000000 08:01 77 /tmp/my file (deleted)\n");
        assert_eq!(out.value[0].tag, "/tmp/my file (deleted)");
    }

    #[test]
    fn private_and_shared_variants_are_summed() {
        let text = "\
1000-2000 rw-p 00000000 00:00 0
Shared_Clean: 4 kB
Shared_Dirty: 8 kB
Shared_Hugetlb: 1 kB
Private_Clean: 16 kB
Private_Dirty: 32 kB
Private_Hugetlb: 2 kB
";
        let chunk = &parse_smaps(text).value[0];
        assert_eq!(chunk.shared_kb, 13);
        assert_eq!(chunk.private_kb, 50);
    }

    #[test]
    fn anomalies_are_counted_not_fatal() {
        let text = "\
Rss: 4 kB
1000-2000 rw-p 00000000 00:00 0
garbage here
Rss: 8 kB
also garbage
";
        let out = parse_smaps(text);
        assert_eq!(out.value.len(), 1);
        assert_eq!(out.value[0].rss_kb, 8);
        assert_eq!(out.anomalies, 3);
        assert_eq!(
            out.first_anomaly,
            Some(Anomaly {
                line_no: 1,
                text: "Rss: 4 kB".to_string()
            })
        );
    }

    #[test]
    fn ignorable_lines_are_case_insensitive() {
        let text = "1000-2000 rw-p 00000000 00:00 0\nTHPeligible: 0\nprotectionkey: 0\n";
        assert_eq!(parse_smaps(text).anomalies, 0);
    }

    #[test]
    fn rollup_maps_pss_kinds_to_categories() {
        let text = "\
55d6c1a00000-7ffd3b5fe000 ---p 00000000 00:00 0                          [rollup]
Rss:                5000 kB
Pss:                3000 kB
Pss_Anon:           2000 kB
Pss_File:            700 kB
Pss_Shmem:           300 kB
SwapPss:             400 kB
";
        let plain = parse_rollup(text, 77, false).value;
        assert_eq!(plain.data, 2000);
        assert_eq!(plain.text, 700);
        assert_eq!(plain.shared_other, 300);
        assert_eq!(plain.pswap, 400);
        assert_eq!(plain.ptotal, 3000);
        assert_eq!(plain.pss, 3000);
        assert_eq!(plain.number, -77);

        let zram = parse_rollup(text, 77, true).value;
        assert_eq!(zram.ptotal, 3400);
        assert_eq!(zram.pss, 3400);
    }
}
