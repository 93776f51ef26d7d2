use std::collections::HashMap;

use chrono::NaiveTime;
use ratatui::style::{Modifier, Style};

use super::ReportSink;
use crate::aggregate::rows::{Row, RowTag};
use crate::format::{columns, header_line, human, summary_line};
use crate::memory::summary::Summary;
use crate::options::Options;
use crate::system::collector::PollStats;
use crate::system::meminfo::{MemInfo, ZramProjection};

/// Everything the lines above the column header show.
pub struct TopOfReport<'a> {
    pub now: NaiveTime,
    pub loop_num: u64,
    pub meminfo: &'a MemInfo,
    pub zram: Option<&'a ZramProjection>,
    pub stats: &'a PollStats,
    /// Memory attributed to reported groups; 0 hides `Oth=`.
    pub app_kb: u64,
    pub opts: &'a Options,
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn kb(kb: u64) -> String {
    human(kb as f64 * 1024.0)
}

pub fn write_top(sink: &mut dyn ReportSink, top: &TopOfReport) {
    let plain = Style::default();
    let stamp = top.now.format("%H:%M:%S").to_string();
    let stamp = if sink.is_windowed() {
        stamp
    } else {
        format!("--- {stamp}")
    };
    let stamp_style = if top.loop_num % 2 == 1 { bold() } else { plain };
    sink.add_header(&stamp, stamp_style, false);

    let mem = top.meminfo;
    let mut leader = format!(
        " Tot={} Used={} Avail={}",
        kb(mem.total_kb),
        kb(mem.used_kb()),
        kb(mem.available_kb)
    );
    if top.app_kb > 0 {
        let other = mem.total_kb as i64
            - top.app_kb as i64
            - mem.available_kb as i64
            - mem.shmem_kb as i64;
        leader.push_str(&format!(" Oth={}", human(other as f64 * 1024.0)));
    }
    leader.push_str(&format!(" Sh+Tmp={}", kb(mem.shmem_kb)));
    let stats = top.stats;
    if stats.wanted_pids < stats.user_pids {
        leader.push_str(&format!(" PIDs={}/{}", stats.wanted_pids, stats.user_pids));
    } else {
        leader.push_str(&format!(" PIDs={}", stats.user_pids));
    }
    if top.opts.search.is_empty() {
        sink.add_header(&leader, plain, true);
    } else {
        sink.add_header(&format!("{leader} /"), plain, true);
        sink.add_header(
            &top.opts.search,
            Style::default().add_modifier(Modifier::UNDERLINED),
            true,
        );
        sink.add_header("/", plain, true);
    }

    if let Some(zram) = top.zram {
        let mut resume = false;
        if top.opts.cpu {
            sink.add_header(&format!("{:8.1}/ker ", stats.kernel_cpu), plain, false);
            resume = true;
        }
        sink.add_header(
            &format!(" zRAM={}", human(zram.zram_used as f64)),
            bold(),
            resume,
        );
        sink.add_header(
            &format!(
                " eTot:{} eUsed:{} eAvail:{}",
                zram.human_pct(zram.e_max_used),
                zram.human_pct(zram.e_used),
                zram.human_pct(zram.e_avail)
            ),
            plain,
            true,
        );
    } else if top.opts.cpu {
        let mut line = format!("{:8.1}/ker", stats.kernel_cpu);
        for busy in &stats.top_kernel {
            line.push_str(&format!("    {:.2}% {}", busy.percent, busy.nickname));
        }
        sink.add_header(&line, plain, false);
    }
}

/// The placeholder shown while a first or regrouped poll runs.
pub fn write_working(sink: &mut dyn ReportSink, top: &TopOfReport, is_root: bool) {
    write_top(sink, top);
    let plain = Style::default();
    sink.add_body(
        "   WORKING .... be patient ;-)",
        Style::default().add_modifier(Modifier::REVERSED),
        false,
    );
    sink.add_body("   HINTS:", plain, false);
    sink.add_body("     - Type \"?\" to open Help Screen", plain, false);
    sink.add_body("     - Type \"Ctrl-C\" to exit program", plain, false);
    if !is_root {
        sink.add_body("     - Install with \"sudo\" to show all PIDs!", bold(), false);
    }
}

/// The bold column header and the totals row, both pinned in the head.
pub fn write_column_header(sink: &mut dyn ReportSink, opts: &Options, grand: &Summary) {
    let cols = columns(opts.cpu, opts.light, opts.debug);
    let header = header_line(&cols, opts.units, opts.numbers);
    sink.add_header(
        &format!(
            "{header}   key/info ({} by {})",
            opts.group_by.label(),
            opts.effective_sort().label()
        ),
        bold(),
        false,
    );
    sink.add_header(
        &summary_line(
            &cols,
            opts.units,
            opts.numbers.then_some(0),
            &RowTag::Total.lead(),
            grand,
        ),
        Style::default(),
        false,
    );
}

/// Writes the report rows; returns the group key behind each body line.
pub fn write_rows(sink: &mut dyn ReportSink, opts: &Options, rows: &[Row]) -> HashMap<usize, String> {
    let cols = columns(opts.cpu, opts.light, opts.debug);
    let mut by_line = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if let Some(key) = &row.key
            && row.tag != RowTag::Removed
        {
            by_line.insert(sink.body_row_count(), key.clone());
        }
        let style = if row.highlight {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let number = opts.numbers.then_some(idx + 1);
        let line = summary_line(&cols, opts.units, number, &row.tag.lead(), &row.summary);
        sink.add_body(&line, style, false);
    }
    by_line
}
