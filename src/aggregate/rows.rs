use std::cmp::Reverse;

use super::group::{GroupAccumulator, GroupAggregator};
use crate::format::with_commas;
use crate::memory::summary::Summary;
use crate::options::SortBy;

/// The lead column of a report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTag {
    Added,
    Changed(i64),
    Unchanged,
    Others,
    Removed,
    Total,
}

impl RowTag {
    pub fn lead(&self) -> String {
        match self {
            RowTag::Added => "A".to_string(),
            RowTag::Changed(delta) => {
                let sign = if *delta < 0 { '-' } else { '+' };
                format!("{sign}{}K", with_commas(delta.unsigned_abs()))
            }
            RowTag::Unchanged => " ".to_string(),
            RowTag::Others => "O".to_string(),
            RowTag::Removed => "x".to_string(),
            RowTag::Total => "T".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub tag: RowTag,
    pub summary: Summary,
    /// The group behind the row; pseudo rows have none.
    pub key: Option<String>,
    pub highlight: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RowOptions<'a> {
    pub sort_by: SortBy,
    pub rise_to_top: bool,
    pub top_pct: u32,
    pub search: &'a str,
    /// Body rows available when fitting to the window.
    pub budget: Option<usize>,
    pub windowed: bool,
    pub is_first: bool,
}

fn sorted_alive<'a>(agg: &'a GroupAggregator, opts: &RowOptions) -> Vec<&'a GroupAccumulator> {
    let mut groups: Vec<&GroupAccumulator> = agg.alive_groups().collect();
    match opts.sort_by {
        SortBy::Cpu => groups.sort_by_key(|g| {
            (
                Reverse((g.cpu_pct() * 10.0).round() as i64),
                g.key.to_lowercase(),
            )
        }),
        SortBy::Name => groups.sort_by_key(|g| g.key.to_lowercase()),
        SortBy::Mem => groups.sort_by_key(|g| Reverse((g.changed && opts.rise_to_top, g.ptotal()))),
    }
    groups
}

/// Orders the alive groups and cuts them down to what fits.
///
/// Groups past the budget or the top-percent cutoff fold into one OTHERS
/// row; groups that died this poll follow as removed rows while room
/// remains.
pub fn build_rows(agg: &GroupAggregator, grand: &Summary, opts: &RowOptions) -> Vec<Row> {
    let limit = opts.budget.unwrap_or(usize::MAX);
    let ptotal_limit = grand.ptotal as f64 * f64::from(opts.top_pct) / 100.0 * 1.001;

    let mut rows = Vec::new();
    let mut running = Summary::labeled("---- RUNNING ----");
    let mut others: Option<Summary> = None;
    let mut shown = 0usize;

    for group in sorted_alive(agg, opts) {
        let Some(summary) = &group.summary else {
            continue;
        };
        summary.add_into(&mut running);
        if summary.info.contains(opts.search)
            && shown < limit.saturating_sub(1)
            && running.ptotal as f64 <= ptotal_limit
        {
            if group.is_new || group.changed || opts.windowed {
                let tag = if group.is_new {
                    RowTag::Added
                } else if group.changed {
                    RowTag::Changed(group.delta_kb)
                } else {
                    RowTag::Unchanged
                };
                rows.push(Row {
                    highlight: !opts.is_first && (group.is_new || group.changed),
                    tag,
                    summary: summary.clone(),
                    key: Some(group.key.clone()),
                });
                shown += 1;
            }
        } else if opts.is_first || opts.windowed {
            summary.add_into(others.get_or_insert_with(|| Summary::labeled("---- OTHERS ----")));
        }
    }
    if let Some(others) = others {
        rows.push(Row {
            tag: RowTag::Others,
            summary: others,
            key: None,
            highlight: false,
        });
    }

    let mut remainder = limit.saturating_sub(rows.len());
    for group in agg.groups().filter(|g| !g.alive) {
        if remainder == 0 {
            break;
        }
        if let Some(prev) = &group.prev_summary {
            remainder -= 1;
            rows.push(Row {
                tag: RowTag::Removed,
                summary: prev.clone(),
                key: Some(group.key.clone()),
                highlight: false,
            });
        }
    }
    rows
}
