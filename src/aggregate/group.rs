use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::memory::summary::{Summary, crosses_threshold};
use crate::options::{GroupBy, Options};

/// Supplies the expensive, fully classified summary of one process.
pub trait DetailSource {
    /// `None` when the process's map can no longer be read.
    fn detailed_summary(&mut self, pid: u32) -> Option<Summary>;
}

/// The aggregation knobs taken from the options each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateConfig {
    pub group_by: GroupBy,
    pub light: bool,
    pub min_delta_kb: i64,
}

impl AggregateConfig {
    pub fn from_options(opts: &Options) -> Self {
        AggregateConfig {
            group_by: opts.group_by,
            light: opts.light,
            min_delta_kb: opts.min_delta_kb,
        }
    }
}

/// Per-group state carried across polls.
#[derive(Debug, Clone, Default)]
pub struct GroupAccumulator {
    pub key: String,
    pub is_new: bool,
    pub alive: bool,
    pub changed: bool,
    pub members: BTreeSet<u32>,
    pub prev_members: BTreeSet<u32>,
    pub rollup: Option<Summary>,
    pub prev_rollup: Option<Summary>,
    /// Either computed this poll or the last shown summary carried over.
    pub summary: Option<Summary>,
    /// The summary last shown as changed.
    pub prev_summary: Option<Summary>,
    pub first_summary: Option<Summary>,
    pub delta_kb: i64,
    pub growth_pct: f64,
    resolved_poll: u64,
}

impl GroupAccumulator {
    fn new(key: &str) -> Self {
        GroupAccumulator {
            key: key.to_string(),
            is_new: true,
            ..GroupAccumulator::default()
        }
    }

    pub fn ptotal(&self) -> u64 {
        self.summary.as_ref().map(|s| s.ptotal).unwrap_or(0)
    }

    pub fn cpu_pct(&self) -> f64 {
        self.summary.as_ref().map(|s| s.cpu_pct).unwrap_or(0.0)
    }

    pub fn info(&self) -> &str {
        self.summary
            .as_ref()
            .map(|s| s.info.as_str())
            .unwrap_or(&self.key)
    }
}

/// Folds processes into groups and decides which groups deserve a full
/// reclassification this poll.
#[derive(Debug)]
pub struct GroupAggregator {
    groups: BTreeMap<String, GroupAccumulator>,
    config: AggregateConfig,
    poll_seq: u64,
    full_passes: usize,
}

impl GroupAggregator {
    pub fn new(config: AggregateConfig) -> Self {
        GroupAggregator {
            groups: BTreeMap::new(),
            config,
            poll_seq: 0,
            full_passes: 0,
        }
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    pub fn poll_seq(&self) -> u64 {
        self.poll_seq
    }

    /// Groups fully reclassified during the current poll.
    pub fn full_passes(&self) -> usize {
        self.full_passes
    }

    /// Starts a poll; a regroup discards all incremental state.
    pub fn begin_poll(&mut self, config: AggregateConfig, regroup: bool) {
        self.config = config;
        self.poll_seq += 1;
        self.full_passes = 0;
        if regroup {
            self.groups.clear();
            return;
        }
        self.groups.retain(|_, group| group.alive);
        for group in self.groups.values_mut() {
            group.is_new = false;
            group.alive = false;
            group.changed = false;
            group.delta_kb = 0;
            group.prev_rollup = group.rollup.take();
            if !group.members.is_empty() {
                group.prev_members = std::mem::take(&mut group.members);
            }
        }
    }

    pub fn add_process(&mut self, key: &str, info: &str, pid: u32, rollup: &Summary) {
        let group = self
            .groups
            .entry(key.to_string())
            .or_insert_with(|| GroupAccumulator::new(key));
        if !group.alive {
            group.rollup = Some(Summary::labeled(info));
            group.summary = Some(Summary::labeled(info));
            group.alive = true;
        }
        if let Some(total) = group.rollup.as_mut() {
            rollup.add_into(total);
        }
        group.members.insert(pid);
    }

    pub fn get(&self, key: &str) -> Option<&GroupAccumulator> {
        self.groups.get(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupAccumulator> {
        self.groups.values()
    }

    pub fn alive_groups(&self) -> impl Iterator<Item = &GroupAccumulator> {
        self.groups.values().filter(|group| group.alive)
    }

    /// Resolves every alive group; returns the grand total.
    pub fn resolve_all(&mut self, source: &mut dyn DetailSource) -> Summary {
        let keys: Vec<String> = self
            .groups
            .iter()
            .filter(|(_, group)| group.alive)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.resolve_group(key, source);
        }
        self.grand_total()
    }

    /// Settles a group's summary for this poll, at most once per poll.
    ///
    /// The detailed pass runs only for a group without a previous rollup or
    /// whose rollup moved past the threshold; otherwise the last shown
    /// summary is reused with a fresh CPU figure.
    pub fn resolve_group(&mut self, key: &str, source: &mut dyn DetailSource) {
        let config = self.config;
        let poll_seq = self.poll_seq;
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        if !group.alive || group.resolved_poll == poll_seq {
            return;
        }
        group.resolved_poll = poll_seq;
        let Some(rollup) = group.rollup.clone() else {
            return;
        };

        let full_pass = !config.light
            && match &group.prev_rollup {
                Some(prev) => crosses_threshold(&rollup, prev, config.min_delta_kb).0,
                None => true,
            };

        let mut summary = group
            .summary
            .take()
            .unwrap_or_else(|| Summary::labeled(rollup.info.clone()));
        if full_pass {
            self.full_passes += 1;
            let members: Vec<u32> = group.members.iter().copied().collect();
            for pid in members {
                match source.detailed_summary(pid) {
                    Some(detail) => detail.add_into(&mut summary),
                    None => {
                        group.members.remove(&pid);
                    }
                }
            }
        } else if config.light {
            rollup.add_into(&mut summary);
        }
        summary.pss = rollup.ptotal;
        summary.pswap = rollup.pswap;
        summary.cpu_pct = rollup.cpu_pct;

        if group.members.is_empty() {
            group.alive = false;
        }

        if !group.alive || (!full_pass && !config.light) {
            group.summary = group.prev_summary.clone().map(|mut prev| {
                prev.cpu_pct = rollup.cpu_pct;
                prev
            });
            return;
        }

        let (changed, delta_kb) = match &group.prev_summary {
            Some(prev) => crosses_threshold(&summary, prev, config.min_delta_kb),
            None => (true, 0),
        };
        group.changed = changed;
        group.delta_kb = delta_kb;
        match &group.first_summary {
            Some(first) => group.growth_pct = growth_percent(summary.ptotal, first.ptotal),
            None => group.first_summary = Some(summary.clone()),
        }

        if changed {
            group.prev_summary = Some(summary.clone());
            group.summary = Some(summary);
        } else {
            group.summary = group.prev_summary.clone().map(|mut prev| {
                prev.cpu_pct = rollup.cpu_pct;
                prev
            });
        }
        debug!(
            key = %group.key,
            changed,
            delta_kb,
            full_pass,
            "resolved group"
        );
    }

    /// Whether the group's current summary moved past the threshold since
    /// it was last shown.
    pub fn change_test(&self, key: &str) -> (bool, i64) {
        let Some(group) = self.groups.get(key) else {
            return (false, 0);
        };
        match (&group.summary, &group.prev_summary) {
            (Some(current), Some(prev)) => crosses_threshold(current, prev, self.config.min_delta_kb),
            (Some(_), None) => (true, 0),
            _ => (false, 0),
        }
    }

    pub fn growth_percent(&self, key: &str) -> f64 {
        self.groups.get(key).map(|g| g.growth_pct).unwrap_or(0.0)
    }

    /// Sum of every alive group's summary.
    pub fn grand_total(&self) -> Summary {
        let mut total = Summary::default();
        for group in self.alive_groups() {
            if let Some(summary) = &group.summary {
                summary.add_into(&mut total);
            }
        }
        total
    }
}

/// Percent growth of `total` over `first`; zero when `first` is zero.
pub fn growth_percent(total: u64, first: u64) -> f64 {
    if first == 0 {
        return 0.0;
    }
    100.0 * (total as f64 - first as f64) / first as f64
}
