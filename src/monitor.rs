use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveTime;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tracing::debug;

use crate::aggregate::group::{AggregateConfig, GroupAggregator};
use crate::aggregate::rows::{RowOptions, build_rows};
use crate::memory::classify::ClassifierConfig;
use crate::memory::summary::Summary;
use crate::options::Options;
use crate::system::collector::{Collector, PollStats};
use crate::system::meminfo::ZramProjector;
use crate::system::process::SampleSettings;
use crate::ui::ReportSink;
use crate::ui::report::{TopOfReport, write_column_header, write_rows, write_top, write_working};

/// What one poll produced.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing left to report on.
    NoGroups,
    Reported(PollReport),
}

#[derive(Debug)]
pub struct PollReport {
    /// Body line to group key, for picking a row.
    pub rows_by_line: HashMap<usize, String>,
    pub grand: Summary,
    pub stats: PollStats,
}

/// Runs polls: scan, aggregate, report.
pub struct Monitor {
    collector: Collector,
    aggregator: GroupAggregator,
    projector: ZramProjector,
    classifier: ClassifierConfig,
    loop_num: u64,
}

impl Monitor {
    pub fn new(
        collector: Collector,
        projector: ZramProjector,
        classifier: ClassifierConfig,
        opts: &Options,
    ) -> Self {
        Monitor {
            collector,
            aggregator: GroupAggregator::new(AggregateConfig::from_options(opts)),
            projector,
            classifier,
            loop_num: 0,
        }
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn aggregator(&self) -> &GroupAggregator {
        &self.aggregator
    }

    /// Display info and member pids of a group from the last poll.
    pub fn group_members(&self, key: &str) -> Option<(String, Vec<u32>)> {
        let group = self.aggregator.get(key)?;
        Some((group.info().to_string(), group.members.iter().copied().collect()))
    }

    fn settings(&self, opts: &Options, zram_active: bool) -> SampleSettings {
        SampleSettings {
            cmdlen: opts.cmdlen,
            filter: opts.filter.clone(),
            cpu: opts.cpu,
            cpu_window: Duration::from_secs(opts.cpu_avg_secs),
            zram_active,
            classifier: self.classifier,
        }
    }

    /// The hint screen shown while a slow first or regrouped poll runs.
    pub fn write_working(
        &self,
        sink: &mut dyn ReportSink,
        opts: &Options,
        now: NaiveTime,
        is_root: bool,
    ) -> Result<()> {
        let meminfo = self
            .collector
            .meminfo()
            .wrap_err("cannot read system memory totals")?;
        let stats = PollStats::default();
        let top = TopOfReport {
            now,
            loop_num: self.loop_num,
            meminfo: &meminfo,
            zram: None,
            stats: &stats,
            app_kb: 0,
            opts,
        };
        write_working(sink, &top, is_root);
        Ok(())
    }

    pub fn poll(
        &mut self,
        opts: &Options,
        now: NaiveTime,
        is_first: bool,
        regroup: bool,
        sink: &mut dyn ReportSink,
    ) -> Result<PollOutcome> {
        self.loop_num += 1;
        let meminfo = self
            .collector
            .meminfo()
            .wrap_err("cannot read system memory totals")?;
        let zram = self.projector.project(&meminfo, &self.collector.zram_stats());

        self.collector.begin_poll();
        let settings = self.settings(opts, zram.is_some());
        let stats = self
            .collector
            .sample(&settings)
            .wrap_err("cannot scan processes")?;

        self.aggregator
            .begin_poll(AggregateConfig::from_options(opts), regroup);
        for sample in self.collector.wanted() {
            let Some(rollup) = &sample.rollup else {
                continue;
            };
            self.aggregator.add_process(
                &sample.group_key(opts.group_by),
                &sample.group_info(opts.group_by),
                sample.pid,
                rollup,
            );
        }
        let mut grand = self.aggregator.resolve_all(&mut self.collector);
        grand.info = format!("--TOTALS in {} --", opts.units.label());

        for sample in self.collector.exclusions() {
            if let Some(reason) = &sample.exclusion {
                debug!(pid = sample.pid, %reason, "excluded");
            }
        }
        debug!(
            loop_num = self.loop_num,
            groups = self.aggregator.alive_groups().count(),
            full_passes = self.aggregator.full_passes(),
            smaps_reads = self.collector.smaps_reads(),
            anomalies = stats.anomalies,
            "poll finished"
        );

        if grand.number == 0 {
            return Ok(PollOutcome::NoGroups);
        }

        let top = TopOfReport {
            now,
            loop_num: self.loop_num,
            meminfo: &meminfo,
            zram: zram.as_ref(),
            stats: &stats,
            app_kb: grand.ptotal,
            opts,
        };
        write_top(sink, &top);
        write_column_header(sink, opts, &grand);

        let budget = if opts.is_fit_opted() {
            sink.view_rows()
        } else {
            None
        };
        let rows = build_rows(
            &self.aggregator,
            &grand,
            &RowOptions {
                sort_by: opts.effective_sort(),
                rise_to_top: opts.rise_to_top,
                top_pct: opts.top_pct,
                search: &opts.search,
                budget,
                windowed: sink.is_windowed(),
                is_first,
            },
        );
        let rows_by_line = write_rows(sink, opts, &rows);

        Ok(PollOutcome::Reported(PollReport {
            rows_by_line,
            grand,
            stats,
        }))
    }
}
