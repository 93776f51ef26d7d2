use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::cpu::{ClockTicks, SysStat};
use super::meminfo::{MemInfo, ZramStats, read_zram_devices};
use super::process::{ProcessSample, SampleSettings};
use super::procfs::{ProcFs, ProcfsError};
use crate::aggregate::group::DetailSource;
use crate::memory::classify::ClassifierConfig;
use crate::memory::summary::Summary;

/// A kernel thread among the top CPU consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelCpu {
    pub nickname: String,
    pub percent: f64,
}

/// Counts gathered by one scan of `/proc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollStats {
    pub user_pids: usize,
    pub kernel_pids: usize,
    pub wanted_pids: usize,
    pub kernel_cpu: f64,
    /// Busiest kernel threads, at most two.
    pub top_kernel: Vec<KernelCpu>,
    pub anomalies: usize,
}

/// Owns every `ProcessSample` and the once-per-poll system tick refresh.
pub struct Collector {
    procfs: ProcFs,
    samples: BTreeMap<u32, ProcessSample>,
    sys_stat: SysStat,
    classifier: ClassifierConfig,
    anomalies: usize,
    smaps_reads: usize,
}

impl Collector {
    pub fn new(procfs: ProcFs, clock: ClockTicks, classifier: ClassifierConfig) -> Self {
        let sys_stat = SysStat::new(procfs.stat_path(), clock);
        Collector {
            procfs,
            samples: BTreeMap::new(),
            sys_stat,
            classifier,
            anomalies: 0,
            smaps_reads: 0,
        }
    }

    pub fn meminfo(&self) -> Result<MemInfo, ProcfsError> {
        MemInfo::read(&self.procfs.meminfo_path())
    }

    pub fn zram_stats(&self) -> Vec<ZramStats> {
        read_zram_devices(&self.procfs.zram_devices())
    }

    /// Evicts samples not seen since the last poll and marks the rest unseen.
    pub fn begin_poll(&mut self) {
        self.samples.retain(|_, sample| sample.alive);
        for sample in self.samples.values_mut() {
            sample.alive = false;
        }
        self.anomalies = 0;
        self.smaps_reads = 0;
    }

    pub fn sample(&mut self, settings: &SampleSettings) -> Result<PollStats, ProcfsError> {
        let pids = self.procfs.pids()?;
        let mut stats = PollStats::default();

        for &pid in &pids {
            let sample = self
                .samples
                .entry(pid)
                .or_insert_with(|| ProcessSample::new(pid));
            sample.alive = true;
            sample.identify(&self.procfs, settings);
            if sample.kernel {
                stats.kernel_pids += 1;
            } else {
                stats.user_pids += 1;
            }
        }

        // one system tick snapshot shared by every process this poll
        if settings.cpu {
            match self.sys_stat.refresh() {
                Ok(delta) => debug!(
                    busy_pct = delta.percent,
                    cpus = delta.cpu_count,
                    "system cpu"
                ),
                Err(err) => warn!(%err, "no system cpu ticks"),
            }
        }
        let system = if settings.cpu { self.sys_stat.latest() } else { None };

        let mut kernel = Vec::new();
        for &pid in &pids {
            let Some(sample) = self.samples.get_mut(&pid) else {
                continue;
            };
            if let Some(system) = &system
                && (sample.is_wanted() || sample.kernel)
            {
                let percent = sample.refresh_cpu(&self.procfs, system, settings.cpu_window);
                if sample.kernel {
                    stats.kernel_cpu += percent;
                    kernel.push(pid);
                }
            }
            self.anomalies += sample.read_rollup(&self.procfs, settings);
            if sample.is_wanted() {
                stats.wanted_pids += 1;
            }
        }

        kernel.sort_by(|a, b| {
            let pa = self.samples.get(a).map(ProcessSample::cpu_percent).unwrap_or(0.0);
            let pb = self.samples.get(b).map(ProcessSample::cpu_percent).unwrap_or(0.0);
            pb.total_cmp(&pa)
        });
        stats.top_kernel = kernel
            .iter()
            .take(2)
            .filter_map(|pid| self.samples.get(pid))
            .map(|sample| KernelCpu {
                nickname: sample.nickname(),
                percent: sample.cpu_percent(),
            })
            .collect();
        stats.anomalies = self.anomalies;

        debug!(
            pids = pids.len(),
            user = stats.user_pids,
            kernel = stats.kernel_pids,
            wanted = stats.wanted_pids,
            anomalies = stats.anomalies,
            "scanned processes"
        );
        Ok(stats)
    }

    /// Wanted processes still running, in pid order.
    pub fn wanted(&self) -> impl Iterator<Item = &ProcessSample> {
        self.samples
            .values()
            .filter(|sample| sample.alive && sample.is_wanted())
    }

    pub fn sample_of(&self, pid: u32) -> Option<&ProcessSample> {
        self.samples.get(&pid)
    }

    /// Processes left out this poll, with their reasons.
    pub fn exclusions(&self) -> impl Iterator<Item = &ProcessSample> {
        self.samples
            .values()
            .filter(|sample| sample.alive && sample.exclusion.is_some())
    }

    pub fn smaps_reads(&self) -> usize {
        self.smaps_reads
    }
}

impl DetailSource for Collector {
    fn detailed_summary(&mut self, pid: u32) -> Option<Summary> {
        let sample = self.samples.get_mut(&pid)?;
        self.smaps_reads += 1;
        let (summary, anomalies) = sample.detailed_summary(&self.procfs, &self.classifier);
        self.anomalies += anomalies;
        summary
    }
}
