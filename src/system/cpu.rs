use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::procfs::{CachedFile, ProcfsError};

/// Kernel clock ticks per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTicks(u64);

impl ClockTicks {
    pub fn new(per_second: u64) -> Self {
        ClockTicks(per_second.max(1))
    }

    pub fn detect() -> Self {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined; both fall back to 100
        let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if tck > 0 {
            ClockTicks(tck as u64)
        } else {
            ClockTicks(100)
        }
    }

    pub fn per_second(self) -> u64 {
        self.0
    }
}

/// One reading of the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemTicks {
    pub at: Instant,
    /// user + system
    pub busy: u64,
    /// Sum of every field of the aggregate line.
    pub gross: u64,
    pub cpu_count: usize,
}

pub fn parse_system_stat(text: &str, at: Instant) -> Option<SystemTicks> {
    let mut aggregate = None;
    let mut cpu_count = 0;
    for line in text.lines() {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            continue;
        };
        if keyword == "cpu" {
            let values: Vec<u64> = words.filter_map(|w| w.parse().ok()).collect();
            if values.len() < 3 {
                return None;
            }
            aggregate = Some((values[0] + values[2], values.iter().sum()));
        } else if keyword.starts_with("cpu") {
            cpu_count += 1;
        }
    }
    let (busy, gross) = aggregate?;
    Some(SystemTicks {
        at,
        busy,
        gross,
        cpu_count,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemDelta {
    pub elapsed: Duration,
    pub busy: u64,
    pub gross: u64,
    pub cpu_count: usize,
    /// Busy time as a percent of one core.
    pub percent: f64,
}

/// System-wide tick tracker, refreshed once per poll.
#[derive(Debug)]
pub struct SysStat {
    file: CachedFile,
    clock: ClockTicks,
    latest: Option<SystemTicks>,
}

impl SysStat {
    pub fn new(path: impl Into<PathBuf>, clock: ClockTicks) -> Self {
        SysStat {
            file: CachedFile::new(path),
            clock,
            latest: None,
        }
    }

    pub fn refresh(&mut self) -> Result<SystemDelta, ProcfsError> {
        let now = Instant::now();
        let path = self.file.path().to_path_buf();
        let text = self.file.read().map_err(|source| ProcfsError::Read {
            path: path.clone(),
            source,
        })?;
        let ticks = parse_system_stat(text, now)
            .ok_or(ProcfsError::MissingField { path, field: "cpu" })?;
        Ok(self.record(ticks))
    }

    pub fn record(&mut self, ticks: SystemTicks) -> SystemDelta {
        let delta = match self.latest {
            Some(prev) => {
                let elapsed = ticks.at.saturating_duration_since(prev.at);
                let busy = ticks.busy.saturating_sub(prev.busy);
                let secs = elapsed.as_secs_f64();
                let percent = if secs > 0.0 {
                    100.0 * busy as f64 / self.clock.per_second() as f64 / secs
                } else {
                    0.0
                };
                SystemDelta {
                    elapsed,
                    busy,
                    gross: ticks.gross.saturating_sub(prev.gross),
                    cpu_count: ticks.cpu_count,
                    percent,
                }
            }
            None => SystemDelta {
                cpu_count: ticks.cpu_count,
                ..SystemDelta::default()
            },
        };
        self.latest = Some(ticks);
        delta
    }

    pub fn latest(&self) -> Option<SystemTicks> {
        self.latest
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSample {
    pub ticks: u64,
    pub at: Instant,
    pub gross: u64,
}

fn percent_between(newer: &CpuSample, older: &CpuSample, cpu_count: usize) -> f64 {
    let ticks = newer.ticks.abs_diff(older.ticks);
    let gross = newer.gross.abs_diff(older.gross);
    if gross == 0 {
        return 0.0;
    }
    cpu_count as f64 * 100.0 * ticks as f64 / gross as f64
}

/// Windowed CPU history of one process.
///
/// Percentages are normalized against the system's gross tick delta so
/// they stay correct when the host steals time (VMs); the sum over all
/// processes cannot exceed `cpu_count * 100`.
#[derive(Debug, Clone)]
pub struct CpuHistory {
    samples: VecDeque<CpuSample>,
    window: Duration,
    percent: f64,
    short_percent: f64,
}

impl CpuHistory {
    pub fn new(window: Duration) -> Self {
        CpuHistory {
            samples: VecDeque::new(),
            window,
            percent: 0.0,
            short_percent: 0.0,
        }
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Average over the whole window.
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Over the last interval only.
    pub fn short_percent(&self) -> f64 {
        self.short_percent
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.percent = 0.0;
        self.short_percent = 0.0;
    }

    pub fn record(&mut self, sample: CpuSample, cpu_count: usize) -> f64 {
        self.samples.push_back(sample);
        if self.samples.len() < 2 {
            return 0.0;
        }

        if let Some(floor) = sample.at.checked_sub(self.window) {
            while self.samples.len() > 2 && self.samples[0].at < floor {
                self.samples.pop_front();
            }
        }

        let newest = self.samples[self.samples.len() - 1];
        let previous = self.samples[self.samples.len() - 2];
        if newest.at <= previous.at {
            self.samples.pop_back();
            return 0.0;
        }

        self.short_percent = percent_between(&newest, &previous, cpu_count);
        self.percent = percent_between(&newest, &self.samples[0], cpu_count);
        self.percent
    }
}

/// Fields of `/proc/<pid>/stat` used for CPU accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub comm: String,
    pub utime: u64,
    pub stime: u64,
    pub threads: u64,
}

pub fn parse_proc_stat(text: &str) -> Option<ProcStat> {
    // comm may contain spaces and parens, so anchor on the last ')'
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open {
        return None;
    }
    let fields: Vec<&str> = text[close + 1..].split_whitespace().collect();
    // Fields after comm: state(0) ppid(1) pgrp(2) session(3) tty_nr(4)
    // tpgid(5) flags(6) minflt(7) cminflt(8) majflt(9) cmajflt(10)
    // utime(11) stime(12) cutime(13) cstime(14) priority(15) nice(16)
    // num_threads(17)
    Some(ProcStat {
        comm: text[open + 1..close].to_string(),
        utime: fields.get(11)?.parse().ok()?,
        stime: fields.get(12)?.parse().ok()?,
        threads: fields.get(17)?.parse().ok()?,
    })
}

/// Per-process CPU tracker with its stat file kept open.
///
/// After the first read failure the handle is closed and the tracker stops
/// retrying, reporting 0% from then on.
#[derive(Debug)]
pub struct CpuTracker {
    stat: CachedFile,
    history: CpuHistory,
    last: Option<ProcStat>,
    failed: bool,
}

impl CpuTracker {
    pub fn new(path: impl Into<PathBuf>, window: Duration) -> Self {
        CpuTracker {
            stat: CachedFile::new(path),
            history: CpuHistory::new(window),
            last: None,
            failed: false,
        }
    }

    pub fn refresh(&mut self, system: &SystemTicks, window: Duration) -> f64 {
        if self.failed {
            return self.history.percent();
        }
        let parsed = match self.stat.read() {
            Ok(text) => parse_proc_stat(text),
            Err(_) => None,
        };
        let Some(stat) = parsed else {
            self.stat.close();
            self.history.clear();
            self.failed = true;
            return 0.0;
        };

        self.history.set_window(window);
        let sample = CpuSample {
            ticks: stat.utime + stat.stime,
            at: Instant::now(),
            gross: system.gross,
        };
        self.last = Some(stat);
        self.history.record(sample, system.cpu_count);
        self.history.percent()
    }

    pub fn percent(&self) -> f64 {
        self.history.percent()
    }

    pub fn comm(&self) -> Option<&str> {
        self.last.as_ref().map(|stat| stat.comm.as_str())
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}
