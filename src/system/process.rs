use std::io;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::cpu::{CpuTracker, SystemTicks};
use super::procfs::{ProcFs, read_lossy};
use crate::memory::classify::{ClassifierConfig, classify_chunks, summarize_chunks};
use crate::memory::smaps::{ParseOutcome, parse_rollup, parse_smaps};
use crate::memory::summary::Summary;
use crate::options::GroupBy;

/// Why a process is left out of the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Exclusion {
    #[error("cannot read command line")]
    CannotReadCmdline,
    #[error("filtered by arguments")]
    FilteredByArgs,
    #[error("cannot read rollup ({0})")]
    CannotReadRollup(io::ErrorKind),
    #[error("cannot read memory map ({0})")]
    CannotReadSmaps(io::ErrorKind),
}

impl Exclusion {
    /// Read failures are retried on the next poll; filtering is final.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Exclusion::FilteredByArgs)
    }
}

const INTERPRETERS: [&str; 9] = [
    "python", "python2", "python3", "perl", "bash", "ruby", "sh", "ksh", "zsh",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandName {
    /// Executable basename, or `interpreter->script`.
    pub exe: String,
    pub cmdline: String,
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn trim_non_word(s: &str) -> &str {
    s.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'))
}

/// Derives display names from the raw NUL-separated `cmdline` contents.
///
/// `Ok(None)` marks a kernel thread (empty command line).
pub fn parse_cmdline(raw: &str) -> Result<Option<CommandName>, Exclusion> {
    let raw = raw.strip_suffix('\0').unwrap_or(raw);
    let mut arguments = raw.split('\0');
    let argv0 = arguments.next().unwrap_or_default();
    if argv0.is_empty() {
        return Ok(None);
    }

    // argv[0] is sometimes rewritten with spaces (e.g. "sshd: user@pts/0")
    let mut words: Vec<&str> = basename(argv0).split_whitespace().collect();
    words.extend(arguments);
    if words.is_empty() {
        return Err(Exclusion::CannotReadCmdline);
    }
    let first = words.remove(0);
    let mut exe = trim_non_word(first).to_string();

    if INTERPRETERS.contains(&exe.as_str())
        && let Some(script_path) = words.first().copied()
    {
        let script = basename(script_path);
        if script != script_path {
            exe = format!("{exe}->{script}");
            words.remove(0);
        }
    }

    let mut cmdline = exe.clone();
    for word in &words {
        cmdline.push(' ');
        cmdline.push_str(word);
    }
    Ok(Some(CommandName { exe, cmdline }))
}

/// Settings that shape how each process is sampled during one poll.
#[derive(Debug, Clone)]
pub struct SampleSettings {
    pub cmdlen: usize,
    pub filter: Vec<String>,
    pub cpu: bool,
    pub cpu_window: Duration,
    pub zram_active: bool,
    pub classifier: ClassifierConfig,
}

/// Everything known about one pid across polls.
#[derive(Debug)]
pub struct ProcessSample {
    pub pid: u32,
    pub alive: bool,
    pub kernel: bool,
    pub exclusion: Option<Exclusion>,
    pub name: Option<CommandName>,
    pub cmdline_trunc: String,
    pub rollup: Option<Summary>,
    pub cpu: Option<CpuTracker>,
    parse_errors: usize,
}

impl ProcessSample {
    pub fn new(pid: u32) -> Self {
        ProcessSample {
            pid,
            alive: true,
            kernel: false,
            exclusion: None,
            name: None,
            cmdline_trunc: String::new(),
            rollup: None,
            cpu: None,
            parse_errors: 0,
        }
    }

    pub fn is_wanted(&self) -> bool {
        !self.kernel && self.exclusion.is_none() && self.name.is_some()
    }

    pub fn exe(&self) -> &str {
        self.name.as_ref().map(|n| n.exe.as_str()).unwrap_or_default()
    }

    pub fn group_key(&self, group_by: GroupBy) -> String {
        match group_by {
            GroupBy::Exe => self.exe().to_string(),
            GroupBy::Cmd => self.cmdline_trunc.clone(),
            GroupBy::Pid => self.pid.to_string(),
        }
    }

    pub fn group_info(&self, group_by: GroupBy) -> String {
        match group_by {
            GroupBy::Pid => format!("{} {}", self.pid, self.cmdline_trunc),
            _ => self.group_key(group_by),
        }
    }

    /// Short name for header lines; kernel threads show their `(comm)`.
    pub fn nickname(&self) -> String {
        match (&self.name, self.cpu.as_ref().and_then(CpuTracker::comm)) {
            (Some(name), _) => name.exe.clone(),
            (None, Some(comm)) => format!("({comm})"),
            (None, None) => self.pid.to_string(),
        }
    }

    pub fn cpu_percent(&self) -> f64 {
        self.cpu.as_ref().map(CpuTracker::percent).unwrap_or(0.0)
    }

    /// Reads the command line once; retries later if it was unreadable.
    pub fn identify(&mut self, procfs: &ProcFs, settings: &SampleSettings) {
        if self.exclusion.as_ref().is_some_and(Exclusion::is_transient) {
            self.exclusion = None;
        }
        if self.exclusion.is_some() || self.kernel || self.name.is_some() {
            return;
        }

        let raw = match procfs.read_pid_file(self.pid, "cmdline") {
            Ok(raw) => raw,
            Err(err) => {
                // usually a race with a process starting or exiting
                debug!(pid = self.pid, %err, "no command line");
                self.exclusion = Some(Exclusion::CannotReadCmdline);
                return;
            }
        };
        let name = match parse_cmdline(&raw) {
            Ok(Some(name)) => name,
            Ok(None) => {
                self.kernel = true;
                return;
            }
            Err(exclusion) => {
                self.exclusion = Some(exclusion);
                return;
            }
        };

        self.cmdline_trunc = name.cmdline.chars().take(settings.cmdlen).collect();
        let pid = self.pid.to_string();
        if !settings.filter.is_empty()
            && !settings.filter.iter().any(|f| *f == pid || *f == name.exe)
        {
            self.exclusion = Some(Exclusion::FilteredByArgs);
        }
        self.name = Some(name);
    }

    pub fn refresh_cpu(&mut self, procfs: &ProcFs, system: &SystemTicks, window: Duration) -> f64 {
        let path = procfs.pid_file(self.pid, "stat");
        self.cpu
            .get_or_insert_with(|| CpuTracker::new(path, window))
            .refresh(system, window)
    }

    /// Reads the rollup of a wanted process; returns the anomaly count.
    pub fn read_rollup(&mut self, procfs: &ProcFs, settings: &SampleSettings) -> usize {
        self.rollup = None;
        if !self.is_wanted() {
            return 0;
        }
        let path = procfs.pid_file(self.pid, "smaps_rollup");
        let text = match read_lossy(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                self.exclusion = Some(Exclusion::CannotReadRollup(io::ErrorKind::UnexpectedEof));
                return 0;
            }
            Err(err) => {
                debug!(pid = self.pid, %err, "no rollup");
                self.exclusion = Some(Exclusion::CannotReadRollup(err.kind()));
                return 0;
            }
        };

        let outcome = parse_rollup(&text, self.pid, settings.zram_active);
        let anomalies = self.note_anomalies(&outcome, &path);
        let mut summary = outcome.value;
        if settings.cpu {
            summary.cpu_pct = self.cpu_percent();
        }
        self.rollup = Some(summary);
        anomalies
    }

    /// Parses and classifies the full memory map.
    ///
    /// Returns `None` (and excludes the process) when the map is unreadable.
    pub fn detailed_summary(
        &mut self,
        procfs: &ProcFs,
        classifier: &ClassifierConfig,
    ) -> (Option<Summary>, usize) {
        let path = procfs.pid_file(self.pid, "smaps");
        let text = match read_lossy(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                self.exclusion = Some(Exclusion::CannotReadSmaps(io::ErrorKind::UnexpectedEof));
                return (None, 0);
            }
            Err(err) => {
                debug!(pid = self.pid, %err, "no memory map");
                self.exclusion = Some(Exclusion::CannotReadSmaps(err.kind()));
                return (None, 0);
            }
        };

        let mut outcome = parse_smaps(&text);
        let anomalies = self.note_anomalies(&outcome, &path);
        classify_chunks(&mut outcome.value, classifier);
        (Some(summarize_chunks(self.pid, &outcome.value)), anomalies)
    }

    fn note_anomalies<T>(&mut self, outcome: &ParseOutcome<T>, path: &Path) -> usize {
        if outcome.anomalies == 0 {
            return 0;
        }
        if self.parse_errors == 0
            && let Some(first) = &outcome.first_anomaly
        {
            warn!(
                pid = self.pid,
                path = %path.display(),
                line = first.line_no,
                text = %first.text,
                "cannot parse line"
            );
        }
        self.parse_errors += outcome.anomalies;
        outcome.anomalies
    }
}
