use clap::ValueEnum;
use crossterm::event::KeyCode;
use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Exe,
    Cmd,
    Pid,
}

impl GroupBy {
    pub const ALL: [GroupBy; 3] = [GroupBy::Exe, GroupBy::Cmd, GroupBy::Pid];

    pub fn label(self) -> &'static str {
        match self {
            GroupBy::Exe => "exe",
            GroupBy::Cmd => "cmd",
            GroupBy::Pid => "pid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Mem,
    Cpu,
    Name,
}

impl SortBy {
    pub const ALL: [SortBy; 3] = [SortBy::Mem, SortBy::Cpu, SortBy::Name];

    pub fn label(self) -> &'static str {
        match self {
            SortBy::Mem => "mem",
            SortBy::Cpu => "cpu",
            SortBy::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
pub enum Units {
    /// 1024*1024 bytes
    #[default]
    #[serde(rename = "MB")]
    #[value(name = "MB")]
    Mebibytes,
    /// 1000*1000 bytes
    #[serde(rename = "mB")]
    #[value(name = "mB")]
    Megabytes,
    #[serde(rename = "KB")]
    #[value(name = "KB")]
    Kibibytes,
    #[serde(rename = "human")]
    #[value(name = "human")]
    Human,
}

impl Units {
    pub const ALL: [Units; 4] = [
        Units::Mebibytes,
        Units::Megabytes,
        Units::Kibibytes,
        Units::Human,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Units::Mebibytes => "MB",
            Units::Megabytes => "mB",
            Units::Kibibytes => "KB",
            Units::Human => "human",
        }
    }

    /// Bytes per displayed unit; 1 means scaled human-readable output.
    pub fn divisor(self) -> u64 {
        match self {
            Units::Mebibytes => 1024 * 1024,
            Units::Megabytes => 1000 * 1000,
            Units::Kibibytes => 1024,
            Units::Human => 1,
        }
    }

    pub fn field_width(self) -> usize {
        match self {
            Units::Mebibytes | Units::Megabytes => 8,
            Units::Kibibytes => 11,
            Units::Human => 7,
        }
    }
}

pub const CPU_AVG_SECS: [u64; 5] = [5, 10, 20, 45, 90];

/// The knobs that change what a poll reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub group_by: GroupBy,
    /// Collapse every category except data into a single "other" column and
    /// skip detailed map parsing.
    pub light: bool,
    pub fit_to_window: bool,
    pub numbers: bool,
    pub rise_to_top: bool,
    pub sort_by: SortBy,
    pub units: Units,
    pub cpu: bool,
    pub cpu_avg_secs: u64,
    pub search: String,
    pub help: bool,
    pub kill_mode: bool,
    pub loop_secs: f64,
    pub min_delta_kb: i64,
    pub top_pct: u32,
    pub cmdlen: usize,
    /// Pids or executable names to restrict the report to.
    pub filter: Vec<String>,
    pub debug: bool,
    pub window: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options::from_config(&Config::default())
    }
}

impl Options {
    pub fn from_config(config: &Config) -> Self {
        let general = &config.general;
        let min_delta_kb = general.min_delta_kb.unwrap_or(match general.units {
            Units::Kibibytes => 100,
            _ => 1000,
        });
        Options {
            group_by: general.group_by,
            light: general.light,
            fit_to_window: general.fit_to_window,
            numbers: general.numbers,
            rise_to_top: general.rise_to_top,
            sort_by: general.sort_by,
            units: general.units,
            cpu: general.cpu,
            cpu_avg_secs: general.cpu_avg_secs,
            search: general.search.clone(),
            help: false,
            kill_mode: false,
            loop_secs: general.loop_secs,
            min_delta_kb,
            top_pct: general.top_pct,
            cmdlen: general.cmdlen,
            filter: Vec::new(),
            debug: false,
            window: general.window,
        }
    }

    /// Sorting by CPU makes no sense without CPU sampling.
    pub fn effective_sort(&self) -> SortBy {
        if self.sort_by == SortBy::Cpu && !self.cpu {
            SortBy::Mem
        } else {
            self.sort_by
        }
    }

    /// Fitting rows to the window only applies to value-ordered reports.
    pub fn is_fit_opted(&self) -> bool {
        self.fit_to_window && matches!(self.effective_sort(), SortBy::Mem | SortBy::Cpu)
    }

    pub fn cycle(&mut self, choice: Choice) {
        match choice {
            Choice::Help => self.help = !self.help,
            Choice::KillMode => self.kill_mode = !self.kill_mode,
            Choice::FitToWindow => self.fit_to_window = !self.fit_to_window,
            Choice::GroupBy => self.group_by = next_of(&GroupBy::ALL, self.group_by),
            Choice::Numbers => self.numbers = !self.numbers,
            Choice::Others => self.light = !self.light,
            Choice::RiseToTop => self.rise_to_top = !self.rise_to_top,
            Choice::SortBy => self.sort_by = next_of(&SortBy::ALL, self.sort_by),
            Choice::Units => self.units = next_of(&Units::ALL, self.units),
            Choice::Cpu => self.cpu = !self.cpu,
            Choice::CpuAvgSecs => {
                self.cpu_avg_secs = next_of(&CPU_AVG_SECS, self.cpu_avg_secs);
            }
            Choice::Search => {}
        }
    }

    /// The values a choice can take, and the index of the current one.
    pub fn values(&self, choice: Choice) -> (Vec<String>, usize) {
        fn flag(on: bool) -> (Vec<String>, usize) {
            (vec!["off".to_string(), "on".to_string()], usize::from(on))
        }
        fn listed<T: PartialEq + Copy>(all: &[T], current: T, label: fn(T) -> String) -> (Vec<String>, usize) {
            let idx = all.iter().position(|v| *v == current).unwrap_or(0);
            (all.iter().map(|v| label(*v)).collect(), idx)
        }
        match choice {
            Choice::Help => (
                vec!["normal".to_string(), "help".to_string()],
                usize::from(self.help),
            ),
            Choice::KillMode => flag(self.kill_mode),
            Choice::FitToWindow => flag(self.fit_to_window),
            Choice::GroupBy => listed(&GroupBy::ALL, self.group_by, |g| g.label().to_string()),
            Choice::Numbers => flag(self.numbers),
            Choice::Others => (
                vec!["expand".to_string(), "collapse".to_string()],
                usize::from(self.light),
            ),
            Choice::RiseToTop => flag(self.rise_to_top),
            Choice::SortBy => listed(&SortBy::ALL, self.sort_by, |s| s.label().to_string()),
            Choice::Units => listed(&Units::ALL, self.units, |u| u.label().to_string()),
            Choice::Cpu => flag(self.cpu),
            Choice::CpuAvgSecs => listed(&CPU_AVG_SECS, self.cpu_avg_secs, |s| s.to_string()),
            Choice::Search => (vec![format!("/{}/", self.search)], 0),
        }
    }
}

fn next_of<T: PartialEq + Copy>(all: &[T], current: T) -> T {
    let idx = all.iter().position(|v| *v == current).unwrap_or(0);
    all[(idx + 1) % all.len()]
}

/// An interactively adjustable option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Help,
    KillMode,
    FitToWindow,
    GroupBy,
    Numbers,
    Others,
    RiseToTop,
    SortBy,
    Units,
    Cpu,
    CpuAvgSecs,
    Search,
}

#[derive(Debug, Clone, Copy)]
pub struct SpinnerEntry {
    pub key: char,
    pub choice: Choice,
    pub descr: &'static str,
}

pub const SPINNER: [SpinnerEntry; 12] = [
    SpinnerEntry { key: '?', choice: Choice::Help, descr: "mode" },
    SpinnerEntry { key: 'K', choice: Choice::KillMode, descr: "kill mode (pick a group, ENTER to kill)" },
    SpinnerEntry { key: 'f', choice: Choice::FitToWindow, descr: "fit rows to window" },
    SpinnerEntry { key: 'g', choice: Choice::GroupBy, descr: "group by" },
    SpinnerEntry { key: 'n', choice: Choice::Numbers, descr: "line numbers" },
    SpinnerEntry { key: 'o', choice: Choice::Others, descr: "other categories" },
    SpinnerEntry { key: 'r', choice: Choice::RiseToTop, descr: "changed groups rise to top" },
    SpinnerEntry { key: 's', choice: Choice::SortBy, descr: "sort by" },
    SpinnerEntry { key: 'u', choice: Choice::Units, descr: "memory units" },
    SpinnerEntry { key: 'c', choice: Choice::Cpu, descr: "cpu reporting" },
    SpinnerEntry { key: 'a', choice: Choice::CpuAvgSecs, descr: "cpu average seconds" },
    SpinnerEntry { key: '/', choice: Choice::Search, descr: "search (ENTER to submit)" },
];

pub fn spinner_entry(code: KeyCode) -> Option<&'static SpinnerEntry> {
    match code {
        KeyCode::Char(c) => SPINNER.iter().find(|entry| entry.key == c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_wraps_around() {
        let mut opts = Options::default();
        assert_eq!(opts.group_by, GroupBy::Exe);
        opts.cycle(Choice::GroupBy);
        opts.cycle(Choice::GroupBy);
        assert_eq!(opts.group_by, GroupBy::Pid);
        opts.cycle(Choice::GroupBy);
        assert_eq!(opts.group_by, GroupBy::Exe);

        assert_eq!(opts.cpu_avg_secs, 20);
        opts.cycle(Choice::CpuAvgSecs);
        opts.cycle(Choice::CpuAvgSecs);
        opts.cycle(Choice::CpuAvgSecs);
        assert_eq!(opts.cpu_avg_secs, 5);
    }

    #[test]
    fn cpu_sort_falls_back_without_cpu() {
        let mut opts = Options {
            sort_by: SortBy::Cpu,
            fit_to_window: true,
            ..Options::default()
        };
        assert_eq!(opts.effective_sort(), SortBy::Cpu);
        opts.cpu = false;
        assert_eq!(opts.effective_sort(), SortBy::Mem);
        opts.sort_by = SortBy::Name;
        assert!(!opts.is_fit_opted());
    }

    #[test]
    fn min_delta_defaults_follow_units() {
        let mut config = Config::default();
        assert_eq!(Options::from_config(&config).min_delta_kb, 1000);
        config.general.units = Units::Kibibytes;
        assert_eq!(Options::from_config(&config).min_delta_kb, 100);
        config.general.min_delta_kb = Some(-50);
        assert_eq!(Options::from_config(&config).min_delta_kb, -50);
    }

    #[test]
    fn values_mark_current_choice() {
        let opts = Options::default();
        let (values, current) = opts.values(Choice::Units);
        assert_eq!(values, vec!["MB", "mB", "KB", "human"]);
        assert_eq!(current, 0);
        let (_, current) = opts.values(Choice::Others);
        assert_eq!(current, 1);
    }

    #[test]
    fn spinner_keys_are_unique() {
        for (i, a) in SPINNER.iter().enumerate() {
            for b in &SPINNER[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
        assert_eq!(
            spinner_entry(KeyCode::Char('u')).map(|e| e.choice),
            Some(Choice::Units)
        );
        assert!(spinner_entry(KeyCode::Char('j')).is_none());
    }
}
