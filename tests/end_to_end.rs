use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use pmemstat::memory::classify::ClassifierConfig;
use pmemstat::monitor::{Monitor, PollOutcome, PollReport};
use pmemstat::options::Options;
use pmemstat::system::collector::Collector;
use pmemstat::system::cpu::ClockTicks;
use pmemstat::system::kill::{EscalationPlan, KillSignal, Signaller, kill_escalating};
use pmemstat::system::meminfo::ZramProjector;
use pmemstat::system::procfs::ProcFs;
use pmemstat::ui::PlainSink;

struct ProcTree {
    dir: tempfile::TempDir,
}

impl ProcTree {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("meminfo"),
            "MemTotal: 8000000 kB\nMemFree: 100 kB\nMemAvailable: 4000000 kB\nDirty: 12 kB\nShmem: 1000 kB\n",
        )
        .unwrap();
        ProcTree { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn process(&self, pid: u32, cmdline: Option<&str>, pss_anon_kb: u64) -> &Self {
        let dir = self.root().join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        if let Some(cmdline) = cmdline {
            fs::write(dir.join("cmdline"), cmdline).unwrap();
        }
        fs::write(
            dir.join("smaps_rollup"),
            format!(
                "55d0c0000000-7ffd00000000 ---p 00000000 00:00 0 [rollup]\n\
                 Rss: {pss_anon_kb} kB\n\
                 Pss: {pss_anon_kb} kB\n\
                 Pss_Anon: {pss_anon_kb} kB\n\
                 Pss_File: 0 kB\n\
                 Pss_Shmem: 0 kB\n\
                 SwapPss: 0 kB\n"
            ),
        )
        .unwrap();
        self
    }

    fn smaps(&self, pid: u32, text: &str) -> &Self {
        fs::write(self.root().join(pid.to_string()).join("smaps"), text).unwrap();
        self
    }

    fn monitor(&self, opts: &Options) -> Monitor {
        let collector = Collector::new(
            ProcFs::new(self.root(), self.root().join("block")),
            ClockTicks::new(100),
            ClassifierConfig::default(),
        );
        let projector = ZramProjector {
            limit_pct: 80.0,
            fallback_ratio: 3.5,
        };
        Monitor::new(collector, projector, ClassifierConfig::default(), opts)
    }
}

fn plain_opts() -> Options {
    Options {
        cpu: false,
        window: false,
        ..Options::default()
    }
}

fn poll(monitor: &mut Monitor, opts: &Options, sink: &mut PlainSink) -> PollReport {
    let now = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
    match monitor.poll(opts, now, true, false, sink).unwrap() {
        PollOutcome::Reported(report) => report,
        PollOutcome::NoGroups => panic!("expected groups"),
    }
}

#[test]
fn same_executable_forms_one_group() {
    let tree = ProcTree::new();
    tree.process(300, Some("/usr/lib/firefox/firefox\0-contentproc\0"), 1000)
        .process(301, Some("/opt/other/firefox\0"), 2000);
    let opts = plain_opts();
    let mut monitor = tree.monitor(&opts);
    let mut sink = PlainSink::new();
    let report = poll(&mut monitor, &opts, &mut sink);

    assert_eq!(report.grand.ptotal, 3000);
    assert_eq!(report.grand.number, 2);
    let group = monitor.aggregator().get("firefox").unwrap();
    assert_eq!(group.members.len(), 2);
    assert_eq!(group.summary.as_ref().map(|s| s.ptotal), Some(3000));
    assert!(sink.lines().iter().any(|l| l.ends_with("A 2x firefox")));
}

#[test]
fn unreadable_command_line_is_excluded() {
    let tree = ProcTree::new();
    tree.process(400, Some("/usr/bin/keeper\0"), 500)
        .process(401, None, 700);
    let opts = plain_opts();
    let mut monitor = tree.monitor(&opts);
    let report = poll(&mut monitor, &opts, &mut PlainSink::new());

    assert_eq!(report.grand.ptotal, 500);
    let excluded = monitor.collector().sample_of(401).unwrap();
    let reason = excluded.exclusion.as_ref().map(ToString::to_string);
    assert_eq!(reason.as_deref(), Some("cannot read command line"));
    assert_eq!(report.stats.wanted_pids, 1);
}

#[test]
fn expanded_mode_classifies_the_full_map() {
    let tree = ProcTree::new();
    tree.process(500, Some("/usr/bin/server\0"), 1700).smaps(
        500,
        "\
55d0c0000000-55d0c0200000 r-xp 00000000 08:01 1234 /usr/bin/server
Size: 2048 kB
Rss: 300 kB
Pss: 200 kB
Swap: 0 kB
SwapPss: 0 kB
55d0c1000000-55d0c1400000 rw-p 00000000 00:00 0 [heap]
Size: 4096 kB
Rss: 1500 kB
Pss: 1500 kB
Private_Dirty: 1500 kB
Swap: 0 kB
SwapPss: 0 kB
",
    );
    let opts = Options {
        light: false,
        ..plain_opts()
    };
    let mut monitor = tree.monitor(&opts);
    let report = poll(&mut monitor, &opts, &mut PlainSink::new());

    assert_eq!(report.grand.text, 200);
    assert_eq!(report.grand.data, 1500);
    assert_eq!(report.grand.ptotal, 1700);
}

#[test]
fn emptied_tree_reports_no_groups() {
    let tree = ProcTree::new();
    tree.process(600, Some("/usr/bin/brief\0"), 100);
    let opts = plain_opts();
    let mut monitor = tree.monitor(&opts);
    poll(&mut monitor, &opts, &mut PlainSink::new());

    fs::remove_dir_all(tree.root().join("600")).unwrap();
    let now = NaiveTime::from_hms_opt(8, 30, 5).unwrap();
    let outcome = monitor
        .poll(&opts, now, false, false, &mut PlainSink::new())
        .unwrap();
    assert!(matches!(outcome, PollOutcome::NoGroups));
}

#[test]
fn exited_member_drops_out_of_totals() {
    let tree = ProcTree::new();
    tree.process(610, Some("/usr/bin/stays\0"), 300)
        .process(611, Some("/usr/bin/leaves\0"), 900);
    let opts = plain_opts();
    let mut monitor = tree.monitor(&opts);
    let report = poll(&mut monitor, &opts, &mut PlainSink::new());
    assert_eq!(report.grand.number, 2);

    fs::remove_dir_all(tree.root().join("611")).unwrap();
    let report = poll(&mut monitor, &opts, &mut PlainSink::new());
    assert_eq!(report.grand.number, 1);
    assert_eq!(report.grand.ptotal, 300);
    assert_eq!(report.stats.wanted_pids, 1);
}

#[test]
fn non_utf8_mapping_path_is_classified() {
    let tree = ProcTree::new();
    tree.process(620, Some("/opt/cafe/app\0"), 1300);
    let mut smaps = b"55d0c0000000-55d0c0200000 r-xp 00000000 08:01 1234 /opt/caf\xe9/lib.so\n".to_vec();
    smaps.extend_from_slice(b"Size: 2048 kB\nRss: 300 kB\nPss: 300 kB\nSwap: 0 kB\nSwapPss: 0 kB\n");
    smaps.extend_from_slice(b"55d0c1000000-55d0c1400000 rw-p 00000000 00:00 0 [heap]\n");
    smaps.extend_from_slice(b"Size: 4096 kB\nRss: 1000 kB\nPss: 1000 kB\nPrivate_Dirty: 1000 kB\nSwap: 0 kB\nSwapPss: 0 kB\n");
    fs::write(tree.root().join("620").join("smaps"), smaps).unwrap();
    let opts = Options {
        light: false,
        ..plain_opts()
    };
    let mut monitor = tree.monitor(&opts);
    let report = poll(&mut monitor, &opts, &mut PlainSink::new());

    assert_eq!(report.grand.ptotal, 1300);
    assert_eq!(report.grand.data, 1000);
    assert!(monitor.collector().sample_of(620).unwrap().exclusion.is_none());
}

/// Ignores SIGTERM; dies on the first SIGKILL.
struct Stubborn {
    alive: Vec<u32>,
    sent: Vec<KillSignal>,
}

impl Signaller for Stubborn {
    fn signal(&mut self, pid: u32, signal: KillSignal) -> bool {
        if !self.alive.contains(&pid) {
            return false;
        }
        self.sent.push(signal);
        if signal == KillSignal::Kill {
            self.alive.retain(|&p| p != pid);
        }
        true
    }

    fn is_alive(&mut self, pid: u32) -> bool {
        self.alive.contains(&pid)
    }

    fn pause(&mut self, _duration: Duration) {}
}

#[test]
fn escalation_reaches_sigkill() {
    let mut signaller = Stubborn {
        alive: vec![700, 701],
        sent: Vec::new(),
    };
    let outcome = kill_escalating(&[700, 701], &mut signaller, &EscalationPlan::default());
    assert!(outcome.success);
    assert_eq!(outcome.message, "Gone (w sig SIGKILL)");
    assert_eq!(
        signaller.sent.iter().filter(|s| **s == KillSignal::Term).count(),
        24
    );
    assert_eq!(
        signaller.sent.iter().filter(|s| **s == KillSignal::Kill).count(),
        2
    );
}
