use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use pmemstat::app::{App, RunEnd};
use pmemstat::config::{Config, load_config, load_config_from_path};
use pmemstat::event::TerminalKeys;
use pmemstat::logging;
use pmemstat::monitor::{Monitor, PollOutcome};
use pmemstat::options::{GroupBy, Options, SortBy, Units};
use pmemstat::system::collector::Collector;
use pmemstat::system::cpu::ClockTicks;
use pmemstat::system::kill::{EscalationPlan, SysinfoSignaller};
use pmemstat::system::meminfo::ZramProjector;
use pmemstat::system::procfs::{ProcFs, is_root};
use pmemstat::ui::PlainSink;
use pmemstat::ui::viewport::Viewport;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "pmemstat",
    about = "Proportional memory and CPU of processes, grouped by executable, command or pid"
)]
struct Cli {
    /// Group processes by
    #[arg(short = 'g', long = "groupby", value_enum)]
    group_by: Option<GroupBy>,

    /// Show every memory category instead of collapsing them into "other"
    #[arg(short = 'o', long)]
    expand_other: bool,

    /// Do not sample CPU
    #[arg(short = 'C', long)]
    no_cpu: bool,

    #[arg(short = 's', long = "sortby", value_enum)]
    sort_by: Option<SortBy>,

    #[arg(short = 'u', long, value_enum)]
    units: Option<Units>,

    /// Only show groups whose info contains this text
    #[arg(short = '/', long)]
    search: Option<String>,

    /// Seconds between polls; 0 polls once in plain mode
    #[arg(short = 'l', long = "loop")]
    loop_secs: Option<f64>,

    /// Report groups covering this percent of memory
    #[arg(short = 't', long)]
    top_pct: Option<u32>,

    #[arg(short = 'f', long)]
    fit_to_window: bool,

    /// Smallest change worth reporting in plain mode; negative shows all
    #[arg(short = 'k', long, allow_negative_numbers = true)]
    min_delta_kb: Option<i64>,

    /// Longest command line shown
    #[arg(short = 'L', long)]
    cmdlen: Option<usize>,

    #[arg(short = 'n', long)]
    numbers: bool,

    /// Keep changed groups in place instead of raising them
    #[arg(short = 'R', long)]
    no_rise: bool,

    /// Print reports to stdout instead of the full-screen window
    #[arg(short = 'W', long)]
    no_window: bool,

    #[arg(short = 'D', long)]
    debug: bool,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pids or executable names to report on
    pids: Vec<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    let opts = options_for_cli(&cli, &config);
    logging::init(&config.logging, opts.window, opts.debug)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .wrap_err("cannot install signal handler")?;

    let monitor = build_monitor(&config, &opts);
    let end = if opts.window {
        run_window(opts, monitor, &config, interrupted)?
    } else {
        run_plain(opts, monitor, &interrupted)?
    };
    if end == RunEnd::NoGroups {
        println!("DONE: no pids to report");
    }
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    let general = &mut config.general;
    if let Some(group_by) = cli.group_by {
        general.group_by = group_by;
    }
    if let Some(sort_by) = cli.sort_by {
        general.sort_by = sort_by;
    }
    if let Some(units) = cli.units {
        general.units = units;
    }
    if let Some(ref search) = cli.search {
        general.search = search.clone();
    }
    if let Some(secs) = cli.loop_secs {
        general.loop_secs = secs;
    }
    if let Some(pct) = cli.top_pct {
        general.top_pct = pct;
    }
    if let Some(delta) = cli.min_delta_kb {
        general.min_delta_kb = Some(delta);
    }
    if let Some(cmdlen) = cli.cmdlen {
        general.cmdlen = cmdlen;
    }
    general.light &= !cli.expand_other;
    general.cpu &= !cli.no_cpu;
    general.fit_to_window |= cli.fit_to_window;
    general.numbers |= cli.numbers;
    general.rise_to_top &= !cli.no_rise;
    general.window &= !cli.no_window;

    config
}

fn options_for_cli(cli: &Cli, config: &Config) -> Options {
    let mut opts = Options::from_config(config);
    opts.filter = cli.pids.clone();
    opts.debug = cli.debug;
    if opts.window {
        if opts.loop_secs < 1.0 {
            opts.loop_secs = 5.0;
        }
        opts.top_pct = 100;
    } else {
        opts.fit_to_window = false;
        opts.cpu = false;
    }
    opts
}

fn build_monitor(config: &Config, opts: &Options) -> Monitor {
    let classifier = config.classifier.to_classifier();
    let procfs = ProcFs::new(&config.paths.proc_root, &config.paths.block_root);
    let collector = Collector::new(procfs, ClockTicks::detect(), classifier);
    let projector = ZramProjector {
        limit_pct: config.zram.limit_pct,
        fallback_ratio: config.zram.fallback_ratio,
    };
    Monitor::new(collector, projector, classifier, opts)
}

/// Restores the terminal however the window loop ends.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

fn run_window(
    opts: Options,
    monitor: Monitor,
    config: &Config,
    interrupted: Arc<AtomicBool>,
) -> Result<RunEnd> {
    let terminal = ratatui::init();
    let guard = TerminalGuard;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let keys = TerminalKeys::new(
        interrupted,
        Duration::from_millis(config.viewport.key_poll_ms),
    );
    let viewport = Viewport::new(terminal, keys, &config.viewport)?;
    let mut app = App::new(
        opts,
        monitor,
        viewport,
        Box::new(SysinfoSignaller::new()),
        EscalationPlan::default(),
        is_root(),
    );
    let end = app.run();
    drop(guard);
    end
}

fn run_plain(opts: Options, mut monitor: Monitor, interrupted: &AtomicBool) -> Result<RunEnd> {
    let mut sink = PlainSink::new();
    let mut out = stdout().lock();
    let mut is_first = true;
    loop {
        let now = chrono::Local::now().time();
        let outcome = monitor.poll(&opts, now, is_first, false, &mut sink)?;
        if matches!(outcome, PollOutcome::NoGroups) {
            return Ok(RunEnd::NoGroups);
        }
        sink.flush_to(&mut out).wrap_err("cannot write report")?;
        if opts.loop_secs <= 0.0 || !sleep_unless(interrupted, opts.loop_secs) {
            info!("plain loop finished");
            return Ok(RunEnd::Quit);
        }
        is_first = false;
    }
}

/// Sleeps `secs`; false when interrupted first.
fn sleep_unless(interrupted: &AtomicBool, secs: f64) -> bool {
    let deadline = Instant::now() + Duration::from_secs_f64(secs);
    loop {
        if interrupted.load(Ordering::SeqCst) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(Duration::from_millis(100)));
    }
}
