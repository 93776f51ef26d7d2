use std::thread;
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, Signal, System};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    Term,
    Kill,
}

impl KillSignal {
    pub fn name(self) -> &'static str {
        match self {
            KillSignal::Term => "SIGTERM",
            KillSignal::Kill => "SIGKILL",
        }
    }

    fn to_sysinfo(self) -> Signal {
        match self {
            KillSignal::Term => Signal::Term,
            KillSignal::Kill => Signal::Kill,
        }
    }
}

/// Sends signals and observes whether processes are gone.
pub trait Signaller {
    /// Returns false when the signal could not be delivered.
    fn signal(&mut self, pid: u32, signal: KillSignal) -> bool;
    /// A zombie counts as gone.
    fn is_alive(&mut self, pid: u32) -> bool;
    fn pause(&mut self, duration: Duration);
}

pub struct SysinfoSignaller {
    sys: System,
}

impl Default for SysinfoSignaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSignaller {
    pub fn new() -> Self {
        SysinfoSignaller { sys: System::new() }
    }

    fn refresh(&mut self, pid: Pid) {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
    }
}

impl Signaller for SysinfoSignaller {
    fn signal(&mut self, pid: u32, signal: KillSignal) -> bool {
        let sysinfo_pid = Pid::from_u32(pid);
        self.refresh(sysinfo_pid);
        match self.sys.process(sysinfo_pid) {
            Some(process) => match process.kill_with(signal.to_sysinfo()) {
                Some(sent) => sent,
                // Signal not supported on this platform, fall back to kill()
                None => process.kill(),
            },
            None => false,
        }
    }

    fn is_alive(&mut self, pid: u32) -> bool {
        let sysinfo_pid = Pid::from_u32(pid);
        self.refresh(sysinfo_pid);
        self.sys
            .process(sysinfo_pid)
            .is_some_and(|process| !matches!(process.status(), ProcessStatus::Zombie))
    }

    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// How hard and how long to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPlan {
    pub term_attempts: u32,
    pub kill_attempts: u32,
    pub poll: Duration,
}

impl Default for EscalationPlan {
    fn default() -> Self {
        EscalationPlan {
            term_attempts: 12,
            kill_attempts: 3,
            poll: Duration::from_millis(500),
        }
    }
}

impl EscalationPlan {
    fn steps(&self) -> impl Iterator<Item = KillSignal> {
        std::iter::repeat_n(KillSignal::Term, self.term_attempts as usize)
            .chain(std::iter::repeat_n(KillSignal::Kill, self.kill_attempts as usize))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillOutcome {
    pub success: bool,
    pub message: String,
    pub last_signal: Option<KillSignal>,
    pub survivors: Vec<u32>,
}

/// Signals every pid through the plan until all are gone or the plan runs out.
///
/// Only pids that are gone count as killed. A pid that refuses every signal
/// (not ours) but still exists ends the plan early and is reported as a
/// survivor.
pub fn kill_escalating(
    pids: &[u32],
    signaller: &mut dyn Signaller,
    plan: &EscalationPlan,
) -> KillOutcome {
    let mut remaining: Vec<u32> = pids.to_vec();
    let mut last_signal = None;

    for signal in plan.steps() {
        if remaining.is_empty() {
            break;
        }
        let delivered = remaining
            .iter()
            .filter(|&&pid| signaller.signal(pid, signal))
            .count();
        if delivered == 0 {
            remaining.retain(|&pid| signaller.is_alive(pid));
            debug!(signal = signal.name(), pids = ?remaining, "nothing signalled");
            break;
        }
        last_signal = Some(signal);
        debug!(signal = signal.name(), delivered, pids = ?remaining, "signalled");
        signaller.pause(plan.poll);
        remaining.retain(|&pid| signaller.is_alive(pid));
    }

    let outcome = if remaining.is_empty() {
        let sig = last_signal.map(KillSignal::name).unwrap_or("none");
        KillOutcome {
            success: true,
            message: format!("Gone (w sig {sig})"),
            last_signal,
            survivors: remaining,
        }
    } else {
        KillOutcome {
            success: false,
            message: format!("Still running: {remaining:?}"),
            last_signal,
            survivors: remaining,
        }
    };
    info!(pids = ?pids, success = outcome.success, message = %outcome.message, "kill finished");
    outcome
}
