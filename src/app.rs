use std::collections::HashMap;
use std::time::Duration;

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::backend::Backend;
use tracing::info;

use crate::action::Action;
use crate::event::KeySource;
use crate::monitor::{Monitor, PollOutcome};
use crate::options::{Choice, GroupBy, Options, SPINNER, spinner_entry};
use crate::system::kill::{EscalationPlan, Signaller, kill_escalating};
use crate::ui::help::write_help;
use crate::ui::viewport::{Viewport, is_ctrl_c};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Help,
}

/// Why the window loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Quit,
    /// Every reported process went away.
    NoGroups,
}

/// The window-mode control loop.
pub struct App<B: Backend, K: KeySource> {
    pub running: bool,
    pub opts: Options,
    monitor: Monitor,
    viewport: Viewport<B, K>,
    signaller: Box<dyn Signaller>,
    plan: EscalationPlan,
    rows_by_line: HashMap<usize, String>,
    is_first: bool,
    was_group_by: GroupBy,
    was_light: bool,
    is_root: bool,
}

impl<B: Backend, K: KeySource> App<B, K> {
    pub fn new(
        opts: Options,
        monitor: Monitor,
        mut viewport: Viewport<B, K>,
        signaller: Box<dyn Signaller>,
        plan: EscalationPlan,
        is_root: bool,
    ) -> Self {
        let mut handled: Vec<KeyCode> = SPINNER.iter().map(|e| KeyCode::Char(e.key)).collect();
        handled.extend([KeyCode::Char('q'), KeyCode::Enter]);
        viewport.set_handled_keys(handled);
        App {
            running: true,
            was_group_by: opts.group_by,
            was_light: opts.light,
            opts,
            monitor,
            viewport,
            signaller,
            plan,
            rows_by_line: HashMap::new(),
            is_first: true,
            is_root,
        }
    }

    pub fn input_mode(&self) -> InputMode {
        if self.opts.help {
            InputMode::Help
        } else {
            InputMode::Normal
        }
    }

    pub fn viewport(&self) -> &Viewport<B, K> {
        &self.viewport
    }

    fn wait(&self) -> Duration {
        Duration::from_secs_f64(self.opts.loop_secs.max(0.0))
    }

    pub fn map_key(&self, key: KeyEvent) -> Action {
        // Ctrl+C always quits
        if is_ctrl_c(&key) {
            return Action::Quit;
        }
        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Enter => match self.input_mode() {
                InputMode::Help => Action::CloseHelp,
                InputMode::Normal if self.opts.kill_mode => Action::KillPicked,
                InputMode::Normal => Action::None,
            },
            code => match spinner_entry(code) {
                Some(entry) if entry.choice == Choice::Search => Action::PromptSearch,
                Some(entry) => Action::Cycle(entry.choice),
                None => Action::None,
            },
        }
    }

    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,
            Action::Cycle(choice) => {
                self.opts.cycle(choice);
                match choice {
                    Choice::Help => {
                        let pick = self.input_mode() == InputMode::Normal && self.opts.kill_mode;
                        self.viewport.set_pick_mode(pick, 1);
                    }
                    Choice::KillMode if self.input_mode() == InputMode::Normal => {
                        self.viewport.set_pick_mode(self.opts.kill_mode, 1);
                    }
                    _ => {}
                }
            }
            Action::PromptSearch => {
                let search = self
                    .viewport
                    .answer("Set search string, then Enter", &self.opts.search)?;
                self.opts.search = search;
            }
            Action::CloseHelp => self.opts.help = false,
            Action::KillPicked => self.kill_picked()?,
            Action::None => {}
        }
        Ok(())
    }

    fn kill_picked(&mut self) -> Result<()> {
        let picked = self
            .viewport
            .pick_pos()
            .and_then(|line| self.rows_by_line.get(&line))
            .and_then(|key| self.monitor.group_members(key));
        if let Some((info, pids)) = picked {
            let answer = self
                .viewport
                .answer(&format!("Type \"y\" to kill: {info} {pids:?}"), "")?;
            if answer.to_lowercase().starts_with('y') {
                info!(group = %info, pids = ?pids, "killing group");
                let outcome = kill_escalating(&pids, self.signaller.as_mut(), &self.plan);
                let title = if outcome.success { "OK" } else { "FAIL" };
                self.viewport.alert(title, &outcome.message)?;
            }
        }
        self.opts.kill_mode = false;
        self.viewport.set_pick_mode(false, 1);
        Ok(())
    }

    fn handle(&mut self, key: Option<KeyEvent>) -> Result<()> {
        match key {
            Some(key) => {
                let action = self.map_key(key);
                self.dispatch(action)
            }
            None => Ok(()),
        }
    }

    pub fn run(&mut self) -> Result<RunEnd> {
        while self.running {
            match self.input_mode() {
                InputMode::Help => {
                    self.viewport.set_pick_mode(false, 1);
                    self.viewport.clear();
                    write_help(&mut self.viewport, &self.opts, self.is_root);
                    let key = self.viewport.prompt(self.wait())?;
                    self.handle(key)?;
                    self.viewport.clear();
                }
                InputMode::Normal => {
                    if self.poll_once()? == PollResult::Empty {
                        return Ok(RunEnd::NoGroups);
                    }
                    self.viewport.set_pick_mode(self.opts.kill_mode, 1);
                    let key = self.viewport.prompt(self.wait())?;
                    self.handle(key)?;
                    while self.running
                        && self.opts.kill_mode
                        && self.input_mode() == InputMode::Normal
                    {
                        let key = self.viewport.prompt(self.wait())?;
                        self.handle(key)?;
                    }
                    self.viewport.clear();
                    self.is_first = false;
                }
            }
        }
        Ok(RunEnd::Quit)
    }

    fn poll_once(&mut self) -> Result<PollResult> {
        let regroup =
            self.was_group_by != self.opts.group_by || self.was_light != self.opts.light;
        let now = chrono::Local::now().time();
        self.viewport.clear();
        if self.is_first || regroup {
            self.viewport.set_pick_mode(false, 1);
            self.monitor
                .write_working(&mut self.viewport, &self.opts, now, self.is_root)?;
            self.viewport.render()?;
            self.viewport.clear();
        }
        let outcome =
            self.monitor
                .poll(&self.opts, now, self.is_first, regroup, &mut self.viewport)?;
        self.was_group_by = self.opts.group_by;
        self.was_light = self.opts.light;
        match outcome {
            PollOutcome::NoGroups => Ok(PollResult::Empty),
            PollOutcome::Reported(report) => {
                self.rows_by_line = report.rows_by_line;
                Ok(PollResult::Shown)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollResult {
    Shown,
    Empty,
}
