use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Report, eyre};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;
use tracing::warn;

use super::popup::{self, Popup};
use super::scroll::{NavKey, ScrollState};
use super::ReportSink;
use crate::config::ViewportSection;
use crate::event::{InputEvent, KeySource};

/// Popups wait this long per key read; the key source still honours
/// interrupts within its own slice.
const POPUP_WAIT: Duration = Duration::from_secs(3600);

fn backend_error(err: impl Display) -> Report {
    eyre!("terminal backend: {err}")
}

pub fn ctrl_c() -> KeyEvent {
    KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
}

pub fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// A bounded buffer of styled lines.
#[derive(Debug)]
pub struct Region {
    lines: Vec<Line<'static>>,
    capacity: usize,
}

impl Region {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Vec::new(),
            capacity,
        }
    }

    /// Lines past capacity are dropped.
    pub fn add(&mut self, text: &str, style: Style, resume: bool) {
        let span = Span::styled(text.to_string(), style);
        let has_room = self.lines.len() < self.capacity;
        match self.lines.last_mut() {
            Some(last) if resume => last.push_span(span),
            _ if has_room => self.lines.push(Line::from(span)),
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }
}

fn plain_text(line: &Line) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

/// The two-region scrolling surface: pinned head lines, a rule carrying the
/// position indicator, then the scrollable body.
pub struct Viewport<B: Backend, K: KeySource> {
    terminal: Terminal<B>,
    keys: K,
    head: Region,
    body: Region,
    state: ScrollState,
    handled: Vec<KeyCode>,
    render_attempts: u32,
    render_backoff: Duration,
    pending_interrupt: bool,
}

impl<B: Backend, K: KeySource> Viewport<B, K> {
    pub fn new(terminal: Terminal<B>, keys: K, settings: &ViewportSection) -> Result<Self> {
        let size = terminal.size().map_err(backend_error)?;
        Ok(Self {
            terminal,
            keys,
            head: Region::new(settings.head_rows),
            body: Region::new(settings.body_rows),
            state: ScrollState::new(size.height as usize, size.width as usize),
            handled: Vec::new(),
            render_attempts: settings.render_attempts.max(1),
            render_backoff: Duration::from_millis(settings.render_backoff_ms),
            pending_interrupt: false,
        })
    }

    /// Keys that `prompt` hands back to the caller instead of absorbing.
    pub fn set_handled_keys(&mut self, keys: Vec<KeyCode>) {
        self.handled = keys;
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn keys_mut(&mut self) -> &mut K {
        &mut self.keys
    }

    pub fn clear(&mut self) {
        self.head.clear();
        self.body.clear();
    }

    pub fn set_pick_mode(&mut self, on: bool, size: usize) {
        self.state.set_pick_mode(on, size);
    }

    /// Body row under the pick marker, in pick mode.
    pub fn pick_pos(&self) -> Option<usize> {
        self.state.pick_mode.then_some(self.state.pick)
    }

    pub fn scroll_pos(&self) -> usize {
        self.state.scroll
    }

    /// Draws the current buffers, retrying transient backend failures.
    pub fn render(&mut self) -> Result<()> {
        self.render_with(None)
    }

    fn render_with(&mut self, popup: Option<&Popup>) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.render_once(popup) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.render_attempts => {
                    warn!(attempt, %err, "render failed, retrying");
                    attempt += 1;
                    thread::sleep(self.render_backoff);
                }
                Err(err) => return Err(err.wrap_err("terminal render kept failing")),
            }
        }
    }

    fn render_once(&mut self, popup: Option<&Popup>) -> Result<()> {
        let size = self.terminal.size().map_err(backend_error)?;
        self.state.resize(size.height as usize, size.width as usize);
        self.state.set_counts(self.head.len(), self.body.len());
        self.state.clamp();
        if self.state.full_repaint {
            self.terminal.clear().map_err(backend_error)?;
            self.state.full_repaint = false;
        }
        let lines = self.visible_lines();
        self.terminal
            .draw(|frame| {
                let area = frame.area();
                frame.render_widget(Paragraph::new(lines), area);
                if let Some(popup) = popup {
                    popup::render(frame, area, popup);
                }
            })
            .map_err(backend_error)?;
        Ok(())
    }

    fn rule_line(&self) -> Line<'static> {
        let cols = self.state.cols;
        let Some((start, width)) = self.state.indicator() else {
            return Line::from("─".repeat(cols));
        };
        let start = start.min(cols);
        let width = width.min(cols - start);
        Line::from(vec![
            Span::raw("─".repeat(start)),
            Span::styled(
                " ".repeat(width),
                Style::default().add_modifier(Modifier::REVERSED),
            ),
            Span::raw("─".repeat(cols - start - width)),
        ])
    }

    fn visible_lines(&self) -> Vec<Line<'static>> {
        let state = &self.state;
        let mut lines: Vec<Line<'static>> = self.head.lines()[..state.head_view].to_vec();
        lines.push(self.rule_line());

        let reversed = Style::default().add_modifier(Modifier::REVERSED);
        let pick_rows = state.pick..state.pick + state.pick_size;
        for idx in state.scroll..(state.scroll + state.view).min(self.body.len()) {
            let line = &self.body.lines()[idx];
            if !state.pick_mode {
                lines.push(line.clone());
            } else if pick_rows.contains(&idx) {
                let marker = if idx == state.pick { ">" } else { " " };
                lines.push(Line::from(vec![
                    Span::styled(marker, reversed),
                    Span::styled(plain_text(line), reversed),
                ]));
            } else {
                lines.push(Line::from(format!(" {}", plain_text(line))));
            }
        }
        lines
    }

    fn is_handled(&self, key: &KeyEvent) -> bool {
        !key.modifiers.contains(KeyModifiers::CONTROL) && self.handled.contains(&key.code)
    }

    /// Renders, then waits up to `timeout` for a key the caller handles.
    ///
    /// Navigation keys are consumed here and re-render only when the
    /// position moves. Ctrl-C, typed or signalled, is always returned.
    pub fn prompt(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        if std::mem::take(&mut self.pending_interrupt) {
            return Ok(Some(ctrl_c()));
        }
        let deadline = Instant::now() + timeout;
        self.render()?;
        loop {
            // navigation keys must not push the deadline out
            let left = deadline.saturating_duration_since(Instant::now());
            match self.keys.next_event(left)? {
                None => return Ok(None),
                Some(InputEvent::Interrupt) => return Ok(Some(ctrl_c())),
                Some(InputEvent::Resize) => self.render()?,
                Some(InputEvent::Key(key)) => {
                    if is_ctrl_c(&key) || self.is_handled(&key) {
                        return Ok(Some(key));
                    }
                    if let Some(nav) = NavKey::from_key(&key)
                        && self.state.apply_nav(nav)
                    {
                        self.render()?;
                    }
                }
            }
        }
    }

    fn popup_area(&self) -> Rect {
        Rect::new(0, 0, self.state.cols as u16, self.state.rows as u16)
    }

    /// Line editor in a popup. Enter submits, Esc restores `seed`.
    pub fn answer(&mut self, prompt: &str, seed: &str) -> Result<String> {
        if !Popup::fits(self.popup_area()) {
            return Ok(seed.to_string());
        }
        let mut text = seed.to_string();
        loop {
            self.render_with(Some(&Popup::new(prompt, format!("{text}_"))))?;
            match self.keys.next_event(POPUP_WAIT)? {
                None | Some(InputEvent::Resize) => {}
                Some(InputEvent::Interrupt) => {
                    self.pending_interrupt = true;
                    return Ok(seed.to_string());
                }
                Some(InputEvent::Key(key)) if is_ctrl_c(&key) => {
                    self.pending_interrupt = true;
                    return Ok(seed.to_string());
                }
                Some(InputEvent::Key(key)) => match key.code {
                    KeyCode::Enter => return Ok(text),
                    KeyCode::Esc => return Ok(seed.to_string()),
                    KeyCode::Backspace => {
                        text.pop();
                    }
                    KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                        text.push(c);
                    }
                    _ => {}
                },
            }
        }
    }

    /// Shows a message until Enter.
    pub fn alert(&mut self, title: &str, message: &str) -> Result<()> {
        if !Popup::fits(self.popup_area()) {
            return Ok(());
        }
        let popup = Popup::new(title, format!("{message}  [ENTER to continue]"));
        loop {
            self.render_with(Some(&popup))?;
            match self.keys.next_event(POPUP_WAIT)? {
                Some(InputEvent::Interrupt) => {
                    self.pending_interrupt = true;
                    return Ok(());
                }
                Some(InputEvent::Key(key)) if is_ctrl_c(&key) => {
                    self.pending_interrupt = true;
                    return Ok(());
                }
                Some(InputEvent::Key(key)) if key.code == KeyCode::Enter => return Ok(()),
                _ => {}
            }
        }
    }
}

impl<B: Backend, K: KeySource> ReportSink for Viewport<B, K> {
    fn add_header(&mut self, text: &str, style: Style, resume: bool) {
        self.head.add(text, style, resume);
    }

    fn add_body(&mut self, text: &str, style: Style, resume: bool) {
        self.body.add(text, style, resume);
    }

    fn body_row_count(&self) -> usize {
        self.body.len()
    }

    fn is_windowed(&self) -> bool {
        true
    }

    fn view_rows(&self) -> Option<usize> {
        let rows = self.state.rows;
        let head_view = rows.saturating_sub(1).min(self.head.len());
        Some(rows.saturating_sub(head_view + 1))
    }
}
