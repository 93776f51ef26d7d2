use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Resize,
    /// Ctrl-C delivered as a signal rather than a key.
    Interrupt,
}

/// Where the viewport gets its keys from.
pub trait KeySource {
    /// Waits at most `timeout`; `None` when nothing arrived.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>>;
}

/// Terminal keys, polled in short slices so an interrupt is noticed promptly.
pub struct TerminalKeys {
    interrupted: Arc<AtomicBool>,
    slice: Duration,
}

impl TerminalKeys {
    pub fn new(interrupted: Arc<AtomicBool>, slice: Duration) -> Self {
        Self {
            interrupted,
            slice: slice.max(Duration::from_millis(1)),
        }
    }
}

impl KeySource for TerminalKeys {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                return Ok(Some(InputEvent::Interrupt));
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(None);
            }
            if event::poll(left.min(self.slice))? {
                match event::read()? {
                    CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                        return Ok(Some(InputEvent::Key(key)));
                    }
                    CrosstermEvent::Resize(_, _) => return Ok(Some(InputEvent::Resize)),
                    _ => {}
                }
            }
        }
    }
}

/// Replays a fixed sequence; `None` entries act as timeouts. Once drained it
/// reports an interrupt so loops under test always end.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    events: VecDeque<Option<InputEvent>>,
}

impl ScriptedKeys {
    pub fn new(events: impl IntoIterator<Item = Option<InputEvent>>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    pub fn keys(keys: impl IntoIterator<Item = KeyEvent>) -> Self {
        Self::new(keys.into_iter().map(|k| Some(InputEvent::Key(k))))
    }

    pub fn push(&mut self, event: Option<InputEvent>) {
        self.events.push_back(event);
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl KeySource for ScriptedKeys {
    fn next_event(&mut self, _timeout: Duration) -> Result<Option<InputEvent>> {
        Ok(self
            .events
            .pop_front()
            .unwrap_or(Some(InputEvent::Interrupt)))
    }
}
