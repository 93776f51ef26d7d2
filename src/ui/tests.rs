use std::thread;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::style::{Modifier, Style};

use crate::config::ViewportSection;
use color_eyre::Result;

use crate::event::{InputEvent, KeySource, ScriptedKeys};
use crate::ui::viewport::{Region, Viewport, is_ctrl_c};
use crate::ui::{PlainSink, ReportSink};

const WAIT: Duration = Duration::from_millis(10);

fn buffer_lines(buf: &ratatui::buffer::Buffer) -> Vec<String> {
    let area = buf.area;
    (0..area.height)
        .map(|y| {
            let mut line = String::new();
            for x in 0..area.width {
                line.push_str(buf[(x, y)].symbol());
            }
            line.trim_end().to_string()
        })
        .collect()
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn viewport(keys: ScriptedKeys) -> Viewport<TestBackend, ScriptedKeys> {
    let terminal = Terminal::new(TestBackend::new(30, 6)).unwrap();
    let mut viewport = Viewport::new(terminal, keys, &ViewportSection::default()).unwrap();
    viewport.add_header("head one", Style::default(), false);
    viewport.add_header("head two", Style::default(), false);
    for i in 0..10 {
        viewport.add_body(&format!("row {i}"), Style::default(), false);
    }
    viewport
}

fn screen(viewport: &Viewport<TestBackend, ScriptedKeys>) -> Vec<String> {
    buffer_lines(viewport.terminal().backend().buffer())
}

#[test]
fn rule_separates_head_and_body() {
    let mut vp = viewport(ScriptedKeys::default());
    vp.render().unwrap();
    let lines = screen(&vp);
    assert_eq!(lines[0], "head one");
    assert_eq!(lines[1], "head two");
    assert_eq!(lines[2], format!(" {}", "─".repeat(29)));
    assert_eq!(&lines[3..], ["row 0", "row 1", "row 2"]);

    let buf = vp.terminal().backend().buffer();
    assert!(buf[(0, 2)].modifier.contains(Modifier::REVERSED));
    assert!(!buf[(1, 2)].modifier.contains(Modifier::REVERSED));
}

#[test]
fn nav_keys_scroll_the_body() {
    let keys = ScriptedKeys::new([
        Some(InputEvent::Key(key(KeyCode::Char('j')))),
        Some(InputEvent::Key(key(KeyCode::Char('j')))),
        None,
    ]);
    let mut vp = viewport(keys);
    assert_eq!(vp.prompt(WAIT).unwrap(), None);
    assert_eq!(vp.scroll_pos(), 2);
    assert_eq!(&screen(&vp)[3..], ["row 2", "row 3", "row 4"]);
}

/// Replays a script, taking `delay` per event and noting each offered timeout.
struct SlowKeys {
    script: ScriptedKeys,
    delay: Duration,
    offered: Vec<Duration>,
}

impl KeySource for SlowKeys {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        self.offered.push(timeout);
        thread::sleep(self.delay);
        self.script.next_event(timeout)
    }
}

#[test]
fn scrolling_does_not_extend_the_wait() {
    let j = || Some(InputEvent::Key(key(KeyCode::Char('j'))));
    let keys = SlowKeys {
        script: ScriptedKeys::new([j(), j(), j(), None]),
        delay: Duration::from_millis(20),
        offered: Vec::new(),
    };
    let terminal = Terminal::new(TestBackend::new(30, 6)).unwrap();
    let mut vp = Viewport::new(terminal, keys, &ViewportSection::default()).unwrap();
    let wait = Duration::from_secs(1);
    assert_eq!(vp.prompt(wait).unwrap(), None);

    let offered = &vp.keys_mut().offered;
    assert_eq!(offered.len(), 4);
    assert!(offered[0] <= wait);
    assert!(offered.windows(2).all(|w| w[1] <= w[0]));
    assert!(offered[3] <= wait - Duration::from_millis(60));
}

#[test]
fn end_key_shows_last_rows() {
    let keys = ScriptedKeys::new([Some(InputEvent::Key(key(KeyCode::End))), None]);
    let mut vp = viewport(keys);
    vp.prompt(WAIT).unwrap();
    let lines = screen(&vp);
    assert_eq!(&lines[3..], ["row 7", "row 8", "row 9"]);
    let buf = vp.terminal().backend().buffer();
    assert!(buf[(29, 2)].modifier.contains(Modifier::REVERSED));
}

#[test]
fn pick_mode_marks_the_picked_row() {
    let keys = ScriptedKeys::new([Some(InputEvent::Key(key(KeyCode::Down))), None]);
    let mut vp = viewport(keys);
    vp.set_pick_mode(true, 1);
    vp.prompt(WAIT).unwrap();
    assert_eq!(vp.pick_pos(), Some(1));
    assert_eq!(&screen(&vp)[3..], [" row 0", ">row 1", " row 2"]);
}

#[test]
fn only_handled_keys_come_back() {
    let keys = ScriptedKeys::keys([key(KeyCode::Char('x')), key(KeyCode::Char('q'))]);
    let mut vp = viewport(keys);
    vp.set_handled_keys(vec![KeyCode::Char('q')]);
    let got = vp.prompt(WAIT).unwrap();
    assert_eq!(got, Some(key(KeyCode::Char('q'))));
}

#[test]
fn resize_is_absorbed() {
    let keys = ScriptedKeys::new([Some(InputEvent::Resize), None]);
    let mut vp = viewport(keys);
    assert_eq!(vp.prompt(WAIT).unwrap(), None);
}

#[test]
fn answer_edits_a_line() {
    let keys = ScriptedKeys::keys([
        key(KeyCode::Char('a')),
        key(KeyCode::Char('b')),
        key(KeyCode::Backspace),
        key(KeyCode::Char('c')),
        key(KeyCode::Enter),
    ]);
    let mut vp = viewport(keys);
    assert_eq!(vp.answer("Search", "").unwrap(), "ac");
    let lines = screen(&vp);
    assert!(lines.iter().any(|l| l.contains("Search")));
    assert!(lines.iter().any(|l| l.contains("ac_")));
}

#[test]
fn escape_restores_seed() {
    let keys = ScriptedKeys::keys([key(KeyCode::Char('z')), key(KeyCode::Esc)]);
    let mut vp = viewport(keys);
    assert_eq!(vp.answer("Search", "fire").unwrap(), "fire");
}

#[test]
fn interrupt_in_popup_surfaces_at_next_prompt() {
    let keys = ScriptedKeys::new([Some(InputEvent::Interrupt), None]);
    let mut vp = viewport(keys);
    assert_eq!(vp.answer("Search", "seed").unwrap(), "seed");
    let got = vp.prompt(WAIT).unwrap();
    assert!(got.is_some_and(|k| is_ctrl_c(&k)));
    // the scripted timeout is still queued
    assert_eq!(vp.prompt(WAIT).unwrap(), None);
}

#[test]
fn alert_waits_for_enter() {
    let keys = ScriptedKeys::keys([key(KeyCode::Char('x')), key(KeyCode::Enter)]);
    let mut vp = viewport(keys);
    vp.alert("OK", "Gone").unwrap();
    assert_eq!(vp.keys_mut().remaining(), 0);
    assert!(screen(&vp).iter().any(|l| l.contains(" OK ")));
}

#[test]
fn tiny_terminal_skips_popups() {
    let terminal = Terminal::new(TestBackend::new(20, 2)).unwrap();
    let keys = ScriptedKeys::keys([key(KeyCode::Char('a'))]);
    let mut vp = Viewport::new(terminal, keys, &ViewportSection::default()).unwrap();
    assert_eq!(vp.answer("Search", "seed").unwrap(), "seed");
    assert_eq!(vp.keys_mut().remaining(), 1);
}

#[test]
fn fit_budget_excludes_head_and_rule() {
    let vp = viewport(ScriptedKeys::default());
    assert_eq!(vp.view_rows(), Some(3));
    assert_eq!(vp.body_row_count(), 10);
}

#[test]
fn region_drops_past_capacity_but_resumes() {
    let mut region = Region::new(2);
    region.add("a", Style::default(), false);
    region.add("b", Style::default(), false);
    region.add("c", Style::default(), false);
    region.add("+", Style::default(), true);
    assert_eq!(region.len(), 2);
    let last: String = region.lines()[1]
        .spans
        .iter()
        .map(|s| s.content.as_ref())
        .collect();
    assert_eq!(last, "b+");
}

#[test]
fn plain_sink_flushes_with_blank_line() {
    let mut sink = PlainSink::new();
    sink.add_header("top", Style::default(), false);
    sink.add_body("row", Style::default(), false);
    sink.add_body(" more", Style::default(), true);
    assert_eq!(sink.body_row_count(), 1);
    let mut out = Vec::new();
    sink.flush_to(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "top\nrow more\n\n");
    assert!(sink.lines().is_empty());
    assert_eq!(sink.body_row_count(), 0);
}
