use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Rows taken by the horizontal rule between head and body.
pub const RULE_ROWS: usize = 1;

pub const NAV_KEYS_BLURB: &str = "\
Navigation:    H/M/L:   top/middle/end-of-page
    k, UP:  up one row               0, HOME:  first row
  j, DOWN:  down one row              $, END:  last row
   Ctrl-u:  half-page up      Ctrl-b, PGUP:  page up
   Ctrl-d:  half-page down    Ctrl-f, PGDN:  page down";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    PageUp,
    PageDown,
    HalfPageUp,
    HalfPageDown,
    First,
    Last,
    PageTop,
    PageMiddle,
    PageBottom,
}

impl NavKey {
    pub fn from_key(key: &KeyEvent) -> Option<NavKey> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let nav = match key.code {
            KeyCode::Char('b') if ctrl => NavKey::PageUp,
            KeyCode::Char('f') if ctrl => NavKey::PageDown,
            KeyCode::Char('u') if ctrl => NavKey::HalfPageUp,
            KeyCode::Char('d') if ctrl => NavKey::HalfPageDown,
            _ if ctrl => return None,
            KeyCode::Char('k') | KeyCode::Up => NavKey::Up,
            KeyCode::Char('j') | KeyCode::Down => NavKey::Down,
            KeyCode::PageUp => NavKey::PageUp,
            KeyCode::PageDown => NavKey::PageDown,
            KeyCode::Char('0') | KeyCode::Home => NavKey::First,
            KeyCode::Char('$') | KeyCode::End => NavKey::Last,
            KeyCode::Char('H') => NavKey::PageTop,
            KeyCode::Char('M') => NavKey::PageMiddle,
            KeyCode::Char('L') => NavKey::PageBottom,
            _ => return None,
        };
        Some(nav)
    }
}

/// Interpolates `pos` over `[pos0, pos9]` into `[ind0, ind9]`.
///
/// Only the extreme positions map to the extreme indicator slots; `None`
/// when the range is empty.
pub fn indicator_position(pos: i64, pos0: i64, pos9: i64, ind0: i64, ind9: i64) -> Option<i64> {
    if pos9 - pos0 <= 0 {
        return None;
    }
    if pos <= pos0 {
        return Some(ind0);
    }
    if pos >= pos9 {
        return Some(ind9);
    }
    let ind = (ind0 as f64 + (ind9 - ind0 + 1) as f64 * (pos - pos0) as f64 / (pos9 - pos0 + 1) as f64)
        .round() as i64;
    Some(ind.max(ind0 + 1).min(ind9 - 1))
}

/// Geometry and position of the two-region viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollState {
    pub rows: usize,
    pub cols: usize,
    pub head_count: usize,
    pub body_count: usize,
    /// Head rows shown above the rule.
    pub head_view: usize,
    /// Body rows shown below the rule.
    pub view: usize,
    pub max_scroll: usize,
    pub scroll: usize,
    pub pick: usize,
    pub pick_mode: bool,
    pub pick_size: usize,
    /// Set when the next draw must start from a cleared terminal.
    pub full_repaint: bool,
}

impl ScrollState {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut state = ScrollState {
            rows,
            cols,
            head_count: 0,
            body_count: 0,
            head_view: 0,
            view: 0,
            max_scroll: 0,
            scroll: 0,
            pick: 0,
            pick_mode: false,
            pick_size: 1,
            full_repaint: false,
        };
        state.calc();
        state
    }

    /// Returns true when the geometry changed.
    pub fn resize(&mut self, rows: usize, cols: usize) -> bool {
        let changed = (rows, cols) != (self.rows, self.cols);
        self.rows = rows;
        self.cols = cols;
        self.calc();
        changed
    }

    pub fn set_counts(&mut self, head_count: usize, body_count: usize) {
        self.head_count = head_count;
        self.body_count = body_count;
        self.calc();
    }

    pub fn calc(&mut self) {
        self.head_view = self.rows.saturating_sub(RULE_ROWS).min(self.head_count);
        self.view = self.rows.saturating_sub(self.head_view + RULE_ROWS);
        self.max_scroll = self.body_count.saturating_sub(self.view);
    }

    pub fn body_base(&self) -> usize {
        self.head_view + RULE_ROWS
    }

    pub fn set_pick_mode(&mut self, on: bool, size: usize) {
        let (was_on, was_size) = (self.pick_mode, self.pick_size);
        self.pick_mode = on;
        self.pick_size = size.max(1);
        if self.pick_mode && (!was_on || was_size != self.pick_size) {
            self.full_repaint = true;
        }
    }

    /// Brings scroll and pick back into range, scrolling to keep the pick
    /// visible.
    pub fn clamp(&mut self) {
        self.calc();
        if self.pick_mode {
            if self.body_count == 0 {
                self.pick = 0;
                self.scroll = 0;
            } else {
                self.pick = self.pick.min(self.body_count - 1);
                self.pick -= self.pick % self.pick_size;
                if self.scroll > self.pick {
                    self.scroll = self.pick;
                } else if self.pick + self.pick_size > self.scroll + self.view {
                    self.scroll = (self.pick + self.pick_size).saturating_sub(self.view);
                }
            }
        }
        self.scroll = self.scroll.min(self.max_scroll);
    }

    /// Moves by a navigation key; returns whether the position changed.
    pub fn apply_nav(&mut self, nav: NavKey) -> bool {
        self.clamp();
        let before = (self.scroll, self.pick);
        let (pos, step) = if self.pick_mode {
            (self.pick as i64, self.pick_size as i64)
        } else {
            (self.scroll as i64, 1)
        };
        let view = self.view as i64;
        let scroll = self.scroll as i64;
        let target = match nav {
            NavKey::Up => pos - step,
            NavKey::Down => pos + step,
            NavKey::PageUp => pos - view,
            NavKey::PageDown => pos + view,
            NavKey::HalfPageUp => pos - view / 2,
            NavKey::HalfPageDown => pos + view / 2,
            NavKey::First => 0,
            NavKey::Last => self.body_count as i64 - 1,
            NavKey::PageTop => scroll,
            NavKey::PageMiddle => scroll + view / 2,
            NavKey::PageBottom => scroll + view - 1,
        };
        let target = target.max(0) as usize;
        if self.pick_mode {
            self.pick = target;
        } else {
            self.scroll = target;
        }
        self.clamp();
        (self.scroll, self.pick) != before
    }

    /// Start column and width of the reverse-video segment on the rule.
    pub fn indicator(&self) -> Option<(usize, usize)> {
        if self.max_scroll == 0 || self.cols == 0 {
            return None;
        }
        let last_col = self.cols as i64 - 1;
        let col = if self.pick_mode {
            indicator_position(self.pick as i64, 0, self.body_count as i64 - 1, 0, last_col)
        } else {
            indicator_position(self.scroll as i64, 0, self.max_scroll as i64, 0, last_col)
        }?;
        if col <= 0 || col >= last_col {
            return Some((col.max(0) as usize, 1));
        }
        let width = self.view as f64 / self.body_count as f64 * self.cols as f64;
        let bot = ((col as f64 - width / 2.0).round() as i64).max(1);
        let top = ((col as f64 + width / 2.0).round() as i64).min(last_col);
        Some((bot as usize, (top - bot).max(1) as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: usize, head: usize, body: usize) -> ScrollState {
        let mut state = ScrollState::new(rows, 80);
        state.set_counts(head, body);
        state
    }

    #[test]
    fn geometry() {
        let s = state(24, 3, 100);
        assert_eq!(s.head_view, 3);
        assert_eq!(s.view, 20);
        assert_eq!(s.max_scroll, 80);
        assert_eq!(s.body_base(), 4);

        let tall_head = state(10, 30, 5);
        assert_eq!(tall_head.head_view, 9);
        assert_eq!(tall_head.view, 0);
        assert_eq!(tall_head.max_scroll, 5);
    }

    #[test]
    fn scroll_moves_and_clamps() {
        let mut s = state(24, 3, 100);
        assert!(!s.apply_nav(NavKey::Up));
        assert!(s.apply_nav(NavKey::PageDown));
        assert_eq!(s.scroll, 20);
        assert!(s.apply_nav(NavKey::HalfPageDown));
        assert_eq!(s.scroll, 30);
        assert!(s.apply_nav(NavKey::Last));
        assert_eq!(s.scroll, 80);
        assert!(!s.apply_nav(NavKey::Down));
        assert!(s.apply_nav(NavKey::First));
        assert_eq!(s.scroll, 0);
    }

    #[test]
    fn pick_auto_scrolls_by_overflow() {
        let mut s = state(24, 3, 100);
        s.set_pick_mode(true, 1);
        assert!(s.full_repaint);
        s.pick = 19;
        s.clamp();
        assert_eq!(s.scroll, 0);
        s.apply_nav(NavKey::Down);
        assert_eq!((s.pick, s.scroll), (20, 1));
        s.pick = 25;
        s.clamp();
        assert_eq!(s.scroll, 6);
        s.pick = 2;
        s.clamp();
        assert_eq!(s.scroll, 2);
    }

    #[test]
    fn pick_aligns_to_block() {
        let mut s = state(24, 3, 100);
        s.set_pick_mode(true, 3);
        s.pick = 8;
        s.clamp();
        assert_eq!(s.pick, 6);
        s.apply_nav(NavKey::Down);
        assert_eq!(s.pick, 9);
        s.apply_nav(NavKey::Last);
        assert_eq!(s.pick, 99);
    }

    #[test]
    fn pick_mode_repaint_only_on_change() {
        let mut s = state(24, 3, 100);
        s.set_pick_mode(true, 1);
        s.full_repaint = false;
        s.set_pick_mode(true, 1);
        assert!(!s.full_repaint);
        s.set_pick_mode(true, 2);
        assert!(s.full_repaint);
    }

    #[test]
    fn interpolated_indicator() {
        assert_eq!(indicator_position(0, 0, 80, 0, 79), Some(0));
        assert_eq!(indicator_position(80, 0, 80, 0, 79), Some(79));
        assert_eq!(indicator_position(1, 0, 80, 0, 79), Some(1));
        assert_eq!(indicator_position(79, 0, 80, 0, 79), Some(78));
        assert_eq!(indicator_position(40, 0, 80, 0, 79), Some(40));
        assert_eq!(indicator_position(3, 3, 3, 0, 79), None);
    }

    #[test]
    fn indicator_segment() {
        let mut s = state(24, 3, 100);
        assert_eq!(s.indicator(), Some((0, 1)));
        s.scroll = 40;
        let (start, width) = s.indicator().unwrap();
        assert_eq!((start, width), (32, 16));
        assert!(state(24, 3, 10).indicator().is_none());
    }

    #[test]
    fn nav_keys() {
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        let plain = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(NavKey::from_key(&ctrl('b')), Some(NavKey::PageUp));
        assert_eq!(NavKey::from_key(&ctrl('d')), Some(NavKey::HalfPageDown));
        assert_eq!(NavKey::from_key(&ctrl('k')), None);
        assert_eq!(NavKey::from_key(&plain('k')), Some(NavKey::Up));
        assert_eq!(NavKey::from_key(&plain('$')), Some(NavKey::Last));
        assert_eq!(NavKey::from_key(&plain('u')), None);
        assert_eq!(
            NavKey::from_key(&KeyEvent::new(KeyCode::End, KeyModifiers::NONE)),
            Some(NavKey::Last)
        );
    }
}
