use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

/// Terminals smaller than this skip popups entirely.
pub const MIN_ROWS: u16 = 3;
pub const MIN_COLS: u16 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub text: String,
}

impl Popup {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    pub fn fits(area: Rect) -> bool {
        area.height >= MIN_ROWS && area.width >= MIN_COLS
    }
}

/// Draws a bordered box centered on `area`, wrapping long text.
pub fn render(frame: &mut Frame, area: Rect, popup: &Popup) {
    let max_width = area.width.saturating_sub(2).max(1);
    let want = popup.title.width().max(popup.text.width()) as u16 + 4;
    let width = want.clamp(MIN_COLS.min(max_width), max_width);
    let inner_width = width.saturating_sub(2).max(1);
    let text_rows = (popup.text.width() as u16).div_ceil(inner_width).max(1);
    let height = (text_rows + 2).min(area.height);

    let overlay = centered_rect(width, height, area);
    frame.render_widget(Clear, overlay);

    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        format!(" {} ", popup.title),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    frame.render_widget(
        Paragraph::new(Line::from(popup.text.as_str())).wrap(Wrap { trim: false }),
        inner,
    );
}

pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let [vert] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [horiz] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(vert);
    horiz
}
