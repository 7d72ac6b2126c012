use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::Palette;

const KEY_HINTS: &str = " /:filter  n:group  f:folder  r:ren  D:del  m/p:drag  o:sort  s:save ";

/// One-line bar showing the focused node's path and counters, a status
/// message, or the active text prompt.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    info: &'a str,
    palette: &'a Palette,
    status_message: Option<&'a str>,
    is_error: bool,
    prompt: Option<(&'a str, &'a str)>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, info: &'a str, palette: &'a Palette) -> Self {
        Self {
            path_str,
            info,
            palette,
            status_message: None,
            is_error: false,
            prompt: None,
        }
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }

    /// Show `title: input` instead of everything else.
    pub fn prompt(mut self, title: &'a str, input: &'a str) -> Self {
        self.prompt = Some((title, input));
        self
    }
}

/// Keep the last `budget` characters, prefixed with "..." when cut.
fn truncate_left(s: &str, budget: usize) -> String {
    let len = s.chars().count();
    if len <= budget {
        return s.to_string();
    }
    if budget <= 3 {
        return s.chars().take(budget).collect();
    }
    let tail: String = s.chars().skip(len - (budget - 3)).collect();
    format!("...{tail}")
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let width = area.width as usize;

        if let Some((title, input)) = self.prompt {
            let line = Line::from(vec![
                Span::styled(
                    format!("{title}: "),
                    Style::default()
                        .fg(self.palette.selected_fg)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(input.to_string(), Style::default().fg(self.palette.text_fg)),
                Span::styled("█", Style::default().fg(self.palette.dim_fg)),
            ]);
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default()
                    .bg(self.palette.error_fg)
                    .fg(self.palette.status_fg)
            } else {
                Style::default().fg(self.palette.success_fg)
            };
            let display: String = msg.chars().take(width).collect();
            let line = Line::from(Span::styled(format!("{display:<width$}"), style));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let hints_len = KEY_HINTS.chars().count();
        let remaining = width.saturating_sub(hints_len);
        let info_len = self.info.chars().count();
        let path_display = truncate_left(self.path_str, remaining.saturating_sub(info_len + 1));
        let gap = remaining
            .saturating_sub(path_display.chars().count())
            .saturating_sub(info_len);

        let mut spans = vec![
            Span::styled(path_display, Style::default().fg(self.palette.status_fg)),
            Span::raw(" ".repeat(gap)),
            Span::styled(self.info, Style::default().fg(self.palette.match_fg)),
        ];
        if width > hints_len + info_len {
            spans.push(Span::styled(
                KEY_HINTS,
                Style::default()
                    .fg(self.palette.dim_fg)
                    .add_modifier(Modifier::DIM),
            ));
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
