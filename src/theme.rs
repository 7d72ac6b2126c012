//! Colors used by the widgets, plus parsing of per-container appearance
//! colors.

use std::str::FromStr;

use ratatui::style::Color;

use collection_tree::tree::Appearance;

/// Runtime colors of the UI (Catppuccin Mocha).
#[derive(Debug, Clone)]
pub struct Palette {
    pub text_fg: Color,
    pub cursor_bg: Color,
    pub group_fg: Color,
    pub folder_fg: Color,
    pub leaf_fg: Color,
    pub selected_fg: Color,
    pub match_fg: Color,
    pub drag_fg: Color,
    pub border_fg: Color,
    pub status_fg: Color,
    pub error_fg: Color,
    pub success_fg: Color,
    pub dim_fg: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text_fg: Color::Rgb(205, 214, 244),     // #cdd6f4
            cursor_bg: Color::Rgb(69, 71, 90),      // #45475a
            group_fg: Color::Rgb(137, 180, 250),    // #89b4fa
            folder_fg: Color::Rgb(148, 226, 213),   // #94e2d5
            leaf_fg: Color::Rgb(205, 214, 244),     // #cdd6f4
            selected_fg: Color::Rgb(249, 226, 175), // #f9e2af
            match_fg: Color::Rgb(203, 166, 247),    // #cba6f7
            drag_fg: Color::Rgb(250, 179, 135),     // #fab387
            border_fg: Color::Rgb(88, 91, 112),     // #585b70
            status_fg: Color::Rgb(205, 214, 244),
            error_fg: Color::Rgb(243, 139, 168),   // #f38ba8
            success_fg: Color::Rgb(166, 227, 161), // #a6e3a1
            dim_fg: Color::Rgb(108, 112, 134),     // #6c7086
        }
    }
}

/// Parse `#rrggbb`, `rrggbb` or a named color such as `"red"`.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some(Color::Rgb(r, g, b));
    }
    Color::from_str(value).ok()
}

/// Foreground for a container: its text color, then its color, then `fallback`.
pub fn appearance_fg(appearance: &Appearance, fallback: Color) -> Color {
    appearance
        .text_color
        .as_deref()
        .or(appearance.color.as_deref())
        .and_then(parse_color)
        .unwrap_or(fallback)
}
