//! Minimal ANSI styling for the terminal dashboard.

use crate::metrics::zones::Color;

pub const RESET: &str = "\x1b[0m";
pub const ENTER_ALT_SCREEN: &str = "\x1b[?1049h";
pub const LEAVE_ALT_SCREEN: &str = "\x1b[?1049l";
pub const HIDE_CURSOR: &str = "\x1b[?25l";
pub const SHOW_CURSOR: &str = "\x1b[?25h";
pub const CURSOR_HOME: &str = "\x1b[H";
pub const CLEAR_LINE: &str = "\x1b[K";
pub const CLEAR_BELOW: &str = "\x1b[J";

pub const WHITE: Color = Color::new(255, 255, 255);
pub const GREEN: Color = Color::new(0, 128, 0);
pub const YELLOW: Color = Color::new(255, 255, 0);
pub const RED: Color = Color::new(255, 0, 0);

/// Wrap text in a 24-bit foreground color.
pub fn paint(text: &str, color: Color) -> String {
    format!("\x1b[38;2;{};{};{}m{}{}", color.r, color.g, color.b, text, RESET)
}

/// Wrap text in a bold 24-bit foreground color.
pub fn paint_bold(text: &str, color: Color) -> String {
    format!("\x1b[1;38;2;{};{};{}m{}{}", color.r, color.g, color.b, text, RESET)
}

/// Remove every escape sequence.
pub fn strip(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            plain.push(c);
            continue;
        }
        // CSI: ESC '[' parameters, terminated by a byte in '@'..='~'
        if chars.next() == Some('[') {
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }

    plain
}

/// Number of terminal columns a styled string occupies.
pub fn visible_width(text: &str) -> usize {
    strip(text).chars().count()
}
