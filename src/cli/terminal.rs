//! Terminal capability detection and output styling

use owo_colors::{colors::css, OwoColorize};

/// Whether stdout should receive coloured output
fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Terminal width in columns, if stdout is a terminal
fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Whether the terminal is too narrow (< 60 columns) for tabular output
pub fn is_narrow() -> bool {
    terminal_width().is_some_and(|w| w < 60)
}

fn paint(text: &str, style: impl FnOnce(&str) -> String) -> String {
    if supports_color() {
        style(text)
    } else {
        text.to_string()
    }
}

/// Extension trait for styling CLI output
pub trait Colorize {
    /// Style as success (green)
    fn success(&self) -> String;
    /// Style as warning (amber)
    fn warning(&self) -> String;
    /// Style as a code or identifier (blue)
    fn info(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Green>().to_string())
    }

    fn warning(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Orange>().to_string())
    }

    fn info(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::LightBlue>().to_string())
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), |s| s.dimmed().to_string())
    }
}
