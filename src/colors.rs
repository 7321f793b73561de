use crate::entry::LogLevel;

/// A 24-bit color applied either to the text or behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fg(u8, u8, u8),
    Bg(u8, u8, u8),
}

const RESET: &str = "\x1b[0m";

impl Paint {
    fn write_prefix(self, out: &mut String) {
        let (layer, r, g, b) = match self {
            Paint::Fg(r, g, b) => (38, r, g, b),
            Paint::Bg(r, g, b) => (48, r, g, b),
        };
        out.push_str(&format!("\x1b[{};2;{};{};{}m", layer, r, g, b));
    }
}

/// Palette for rendered entries
#[derive(Debug, Clone)]
pub struct ColorScheme {
    enabled: bool,
    pub critical: Paint, // Red background, the only badge with one
    pub error: Paint,    // Red
    pub warning: Paint,  // Yellow
    pub info: Paint,     // Teal-blue
    pub debug: Paint,    // Magenta
    pub unknown: Paint,  // Magenta, same as debug
    pub message: Paint,  // Bright white
    pub key: Paint,      // Dark teal
    pub equals: Paint,   // Light gray
    pub value: Paint,    // Dim gray
}

impl ColorScheme {
    /// With `use_colors` off every paint call writes the bare text.
    pub fn new(use_colors: bool) -> Self {
        Self {
            enabled: use_colors,
            critical: Paint::Bg(255, 0, 0),
            error: Paint::Fg(255, 0, 0),
            warning: Paint::Fg(255, 245, 32),
            info: Paint::Fg(20, 172, 190),
            debug: Paint::Fg(221, 28, 119),
            unknown: Paint::Fg(221, 28, 119),
            message: Paint::Fg(255, 255, 255),
            key: Paint::Fg(0, 100, 90),
            equals: Paint::Fg(190, 190, 190),
            value: Paint::Fg(120, 120, 120),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn level(&self, level: LogLevel) -> Paint {
        match level {
            LogLevel::Critical => self.critical,
            LogLevel::Error => self.error,
            LogLevel::Warning => self.warning,
            LogLevel::Info => self.info,
            LogLevel::Debug => self.debug,
            LogLevel::Unknown => self.unknown,
        }
    }

    /// Append `text` to `out`, wrapped in the escape codes for `paint`.
    pub fn paint_into(&self, paint: Paint, text: &str, out: &mut String) {
        if self.enabled {
            paint.write_prefix(out);
            out.push_str(text);
            out.push_str(RESET);
        } else {
            out.push_str(text);
        }
    }

    pub fn paint(&self, paint: Paint, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 24);
        self.paint_into(paint, text, &mut out);
        out
    }
}
