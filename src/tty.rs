use is_terminal::IsTerminal;

use crate::config::ColorMode;

/// Check if stdout is connected to a TTY
pub fn is_stdout_tty() -> bool {
    std::io::stdout().is_terminal()
}

pub fn is_stdin_tty() -> bool {
    std::io::stdin().is_terminal()
}

pub fn is_stderr_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Determine if colors should be used based on CLI color mode and environment
pub fn should_use_colors_with_mode(color_mode: ColorMode) -> bool {
    resolve_color_mode(
        color_mode,
        is_stdout_tty(),
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var_os("FORCE_COLOR").is_some(),
    )
}

/// `Always` still honours NO_COLOR; FORCE_COLOR only matters in auto mode.
fn resolve_color_mode(mode: ColorMode, tty: bool, no_color: bool, force_color: bool) -> bool {
    match mode {
        ColorMode::Never => false,
        ColorMode::Always => !no_color,
        ColorMode::Auto => {
            if no_color {
                false
            } else {
                force_color || tty
            }
        }
    }
}
