//! Colored status messages for the terminal

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

fn print_marked(out: &mut impl Write, color: Color, marker: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(marker),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    print_marked(&mut std::io::stderr(), Color::Red, "✗ ", msg);
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    print_marked(&mut std::io::stderr(), Color::Yellow, "⚠ ", msg);
}

pub fn print_info(msg: &str) {
    print_marked(&mut std::io::stdout(), Color::Cyan, "ℹ ", msg);
}
