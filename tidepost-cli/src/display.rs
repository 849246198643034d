// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Terminal Output Helpers

use console::style;

/// Prints a success line.
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Prints an informational line.
pub fn info(msg: &str) {
    println!("{} {}", style("→").cyan(), msg);
}

/// Prints a warning to stderr.
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), msg);
}
