// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tracing bootstrap for the CLI.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,tidepost=info,tidepost_core=info";

/// Installs the global subscriber, logging to stderr.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `TIDEPOST_LOG`
/// 3) internal default filter (`--verbose` raises it to debug)
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_env_filter(filter_from_env(verbose))
        .try_init();
}

fn filter_from_env(verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(filter) = env::var("TIDEPOST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
    {
        return filter;
    }

    if verbose {
        EnvFilter::new("info,tidepost=debug,tidepost_core=debug")
    } else {
        EnvFilter::new(DEFAULT_FILTER)
    }
}
