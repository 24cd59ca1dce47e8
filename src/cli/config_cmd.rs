// Copyright 2024-2026 Courier Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration from environment variables, or from a
//! TOML file when one is given.

use std::path::Path;

use crate::config::{self, ConfigError, EffectiveConfig, EnvConfig};
use crate::telemetry::init_logging;

fn resolve(file: Option<&Path>) -> Result<EnvConfig, ConfigError> {
    match file {
        Some(path) => config::load_file(path),
        None => Ok(config::load()),
    }
}

/// Print the effective config as JSON to stdout.
pub fn run_show(file: Option<&Path>) -> i32 {
    match resolve(file) {
        Ok(cfg) => match render_json(&cfg.effective_config()) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Failed to render config: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            super::EXIT_USAGE
        }
    }
}

/// Print default values (no env overrides) as key-value pairs.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration. Returns 0 if valid, 1 otherwise.
pub fn run_validate(file: Option<&Path>) -> i32 {
    let cfg = match resolve(file) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 1;
        }
    };
    let mut warnings = 0;

    if cfg.connect_timeout > cfg.timeout {
        eprintln!(
            "WARNING: COURIER_CONNECT_TIMEOUT_MS ({}) exceeds COURIER_TIMEOUT_MS ({})",
            cfg.connect_timeout.as_millis(),
            cfg.timeout.as_millis()
        );
        warnings += 1;
    }

    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&cfg.log_level) {
        eprintln!("WARNING: COURIER_LOG_LEVEL is not a valid filter: {}", e);
        warnings += 1;
    }

    if warnings == 0 {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

/// Install logging from the resolved config. Failures are reported and
/// ignored: the CLI works without logs.
pub fn init_cli_logging(cfg: &EnvConfig) {
    if let Err(e) = init_logging(&cfg.log_config()) {
        eprintln!("logging disabled: {}", e);
    }
}

fn render_json(cfg: &EffectiveConfig) -> serde_json::Result<String> {
    serde_json::to_string_pretty(cfg)
}

fn print_config(cfg: &EffectiveConfig) {
    println!("COURIER_WORKERS={}", cfg.workers);
    println!("COURIER_CONNECT_TIMEOUT_MS={}", cfg.connect_timeout_ms);
    println!("COURIER_TIMEOUT_MS={}", cfg.timeout_ms);
    println!("COURIER_USER_AGENT={}", cfg.user_agent);
    println!("COURIER_MAX_REDIRECTS={}", cfg.max_redirects);
    println!("COURIER_COOKIES={}", cfg.cookies);
    println!("COURIER_LOG_LEVEL={}", cfg.log_level);
    println!("COURIER_LOG_FORMAT={}", cfg.log_format.as_str());
}
