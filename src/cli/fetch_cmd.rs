// Copyright 2024-2026 Courier Contributors
// SPDX-License-Identifier: Apache-2.0

//! `fetch` subcommand: GET one or more URLs through the queue.
//!
//! Every URL becomes a text request submitted at the chosen priority. The
//! command waits on each request's future in submission order and prints
//! one line per URL.

use std::path::PathBuf;

use crate::config;
use crate::future::FutureError;
use crate::request::Request;
use crate::scheduler::Priority;
use crate::transport::Method;
use crate::{Courier, CourierConfig};

/// Default wait per request, in milliseconds.
pub const DEFAULT_WAIT_MS: i64 = 60_000;

/// Parsed `fetch` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchArgs {
    pub priority: Priority,
    /// Per-request wait; 0 waits indefinitely.
    pub wait_ms: i64,
    pub config_file: Option<PathBuf>,
    pub urls: Vec<String>,
}

/// Parse the arguments following `fetch`.
pub fn parse_fetch_args(args: &[String]) -> Result<FetchArgs, String> {
    let mut parsed = FetchArgs {
        priority: Priority::Normal,
        wait_ms: DEFAULT_WAIT_MS,
        config_file: None,
        urls: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--priority" | "-p" => {
                let value = iter.next().ok_or("--priority requires a value")?;
                parsed.priority = value.parse()?;
            }
            "--timeout" | "-t" => {
                let value = iter.next().ok_or("--timeout requires a value")?;
                parsed.wait_ms = value
                    .parse::<i64>()
                    .ok()
                    .filter(|ms| *ms >= 0)
                    .ok_or_else(|| format!("invalid timeout: {}", value))?;
            }
            "--config" => {
                let value = iter.next().ok_or("--config requires a path")?;
                parsed.config_file = Some(PathBuf::from(value));
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option: {}", flag)),
            url => parsed.urls.push(url.to_string()),
        }
    }

    if parsed.urls.is_empty() {
        return Err("fetch requires at least one URL".to_string());
    }
    Ok(parsed)
}

/// Run `fetch`. Returns 0 when every URL succeeded, 1 otherwise.
pub fn run_fetch(args: &[String]) -> i32 {
    let args = match parse_fetch_args(args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            return super::EXIT_USAGE;
        }
    };

    let env = match &args.config_file {
        Some(path) => match config::load_file(path) {
            Ok(env) => env,
            Err(e) => {
                eprintln!("Error: {}", e);
                return super::EXIT_USAGE;
            }
        },
        None => config::load(),
    };
    super::init_cli_logging(&env);

    let courier = match Courier::new(CourierConfig::from(&env)) {
        Ok(courier) => courier,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = courier.start() {
        eprintln!("Error: {}", e);
        return 1;
    }

    let mut pending = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        let request = Request::text(Method::Get, url.clone()).with_priority(args.priority);
        match courier.fetch(request) {
            Ok(future) => pending.push((url, future)),
            Err(e) => eprintln!("ERROR  {}  {}", url, e),
        }
    }

    let mut failures = args.urls.len() - pending.len();
    for (url, future) in pending {
        match future.get(args.wait_ms) {
            Ok(body) => println!("OK     {}  {} bytes", url, body.len()),
            Err(FutureError::Failed(e)) => {
                failures += 1;
                match e.status_code() {
                    Some(status) => println!("FAIL   {}  status {}", url, status),
                    None => println!("FAIL   {}  {}", url, e),
                }
            }
            Err(e) => {
                failures += 1;
                println!("FAIL   {}  {}", url, e);
            }
        }
    }

    courier.shutdown();
    if failures == 0 {
        0
    } else {
        1
    }
}
