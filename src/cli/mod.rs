// Copyright 2024-2026 Courier Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for courier commands.
//!
//! ## Usage
//!
//! ```bash
//! courier-cli fetch https://example.com/a https://example.com/b
//! courier-cli fetch --priority high --timeout 5000 https://example.com/
//! courier-cli config show
//! ```

pub mod config_cmd;
pub mod fetch_cmd;

pub use config_cmd::{init_cli_logging, run_defaults, run_show, run_validate};
pub use fetch_cmd::{parse_fetch_args, run_fetch, FetchArgs};

/// Exit code for invalid arguments or configuration.
pub const EXIT_USAGE: i32 = 2;
