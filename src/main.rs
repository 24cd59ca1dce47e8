//! courier-cli entry point.
//!
//! ## CLI Subcommands
//!
//! - `courier-cli fetch [OPTIONS] <URL>...` - GET URLs through the queue
//! - `courier-cli config show|defaults|validate` - Inspect configuration
//! - `courier-cli version` - Show version information
//!
//! The blocking HTTP client owns its own runtime, so this binary does not
//! start one.

use std::path::PathBuf;
use std::process::ExitCode;

use courier_core::cli::{self, config_cmd};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "fetch" => exit(cli::run_fetch(&args[2..])),
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            let file = match config_file_arg(&args[2.min(args.len())..]) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return exit(cli::EXIT_USAGE);
                }
            };
            match subcommand {
                "show" | "--config" => exit(config_cmd::run_show(file.as_deref())),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => exit(config_cmd::run_validate(file.as_deref())),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("courier-cli {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

/// Find `--config <path>` among config subcommand arguments.
fn config_file_arg(args: &[String]) -> Result<Option<PathBuf>, String> {
    match args.iter().position(|a| a == "--config") {
        Some(i) => args
            .get(i + 1)
            .map(|p| Some(PathBuf::from(p)))
            .ok_or_else(|| "--config requires a path".to_string()),
        None => Ok(None),
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "courier-cli - prioritized HTTP request queue v{}

USAGE:
    courier-cli <COMMAND> [OPTIONS]

COMMANDS:
    fetch        GET one or more URLs through the request queue
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    courier-cli fetch https://example.com/
    courier-cli fetch --priority high https://a.example/ https://b.example/
    courier-cli config show
    courier-cli config validate --config courier.toml

ENVIRONMENT:
    COURIER_WORKERS             Dispatcher threads (default: 5)
    COURIER_CONNECT_TIMEOUT_MS  Connect timeout (default: 10000)
    COURIER_TIMEOUT_MS          Exchange timeout (default: 30000)
    COURIER_USER_AGENT          User-Agent header (default: courier/1)
    COURIER_MAX_REDIRECTS       Redirect hops, 0 disables (default: 10)
    COURIER_COOKIES             Keep cookies across requests (default: false)
    COURIER_LOG_LEVEL           Log filter (default: info)
    COURIER_LOG_FORMAT          json or pretty (default: json)

EXIT CODES:
    0  Success
    1  One or more requests failed
    2  Usage or configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "fetch" => {
            eprintln!(
                "courier-cli fetch - GET URLs through the request queue

USAGE:
    courier-cli fetch [OPTIONS] <URL>...

OPTIONS:
    -p, --priority P   low, normal, high or critical (default: normal)
    -t, --timeout MS   Wait per request, 0 waits forever (default: 60000)
    --config FILE      Load settings from a TOML file instead of the environment

DESCRIPTION:
    Submits every URL as a text request, then waits for each result in
    submission order. Prints one line per URL with its size or failure.
"
            );
        }
        "config" => {
            eprintln!(
                "courier-cli config - Inspect configuration

USAGE:
    courier-cli config [show|defaults|validate] [--config FILE]

DESCRIPTION:
    show       Print the effective configuration as JSON
    defaults   Print default values as KEY=value lines
    validate   Check for inconsistent settings (exit 1 on warnings)
"
            );
        }
        _ => {
            eprintln!("No help available for: {}", command);
            print_usage();
        }
    }
}
