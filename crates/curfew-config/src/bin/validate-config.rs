//! Config validation CLI tool
//!
//! Validates a curfew configuration file and reports any errors.

use curfew_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a curfew configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match curfew_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", curfew_config::CURRENT_CONFIG_VERSION);
            println!(
                "  Poll interval: {}s, watchdog: {}s after {}s, shutdown grace: {}s",
                policy.service.poll_interval.as_secs(),
                policy.service.watchdog_interval.as_secs(),
                policy.service.watchdog_initial_delay.as_secs(),
                policy.service.shutdown_grace.as_secs(),
            );
            match &policy.service.env_file {
                Some(path) => println!("  Env file: {}", path.display()),
                None => println!("  Env file: (none)"),
            }

            println!();
            println!("Consent documents:");
            for doc in policy.consent.documents() {
                println!(
                    "  - {}: {} (marker {}, override {})",
                    doc.kind,
                    doc.document.display(),
                    doc.marker.display(),
                    doc.override_env.as_deref().unwrap_or("none"),
                );
            }

            println!();
            if policy.schedule.is_empty() {
                println!("Schedule: empty (the workload never runs)");
            } else {
                println!("Schedule:");
                for window in &policy.schedule {
                    let note = if window.is_zero_width() {
                        " (zero-width, never matches)"
                    } else if window.wraps_midnight() {
                        " (wraps past midnight)"
                    } else {
                        ""
                    };
                    println!("  - {}{}", window, note);
                }
            }

            println!();
            println!(
                "Workload: {} {}",
                policy.workload.command,
                policy.workload.args.join(" ")
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                curfew_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                curfew_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                curfew_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                curfew_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        curfew_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
