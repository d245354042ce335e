mod application;
mod domain;
mod infrastructure;
mod interfaces;
mod shared;

use crate::infrastructure::config::ConfigService;
use crate::interfaces::cli::{execute, CliArgs};
use clap::Parser;
use std::env;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Parse the command line, load configuration and run the selected command.
pub fn run() {
    let args = CliArgs::parse();

    let config = match ConfigService::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(args.log_level.as_deref().unwrap_or("info"));
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.filter.clone());
    init_logging(&level);
    debug!(command = ?args.command, "fieldops starting");

    let exit_code = actix_web::rt::System::new().block_on(execute(args, config));
    std::process::exit(exit_code);
}

fn init_logging(default_filter: &str) {
    let filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(default_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
