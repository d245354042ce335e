use crate::domain::error::{AppError, Result};
use crate::infrastructure::bootstrap::build_state;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::{add_log, start_server};
use crate::interfaces::state::AppState;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Back office for fibre field operations
#[derive(Parser, Debug)]
#[command(
    name = "fieldops",
    version,
    about = "Contractor import, staff documents and QA photo review for fibre field operations"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file (defaults to ./fieldops.toml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        help = "Log filter, e.g. 'info' or 'fieldops_lib=debug'"
    )]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve(ServeArgs),

    #[command(subcommand, about = "Contractor spreadsheet import")]
    Import(ImportCommand),

    #[command(subcommand, about = "Export stored records")]
    Export(ExportCommand),

    #[command(subcommand, about = "Staff document compliance")]
    Staff(StaffCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, help = "Override the configured bind host")]
    pub host: Option<String>,

    #[arg(short = 'p', long, help = "Override the configured port")]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ImportCommand {
    #[command(about = "Parse, validate and report on a contractor file without saving")]
    Preview {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    #[command(about = "Import the valid rows of a contractor file")]
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    #[command(about = "Write the import template CSV")]
    Template {
        #[arg(value_name = "OUT")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExportCommand {
    #[command(about = "Write all contractors as CSV")]
    Contractors {
        #[arg(value_name = "OUT")]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum StaffCommand {
    #[command(about = "Print the compliance status of one staff member")]
    Compliance {
        #[arg(value_name = "STAFF_ID")]
        staff_id: String,
    },
    #[command(about = "Mark documents past their expiry date as expired")]
    Expire,
}

/// Run a parsed command; the returned value is the process exit code.
pub async fn execute(args: CliArgs, config: AppConfig) -> i32 {
    match dispatch(args.command, config).await {
        Ok(()) => 0,
        Err(e) => {
            error!(code = e.code(), "{}", e);
            eprintln!("error: {}", e);
            1
        }
    }
}

async fn dispatch(command: Commands, mut config: AppConfig) -> Result<()> {
    if let Commands::Serve(serve) = &command {
        if let Some(host) = &serve.host {
            config.server.host = host.clone();
        }
        if let Some(port) = serve.port {
            config.server.port = port;
        }
    }

    let state = Arc::new(build_state(&config).await?);

    match command {
        Commands::Serve(_) => serve(state, &config).await,
        Commands::Import(ImportCommand::Preview { file }) => {
            let (name, bytes) = read_input(&file)?;
            let preview = state.contractor_import_use_case.preview(&name, &bytes).await?;
            print_json(&preview)
        }
        Commands::Import(ImportCommand::Run { file }) => {
            let (name, bytes) = read_input(&file)?;
            let outcome = state.contractor_import_use_case.import(&name, &bytes).await?;
            print_json(&outcome)
        }
        Commands::Import(ImportCommand::Template { out }) => {
            let csv = state.contractor_import_use_case.template_csv()?;
            write_output(&out, &csv)
        }
        Commands::Export(ExportCommand::Contractors { out }) => {
            let csv = state.contractor_import_use_case.export_csv().await?;
            write_output(&out, &csv)
        }
        Commands::Staff(StaffCommand::Compliance { staff_id }) => {
            let status = state.staff_documents_use_case.compliance(&staff_id).await?;
            print_json(&status)
        }
        Commands::Staff(StaffCommand::Expire) => {
            let updated = state.staff_documents_use_case.mark_expired().await?;
            println!("{} document(s) marked expired", updated);
            Ok(())
        }
    }
}

async fn serve(state: Arc<AppState>, config: &AppConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    add_log(
        &state.logs,
        "INFO",
        "HttpApi",
        &format!("Starting HTTP API on {}:{}", host, port),
    );
    info!(%host, port, "Starting HTTP API");

    let server = start_server(state, &host, port, config.storage.max_upload_bytes)?;
    server.await?;
    info!("HTTP API stopped");
    Ok(())
}

fn read_input(path: &Path) -> Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| AppError::ValidationError(format!("Not a file: {}", path.display())))?;
    let bytes = std::fs::read(path)?;
    Ok((name, bytes))
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(format!("Failed to render output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
