use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use spec_integrity::config::EngineConfig;
use spec_integrity::observability::{init_tracing, setup_panic_hook};
use spec_integrity::services::{ConsistencyAnalyzer, DiagramParser, LinkResolver};
use spec_integrity::storage::{PostgresStorageBackend, StorageBackend};
use sqlx::postgres::PgPoolOptions;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "spec-integrity", version, about = "Specification integrity engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a diagram's header and block structure
    Validate {
        /// Diagram source file, `-` for stdin
        file: PathBuf,
    },
    /// Print participants and calls of a diagram as JSON
    Parse { file: PathBuf },
    /// Re-indent a diagram
    Format {
        file: PathBuf,
        /// Rewrite the file instead of printing
        #[arg(long)]
        write: bool,
    },
    /// Run the consistency rules over a stored project
    Check { project_id: Uuid },
    /// Link a stored diagram's calls to matching API contracts
    Link { diagram_id: Uuid },
}

fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read diagram from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

async fn connect(config: &EngineConfig) -> Result<Arc<dyn StorageBackend>> {
    let Some(url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL must be set for this command");
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let backend = PostgresStorageBackend::new(pool);
    backend.migrate().await.context("Failed to run migrations")?;
    info!("Connected to PostgreSQL");
    Ok(Arc::new(backend))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let config = EngineConfig::from_env();
    init_tracing(config.log_json);
    setup_panic_hook();

    let cli = Cli::parse();
    let parser = DiagramParser::new();

    match cli.command {
        Command::Validate { file } => {
            let result = parser.validate(&read_source(&file)?);
            print_json(&result)?;
            if !result.valid {
                std::process::exit(1);
            }
        }
        Command::Parse { file } => {
            let parsed = parser.parse(&read_source(&file)?);
            print_json(&parsed)?;
        }
        Command::Format { file, write } => {
            let formatted = parser.format(&read_source(&file)?);
            if write && file.as_os_str() != "-" {
                std::fs::write(&file, &formatted)
                    .with_context(|| format!("Failed to write {}", file.display()))?;
                info!("Formatted {}", file.display());
            } else {
                print!("{}", formatted);
            }
        }
        Command::Check { project_id } => {
            let storage = connect(&config).await?;
            let report = ConsistencyAnalyzer::new(storage)
                .check_project(project_id)
                .await
                .with_context(|| format!("Consistency check failed for project {}", project_id))?;
            print_json(&report)?;
        }
        Command::Link { diagram_id } => {
            let storage = connect(&config).await?;
            let links = LinkResolver::new(storage)
                .auto_detect(diagram_id)
                .await
                .with_context(|| format!("Link detection failed for diagram {}", diagram_id))?;
            print_json(&links)?;
        }
    }

    Ok(())
}
