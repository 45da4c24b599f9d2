//! Build-order scheduler - Development Tools

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use econ_tools::validate::{validate_data_directory, validate_file, DataFile};

#[derive(Parser)]
#[command(name = "econ-tools")]
#[command(about = "Development tools for the build-order scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate catalog and scheduler config files
    Validate {
        /// Data directory or single RON file
        #[arg(default_value = "crates/econ_core/assets/data")]
        path: String,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            let path = std::path::Path::new(&path);
            tracing::info!("Validating data files in: {}", path.display());
            if path.is_file() {
                match validate_file(path) {
                    Ok(file) => tracing::info!("Validation passed: {}", describe(&file)),
                    Err(e) => {
                        tracing::error!("Validation failed: {e}");
                        std::process::exit(1);
                    }
                }
                return;
            }
            match validate_data_directory(path) {
                Ok(report) if report.passed() => {
                    for (file, data) in &report.valid {
                        tracing::info!("{}: {}", file.display(), describe(data));
                    }
                    tracing::info!("Validation passed ({} files)", report.valid.len());
                }
                Ok(report) => {
                    for failure in &report.failures {
                        tracing::error!("{failure}");
                    }
                    tracing::error!(
                        "Validation failed: {} of {} files",
                        report.failures.len(),
                        report.failures.len() + report.valid.len()
                    );
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn describe(file: &DataFile) -> String {
    match file {
        DataFile::Catalog { name, actions } => format!("catalog '{name}' with {actions} actions"),
        DataFile::Config(_) => "scheduler config".to_string(),
    }
}
