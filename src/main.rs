pub mod types;
pub mod error;
pub mod config;
pub mod data;
pub mod processing;
pub mod render;
pub mod pages;
pub mod server;
pub mod boundaries;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the attributes and geometries of a boundary file
    Inspect {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Number of attribute rows to print
        #[arg(short, long, default_value_t = 5)]
        rows: usize,
    },
    /// Serve the city and heatmap dashboards
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// City data CSV, overrides `input.data_csv`
        #[arg(short, long, value_name = "CSV", env = "POLICY_DASHBOARD_DATA")]
        data: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { path, rows } => {
            let features = boundaries::load_features(&path)?;
            print!("{}", boundaries::inspect_report(&features, rows));
        }
        Commands::Serve { config, data } => {
            info!("Serving dashboards with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?.with_data_csv(data);

            // Loaded once, read-only for the life of the process
            let dataset = data::load_dataset(&app_config.input.data_csv)?;

            let boundaries = match &app_config.input.boundary_file {
                Some(path) => boundaries::load_boundaries(path)?,
                None => Vec::new(),
            };

            server::start_server(app_config, dataset, boundaries).await?;
        }
    }

    Ok(())
}
