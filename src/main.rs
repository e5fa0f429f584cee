//! CLI Entry Point for gas-daq
//!
//! Offline tooling around the channel configuration engine:
//! - Export a configuration table (or the blank template) from a saved-state file
//! - Check an import table and print the configurations it would apply
//! - Validate a console configuration file
//!
//! # Usage
//!
//! ```bash
//! gas_daq export --confirmed saved.json --output channels.csv
//! gas_daq import channels.csv --chimera
//! gas_daq check-config config/gas_daq.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gas_core::{mock::MockBackend, ChannelConfig, ChannelId, Device};
use gas_daq::config::AppConfig;
use gas_daq::editor::{ChannelEditor, EditorOptions};
use gas_daq::logging::{self, OutputFormat, TracingConfig};
use gas_daq::session_store::MemorySessionStore;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "gas_daq")]
#[command(about = "Channel configuration tooling for gas-measurement devices", long_about = None)]
struct Cli {
    /// Console configuration file
    #[arg(long, global = true, default_value = "config/gas_daq.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log span open/close events
    #[arg(long, global = true)]
    trace_spans: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for OutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => OutputFormat::Pretty,
            LogFormat::Compact => OutputFormat::Compact,
            LogFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the export table for a device's saved configuration
    Export {
        /// JSON object of channel number to saved configuration
        #[arg(long)]
        confirmed: Option<PathBuf>,

        /// Destination CSV file
        #[arg(long)]
        output: PathBuf,

        /// Include the chimera channel column
        #[arg(long)]
        chimera: bool,
    },

    /// Parse an import table and print the resulting configurations
    Import {
        /// CSV file in the export layout
        table: PathBuf,

        /// Accept chimera channel mappings
        #[arg(long)]
        chimera: bool,
    },

    /// Load and validate a configuration file
    CheckConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config).context("loading configuration")?;
    let tracing_config = TracingConfig::from_app_config(&config)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format.into())
        .with_ansi(!cli.no_color)
        .with_span_events(cli.trace_spans);
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Export {
            confirmed,
            output,
            chimera,
        } => export(&config, confirmed, output, chimera).await,
        Commands::Import { table, chimera } => import(&config, table, chimera),
        Commands::CheckConfig { path } => check_config(path),
    }
}

fn offline_editor(config: &AppConfig, backend: Arc<MockBackend>, chimera: bool) -> ChannelEditor {
    let options = EditorOptions {
        chimera_enabled: chimera || config.editor.chimera_enabled,
        ..config.editor
    };
    ChannelEditor::open(
        Device::new("offline", "offline"),
        backend,
        Arc::new(MemorySessionStore::new()),
        options,
    )
}

async fn export(
    config: &AppConfig,
    confirmed: Option<PathBuf>,
    output: PathBuf,
    chimera: bool,
) -> Result<()> {
    let device = Device::new("offline", "offline");
    let mut backend = MockBackend::new();
    if let Some(path) = confirmed {
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let records: BTreeMap<ChannelId, ChannelConfig> =
            serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
        for (channel, record) in records {
            backend = backend.with_record(&device.id, channel, record);
        }
    }

    let mut editor = offline_editor(config, Arc::new(backend), chimera);
    editor.refresh().await?;
    let table = editor.export_table()?;
    tokio::fs::write(&output, table)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(output = %output.display(), "Export table written");
    Ok(())
}

fn import(config: &AppConfig, table: PathBuf, chimera: bool) -> Result<()> {
    let bytes = std::fs::read(&table).with_context(|| format!("reading {}", table.display()))?;
    let mut editor = offline_editor(config, Arc::new(MockBackend::new()), chimera);
    let channels = editor.import_table(&bytes)?;

    let imported: BTreeMap<ChannelId, &ChannelConfig> = channels
        .iter()
        .filter_map(|&channel| editor.confirmed(channel).map(|config| (channel, config)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&imported)?);
    Ok(())
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = AppConfig::load_from(&path).context("loading configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;
    println!("{} is valid", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
