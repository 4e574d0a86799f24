use anyhow::{Context, Result};
use clap::Parser;
use phasestats::cli::{Cli, Command, OutputFormat};
use phasestats::comparison::{ComparisonCase, ComparisonNode};
use phasestats::config::EngineConfig;
use phasestats::engine::Engine;
use phasestats::report::render_text;
use phasestats::store::{Dataset, SqliteStore};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber: TRACE with --debug, otherwise RUST_LOG (WARN by default)
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::from_file(path),
        None => Ok(EngineConfig::default()),
    }
}

/// Print a comparison tree in the requested format
fn print_node(node: &ComparisonNode, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(node)
                .context("Failed to serialize comparison to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            print!("{}", render_text(node)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.debug);

    let config = load_config(&cli)?;
    let store = SqliteStore::open(&cli.db)
        .with_context(|| format!("Failed to open database {}", cli.db.display()))?;
    let mut engine = Engine::new(store, config);

    match &cli.command {
        Command::Import { dataset } => {
            let dataset = Dataset::from_json_file(dataset)?;
            let written = engine
                .store_mut()
                .load_dataset(&dataset)
                .context("Failed to import dataset")?;
            println!(
                "Imported {} machines, {} runs, {} measurements",
                dataset.machines.len(),
                dataset.runs.len(),
                written
            );
        }
        Command::Aggregate { run_id } => {
            let rows = engine
                .aggregate(run_id)
                .with_context(|| format!("Failed to aggregate run {}", run_id))?;
            println!("Stored {} phase stats for run {}", rows, run_id);
        }
        Command::Compare { run_ids, force } => {
            let force = force
                .as_deref()
                .map(ComparisonCase::from_force_mode)
                .transpose()?;
            let node = engine.compare_runs(run_ids, force)?;
            print_node(&node, cli.format)?;
        }
        Command::Stats { run_id } => {
            let node = engine.single_run_stats(run_id)?;
            print_node(&node, cli.format)?;
        }
    }

    Ok(())
}
