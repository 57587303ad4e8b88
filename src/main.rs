// Network Interface Analysis Tool

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use netlens::{
    config::{load_config, validate_config, Config},
    egress, output,
    providers::{self, SystemProbe},
    report, underlay,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Something went wrong during collection or output
const EXIT_GENERAL_ERROR: u8 = 1;

/// One or more required commands are missing from PATH
const EXIT_MISSING_DEPENDENCIES: u8 = 2;

/// Invalid argument combination
const EXIT_INVALID_ARGUMENTS: u8 = 4;

#[derive(Parser)]
#[command(name = "netlens")]
#[command(version)]
#[command(about = "Network interface analysis tool for GNU/Linux", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Write logs to file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Export format
    #[arg(long, value_name = "FORMAT")]
    export: Option<ExportFormat>,

    /// Export destination file (requires --export)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = if args.verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let Some(path) = &args.log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create log file {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.output.is_some() && args.export.is_none() {
        eprintln!("Error: --output requires --export");
        return ExitCode::from(EXIT_INVALID_ARGUMENTS);
    }

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_GENERAL_ERROR);
    }

    if !providers::check_dependencies() {
        log::error!("Missing required dependencies - cannot continue");
        return ExitCode::from(EXIT_MISSING_DEPENDENCIES);
    }

    // Small pool: one thread for collection, one for the egress lookup
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("netlens")
        .enable_time()
        .enable_io()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to build runtime: {}", e);
            return ExitCode::from(EXIT_GENERAL_ERROR);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Error during execution: {:#}", e);
            ExitCode::from(EXIT_GENERAL_ERROR)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let config = Config::default();
            validate_config(&config)?;
            config
        }
    };

    log::info!("Starting network data collection...");

    // Egress lookup runs concurrently with local collection; it only touches
    // the network, never the snapshot
    let egress_config = config.egress.clone();
    let egress_task = tokio::spawn(async move { egress::lookup_egress(&egress_config).await });

    let probe = SystemProbe::new(&config);
    let snapshot = probe.collect().await;

    if snapshot.interfaces.is_empty() {
        anyhow::bail!("No network interfaces found");
    }

    let active = underlay::default_route_interface(&snapshot.routes);
    match &active {
        Some(name) => log::info!("Active interface: {}", name),
        None => log::warn!("No default route; external traffic has no egress interface"),
    }

    let egress_info = match egress_task.await {
        Ok(info) => Some(info),
        Err(e) => {
            log::warn!("Egress lookup task failed: {}", e);
            None
        }
    };

    let rows = report::analyze(&snapshot, &config, active.as_deref(), egress_info);
    log::info!("Successfully collected data for {} interfaces", rows.len());

    match args.export {
        Some(ExportFormat::Json) => {
            let json = output::export_json(&rows)?;
            match &args.output {
                Some(path) => {
                    std::fs::write(path, &json)
                        .with_context(|| format!("failed to write {:?}", path))?;
                    log::info!("Exported to {:?}", path);
                }
                None => println!("{}", json),
            }
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            output::write_table(&mut handle, &rows, true)?;
        }
    }

    Ok(())
}
