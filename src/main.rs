use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edc_export::config::{ExportSettings, DEFAULT_LOG_FILE};
use edc_export::export::{run_export, ExportOptions};
use edc_export::project::{Project, RedcapProject};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "edc-export")]
#[command(about = "Export REDCap forms to CSV and merge English/Spanish exports")]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log at debug level to stderr instead of the log file
    #[arg(long, global = true)]
    debug: bool,

    /// Log file to append to
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every form listed in a project's bootstrap form
    Export(ExportArgs),
    /// Merge English and Spanish exports under <export-root>/temp
    Merge(MergeArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// TOML configuration file
    config: PathBuf,

    /// Project id (a [projects.<id>] table in the config)
    project_id: String,

    /// Records per export request (overrides the config file)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Keep exporting remaining forms after a form fails
    #[arg(long)]
    keep_going: bool,
}

#[derive(Args)]
struct MergeArgs {
    /// Directory containing temp/English and temp/Spanish
    export_root: PathBuf,
}

fn run_export_command(args: ExportArgs) -> Result<()> {
    let settings = ExportSettings::load(&args.config)?;
    let project = settings.project(&args.project_id)?;

    let dest_dir = Path::new(".").join(&project.file_dest);
    debug!(api_url = %settings.api.api_url, dest = ?dest_dir, "Resolved export target");

    let bootstrap = RedcapProject::connect(
        &settings.api.api_url,
        &project.bootstrap_token,
        settings.api.verify_ssl,
    )
    .context("Failed to connect to bootstrap project")?;
    let data = RedcapProject::connect(
        &settings.api.api_url,
        &project.data_token,
        settings.api.verify_ssl,
    )
    .context("Failed to connect to data project")?;
    info!(pid = %args.project_id, def_field = %data.definition_field(), "Connected");

    let options = ExportOptions {
        chunk_size: args.chunk_size.unwrap_or_else(|| project.chunk_size()),
        keep_going: args.keep_going,
    };

    let start = Instant::now();
    let stats = run_export(&bootstrap, &data, &args.project_id, &dest_dir, &options)
        .with_context(|| format!("Export failed for pid:{}", args.project_id))?;

    println!();
    println!("=== Summary ===");
    println!("Export time:        {:.2}s", start.elapsed().as_secs_f64());
    println!("Forms exported:     {}", stats.forms_exported);
    println!("Forms failed:       {}", stats.forms_failed);
    println!("Records:            {}", stats.records);
    println!("Chunks:             {}", stats.chunks);
    println!("Destination:        {}", dest_dir.display());

    if stats.has_failures() {
        bail!("{} form(s) failed: {}", stats.forms_failed, stats.failed_forms.join(", "));
    }
    Ok(())
}

fn run_merge_command(args: MergeArgs) -> Result<()> {
    let start = Instant::now();
    let stats = edc_export::merge::run_merge(&args.export_root)
        .with_context(|| format!("Merge failed in {}", args.export_root.display()))?;

    println!();
    println!("=== Summary ===");
    println!("Merge time:         {:.2}s", start.elapsed().as_secs_f64());
    println!("Files merged:       {}", stats.merged);
    println!("Rows written:       {}", stats.rows_written);
    println!("Files copied:       {}", stats.copied);
    println!("Already present:    {}", stats.skipped_existing);
    println!("Failed pairs:       {}", stats.failed.len());

    if stats.has_failures() {
        let names: Vec<String> = stats
            .failed
            .iter()
            .map(|f| f.display().to_string())
            .collect();
        bail!("{} pair(s) failed to merge: {}", stats.failed.len(), names.join(", "));
    }
    Ok(())
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;
        return Ok(());
    }

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("Failed to open log file: {}", cli.log_file.display()))?;

    // RUST_LOG overrides the -v level, e.g. RUST_LOG=edc_export::export=trace
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Export(args) => run_export_command(args),
        Commands::Merge(args) => run_merge_command(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
