//! Talia CLI Application
//!
//! A command-line interface for bulk domain availability checks over WHOIS.
//! Reads a JSON file of domains, checks each one against a single WHOIS
//! server and writes the outcome back as updated records or as a grouped
//! available/unavailable store.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::fs;
use std::path::Path;
use std::process;
use std::time::Duration;
use talia_lib::{
    convert_array_to_grouped, export_available, grouped_from_results, load_env_config,
    load_env_file, load_grouped_file, merge_and_write, merge_grouped, parse_duration_string,
    parse_input_document, validate_server_address, write_grouped_data, write_records,
    Availability, BatchChecker, BatchReport, CheckConfig, Concurrency, ConfigManager,
    DomainRecord, ExtendedGroupedData, FileConfig, GroupedData, InputDocument,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for talia
#[derive(Parser, Debug)]
#[command(name = "talia")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check domain availability over WHOIS and keep a grouped JSON record")]
#[command(
    long_about = "Check domain availability against a single WHOIS server (RFC 3912).\n\nThe input is either a JSON array of domain records, which is updated in place, or a grouped object whose 'unverified' list is checked and merged into its available/unavailable buckets."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// JSON file with the domains to check
    #[arg(value_name = "JSON_FILE")]
    pub input: String,

    /// WHOIS server as host:port (e.g. whois.verisign-grs.com:43)
    #[arg(long = "whois", value_name = "HOST:PORT", help_heading = "Lookup")]
    pub whois: Option<String>,

    /// Pause between sequential lookups (default: 2s)
    #[arg(long = "sleep", value_name = "DURATION", help_heading = "Lookup")]
    pub sleep: Option<String>,

    /// 0 = sequential, N = worker pool, 'unbounded' or negative = one worker per domain
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        allow_negative_numbers = true,
        help_heading = "Lookup"
    )]
    pub concurrency: Option<String>,

    /// Connect timeout per lookup (default: 10s)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Lookup")]
    pub timeout: Option<String>,

    /// Keep the raw WHOIS response for successful checks too
    #[arg(short = 'v', long = "verbose", help_heading = "Output")]
    pub verbose: bool,

    /// Write grouped available/unavailable output instead of updating records
    #[arg(long = "grouped-output", help_heading = "Output")]
    pub grouped_output: bool,

    /// Grouped store to merge results into (with --grouped-output)
    #[arg(long = "output-file", value_name = "FILE", help_heading = "Output")]
    pub output_file: Option<String>,

    /// Write available domains, one per line, to this file
    #[arg(long = "export-available", value_name = "FILE", help_heading = "Output")]
    pub export_available: Option<String>,

    /// Use a specific configuration file
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Load environment variables from this file (default: ./.env if present)
    #[arg(long = "env-file", value_name = "FILE", help_heading = "Configuration")]
    pub env_file: Option<String>,

    /// Show debug logs on stderr
    #[arg(long = "debug", help_heading = "Configuration")]
    pub debug: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, Default)]
struct Settings {
    check: CheckConfig,
    grouped_output: bool,
    output_file: Option<String>,
    export_available: Option<String>,
}

impl Settings {
    /// Output file that applies, if grouped output was requested with one.
    fn grouped_destination(&self) -> Option<&str> {
        if self.grouped_output {
            self.output_file.as_deref().filter(|p| !p.is_empty())
        } else {
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr so progress output on stdout stays clean.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("talia=debug,talia_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv(&args)?;
    let settings = build_settings(&args)?;
    debug!(?settings, "resolved settings");

    let raw = fs::read_to_string(&args.input)
        .map_err(|e| format!("Failed to read input file '{}': {}", args.input, e))?;

    match parse_input_document(&raw)? {
        InputDocument::Flat(records) => run_flat_input(&args.input, records, &settings).await,
        InputDocument::Grouped(ext) => run_grouped_input(&args.input, ext, &settings).await,
    }
}

/// Load `.env` before any `TALIA_*` lookups happen.
fn load_dotenv(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    match &args.env_file {
        Some(path) => {
            let applied = load_env_file(path)
                .map_err(|e| format!("Failed to load env file '{}': {}", path, e))?;
            debug!(path = %path, applied, "loaded env file");
        }
        None if Path::new(".env").is_file() => {
            let applied = load_env_file(".env")?;
            debug!(applied, "loaded ./.env");
        }
        None => {}
    }
    Ok(())
}

/// Resolve settings with precedence CLI > environment > config file > defaults.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::default();
    let config_manager = ConfigManager::new(args.debug);

    // Step 1: config files (explicit --config, then TALIA_CONFIG, then discovery)
    let env_config_path = std::env::var("TALIA_CONFIG").ok().filter(|p| !p.is_empty());
    if let Some(explicit) = args.config.as_ref().or(env_config_path.as_ref()) {
        info!(path = %explicit, "using explicit config file");
        let file_config = config_manager
            .load_file(explicit)
            .map_err(|e| format!("Failed to load config file '{}': {}", explicit, e))?;
        settings = merge_file_config(settings, file_config)?;
    } else {
        let file_config = config_manager.discover_and_load()?;
        settings = merge_file_config(settings, file_config)?;
    }

    // Step 2: TALIA_* environment variables
    settings = apply_environment_config(settings);

    // Step 3: CLI arguments (highest precedence)
    settings = apply_cli_args(settings, args)?;

    if settings.check.server.is_empty() {
        return Err("a WHOIS server is required: pass --whois host:port or set TALIA_WHOIS".into());
    }
    validate_server_address(&settings.check.server)?;

    Ok(settings)
}

fn merge_file_config(
    mut settings: Settings,
    file_config: FileConfig,
) -> Result<Settings, Box<dyn std::error::Error>> {
    if let Some(defaults) = file_config.defaults {
        if let Some(whois) = defaults.whois {
            settings.check.server = whois;
        }
        if let Some(sleep) = defaults.sleep {
            settings.check.delay = parse_duration_arg("sleep", &sleep)?;
        }
        if let Some(concurrency) = defaults.concurrency {
            settings.check.concurrency = Concurrency::from_flag(concurrency);
        }
        if let Some(timeout) = defaults.timeout {
            settings.check.dial_timeout = parse_duration_arg("timeout", &timeout)?;
        }
        if let Some(verbose) = defaults.verbose {
            settings.check.verbose = verbose;
        }
    }

    if let Some(output) = file_config.output {
        if let Some(grouped) = output.grouped_output {
            settings.grouped_output = grouped;
        }
        if output.output_file.is_some() {
            settings.output_file = output.output_file;
        }
        if output.export_available.is_some() {
            settings.export_available = output.export_available;
        }
    }

    Ok(settings)
}

fn apply_environment_config(mut settings: Settings) -> Settings {
    let env_config = load_env_config(false);

    if let Some(whois) = env_config.whois {
        settings.check.server = whois;
    }
    if let Some(sleep) = env_config.sleep {
        settings.check.delay = sleep;
    }
    if let Some(concurrency) = env_config.concurrency {
        settings.check.concurrency = Concurrency::from_flag(concurrency);
    }
    if let Some(timeout) = env_config.timeout {
        settings.check.dial_timeout = timeout;
    }
    if let Some(verbose) = env_config.verbose {
        settings.check.verbose = verbose;
    }
    if let Some(grouped) = env_config.grouped_output {
        settings.grouped_output = grouped;
    }
    if env_config.output_file.is_some() {
        settings.output_file = env_config.output_file;
    }
    if env_config.export_available.is_some() {
        settings.export_available = env_config.export_available;
    }

    settings
}

fn apply_cli_args(
    mut settings: Settings,
    args: &Args,
) -> Result<Settings, Box<dyn std::error::Error>> {
    if let Some(whois) = &args.whois {
        settings.check.server = whois.clone();
    }
    if let Some(sleep) = &args.sleep {
        settings.check.delay = parse_duration_arg("sleep", sleep)?;
    }
    if let Some(concurrency) = &args.concurrency {
        settings.check.concurrency = concurrency.parse::<Concurrency>()?;
    }
    if let Some(timeout) = &args.timeout {
        settings.check.dial_timeout = parse_duration_arg("timeout", timeout)?;
    }

    // Boolean flags only switch things on; absence keeps env/config values.
    if args.verbose {
        settings.check.verbose = true;
    }
    if args.grouped_output {
        settings.grouped_output = true;
    }
    if args.output_file.is_some() {
        settings.output_file = args.output_file.clone();
    }
    if args.export_available.is_some() {
        settings.export_available = args.export_available.clone();
    }

    Ok(settings)
}

fn parse_duration_arg(name: &str, value: &str) -> Result<Duration, String> {
    parse_duration_string(value).ok_or_else(|| {
        format!(
            "Invalid {} '{}'. Use a format like '500ms', '2s', '1m'",
            name, value
        )
    })
}

/// Run a batch with live progress and a closing summary.
async fn check_with_progress(domains: &[String], config: &CheckConfig) -> BatchReport {
    ui::print_header(domains.len(), &config.server, &config.concurrency.to_string());

    let report = BatchChecker::new(config.clone())
        .with_progress(ui::progress_printer())
        .run(domains)
        .await;

    ui::print_summary(&report.stats, report.elapsed);
    report
}

/// Flat array input: update records in place, or produce grouped output.
async fn run_flat_input(
    input_path: &str,
    mut records: Vec<DomainRecord>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let domains: Vec<String> = records.iter().map(|r| r.domain.clone()).collect();
    let report = check_with_progress(&domains, &settings.check).await;
    let verbose = settings.check.verbose;

    if !settings.grouped_output {
        for (record, result) in records.iter_mut().zip(&report.results) {
            record.available = result.is_available();
            record.reason = Some(result.availability);
            record.log = if verbose || result.availability == Availability::Error {
                Some(result.raw_log.clone())
            } else {
                None
            };
        }
        write_records(input_path, &records)?;
        println!("Processing complete. Updated file: {}", input_path);

        if let Some(export_path) = &settings.export_available {
            write_export(export_path, &convert_array_to_grouped(records))?;
        }
        return Ok(());
    }

    let batch = grouped_from_results(&report.results, verbose);
    match settings.grouped_destination() {
        Some(output_file) => {
            merge_and_write(output_file, batch)?;
            println!(
                "Processing complete in grouped-output mode (merged into {}).",
                output_file
            );
            if let Some(export_path) = &settings.export_available {
                let merged = load_grouped_file(output_file)?;
                write_export(export_path, &merged)?;
            }
        }
        None => {
            write_grouped_data(input_path, &batch)?;
            println!("Processing complete in grouped-output mode (overwrote input).");
            if let Some(export_path) = &settings.export_available {
                write_export(export_path, &batch)?;
            }
        }
    }

    Ok(())
}

/// Grouped input with an `unverified` list: check those and fold them in.
async fn run_grouped_input(
    input_path: &str,
    ext: ExtendedGroupedData,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let (existing, unverified) = ext.into_parts();
    let domains: Vec<String> = unverified.into_iter().map(|r| r.domain).collect();

    let report = check_with_progress(&domains, &settings.check).await;
    let merged = merge_grouped(
        existing,
        grouped_from_results(&report.results, settings.check.verbose),
    );

    let destination = settings.grouped_destination().unwrap_or(input_path);
    write_grouped_data(destination, &merged)?;

    if destination == input_path {
        println!("Processed grouped input (with unverified) and overwrote original file.");
    } else {
        println!(
            "Processed grouped input (with unverified) and wrote results to: {}",
            destination
        );
    }

    if let Some(export_path) = &settings.export_available {
        write_export(export_path, &merged)?;
    }
    Ok(())
}

fn write_export(path: &str, data: &GroupedData) -> Result<(), Box<dyn std::error::Error>> {
    export_available(path, data)?;
    println!(
        "Exported {} available domain{} to {}",
        data.available.len(),
        if data.available.len() == 1 { "" } else { "s" },
        path
    );
    Ok(())
}
