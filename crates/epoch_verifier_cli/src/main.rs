//! epoch-verifier CLI: verify, fetch, report, check-digest.

use clap::{Args, Parser, Subcommand};
use epoch_verifier::source::{Cache, DataSource, HttpConfig, HttpSource, JsonDirSource};
use epoch_verifier::verify::check_digest;
use epoch_verifier::{Context, ReportData, Runner, VerificationReport, VerifierConfig};
use epoch_verifier_report::{render_report, render_text};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Exit code when at least one rule failed (or a digest did not match).
const EXIT_FAILED: u8 = 1;
/// Exit code when the input could not be loaded or the context could not be built.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Verify(args) => run_verify(args),
        Command::Fetch(args) => run_fetch(args),
        Command::Report(args) => run_report(args),
        Command::CheckDigest(args) => run_check_digest(args),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "aborted");
            eprintln!("error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[derive(Parser)]
#[command(name = "epoch-verifier")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Independent auditor for quadratic-funding epoch rewards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify one epoch and print the report.
    Verify(VerifyArgs),
    /// Download an epoch's datasets into the cache (and optionally a JSON directory).
    Fetch(FetchArgs),
    /// Verify one epoch and write HTML, report JSON and digest.
    Report(ReportArgs),
    /// Recompute a saved report's digest and compare it with its `.sha256` file.
    CheckDigest(CheckDigestArgs),
}

/// Where the epoch datasets come from.
#[derive(Args)]
struct SourceArgs {
    #[arg(long)]
    epoch: u64,
    /// Directory of JSON exports (`<dir>/<epoch>/*.json`).
    #[arg(long, conflicts_with = "api_url")]
    data_dir: Option<PathBuf>,
    /// Backend API base URL. Falls back to `api_url` in the config file.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    #[arg(long)]
    offline: bool,
}

#[derive(Parser)]
struct VerifyArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Evaluate rules in parallel.
    #[arg(long)]
    parallel: bool,
}

#[derive(Parser)]
struct FetchArgs {
    #[arg(long)]
    epoch: u64,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    /// Also write the datasets as `<out>/<epoch>/*.json`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser)]
struct ReportArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value = "./reports")]
    reports_dir: PathBuf,
}

#[derive(Parser)]
struct CheckDigestArgs {
    #[arg(long)]
    report: PathBuf,
}

fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("cache.sqlite")
}

fn http_source(
    api_url: Option<String>,
    config: &VerifierConfig,
    cache_dir: &Path,
    offline: bool,
) -> Result<HttpSource, Box<dyn std::error::Error>> {
    let base_url = api_url
        .or_else(|| config.api_url.clone())
        .ok_or("no data source: pass --data-dir or --api-url (or set api_url in config)")?;
    let cache = Cache::open(cache_path(cache_dir))?;
    let http = HttpConfig {
        offline,
        ..HttpConfig::new(base_url)
    };
    Ok(HttpSource::new(http, Some(cache))?)
}

fn open_source(
    args: &SourceArgs,
    config: &VerifierConfig,
) -> Result<Box<dyn DataSource>, Box<dyn std::error::Error>> {
    if let Some(dir) = &args.data_dir {
        return Ok(Box::new(JsonDirSource::new(dir)));
    }
    let source = http_source(args.api_url.clone(), config, &args.cache_dir, args.offline)?;
    Ok(Box::new(source))
}

fn verify_epoch(
    args: &SourceArgs,
    config: &VerifierConfig,
    parallel: bool,
) -> Result<VerificationReport, Box<dyn std::error::Error>> {
    let source = open_source(args, config)?;
    let raw = source.fetch_epoch(args.epoch)?;
    let context = Context::from_raw(args.epoch, &raw, config.rule_params()?)?;
    Ok(Runner::new().parallel(parallel).run(&context))
}

fn run_verify(args: VerifyArgs) -> CliResult {
    let config = VerifierConfig::load()?;
    let parallel = args.parallel || config.parallel;
    let report = verify_epoch(&args.source, &config, parallel)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    })
}

fn run_fetch(args: FetchArgs) -> CliResult {
    let config = VerifierConfig::load()?;
    let source = http_source(args.api_url, &config, &args.cache_dir, false)?;
    let raw = source.fetch_epoch(args.epoch)?;
    if let Some(out) = &args.out {
        let dir = JsonDirSource::write_epoch(out, args.epoch, &raw)?;
        info!(dir = %dir.display(), "datasets written");
    }
    info!(
        epoch = args.epoch,
        requests = source.request_count(),
        "fetch complete"
    );
    Ok(ExitCode::SUCCESS)
}

fn run_report(args: ReportArgs) -> CliResult {
    let config = VerifierConfig::load()?;
    let report = verify_epoch(&args.source, &config, config.parallel)?;
    let data = ReportData::new(report)?;

    std::fs::create_dir_all(&args.reports_dir)?;
    let stem = format!("epoch_{}", data.report.epoch);
    let html_path = args
        .out
        .unwrap_or_else(|| args.reports_dir.join(format!("{stem}.html")));
    let json_path = args.reports_dir.join(format!("{stem}.json"));
    let hash_path = args.reports_dir.join(format!("{stem}.sha256"));
    render_report(&data, &html_path)?;
    std::fs::write(&json_path, serde_json::to_string_pretty(&data.report)?)?;
    std::fs::write(&hash_path, format!("{}\n", data.digest_sha256))?;
    info!(?html_path, ?json_path, ?hash_path, "report complete");
    println!("{}", data.report.summary());
    Ok(ExitCode::SUCCESS)
}

fn run_check_digest(args: CheckDigestArgs) -> CliResult {
    let report_json = std::fs::read_to_string(&args.report)?;
    let report: VerificationReport = serde_json::from_str(&report_json)?;
    let sha256_path = args.report.with_extension("sha256");
    let expected = std::fs::read_to_string(&sha256_path).ok();
    let check = check_digest(&report, expected.as_deref())?;
    if check.matches {
        println!("OK\t{}", check.digest);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "MISMATCH\tcomputed={}\texpected={:?}",
            check.digest, check.expected
        );
        Ok(ExitCode::from(EXIT_FAILED))
    }
}
