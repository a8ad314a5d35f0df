//! Weekscan CLI: weekly breakout scan, ledger maintenance, universe inspection.
//!
//! Commands:
//! - `scan` (default): fetch, evaluate, and alert each new weekly breakout once
//! - `ledger show`: print the alert ledger
//! - `ledger reset`: prune the ledger down to the current ISO week
//! - `universe`: print the resolved symbol list

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use weekscan_core::data::{CircuitBreaker, FallbackPolicy, Universe, YahooProvider};
use weekscan_runner::{
    AlertSink, Clock, ConsoleSink, LogProgress, ScanProgress, ScanReport, Scanner, ScannerConfig,
    SinkKind, StderrProgress, SymbolOutcome, SystemClock, TelegramSink,
};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "weekscan.toml";

#[derive(Parser)]
#[command(
    name = "weekscan",
    version,
    about = "Weekly breakout scanner: one alert per symbol per ISO week"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./weekscan.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v for debug). RUST_LOG applies otherwise.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the universe and alert new weekly breakouts.
    Scan(ScanArgs),
    /// Alert ledger commands.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,

        /// Ledger CSV path (overrides the config file).
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Print the resolved symbol universe.
    Universe {
        /// Universe CSV path (overrides the config file).
        #[arg(long)]
        universe_csv: Option<PathBuf>,

        /// Fail instead of falling back to the built-in basket.
        #[arg(long, default_value_t = false)]
        strict_universe: bool,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Print every record in the ledger.
    Show,
    /// Drop records from weeks other than the current ISO week.
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkArg {
    Console,
    Telegram,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Console => SinkKind::Console,
            SinkArg::Telegram => SinkKind::Telegram,
        }
    }
}

#[derive(clap::Args, Default)]
struct ScanArgs {
    /// Evaluate and print breakouts without sending alerts or touching the ledger.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Scan only these symbols instead of the configured universe (repeatable).
    #[arg(long = "symbol")]
    symbols: Vec<String>,

    /// Scan at most this many symbols.
    #[arg(long)]
    max_symbols: Option<usize>,

    /// Lookback window in weeks (overrides the config file).
    #[arg(long)]
    lookback: Option<usize>,

    /// Minimum volume ratio (overrides the config file).
    #[arg(long)]
    min_volume_ratio: Option<f64>,

    /// Ledger CSV path (overrides the config file).
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Universe CSV path (overrides the config file).
    #[arg(long)]
    universe_csv: Option<PathBuf>,

    /// Fail instead of falling back to the built-in basket.
    #[arg(long, default_value_t = false)]
    strict_universe: bool,

    /// Alert sink (overrides the config file).
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// Print a per-symbol progress line to stderr.
    #[arg(long, default_value_t = false)]
    progress: bool,

    /// Print the full scan report as JSON instead of the summary.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Scan(ScanArgs::default())) {
        Commands::Scan(args) => run_scan(&mut config, args),
        Commands::Ledger { action, ledger } => {
            if let Some(path) = ledger {
                config.ledger.path = path;
            }
            match action {
                LedgerAction::Show => run_ledger_show(&config),
                LedgerAction::Reset => run_ledger_reset(&config),
            }
        }
        Commands::Universe {
            universe_csv,
            strict_universe,
        } => {
            apply_universe_overrides(&mut config, universe_csv, strict_universe);
            run_universe(&config)
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ScannerConfig> {
    if let Some(path) = path {
        return ScannerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        info!(path = DEFAULT_CONFIG_FILE, "using config file");
        return ScannerConfig::from_file(default_path)
            .with_context(|| format!("loading config {DEFAULT_CONFIG_FILE}"));
    }
    Ok(ScannerConfig::default())
}

fn apply_universe_overrides(
    config: &mut ScannerConfig,
    universe_csv: Option<PathBuf>,
    strict: bool,
) {
    if let Some(path) = universe_csv {
        config.universe.csv_path = path;
        config.universe.url = None;
    }
    if strict {
        config.universe.fallback = FallbackPolicy::Fail;
    }
}

fn resolve_universe(config: &ScannerConfig, explicit: Vec<String>) -> Result<Universe> {
    if !explicit.is_empty() {
        return Ok(Universe::from_symbols(explicit));
    }
    config
        .universe
        .load(config.data.timeout())
        .context("loading symbol universe")
}

/// Console alerts go to stderr when stdout carries the JSON report.
fn console_sink(json: bool) -> ConsoleSink {
    if json {
        ConsoleSink::with_writer(Box::new(std::io::stderr()))
    } else {
        ConsoleSink::stdout()
    }
}

fn build_sink(config: &ScannerConfig, json: bool) -> Result<Box<dyn AlertSink>> {
    match config.alerts.sink {
        SinkKind::Console => Ok(Box::new(console_sink(json))),
        SinkKind::Telegram => {
            let token = std::env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN must be set for the telegram sink")?;
            let chat_id = std::env::var("TELEGRAM_CHAT_ID")
                .context("TELEGRAM_CHAT_ID must be set for the telegram sink")?;
            let telegram = config.alerts.telegram_config(
                token,
                chat_id,
                config.rule.lookback_weeks,
            );
            Ok(Box::new(TelegramSink::new(telegram)?))
        }
    }
}

fn run_scan(config: &mut ScannerConfig, args: ScanArgs) -> Result<()> {
    if let Some(lookback) = args.lookback {
        config.rule.lookback_weeks = lookback;
    }
    if let Some(ratio) = args.min_volume_ratio {
        config.rule.min_volume_ratio = ratio;
    }
    if let Some(path) = args.ledger {
        config.ledger.path = path;
    }
    if let Some(sink) = args.sink {
        config.alerts.sink = sink.into();
    }
    apply_universe_overrides(config, args.universe_csv, args.strict_universe);
    config.validate().context("invalid scan settings")?;

    let mut universe = resolve_universe(config, args.symbols)?;
    if let Some(max) = args.max_symbols {
        universe.truncate(max);
    }
    if universe.is_empty() {
        bail!("no symbols to scan");
    }

    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(config.data.yahoo_config(), circuit_breaker)?;
    let sink: Box<dyn AlertSink> = if args.dry_run {
        Box::new(console_sink(args.json))
    } else {
        build_sink(config, args.json)?
    };
    let clock = SystemClock;
    let progress: Box<dyn ScanProgress> = if args.progress {
        Box::new(StderrProgress)
    } else {
        Box::new(LogProgress)
    };

    let mut ledger = config.ledger.open();
    let scanner = Scanner::new(
        config.scan_settings(args.dry_run),
        &clock,
        &provider,
        sink.as_ref(),
    )
    .with_progress(progress.as_ref());

    let report = scanner
        .run(universe.symbols(), &mut ledger)
        .with_context(|| format!("scan aborted (ledger {})", ledger.path().display()))?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_summary(&report, args.dry_run);
    }
    Ok(())
}

fn print_summary(report: &ScanReport, dry_run: bool) {
    println!();
    println!("ISO week {}-W{:02}", report.year, report.week);

    if dry_run {
        let pending = report.would_alert();
        if pending.is_empty() {
            println!("No new breakout signals found.");
        } else {
            println!("New breakout signals (dry run, not sent):");
            for alert in pending {
                println!("  {}", alert.summary_line());
            }
        }
    } else if report.emitted.is_empty() {
        println!("No new breakout signals found.");
    } else {
        println!("New breakout signals:");
        for alert in &report.emitted {
            println!("  {}", alert.summary_line());
        }
    }

    let already = count(report, |o| matches!(o, SymbolOutcome::AlreadyAlerted));
    let insufficient = count(report, |o| matches!(o, SymbolOutcome::InsufficientData { .. }));
    println!(
        "Scanned {} symbol(s): {} already alerted this week, {} with insufficient data, {} failed",
        report.outcomes.len(),
        already,
        insufficient,
        report.failed_count()
    );
    for failure in report.failures() {
        println!("  {}: {}", failure.symbol, failure.outcome);
    }
}

fn count(report: &ScanReport, pred: impl Fn(&SymbolOutcome) -> bool) -> usize {
    report.outcomes.iter().filter(|r| pred(&r.outcome)).count()
}

fn run_ledger_show(config: &ScannerConfig) -> Result<()> {
    let ledger = config.ledger.open();
    let records = ledger
        .records()
        .with_context(|| format!("reading ledger {}", ledger.path().display()))?;

    if records.is_empty() {
        println!("Ledger is empty: {}", ledger.path().display());
        return Ok(());
    }

    println!("{:<16} {:>6} {:>4}", "Symbol", "Year", "Week");
    for record in &records {
        println!("{:<16} {:>6} {:>4}", record.symbol, record.year, record.week);
    }
    println!("{} record(s) in {}", records.len(), ledger.path().display());
    Ok(())
}

fn run_ledger_reset(config: &ScannerConfig) -> Result<()> {
    let mut ledger = config.ledger.open();
    let (year, week) = SystemClock.iso_week();
    let pruned = ledger
        .roll_over(year, week)
        .with_context(|| format!("resetting ledger {}", ledger.path().display()))?;

    println!("Ledger rolled over to {year}-W{week:02}: {pruned} record(s) removed");
    Ok(())
}

fn run_universe(config: &ScannerConfig) -> Result<()> {
    let universe = resolve_universe(config, Vec::new())?;
    for symbol in universe.symbols() {
        println!("{symbol}");
    }
    eprintln!("{} symbol(s)", universe.len());
    Ok(())
}
