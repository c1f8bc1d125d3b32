//! tradeaudit CLI: analyze a normalized trade file and emit the JSON report.
//!
//! Commands:
//! - `analyze`: load a trade CSV, run the full analysis, write the report
//! - `default-config`: print the default configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::MetricValue;
use tradeaudit_runner::runner::{run_analysis_from_csv, AnalysisReport};

#[derive(Parser)]
#[command(
    name = "tradeaudit",
    about = "tradeaudit: behavioral and statistical analysis of closed trades"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a normalized trade CSV.
    Analyze {
        /// Trade CSV with header asset,direction,open_time,close_time,...
        #[arg(long)]
        trades: PathBuf,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the JSON report here and print a summary. Without it the report goes to stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Monte Carlo master seed (overrides the config file).
        #[arg(long)]
        seed: Option<u64>,

        /// Monte Carlo trial count (overrides the config file).
        #[arg(long)]
        trials: Option<usize>,

        /// Number of Trade DNA clusters (overrides the config file).
        #[arg(long)]
        clusters: Option<usize>,
    },
    /// Print the default configuration as TOML.
    DefaultConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            trades,
            config,
            output,
            seed,
            trials,
            clusters,
        } => run_analyze_cmd(&trades, config.as_deref(), output.as_deref(), seed, trials, clusters),
        Commands::DefaultConfig => {
            print!("{}", AnalysisConfig::default().to_toml()?);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for the JSON report.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tradeaudit_runner={level},tradeaudit_core={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_analyze_cmd(
    trades: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    seed: Option<u64>,
    trials: Option<usize>,
    clusters: Option<usize>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(seed) = seed {
        config.monte_carlo_seed = Some(seed);
    }
    if let Some(trials) = trials {
        config.monte_carlo_trials = trials;
    }
    if let Some(clusters) = clusters {
        config.cluster_count = clusters;
    }
    tracing::info!(trades = %trades.display(), "analyzing");

    let report = run_analysis_from_csv(trades, &config)?;
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            print_summary(&report);
            println!("Report saved to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn fmt_metric(value: MetricValue) -> String {
    match value {
        MetricValue::Value(v) => format!("{v:.2}"),
        MetricValue::Infinite => "inf".into(),
        MetricValue::Undefined => "undefined".into(),
        MetricValue::NoData => "n/a".into(),
    }
}

fn fmt_pct(value: MetricValue) -> String {
    match value.value() {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => fmt_metric(value),
    }
}

fn print_summary(report: &AnalysisReport) {
    let g = &report.metrics.global;
    let b = &report.behavior.summary;
    let mc = &report.monte_carlo;

    println!("=== Trade Audit ===");
    println!("Trades:          {}", report.trade_count);
    println!("Total PnL:       {}", g.total_pnl);
    println!("Profit factor:   {}", fmt_metric(g.profit_factor));
    println!("Win rate:        {}", fmt_pct(g.win_rate));
    println!("Expectancy:      {}", fmt_metric(g.expectancy));
    println!("Max drawdown:    {}", fmt_metric(g.max_drawdown));
    println!("Sharpe:          {}", fmt_metric(g.sharpe));
    match report.discipline.score() {
        Some(score) => println!("Discipline:      {score:.1} / 100"),
        None => println!("Discipline:      n/a"),
    }
    println!();
    println!("--- Behavior ---");
    println!("Revenge trades:  {}", b.revenge_count);
    println!("Impulsive:       {}", b.impulsive_count);
    println!(
        "Overtrading:     {} trades over {} days",
        b.overtrading_trade_count,
        b.overtrading_days.len()
    );
    println!("Flagged:         {}", fmt_pct(b.flagged_fraction));
    let tilt = &report.behavior.tilt;
    println!("Tiltmeter:       {} / 100 ({:?})", tilt.score, tilt.status);
    for alert in &tilt.alerts {
        println!("  alert:         {alert:?}");
    }
    let temporal = &report.metrics.temporal;
    if let Some(hour) = temporal.toxic_hours.first() {
        println!("Worst hour:      {hour:02}:00");
    }
    if let Some(hour) = temporal.profitable_hours.first() {
        println!("Best hour:       {hour:02}:00");
    }
    if let Some(clustering) = &report.clustering {
        let dna = &clustering.dna;
        println!();
        println!("--- Trade DNA (cluster {}) ---", dna.cluster_id);
        println!("Trades:          {}", dna.member_count);
        println!("Mean PnL:        {}", fmt_metric(dna.mean_pnl));
        println!("Win rate:        {}", fmt_pct(dna.win_rate));
        println!("Hold (min):      {:.1}", dna.profile.duration_minutes);
        println!("Leverage:        {:.1}", dna.profile.leverage);
        if let Some(session) = &dna.dominant_session {
            println!("Session:         {session}");
        }
    }
    println!();
    println!("--- Monte Carlo ({} trials, seed {}) ---", mc.trials, mc.seed);
    println!("Drawdown pctile: {}", fmt_metric(mc.percentile));
    println!("Verdict:         {:?}", mc.verdict);
}
