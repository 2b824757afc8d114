//! Tradeloop CLI: replay, config checks and preset listing.
//!
//! Commands:
//! - `replay`: run a bot from a TOML config over M1 history on the paper terminal
//! - `check-config`: parse and validate a TOML config, print the resolved strategy
//! - `presets`: list the built-in strategy presets

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tradeloop_core::signal::PRESETS;
use tradeloop_runner::{run_replay, BotConfig, CandleSource, ReplayReport};

#[derive(Parser)]
#[command(name = "tradeloop", about = "Tradeloop CLI: polling strategy engine and paper replay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a bot over M1 candles on the paper terminal.
    Replay {
        /// Path to the bot's TOML config.
        #[arg(long)]
        config: PathBuf,

        /// M1 candle CSV (time,open,high,low,close[,volume]).
        #[arg(long, conflicts_with = "synthetic")]
        candles: Option<PathBuf>,

        /// Generate this many synthetic M1 candles instead of reading a CSV.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Emit logs as JSON lines.
        #[arg(long, default_value_t = false)]
        json_logs: bool,
    },
    /// Parse and validate a TOML config.
    CheckConfig {
        /// Path to the bot's TOML config.
        #[arg(long)]
        config: PathBuf,
    },
    /// List the built-in strategy presets.
    Presets,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            config,
            candles,
            synthetic,
            json_logs,
        } => {
            init_logging(json_logs);
            run_replay_cmd(&config, candles, synthetic)
        }
        Commands::CheckConfig { config } => {
            init_logging(false);
            run_check_config(&config)
        }
        Commands::Presets => {
            run_presets();
            Ok(())
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn run_replay_cmd(config_path: &Path, candles: Option<PathBuf>, synthetic: Option<usize>) -> Result<()> {
    let source = match (candles, synthetic) {
        (Some(path), None) => CandleSource::Csv(path),
        (None, Some(count)) => CandleSource::Synthetic(count),
        (None, None) => bail!("one of --candles or --synthetic is required"),
        (Some(_), Some(_)) => bail!("--candles and --synthetic are mutually exclusive"),
    };

    let config = BotConfig::from_file(config_path)?;
    info!(config = %config_path.display(), source = ?source, "loading candles");
    let m1 = source
        .load(&config.strategy.symbol)
        .with_context(|| format!("loading candles from {source:?}"))?;
    let report = run_replay(&config, m1)?;
    print_summary(&config, &report);
    if config.journal.enabled {
        println!("Journal: {}", config.journal.path.display());
    }
    Ok(())
}

fn run_check_config(config_path: &Path) -> Result<()> {
    let config = BotConfig::from_file(config_path)?;
    let strategy = config.strategy_config()?;
    let engine = config.build_engine()?;

    println!("Config OK: {}", config_path.display());
    println!("Strategy:  {} on {} (id {})", strategy.name, strategy.symbol, engine.strategy_id());
    println!("Pipeline:");
    for (i, filter) in strategy.filters.iter().enumerate() {
        println!("  {}. {}", i + 1, filter.name());
    }
    let timeframes: Vec<String> = engine
        .frame_plan()
        .timeframes()
        .map(|tf| tf.to_string())
        .collect();
    println!("Timeframes: {}", timeframes.join(", "));
    Ok(())
}

fn run_presets() {
    println!("{:<22} Description", "Preset");
    println!("{}", "-".repeat(80));
    for (name, description) in PRESETS {
        println!("{name:<22} {description}");
    }
}

fn print_summary(config: &BotConfig, report: &ReplayReport) {
    let s = &report.summary;
    let trades = report.trades.len();
    let wins = report.trades.iter().filter(|t| t.profit > 0.0).count();
    let net = report.final_balance - report.starting_balance;

    println!();
    let name = config.strategy_config().map(|c| c.name).unwrap_or_default();
    println!("=== Replay: {name} on {} ===", config.strategy.symbol);
    println!("Cycles:          {}", s.cycles);
    println!("  data missing:  {}", s.data_unavailable);
    println!("  regime filter: {}", s.regime_filtered);
    println!("  no signal:     {}", s.no_signal);
    println!("  blocked:       {}", s.blocked);
    println!("  sizing failed: {}", s.sizing_failed);
    println!(
        "Orders:          {} placed, {} rejected, {} pauses",
        s.orders_placed, s.orders_rejected, s.pauses
    );
    println!("Stop updates:    {} sent, {} rejected", s.stops_modified, s.stop_rejections);
    println!("Trades closed:   {trades} ({wins} winners)");
    if trades > 0 {
        println!("Win rate:        {:.1}%", wins as f64 / trades as f64 * 100.0);
    }
    println!("Open at end:     {}", report.open_positions);
    println!(
        "Balance:         {:.2} -> {:.2} ({:+.2})",
        report.starting_balance, report.final_balance, net
    );
}
