//! Token Watch
//!
//! Tracks the latest token called in a chat and follows its market cap.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use token_watch::{
    classifier::classify,
    client::{DexScreenerClient, MarketCapFetcher},
    config::Config,
    ingester::{
        stdin::StdinSource,
        telegram::{TelegramBotSource, TelegramForwarder},
        IngestHandler, InboundMessage, MessageSource,
    },
    monitor::MarketCapMonitor,
    tracker::{EntryStore, TokenEntry, TokenTracker},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "token-watch")]
#[command(about = "Track tokens called in chat groups and monitor their market cap")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for messages and monitor the active token
    Run {
        /// Read messages from stdin instead of Telegram
        #[arg(long)]
        stdin: bool,

        /// Chat id assigned to stdin messages
        #[arg(long, default_value = "0")]
        chat_id: i64,
    },
    /// Look up the current market cap of a token
    Check {
        /// Ticker, contract address or mint
        token: String,
    },
    /// Show the active entry and history
    Status,
    /// Print the tokens found in a piece of text
    Classify {
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Classification needs no config
    if let Commands::Classify { text } = &cli.command {
        show_classification(text);
        return Ok(());
    }

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { stdin, chat_id } => run_watch(config, stdin, chat_id).await,
        Commands::Check { token } => check_token(config, &token).await,
        Commands::Status => show_status(config),
        Commands::Classify { .. } => Ok(()),
    }
}

fn dexscreener(config: &Config) -> anyhow::Result<Arc<dyn MarketCapFetcher>> {
    let client = DexScreenerClient::new(
        &config.monitor.api_base_url,
        Duration::from_secs(config.monitor.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

async fn run_watch(config: Config, use_stdin: bool, chat_id: i64) -> anyhow::Result<()> {
    tracing::info!("Starting token watch");

    if config.filter.discovery_mode {
        tracing::warn!("Discovery mode: messages are logged, nothing is tracked");
    }
    if config.trading.enabled {
        tracing::warn!("Trading is configured but not executed by this build");
    }

    let fetcher = dexscreener(&config)?;
    let store = EntryStore::from_config(&config.storage);
    tracing::info!(
        current = %store.current_path().display(),
        history = %store.history_path().display(),
        "Entry storage"
    );

    let tracker = Arc::new(TokenTracker::restore(store, fetcher).await);
    tracker.seed_static(&config.static_tokens).await;

    // ========== Market Cap Monitor ==========
    let cancel = CancellationToken::new();
    let monitor = MarketCapMonitor::new(
        tracker.clone(),
        Duration::from_secs(config.monitor.interval_secs),
    );
    let monitor_handle = tokio::spawn(monitor.run(cancel.clone()));

    // ========== Message Sources ==========
    let (tx, rx) = mpsc::channel::<InboundMessage>(500);

    let source: Box<dyn MessageSource> = match &config.telegram {
        Some(tg) if !use_stdin => Box::new(TelegramBotSource::new(tg)?),
        _ => {
            tracing::info!(chat_id, "Reading messages from stdin");
            Box::new(StdinSource::new(chat_id))
        }
    };
    let source_name = source.name().to_string();
    tokio::spawn(async move {
        if let Err(e) = source.run(tx).await {
            tracing::error!("{} source error: {}", source_name, e);
        }
    });

    let mut handler = IngestHandler::new(tracker.clone(), config.filter.clone());
    if let Some(tg) = &config.telegram {
        if let Some(forward_chat_id) = &tg.forward_chat_id {
            handler = handler.with_forwarder(Arc::new(TelegramForwarder::new(
                tg.bot_token.clone(),
                forward_chat_id.clone(),
            )));
        }
    }

    tokio::select! {
        _ = handler.run(rx) => {
            tracing::info!("Message source finished");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    cancel.cancel();
    if let Err(e) = monitor_handle.await {
        tracing::error!("Monitor task failed: {}", e);
    }

    if let Some(entry) = tracker.snapshot().await {
        print_entry("Active token", &entry);
    }
    let pending = tracker.pending_history().await;
    if pending > 0 {
        tracing::warn!(pending, "History records not yet written");
    }

    Ok(())
}

async fn check_token(config: Config, token: &str) -> anyhow::Result<()> {
    let fetcher = dexscreener(&config)?;
    let quote = fetcher.fetch(token).await?;

    println!("\n🔎 {}\n", token);
    match quote.market_cap {
        Some(mc) => println!("Market cap: ${:.0}", mc),
        None => println!("Market cap: unavailable"),
    }
    if let Some(url) = &quote.pair_url {
        println!("Pair: {}", url);
    }
    Ok(())
}

fn show_status(config: Config) -> anyhow::Result<()> {
    let store = EntryStore::from_config(&config.storage);

    match store.load_current() {
        Some(entry) => print_entry("Active token", &entry),
        None => println!("\nNo active token\n"),
    }

    let history = store.load_history()?;
    println!("📜 History ({} entries)\n", history.len());
    for entry in history.iter().rev().take(10) {
        println!(
            "  {:<44} peak {:>+9.2}%  {}{}",
            entry.token,
            entry.highest_percent_increase,
            entry.time_posted.format("%Y-%m-%d %H:%M"),
            if entry.reached_50 { "  ✅" } else { "" }
        );
    }
    println!();
    Ok(())
}

fn show_classification(text: &str) {
    let matches = classify(text);
    if matches.is_empty() {
        println!("No tokens found");
        return;
    }
    for m in matches {
        println!("{:>4}  {:<8} {}", m.start, format!("{:?}", m.kind), m.value);
    }
}

fn print_entry(title: &str, entry: &TokenEntry) {
    let fmt_mc = |mc: Option<f64>| mc.map_or_else(|| "-".to_string(), |v| format!("${:.0}", v));

    println!("\n📈 {}: {}\n", title, entry.token);
    println!("Posted:        {}", entry.time_posted.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Initial MC:    {}", fmt_mc(entry.initial_market_cap));
    println!("Current MC:    {} ({})", fmt_mc(entry.current_market_cap), entry.current_percentage);
    println!(
        "Highest MC:    {} ({:+.2}%)",
        fmt_mc(entry.highest_market_cap),
        entry.highest_percent_increase
    );
    println!("Reached +50%:  {}", if entry.reached_50 { "yes" } else { "no" });
    if let Some(checked) = entry.last_checked {
        println!("Last checked:  {}", checked.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(url) = &entry.pair_url {
        println!("Pair:          {}", url);
    }
    println!();
}
