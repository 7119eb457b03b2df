//! WinGo HIGH/LOW Forecast Bot
//!
//! Serves the Telegram command surface and the two scheduled loops.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wingo_bot::{
    config::Config,
    notify::{self, TelegramChannel},
    source::HttpDrawSource,
    storage::Database,
    summary::DailyAggregator,
    telegram::{CommandHandler, TelegramBot},
    worker::Supervisor,
};

#[derive(Parser)]
#[command(name = "wingo-bot")]
#[command(about = "WinGo HIGH/LOW forecast broadcasting bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run,
    /// Print forecast accuracy from the database
    Stats,
    /// Send a test message to every registered chat
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Missing required values are fatal here, before any task is scheduled.
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Stats => show_stats(config).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting wingo forecast bot");

    let db = Database::connect(&config.database.path).await?;
    let channel = Arc::new(TelegramChannel::new(config.telegram.bot_token.clone()));
    let supervisor = Arc::new(Supervisor::new());
    let source = HttpDrawSource::new(&config.source)?;

    // The daily summary runs whether or not forecasting is active.
    let aggregator = DailyAggregator::new(db.clone(), channel.clone(), config.summary.clone());
    tokio::spawn(aggregator.run());

    let handler = Arc::new(CommandHandler::new(
        db,
        supervisor,
        source,
        channel,
        config.clone(),
    ));
    let bot = Arc::new(TelegramBot::new(
        config.telegram.bot_token.clone(),
        config.telegram.admin_id,
    ));

    bot.run(handler).await;
    Ok(())
}

async fn show_stats(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let stats = db.forecast_stats().await?;

    println!("\n📊 Forecast Accuracy\n");
    println!("Total:    {}", stats.total);
    println!("Wins:     {}", stats.wins);
    println!("Losses:   {}", stats.losses);
    println!("Pending:  {}", stats.pending);
    println!("Win rate: {}", stats.win_rate);

    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let destinations = db.list_destinations().await?;
    if destinations.is_empty() {
        println!("No chats registered. Use /addchat from the bot first.");
        return Ok(());
    }

    let channel = TelegramChannel::new(config.telegram.bot_token.clone());
    let (delivered, failed) = notify::broadcast(
        &channel,
        &destinations,
        "🧪 <b>Test Notification</b>\n\nIf you see this, delivery is working!",
    )
    .await;

    println!("✅ Delivered to {delivered} chat(s), {failed} failed");
    Ok(())
}
