use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use log::info;

use nudge::core::Config;
use nudge::database::Database;
use nudge::features::reminders::{DispatchPolicy, Dispatcher, LogSink, ReminderScheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting nudge reminder bot...");

    let database = Database::new(&config.database_path).await?;
    info!("📦 Database ready at {}", config.database_path);

    let policy = DispatchPolicy {
        max_attempts: config.delivery_max_attempts,
        backoff: config.delivery_backoff(),
    };
    let dispatcher = Dispatcher::new(Arc::new(LogSink), policy);
    let scheduler =
        ReminderScheduler::new(Arc::new(database), dispatcher, config.reconcile_grace());

    // Rebuild the live schedule before anything else runs; a store failure
    // here is fatal since the schedule state would be unknown.
    let report = scheduler.reconcile().await?;
    info!(
        "🎉 Schedule reconciled: {} daily armed, {} one-time armed, {} stale pruned",
        report.daily_armed, report.once_armed, report.stale_pruned
    );

    info!("Bot running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    scheduler.shutdown();

    Ok(())
}
