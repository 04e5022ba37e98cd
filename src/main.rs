use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local};
use tracing::info;

use salonboard::board::{Board, LoadLevel};
use salonboard::config::BoardConfig;
use salonboard::directory::ResourceDirectory;
use salonboard::reaper;
use salonboard::store::WalStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = BoardConfig::from_env()?;
    salonboard::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(WalStore::open(&config.data_dir.join("appointments.wal"))?);
    let directory = ResourceDirectory::load(&config.directory_path);
    if !config.directory_path.exists() {
        directory.save(&config.directory_path)?;
    }

    info!("salonboard starting");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  directory: {} ({} stylists)", config.directory_path.display(), directory.len());
    info!(
        "  day: {:02}:00-{:02}:00, step {} min, default {} min",
        config.scheduler.day_start_hour,
        config.scheduler.day_end_hour,
        config.scheduler.step_minutes,
        config.scheduler.default_duration
    );

    let board = Arc::new(
        Board::new(store.clone(), directory, config.scheduler)?
            .with_undo_window(config.undo_window_ms),
    );

    tokio::spawn(reaper::run_reaper(board.clone(), Duration::from_secs(1)));
    tokio::spawn(reaper::run_compactor(
        store.clone(),
        config.compact_threshold,
        Duration::from_secs(30),
    ));

    let date = config.date.unwrap_or_else(|| Local::now().date_naive());
    let day = board.day_board(date, None).await?;
    println!("{day}");

    let month = board.month_overview(date.year(), date.month()).await?;
    let busiest = month
        .days
        .iter()
        .filter(|d| d.in_month && d.level >= LoadLevel::Busy)
        .map(|d| format!("{} ({})", d.date.format("%d"), d.count))
        .collect::<Vec<_>>();
    if !busiest.is_empty() {
        println!("busy days this month: {}", busiest.join(", "));
    }

    info!("board ready; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("salonboard stopped");
    Ok(())
}
