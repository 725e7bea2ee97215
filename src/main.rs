#![forbid(unsafe_code)]

use std::sync::Arc;

use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use fishinge_economy::{
    db_conn, migrate,
    recovery::{self, LogNotifier},
    Catalog, Config,
};
use futures_lite::StreamExt;
use log::{debug, info};
use signal_hook::consts::*;
use signal_hook_tokio::Signals;
use tokio::sync::Notify;

async fn handle_signals(mut signals: Signals, quit_signal: Arc<Notify>) {
    info!("Starting signal handler");
    while let Some(signal) = signals.next().await {
        match signal {
            SIGTERM | SIGINT | SIGQUIT => {
                quit_signal.notify_waiters();
                break;
            }
            _ => unreachable!(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    dotenv().ok();

    run().await.wrap_err("failed to run economy")
}

async fn run() -> Result<()> {
    let signals = Signals::new(&[SIGTERM, SIGINT, SIGQUIT]).wrap_err("Signal hooking error")?;
    let quit_signal = Arc::new(Notify::new());

    let config = Config::load().wrap_err("Could not load config")?;

    let catalog = Catalog::load(&config.catalog_path)
        .wrap_err_with(|| format!("Could not load catalog {}", config.catalog_path.display()))?;
    catalog
        .validate_against(&config)
        .wrap_err("Catalog does not match the configured defaults")?;
    info!(
        "Loaded {} fish, {} trash, {} rods and {} nets",
        catalog.fish.len(),
        catalog.trash.len(),
        catalog.rods.len(),
        catalog.nets.len()
    );

    let mut conn = db_conn(&config.database_url).await?;
    migrate(&mut conn).await?;

    let handle = signals.handle();
    let signals_task = tokio::spawn(handle_signals(signals, quit_signal.clone()));

    let recovery_task = tokio::spawn(recovery::run(
        conn,
        config,
        Arc::new(LogNotifier),
        quit_signal.clone(),
    ));

    recovery_task.await?;
    debug!("Recovery task finished");

    handle.close();
    signals_task.await?;

    Ok(())
}
