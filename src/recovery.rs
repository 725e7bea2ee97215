use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info};
use sqlx::SqliteConnection;
use tokio::{select, sync::Notify, time::MissedTickBehavior};

use crate::{config::Config, equipment, models::RodInstance, Result};

/// Told about every rod that is back at full durability.
#[async_trait]
pub trait RecoveryNotifier: Send + Sync {
    async fn rod_recovered(&self, rod: &RodInstance);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl RecoveryNotifier for LogNotifier {
    async fn rod_recovered(&self, rod: &RodInstance) {
        info!(
            "{} of {} recovered to {}",
            rod.rod_name(),
            rod.user_id(),
            rod.max_durability()
        );
    }
}

/// Runs one recovery pass and notifies about every rod that finished.
pub async fn tick<N: RecoveryNotifier + ?Sized>(
    conn: &mut SqliteConnection,
    config: &Config,
    notifier: &N,
) -> Result<usize> {
    let recovered = equipment::advance_recovery(
        conn,
        Utc::now(),
        config.recovery_interval(),
        config.recovery_divisor,
    )
    .await?;

    for rod in &recovered {
        notifier.rod_recovered(rod).await;
    }

    Ok(recovered.len())
}

/// Ticks every recovery interval until `quit_signal` fires.
pub async fn run<N: RecoveryNotifier + ?Sized>(
    mut conn: SqliteConnection,
    config: Config,
    notifier: Arc<N>,
    quit_signal: Arc<Notify>,
) {
    info!("Starting recovery scheduler");

    let period = config.recovery_interval.max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = interval.tick() => {
                if let Err(err) = tick(&mut conn, &config, notifier.as_ref()).await {
                    error!("Could not advance rod recovery: {err}");
                }
            }
            _ = quit_signal.notified() => {
                debug!("Received quitting recovery task");
                break;
            }
        }
    }

    if let Err(err) = sqlx::Connection::close(conn).await {
        error!("Could not close database connection: {err}");
    }
}
