use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use sqlx::{Connection, SqliteConnection};

use crate::{
    catalog::Catalog, config::Config, equipment, models::Player, nets, Error, Result,
};

/// Loads the profile of `user_id`. The global row wins; a chat row is only
/// used for accounts that never got a global one.
pub async fn load(
    conn: &mut SqliteConnection,
    user_id: i64,
    chat_id: Option<i64>,
) -> Result<Option<Player>> {
    let global: Option<Player> =
        sqlx::query_as("SELECT * FROM players WHERE user_id = ? AND chat_id IS NULL")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    if global.is_some() {
        return Ok(global);
    }

    let legacy: Option<Player> = match chat_id {
        Some(chat_id) => {
            sqlx::query_as("SELECT * FROM players WHERE user_id = ? AND chat_id = ?")
                .bind(user_id)
                .bind(chat_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => None,
    };

    Ok(legacy)
}

/// Writes the player back to the row it was loaded from. Fails with
/// [`Error::Conflict`] when the row changed since it was read.
pub async fn save(conn: &mut SqliteConnection, player: &mut Player) -> Result<()> {
    let result = sqlx::query(
        "UPDATE players SET username = ?, coins = ?, xp = ?, level = ?, current_rod = ?,
             current_bait = ?, current_location = ?, last_fish_time = ?, last_net_use_time = ?,
             version = version + 1
         WHERE id = ? AND version = ?",
    )
    .bind(&player.username)
    .bind(player.coins)
    .bind(player.xp)
    .bind(player.level)
    .bind(&player.current_rod)
    .bind(&player.current_bait)
    .bind(&player.current_location)
    .bind(player.last_fish_time)
    .bind(player.last_net_use_time)
    .bind(player.id)
    .bind(player.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict {
            user_id: player.user_id,
        });
    }

    player.version += 1;
    Ok(())
}

pub async fn link_chat(
    conn: &mut SqliteConnection,
    user_id: i64,
    chat_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO player_chats (user_id, chat_id, first_seen) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(chat_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn chats(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<i64>> {
    Ok(
        sqlx::query_scalar("SELECT chat_id FROM player_chats WHERE user_id = ? ORDER BY chat_id")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?,
    )
}

/// Registers a user. An existing global profile is returned as is. Otherwise
/// the new global profile copies the economy of any older row of the user,
/// or starts from the configured defaults. The player always ends up owning
/// the baseline rod and the default net.
pub async fn create(
    conn: &mut SqliteConnection,
    catalog: &Catalog,
    config: &Config,
    user_id: i64,
    chat_id: Option<i64>,
    username: &str,
    now: DateTime<Utc>,
) -> Result<Player> {
    let mut tx = conn.begin().await?;

    if let Some(chat_id) = chat_id {
        link_chat(&mut tx, user_id, chat_id, now).await?;
    }

    let existing: Option<Player> =
        sqlx::query_as("SELECT * FROM players WHERE user_id = ? ORDER BY chat_id IS NOT NULL, id LIMIT 1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    let player = match existing {
        Some(player) if player.is_global() => player,
        existing => {
            let id: i64 = match &existing {
                Some(source) => {
                    debug!("Copying profile of {user_id} from chat row {}", source.id);
                    sqlx::query_scalar(
                        "INSERT INTO players (user_id, chat_id, username, coins, xp, level, current_rod,
                             current_bait, current_location, last_fish_time, last_net_use_time, created_at)
                         VALUES (?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                         RETURNING id",
                    )
                    .bind(user_id)
                    .bind(username)
                    .bind(source.coins)
                    .bind(source.xp)
                    .bind(source.level)
                    .bind(&source.current_rod)
                    .bind(&source.current_bait)
                    .bind(&source.current_location)
                    .bind(source.last_fish_time)
                    .bind(source.last_net_use_time)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
                }
                None => {
                    sqlx::query_scalar(
                        "INSERT INTO players (user_id, chat_id, username, coins, xp, level, current_rod,
                             current_bait, current_location, created_at)
                         VALUES (?, NULL, ?, ?, 0, 0, ?, ?, ?, ?)
                         RETURNING id",
                    )
                    .bind(user_id)
                    .bind(username)
                    .bind(config.starting_coins)
                    .bind(&config.baseline_rod)
                    .bind(&config.default_bait)
                    .bind(&config.default_location)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            info!("Created profile {id} for {username} ({user_id})");
            sqlx::query_as("SELECT * FROM players WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
        }
    };

    let baseline = catalog
        .rod(&config.baseline_rod)
        .ok_or_else(|| Error::unknown("rod", &config.baseline_rod))?;
    equipment::ensure_rod(&mut tx, user_id, baseline, &mut StdRng::from_entropy()).await?;

    if let Some(net) = catalog.net(&config.default_net) {
        nets::ensure_net(&mut tx, user_id, net).await?;
    }

    tx.commit().await?;

    Ok(player)
}
