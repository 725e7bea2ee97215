use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::Serialize;
use sqlx::{Connection, SqliteConnection};

use crate::{
    cast::{Catch, Engine},
    catalog::Net,
    ledger::{self, NewCatch},
    models::{NetInstance, NetRow, NetUses, Player},
    pricing, profile,
    roll::{self, Dice},
    selector, Error, Result,
};

pub async fn get_net(
    conn: &mut SqliteConnection,
    user_id: i64,
    net_name: &str,
) -> Result<Option<NetInstance>> {
    let row: Option<NetRow> =
        sqlx::query_as("SELECT * FROM net_instances WHERE user_id = ? AND net_name = ?")
            .bind(user_id)
            .bind(net_name)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(NetInstance::try_from).transpose()?)
}

pub async fn user_nets(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<NetInstance>> {
    let rows: Vec<NetRow> =
        sqlx::query_as("SELECT * FROM net_instances WHERE user_id = ? ORDER BY net_name")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows
        .into_iter()
        .map(NetInstance::try_from)
        .collect::<Result<_, _>>()?)
}

fn fresh_uses(net: &Net) -> NetUses {
    match net.max_uses {
        Some(uses) => NetUses::Remaining(uses),
        None => NetUses::Unlimited,
    }
}

/// Gives the player `net` unless they already own it.
pub async fn ensure_net(conn: &mut SqliteConnection, user_id: i64, net: &Net) -> Result<NetInstance> {
    sqlx::query("INSERT OR IGNORE INTO net_instances (user_id, net_name, uses_left) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(&net.name)
        .bind(fresh_uses(net).to_column())
        .execute(&mut *conn)
        .await?;

    get_net(conn, user_id, &net.name)
        .await?
        .ok_or_else(|| Error::unknown("net", &net.name))
}

/// Tops up a finite net by another full set of uses.
pub async fn add_uses(conn: &mut SqliteConnection, user_id: i64, net: &Net) -> Result<NetInstance> {
    let Some(uses) = net.max_uses else {
        return ensure_net(conn, user_id, net).await;
    };

    sqlx::query(
        "INSERT INTO net_instances (user_id, net_name, uses_left) VALUES (?, ?, ?)
         ON CONFLICT (user_id, net_name) DO UPDATE SET uses_left = uses_left + excluded.uses_left",
    )
    .bind(user_id)
    .bind(&net.name)
    .bind(uses as i64)
    .execute(&mut *conn)
    .await?;

    get_net(conn, user_id, &net.name)
        .await?
        .ok_or_else(|| Error::unknown("net", &net.name))
}

async fn save_net(conn: &mut SqliteConnection, net: &NetInstance) -> Result<()> {
    sqlx::query("UPDATE net_instances SET uses_left = ?, last_use_time = ? WHERE id = ?")
        .bind(net.uses.to_column())
        .bind(net.last_use_time)
        .bind(net.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Time left before `net` may be used. All nets share the player's last use.
pub fn cooldown_remaining(player: &Player, net: &Net, now: DateTime<Utc>) -> Option<Duration> {
    let ready_at = player.last_net_use_time? + Duration::hours(net.cooldown_hours);
    (ready_at > now).then(|| ready_at - now)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetHaul {
    pub net: String,
    pub items: Vec<Catch>,
    pub uses: NetUses,
    pub total_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NetOutcome {
    ProfileMissing,
    NotOwned,
    Cooldown {
        #[serde(skip)]
        remaining: Duration,
    },
    Exhausted,
    /// Neither fish nor trash at the location.
    NoContent,
    Used(NetHaul),
}

impl Engine {
    /// Pulls `fish_count` items out of the water in one use of a net. Each
    /// item is trash with a 20% chance and picked uniformly from its pool.
    pub async fn use_net<D: Dice>(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        net_name: &str,
        dice: &mut D,
        now: DateTime<Utc>,
    ) -> Result<NetOutcome> {
        let net = self
            .catalog()
            .net(net_name)
            .ok_or_else(|| Error::unknown("net", net_name))?;

        let mut tx = conn.begin().await?;

        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(NetOutcome::ProfileMissing);
        };
        let Some(mut instance) = get_net(&mut tx, user_id, &net.name).await? else {
            return Ok(NetOutcome::NotOwned);
        };

        if let Some(remaining) = cooldown_remaining(&player, net, now) {
            debug!("{} has to wait before using a net", player.username);
            return Ok(NetOutcome::Cooldown { remaining });
        }
        if instance.uses.is_exhausted() {
            return Ok(NetOutcome::Exhausted);
        }

        let location = player.current_location.clone();
        let fish = selector::fish_pool(
            self.catalog(),
            &location,
            Some(self.season(now)),
            player.level,
        );
        let trash = selector::trash_pool(self.catalog(), &location);
        if fish.is_empty() && trash.is_empty() {
            return Ok(NetOutcome::NoContent);
        }

        let mut items = Vec::with_capacity(net.fish_count as usize);
        for _ in 0..net.fish_count {
            let wants_trash = roll::net_pulls_trash(dice.net_roll());
            let pool = if (wants_trash && !trash.is_empty()) || fish.is_empty() {
                &trash
            } else {
                &fish
            };
            let Some(species) = selector::choose_uniform(pool, dice) else {
                continue;
            };

            let (weight, length) = selector::measure(species, dice);
            let item_id = ledger::record(
                &mut tx,
                &NewCatch {
                    user_id,
                    chat_id,
                    species,
                    weight,
                    length,
                    location: &location,
                    caught_at: now,
                    sold: false,
                },
            )
            .await?;

            items.push(Catch {
                item_id,
                species: species.name.clone(),
                rarity: species.rarity,
                weight,
                length,
                price: pricing::sale_price(species, weight, length),
            });
        }

        if let NetUses::Remaining(uses) = instance.uses {
            instance.uses = NetUses::Remaining(uses.saturating_sub(1));
        }
        instance.last_use_time = Some(now);
        save_net(&mut tx, &instance).await?;

        player.last_net_use_time = Some(now);
        profile::save(&mut tx, &mut player).await?;

        tx.commit().await?;

        let total_value = items.iter().map(|item| item.price).sum();
        info!(
            "{} pulled {} items worth {total_value} with a {}",
            player.username,
            items.len(),
            net.name
        );

        Ok(NetOutcome::Used(NetHaul {
            net: net.name.clone(),
            items,
            uses: instance.uses,
            total_value,
        }))
    }
}
