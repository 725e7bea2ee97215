use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    catalog::{Catalog, Rarity, Species},
    models::CaughtItem,
    pricing, profile,
    progression::{self, LevelProgress},
    Error, Result,
};

/// A catch about to be written to the ledger.
#[derive(Debug, Clone)]
pub struct NewCatch<'a> {
    pub user_id: i64,
    pub chat_id: Option<i64>,
    pub species: &'a Species,
    pub weight: f64,
    pub length: f64,
    pub location: &'a str,
    pub caught_at: DateTime<Utc>,
    /// Trash from a cast is paid out right away and lands already sold.
    pub sold: bool,
}

pub async fn record(conn: &mut SqliteConnection, catch: &NewCatch<'_>) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO caught_items (user_id, chat_id, species_name, weight, length, location, sold, caught_at, sold_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(catch.user_id)
    .bind(catch.chat_id)
    .bind(&catch.species.name)
    .bind(catch.weight)
    .bind(catch.length)
    .bind(catch.location)
    .bind(catch.sold)
    .bind(catch.caught_at)
    .bind(catch.sold.then_some(catch.caught_at))
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn items(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<CaughtItem>> {
    let items: Vec<CaughtItem> =
        sqlx::query_as("SELECT * FROM caught_items WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    for item in &items {
        item.check()?;
    }
    Ok(items)
}

pub async fn unsold(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<CaughtItem>> {
    Ok(items(conn, user_id)
        .await?
        .into_iter()
        .filter(|item| !item.sold)
        .collect())
}

/// Price of a stored item, or `None` when its species left the catalog.
pub fn item_price(catalog: &Catalog, item: &CaughtItem) -> Option<i64> {
    catalog
        .species(&item.species_name)
        .map(|species| pricing::sale_price(species, item.weight, item.length))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Items(Vec<i64>),
    Species(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SoldItem {
    pub id: i64,
    pub species: String,
    pub weight: f64,
    pub price: i64,
    pub xp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub items: Vec<SoldItem>,
    pub earned: i64,
    pub xp_gained: i64,
    pub balance: i64,
    pub progress: LevelProgress,
}

#[derive(Debug, Clone, Serialize)]
pub enum SaleOutcome {
    ProfileMissing,
    Sold(SaleReceipt),
}

/// Sells the selected unsold items in one transaction, paying out their
/// price and awarding their XP. Items already sold are skipped, so selling
/// the same item twice credits nothing the second time.
pub async fn sell(
    conn: &mut SqliteConnection,
    catalog: &Catalog,
    user_id: i64,
    chat_id: Option<i64>,
    selection: &Selection,
    now: DateTime<Utc>,
) -> Result<SaleOutcome> {
    let mut tx = conn.begin().await?;

    let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
        return Ok(SaleOutcome::ProfileMissing);
    };

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM caught_items WHERE sold = 0 AND user_id = ");
    query.push_bind(user_id);
    match selection {
        Selection::All => {}
        Selection::Items(ids) if ids.is_empty() => {
            query.push(" AND 0");
        }
        Selection::Items(ids) => {
            query.push(" AND id IN (");
            let mut separated = query.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }
        Selection::Species(name) => {
            query.push(" AND species_name = ");
            query.push_bind(name.trim());
        }
    }
    let candidates: Vec<CaughtItem> = query.build_query_as().fetch_all(&mut *tx).await?;

    let mut sold = Vec::with_capacity(candidates.len());
    for item in candidates {
        let Some(species) = catalog.species(&item.species_name) else {
            warn!("Not selling item {}: unknown species {}", item.id, item.species_name);
            continue;
        };
        sold.push(SoldItem {
            id: item.id,
            species: species.name.clone(),
            weight: item.weight,
            price: pricing::sale_price(species, item.weight, item.length),
            xp: progression::item_xp(species, item.weight),
        });
    }

    if !sold.is_empty() {
        let mut update: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE caught_items SET sold = 1, sold_at = ");
        update.push_bind(now);
        update.push(" WHERE sold = 0 AND id IN (");
        {
            let mut separated = update.separated(", ");
            for item in &sold {
                separated.push_bind(item.id);
            }
            separated.push_unseparated(")");
        }

        let result = update.build().execute(&mut *tx).await?;
        if result.rows_affected() != sold.len() as u64 {
            return Err(Error::Conflict { user_id });
        }
    }

    let earned: i64 = sold.iter().map(|item| item.price).sum();
    let xp_gained: i64 = sold.iter().map(|item| item.xp).sum();
    let progress = LevelProgress::after_gain(player.xp, xp_gained);

    if !sold.is_empty() {
        player.coins += earned;
        player.xp += xp_gained;
        player.level = progress.level;
        profile::save(&mut tx, &mut player).await?;
    }

    tx.commit().await?;

    info!(
        "{} sold {} items for {earned} coins and {xp_gained} xp",
        player.username,
        sold.len()
    );

    Ok(SaleOutcome::Sold(SaleReceipt {
        items: sold,
        earned,
        xp_gained,
        balance: player.coins,
        progress,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Biggest {
    pub species: String,
    pub weight: f64,
    pub length: f64,
}

/// Aggregates over a player's ledger. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub fish_caught: u64,
    pub fish_weight: f64,
    pub unique_species: usize,
    pub biggest: Option<Biggest>,
    pub trash_caught: u64,
    pub trash_weight: f64,
    pub sold_count: u64,
    pub sold_weight: f64,
    pub unsold_count: u64,
    pub unsold_weight: f64,
    pub unsold_value: i64,
}

pub fn summarize(catalog: &Catalog, items: &[CaughtItem]) -> Stats {
    let mut stats = Stats::default();
    let mut species = HashSet::new();

    for item in items {
        let rarity = catalog
            .species(&item.species_name)
            .map(|species| species.rarity);

        if rarity == Some(Rarity::Trash) {
            stats.trash_caught += 1;
            stats.trash_weight += item.weight;
        } else {
            stats.fish_caught += 1;
            stats.fish_weight += item.weight;
            species.insert(item.species_name.as_str());

            if stats
                .biggest
                .as_ref()
                .map_or(true, |biggest| item.weight > biggest.weight)
            {
                stats.biggest = Some(Biggest {
                    species: item.species_name.clone(),
                    weight: item.weight,
                    length: item.length,
                });
            }
        }

        if item.sold {
            stats.sold_count += 1;
            stats.sold_weight += item.weight;
        } else {
            stats.unsold_count += 1;
            stats.unsold_weight += item.weight;
            stats.unsold_value += item_price(catalog, item).unwrap_or(0);
        }
    }

    stats.unique_species = species.len();
    stats
}

pub async fn stats(conn: &mut SqliteConnection, catalog: &Catalog, user_id: i64) -> Result<Stats> {
    let items = items(conn, user_id).await?;
    Ok(summarize(catalog, &items))
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LevelEntry {
    pub user_id: i64,
    pub username: String,
    pub level: i64,
    pub xp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesEntry {
    pub user_id: i64,
    pub username: String,
    pub value: i64,
    pub items: u64,
}

pub async fn top_by_level(conn: &mut SqliteConnection, limit: u32) -> Result<Vec<LevelEntry>> {
    Ok(sqlx::query_as(
        "SELECT user_id, username, level, xp FROM players
         WHERE chat_id IS NULL
         ORDER BY level DESC, xp DESC, user_id
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?)
}

/// Players ranked by the value of what they sold, optionally only counting
/// sales since `since`.
pub async fn top_by_sales(
    conn: &mut SqliteConnection,
    catalog: &Catalog,
    since: Option<DateTime<Utc>>,
    limit: u32,
) -> Result<Vec<SalesEntry>> {
    let sold: Vec<CaughtItem> = sqlx::query_as("SELECT * FROM caught_items WHERE sold = 1")
        .fetch_all(&mut *conn)
        .await?;

    let mut totals: HashMap<i64, (i64, u64)> = HashMap::new();
    for item in sold {
        let sold_at = item.sold_at.unwrap_or(item.caught_at);
        if since.map_or(false, |since| sold_at < since) {
            continue;
        }
        let total = totals.entry(item.user_id).or_default();
        total.0 += item_price(catalog, &item).unwrap_or(0);
        total.1 += 1;
    }

    let names: HashMap<i64, String> = sqlx::query_as::<_, (i64, String)>(
        "SELECT user_id, username FROM players ORDER BY chat_id IS NULL",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .collect();

    let mut entries: Vec<SalesEntry> = totals
        .into_iter()
        .map(|(user_id, (value, items))| SalesEntry {
            user_id,
            username: names.get(&user_id).cloned().unwrap_or_default(),
            value,
            items,
        })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then(a.user_id.cmp(&b.user_id)));
    entries.truncate(limit as usize);

    Ok(entries)
}
