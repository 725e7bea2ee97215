use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rand::Rng;
use sqlx::{Connection, SqliteConnection};

use crate::{
    catalog::{Rod, RodKind},
    models::{RodInstance, RodRow},
    pricing, Result,
};

impl RodInstance {
    /// Wears a durable rod down, never below zero, and starts its recovery.
    pub fn apply_damage(&mut self, damage: i64, now: DateTime<Utc>) {
        if damage <= 0 {
            return;
        }

        self.current = (self.current - damage).max(0);
        if self.current < self.max && self.recovery_started_at.is_none() {
            self.recovery_started_at = Some(now);
            self.recovered_at = Some(now);
        }
    }

    /// Uses up one catch of a temporary rod. Returns whether it is spent.
    pub fn consume_charge(&mut self) -> bool {
        self.current = (self.current - 1).max(0);
        self.current == 0
    }

    /// Applies every recovery step that fell due since the last one and
    /// returns whether the rod is back at full durability. Calling it twice
    /// with the same instant changes nothing.
    pub fn recover(&mut self, now: DateTime<Utc>, interval: Duration, divisor: i64) -> bool {
        let Some(started) = self.recovery_started_at else {
            return false;
        };
        let last = self.recovered_at.unwrap_or(started);

        let interval_secs = interval.num_seconds().max(1);
        let steps = (now - last).num_seconds().div_euclid(interval_secs);
        if steps <= 0 {
            return false;
        }

        let step = (self.max / divisor.max(1)).max(1);
        self.current = self.current.saturating_add(step.saturating_mul(steps)).min(self.max);
        self.recovered_at = Some(last + Duration::seconds(steps * interval_secs));

        if self.current >= self.max {
            self.recovery_started_at = None;
            self.recovered_at = None;
            return true;
        }
        false
    }

    pub fn repair(&mut self, now: DateTime<Utc>) {
        self.current = self.max;
        self.recovery_started_at = None;
        self.recovered_at = None;
        self.last_repair_time = Some(now);
    }

    pub fn missing(&self) -> i64 {
        self.max - self.current
    }

    /// Stars a repair of this rod costs, scaled from the full repair price.
    pub fn repair_cost(&self, full_price: i64) -> i64 {
        pricing::repair_cost(full_price, self.missing(), self.max)
    }
}

/// Durability a freshly bought rod starts with. Temporary rods roll their
/// number of catches once.
pub fn initial_durability<R: Rng + ?Sized>(rod: &Rod, rng: &mut R) -> i64 {
    match rod.kind {
        RodKind::Durable { durability } => durability,
        RodKind::Temporary {
            min_charges,
            max_charges,
        } => rng.gen_range(min_charges..=max_charges),
    }
}

pub async fn get_rod(
    conn: &mut SqliteConnection,
    user_id: i64,
    rod_name: &str,
) -> Result<Option<RodInstance>> {
    let row: Option<RodRow> =
        sqlx::query_as("SELECT * FROM rod_instances WHERE user_id = ? AND rod_name = ?")
            .bind(user_id)
            .bind(rod_name)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(RodInstance::try_from).transpose()?)
}

pub async fn user_rods(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<RodInstance>> {
    let rows: Vec<RodRow> =
        sqlx::query_as("SELECT * FROM rod_instances WHERE user_id = ? ORDER BY rod_name")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows
        .into_iter()
        .map(RodInstance::try_from)
        .collect::<Result<_, _>>()?)
}

/// Creates the instance with fresh durability. An existing instance is
/// reset, which is how buying a rod again refills it.
pub async fn create_rod<R: Rng + ?Sized>(
    conn: &mut SqliteConnection,
    user_id: i64,
    rod: &Rod,
    rng: &mut R,
) -> Result<RodInstance> {
    let durability = initial_durability(rod, rng);
    debug!("Giving {} to {user_id} with {durability} durability", rod.name);

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO rod_instances (user_id, rod_name, current_durability, max_durability)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user_id, rod_name) DO UPDATE SET
             current_durability = excluded.current_durability,
             max_durability = excluded.max_durability,
             recovery_started_at = NULL,
             recovered_at = NULL
         RETURNING id",
    )
    .bind(user_id)
    .bind(&rod.name)
    .bind(durability)
    .bind(durability)
    .fetch_one(&mut *conn)
    .await?;

    Ok(RodInstance::new(id, user_id, &rod.name, durability, durability, None)?)
}

/// Fetches the player's instance of `rod`, creating it on first use.
pub async fn ensure_rod<R: Rng + ?Sized>(
    conn: &mut SqliteConnection,
    user_id: i64,
    rod: &Rod,
    rng: &mut R,
) -> Result<RodInstance> {
    match get_rod(conn, user_id, &rod.name).await? {
        Some(instance) => Ok(instance),
        None => create_rod(conn, user_id, rod, rng).await,
    }
}

pub async fn save_rod(conn: &mut SqliteConnection, rod: &RodInstance) -> Result<()> {
    rod.check()?;

    sqlx::query(
        "UPDATE rod_instances SET current_durability = ?, recovery_started_at = ?,
             recovered_at = ?, last_repair_time = ?
         WHERE id = ?",
    )
    .bind(rod.current)
    .bind(rod.recovery_started_at)
    .bind(rod.recovered_at)
    .bind(rod.last_repair_time)
    .bind(rod.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_rod(conn: &mut SqliteConnection, rod: &RodInstance) -> Result<()> {
    sqlx::query("DELETE FROM rod_instances WHERE id = ?")
        .bind(rod.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Sets the rod back to full durability. Returns `None` when the player does
/// not own it.
pub async fn repair_rod(
    conn: &mut SqliteConnection,
    user_id: i64,
    rod_name: &str,
    now: DateTime<Utc>,
) -> Result<Option<RodInstance>> {
    let mut tx = conn.begin().await?;

    let Some(mut rod) = get_rod(&mut tx, user_id, rod_name).await? else {
        return Ok(None);
    };
    rod.repair(now);
    save_rod(&mut tx, &rod).await?;

    tx.commit().await?;

    info!("Repaired {rod_name} of {user_id}");
    Ok(Some(rod))
}

/// Applies due recovery steps to every recovering rod and returns the rods
/// that reached full durability.
pub async fn advance_recovery(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
    interval: Duration,
    divisor: i64,
) -> Result<Vec<RodInstance>> {
    let mut tx = conn.begin().await?;

    let rows: Vec<RodRow> =
        sqlx::query_as("SELECT * FROM rod_instances WHERE recovery_started_at IS NOT NULL")
            .fetch_all(&mut *tx)
            .await?;

    let mut recovered = Vec::new();
    for row in rows {
        let mut rod = RodInstance::try_from(row)?;
        let before = rod.recovered_at;

        let full = rod.recover(now, interval, divisor);
        if rod.recovered_at == before && !full {
            continue;
        }

        save_rod(&mut tx, &rod).await?;
        if full {
            recovered.push(rod);
        }
    }

    tx.commit().await?;

    if !recovered.is_empty() {
        debug!("{} rods recovered fully", recovered.len());
    }
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn rod(current: i64) -> RodInstance {
        RodInstance::new(1, 1, "Bamboo Rod", current, 100, None).unwrap()
    }

    #[test_case(100, 1, 99 ; "scratch")]
    #[test_case(10, 15, 0 ; "floored at zero")]
    #[test_case(0, 5, 0 ; "already broken")]
    fn damage(current: i64, damage: i64, expected: i64) {
        let mut rod = rod(current);
        rod.apply_damage(damage, Utc::now());

        assert_eq!(rod.durability(), expected);
        assert!(rod.recovery_started_at().is_some());
        assert!(rod.check().is_ok());
    }

    #[test]
    fn zero_damage_does_not_start_recovery() {
        let mut rod = rod(100);
        rod.apply_damage(0, Utc::now());

        assert_eq!(rod.durability(), 100);
        assert!(rod.recovery_started_at().is_none());
    }

    #[test]
    fn recovery_steps_per_interval() {
        let start = Utc::now();
        let mut rod = rod(100);
        rod.apply_damage(15, start);

        let interval = Duration::minutes(10);
        assert!(!rod.recover(start + Duration::minutes(9), interval, 30));
        assert_eq!(rod.durability(), 85);

        assert!(!rod.recover(start + Duration::minutes(25), interval, 30));
        assert_eq!(rod.durability(), 91);

        // same instant again is a no-op
        assert!(!rod.recover(start + Duration::minutes(25), interval, 30));
        assert_eq!(rod.durability(), 91);

        assert!(rod.recover(start + Duration::hours(2), interval, 30));
        assert_eq!(rod.durability(), 100);
        assert!(rod.recovery_started_at().is_none());
    }

    #[test]
    fn small_rods_recover_at_least_one_point() {
        let start = Utc::now();
        let mut rod = RodInstance::new(1, 1, "Twig", 20, 20, None).unwrap();
        rod.apply_damage(5, start);

        rod.recover(start + Duration::minutes(10), Duration::minutes(10), 30);
        assert_eq!(rod.durability(), 16);
    }

    #[test]
    fn repair_restores_everything() {
        let now = Utc::now();
        let mut rod = rod(100);
        rod.apply_damage(100, now);
        assert!(rod.is_broken());

        assert_eq!(rod.repair_cost(20), 20);
        rod.repair(now);

        assert_eq!(rod.durability(), 100);
        assert!(rod.recovery_started_at().is_none());
        assert_eq!(rod.last_repair_time(), Some(now));
    }

    #[test]
    fn temporary_rod_charges() {
        let mut rod = RodInstance::new(1, 1, "Carbon Rod", 2, 2, None).unwrap();

        assert!(!rod.consume_charge());
        assert!(rod.consume_charge());
        assert_eq!(rod.durability(), 0);
    }
}
