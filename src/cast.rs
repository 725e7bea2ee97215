use std::{fmt::Display, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::Serialize;
use sqlx::{Connection, SqliteConnection};

use crate::{
    catalog::{Catalog, Rarity, Rod, Species},
    config::Config,
    equipment,
    ledger::{self, NewCatch},
    models::{Player, RodInstance, RodState},
    pricing, profile,
    progression::{self, LevelProgress},
    roll::{self, Dice, Roll},
    season::Season,
    selector, shop,
    weather::{self, Weather},
    Error, Result,
};

pub use crate::roll::CastMode;

/// Why a normal cast was refused before anything was rolled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Rejection {
    Cooldown {
        #[serde(skip)]
        remaining: Duration,
    },
    RodBroken {
        rod: String,
    },
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Cooldown { remaining } => {
                let remaining =
                    humantime::format_duration(StdDuration::from_secs(remaining.num_seconds().max(0) as u64));
                write!(f, "you just fished! Try again in {remaining}.")
            }
            Rejection::RodBroken { rod } => write!(f, "your {rod} is broken"),
        }
    }
}

/// A fish got away. Snaps never touch the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Snap {
    /// The bait roll failed.
    WrongBait { bait: String },
    /// Nothing of the rolled rarity takes the equipped bait.
    BaitMismatch { bait: String },
    Oversized {
        species: String,
        weight: f64,
        max_weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catch {
    pub item_id: i64,
    pub species: String,
    pub rarity: Rarity,
    pub weight: f64,
    pub length: f64,
    pub price: i64,
}

impl Display for Catch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.2}kg, {:.1}cm) worth ${}",
            self.species, self.weight, self.length, self.price
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CastOutcome {
    ProfileMissing,
    Rejected(Rejection),
    Jackpot,
    NoBite,
    /// No species is eligible at the location right now.
    NoContent,
    Snap(Snap),
    Trash(Catch),
    Fish(Catch),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RodStatus {
    pub name: String,
    pub durability: i64,
    pub max_durability: i64,
    pub broken: bool,
    pub recovering: bool,
    pub temporary: bool,
    /// A temporary rod ran out during this cast and was swapped for the
    /// baseline rod.
    pub temporary_broke: bool,
}

impl RodStatus {
    fn new(rod: &Rod, instance: &RodInstance, temporary_broke: bool) -> Self {
        Self {
            name: rod.name.clone(),
            durability: instance.durability(),
            max_durability: instance.max_durability(),
            broken: instance.state() == RodState::Broken && !temporary_broke,
            recovering: instance.recovery_started_at().is_some(),
            temporary: rod.is_temporary(),
            temporary_broke,
        }
    }
}

/// Everything the caller needs to present a cast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastState {
    pub location: String,
    pub season: Season,
    pub weather: Option<Weather>,
    pub balance: i64,
    pub xp_gained: i64,
    pub progress: LevelProgress,
    pub rod: RodStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastReport {
    pub mode: CastMode,
    pub outcome: CastOutcome,
    /// `None` only when the profile is missing.
    pub state: Option<CastState>,
}

impl CastReport {
    /// Whether a paid cast produced nothing and should be refunded.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            CastOutcome::ProfileMissing
                | CastOutcome::Rejected(_)
                | CastOutcome::NoContent
                | CastOutcome::Snap(_)
        )
    }

    pub fn caught(&self) -> Option<&Catch> {
        match &self.outcome {
            CastOutcome::Trash(catch) | CastOutcome::Fish(catch) => Some(catch),
            _ => None,
        }
    }
}

/// Resolves casts and net uses against a catalog.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
    config: Config,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, config: Config) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn season(&self, now: DateTime<Utc>) -> Season {
        Season::at(now, self.config.season_epoch, self.config.season_length())
    }

    pub(crate) fn baseline_rod(&self) -> Result<&Rod> {
        self.catalog
            .rod(&self.config.baseline_rod)
            .ok_or_else(|| Error::unknown("rod", &self.config.baseline_rod))
    }

    /// Creates the profile of a user on first contact.
    pub async fn register(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Player> {
        profile::create(
            conn,
            &self.catalog,
            &self.config,
            user_id,
            chat_id,
            username,
            now,
        )
        .await
    }

    /// Normal casts must wait out the cooldown and need a rod that is not
    /// broken.
    pub fn can_fish(
        &self,
        player: &Player,
        rod: &RodInstance,
        now: DateTime<Utc>,
    ) -> Option<Rejection> {
        if rod.is_broken() {
            return Some(Rejection::RodBroken {
                rod: rod.rod_name().to_string(),
            });
        }

        let ready_at = player.last_fish_time? + self.config.cast_cooldown();
        (ready_at > now).then(|| Rejection::Cooldown {
            remaining: ready_at - now,
        })
    }

    /// Resolves one cast in a single transaction. Every expected outcome,
    /// including refusals, is reported in the returned value.
    pub async fn cast<D: Dice>(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        chat_id: Option<i64>,
        mode: CastMode,
        dice: &mut D,
        now: DateTime<Utc>,
    ) -> Result<CastReport> {
        let mut tx = conn.begin().await?;

        let Some(mut player) = profile::load(&mut tx, user_id, chat_id).await? else {
            return Ok(CastReport {
                mode,
                outcome: CastOutcome::ProfileMissing,
                state: None,
            });
        };

        let rod = self
            .catalog
            .rod(&player.current_rod)
            .ok_or_else(|| Error::unknown("rod", &player.current_rod))?;
        let mut instance = equipment::ensure_rod(&mut tx, user_id, rod, dice).await?;

        let location = player.current_location.clone();
        let season = self.season(now);
        let xp_before = player.xp;

        let rejection = match mode {
            CastMode::Normal => self.can_fish(&player, &instance, now),
            CastMode::Guaranteed => None,
        };

        let mut cast = Cast {
            engine: self,
            mode,
            player: &mut player,
            rod,
            instance: &mut instance,
            location: &location,
            season,
            chat_id,
            now,
            temporary_broke: false,
        };

        let (outcome, weather) = match (mode, rejection) {
            (_, Some(rejection)) => {
                debug!("{} may not fish: {rejection}", cast.player.username);
                (CastOutcome::Rejected(rejection), None)
            }
            (CastMode::Normal, None) => {
                let weather = weather::current(
                    &mut tx,
                    &location,
                    now,
                    self.config.weather_refresh(),
                    dice,
                )
                .await?;

                let raw = dice.cast_roll();
                let roll = roll::resolve_normal(raw, weather.modifier());
                info!(
                    "{} rolled {raw} (adjusted {}) at {location} in {weather}: {roll}",
                    cast.player.username,
                    roll::adjust(raw, weather.modifier())
                );

                (cast.resolve(&mut tx, roll, dice).await?, Some(weather))
            }
            (CastMode::Guaranteed, None) => {
                let raw = dice.guaranteed_roll();
                let roll = roll::resolve_guaranteed(raw);
                info!(
                    "{} rolled {raw} on a guaranteed cast at {location}: {roll}",
                    cast.player.username
                );

                (cast.resolve(&mut tx, roll, dice).await?, None)
            }
        };

        let temporary_broke = cast.temporary_broke;
        let rod_status = RodStatus::new(rod, &instance, temporary_broke);

        if !matches!(outcome, CastOutcome::Rejected(_)) {
            profile::save(&mut tx, &mut player).await?;
        }
        tx.commit().await?;

        match &outcome {
            CastOutcome::Trash(catch) | CastOutcome::Fish(catch) => {
                info!("{} caught {catch}", player.username)
            }
            outcome => debug!("{} cast result: {outcome:?}", player.username),
        }

        let xp_gained = player.xp - xp_before;
        Ok(CastReport {
            mode,
            outcome,
            state: Some(CastState {
                location,
                season,
                weather,
                balance: player.coins,
                xp_gained,
                progress: LevelProgress::after_gain(xp_before, xp_gained),
                rod: rod_status,
            }),
        })
    }
}

/// State of one cast in progress.
struct Cast<'a> {
    engine: &'a Engine,
    mode: CastMode,
    player: &'a mut Player,
    rod: &'a Rod,
    instance: &'a mut RodInstance,
    location: &'a str,
    season: Season,
    chat_id: Option<i64>,
    now: DateTime<Utc>,
    temporary_broke: bool,
}

impl Cast<'_> {
    async fn resolve<D: Dice>(
        &mut self,
        conn: &mut SqliteConnection,
        roll: Roll,
        dice: &mut D,
    ) -> Result<CastOutcome> {
        // every resolved cast counts against the cooldown
        self.player.last_fish_time = Some(self.now);

        match roll {
            Roll::Jackpot => Ok(CastOutcome::Jackpot),
            Roll::NoBite => Ok(CastOutcome::NoBite),
            Roll::Catch {
                rarity: Rarity::Trash,
                ..
            } => self.trash(conn, dice).await,
            Roll::Catch { rarity, any_season } => self.fish(conn, rarity, any_season, dice).await,
        }
    }

    async fn trash<D: Dice>(
        &mut self,
        conn: &mut SqliteConnection,
        dice: &mut D,
    ) -> Result<CastOutcome> {
        let engine = self.engine;
        let pool = selector::cast_trash_pool(&engine.catalog, self.location);
        let Some(trash) = selector::choose(&pool, dice) else {
            return Ok(CastOutcome::NoContent);
        };
        let (weight, length) = selector::measure(trash, dice);
        let price = pricing::sale_price(trash, weight, length);

        let item_id = ledger::record(conn, &self.new_catch(trash, weight, length, true)).await?;

        self.player.coins += price;
        self.player.xp += progression::item_xp(trash, weight);
        self.player.level = progression::level_for(self.player.xp);

        self.wear(conn, Rarity::Trash).await?;

        Ok(CastOutcome::Trash(Catch {
            item_id,
            species: trash.name.clone(),
            rarity: Rarity::Trash,
            weight,
            length,
            price,
        }))
    }

    async fn fish<D: Dice>(
        &mut self,
        conn: &mut SqliteConnection,
        rarity: Rarity,
        any_season: bool,
        dice: &mut D,
    ) -> Result<CastOutcome> {
        let engine = self.engine;
        let season = (!any_season).then_some(self.season);
        let pool = selector::fish_pool(
            &engine.catalog,
            self.location,
            season,
            self.player.level,
        );
        if pool.is_empty() {
            return Ok(CastOutcome::NoContent);
        }

        let checks_bait = self.mode == CastMode::Normal && !any_season;
        let candidates = if checks_bait {
            let bait = self.player.current_bait.clone();
            if !roll::bait_holds(dice.bait_roll()) {
                return Ok(CastOutcome::Snap(Snap::WrongBait { bait }));
            }

            let candidates: Vec<&Species> = selector::of_rarity(&pool, rarity)
                .into_iter()
                .filter(|species| species.baits.accepts(&bait))
                .collect();
            if candidates.is_empty() {
                return Ok(CastOutcome::Snap(Snap::BaitMismatch { bait }));
            }
            candidates
        } else {
            let candidates = selector::of_rarity(&pool, rarity);
            if candidates.is_empty() {
                pool
            } else {
                candidates
            }
        };

        let Some(species) = selector::choose(&candidates, dice) else {
            return Ok(CastOutcome::NoContent);
        };
        let (weight, length) = selector::measure(species, dice);

        if self.mode == CastMode::Normal && weight > self.rod.max_weight {
            return Ok(CastOutcome::Snap(Snap::Oversized {
                species: species.name.clone(),
                weight,
                max_weight: self.rod.max_weight,
            }));
        }

        let item_id = ledger::record(conn, &self.new_catch(species, weight, length, false)).await?;

        if self.mode == CastMode::Normal {
            let bait = &self.player.current_bait;
            if shop::consume_bait(conn, &engine.catalog, self.player.user_id, bait).await? {
                debug!("{} ran out of {bait}", self.player.username);
                self.player.current_bait = engine.config.default_bait.clone();
            }
        }

        self.wear(conn, species.rarity).await?;

        Ok(CastOutcome::Fish(Catch {
            item_id,
            species: species.name.clone(),
            rarity: species.rarity,
            weight,
            length,
            price: pricing::sale_price(species, weight, length),
        }))
    }

    fn new_catch<'s>(
        &'s self,
        species: &'s Species,
        weight: f64,
        length: f64,
        sold: bool,
    ) -> NewCatch<'s> {
        NewCatch {
            user_id: self.player.user_id,
            chat_id: self.chat_id,
            species,
            weight,
            length,
            location: self.location,
            caught_at: self.now,
            sold,
        }
    }

    /// Damages a durable rod or spends a charge of a temporary one. A spent
    /// temporary rod is removed and the baseline rod equipped instead.
    async fn wear(&mut self, conn: &mut SqliteConnection, rarity: Rarity) -> Result<()> {
        if self.rod.is_temporary() {
            if self.instance.consume_charge() {
                info!(
                    "{} used up their {}",
                    self.player.username, self.rod.name
                );
                equipment::delete_rod(conn, self.instance).await?;
                self.player.current_rod = self.engine.baseline_rod()?.name.clone();
                self.temporary_broke = true;
                return Ok(());
            }
        } else {
            self.instance
                .apply_damage(pricing::damage(rarity, self.mode), self.now);
        }

        equipment::save_rod(conn, self.instance).await
    }
}
