#![allow(dead_code)]

use std::{collections::VecDeque, str::FromStr, sync::Arc};

use chrono::{DateTime, TimeZone, Utc};
use fishinge_economy::{
    migrate,
    models::Player,
    roll::{CAST_ROLL_MAX, GUARANTEED_ROLL_MAX},
    Catalog, Config, Dice, Engine,
};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqliteConnection};

pub const USER: i64 = 4242;
pub const CHAT: i64 = -100;

const CATALOG: &str = r#"(
    locations: ["Pond", "Empty Bay"],
    fish: [
        (
            name: "Carp",
            rarity: Common,
            min_weight: 1.0,
            max_weight: 3.0,
            min_length: 30.0,
            max_length: 60.0,
            price: 100,
            locations: ["Pond"],
            baits: Only(["Worms", "Corn"]),
        ),
        (
            name: "Pike",
            rarity: Rare,
            min_weight: 2.0,
            max_weight: 5.0,
            price: 200,
            locations: ["Pond"],
            baits: Only(["Live Bait"]),
        ),
        (
            name: "Whale Carp",
            rarity: Legendary,
            min_weight: 30.0,
            max_weight: 40.0,
            price: 1000,
            locations: ["Pond"],
            seasons: [Summer],
            baits: Only(["Live Bait"]),
        ),
    ],
    trash: [
        (name: "Boot", rarity: Trash, min_weight: 0.5, max_weight: 0.5, price: 3, locations: ["Pond"]),
    ],
    rods: [
        (name: "Bamboo Rod", price: 0, max_weight: 20.0, kind: Durable(durability: 100)),
        (name: "Golden Rod", price: 500, max_weight: 350.0, kind: Temporary(min_charges: 1, max_charges: 1)),
    ],
    nets: [
        (name: "Basic Net", price: 0, fish_count: 5, cooldown_hours: 24),
        (name: "Strong Net", price: 300, fish_count: 5, cooldown_hours: 24, max_uses: Some(1)),
    ],
    baits: [
        (name: "Worms", price: 0, infinite: true),
        (name: "Corn", price: 5),
        (name: "Live Bait", price: 10),
    ],
)"#;

pub fn catalog() -> Catalog {
    Catalog::from_ron(CATALOG).unwrap()
}

pub fn config() -> Config {
    Config {
        starting_coins: 1000,
        default_location: "Pond".to_string(),
        ..Config::default()
    }
}

pub fn engine() -> Engine {
    let catalog = catalog();
    let config = config();
    catalog.validate_against(&config).unwrap();
    Engine::new(Arc::new(catalog), config)
}

/// A winter day one day after the season epoch.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap()
}

pub async fn db() -> SqliteConnection {
    let mut conn = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .connect()
        .await
        .unwrap();
    migrate(&mut conn).await.unwrap();
    conn
}

/// A fresh database with the test user registered and clear skies at the pond.
pub async fn setup() -> (SqliteConnection, Engine, Player) {
    let mut conn = db().await;
    let engine = engine();
    let player = engine
        .register(&mut conn, USER, Some(CHAT), "fisher", now())
        .await
        .unwrap();
    set_weather(&mut conn, "Pond", "clear", now()).await;
    (conn, engine, player)
}

pub async fn set_weather(
    conn: &mut SqliteConnection,
    location: &str,
    condition: &str,
    at: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO weather (location, condition, updated_at) VALUES (?, ?, ?)
         ON CONFLICT (location) DO UPDATE SET condition = excluded.condition, updated_at = excluded.updated_at",
    )
    .bind(location)
    .bind(condition)
    .bind(at)
    .execute(conn)
    .await
    .unwrap();
}

pub async fn player(conn: &mut SqliteConnection) -> Player {
    fishinge_economy::profile::load(conn, USER, Some(CHAT))
        .await
        .unwrap()
        .unwrap()
}

/// Dice with scripted draws. Once a script runs dry the draws come from a
/// seeded generator.
pub struct Rigged {
    rng: StdRng,
    casts: VecDeque<u32>,
    guaranteed: VecDeque<u32>,
    baits: VecDeque<u32>,
    nets: VecDeque<u32>,
}

impl Rigged {
    pub fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(7),
            casts: VecDeque::new(),
            guaranteed: VecDeque::new(),
            baits: VecDeque::new(),
            nets: VecDeque::new(),
        }
    }

    pub fn cast(mut self, roll: u32) -> Self {
        self.casts.push_back(roll);
        self
    }

    pub fn guaranteed(mut self, roll: u32) -> Self {
        self.guaranteed.push_back(roll);
        self
    }

    pub fn bait(mut self, roll: u32) -> Self {
        self.baits.push_back(roll);
        self
    }

    pub fn nets(mut self, rolls: impl IntoIterator<Item = u32>) -> Self {
        self.nets.extend(rolls);
        self
    }
}

impl RngCore for Rigged {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl Dice for Rigged {
    fn cast_roll(&mut self) -> u32 {
        match self.casts.pop_front() {
            Some(roll) => roll,
            None => self.rng.gen_range(0..=CAST_ROLL_MAX),
        }
    }

    fn guaranteed_roll(&mut self) -> u32 {
        match self.guaranteed.pop_front() {
            Some(roll) => roll,
            None => self.rng.gen_range(0..=GUARANTEED_ROLL_MAX),
        }
    }

    fn bait_roll(&mut self) -> u32 {
        match self.baits.pop_front() {
            Some(roll) => roll,
            None => self.rng.gen_range(1..=100),
        }
    }

    fn net_roll(&mut self) -> u32 {
        match self.nets.pop_front() {
            Some(roll) => roll,
            None => self.rng.gen_range(1..=100),
        }
    }
}
