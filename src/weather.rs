use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::{roll::Dice, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Weather {
    Clear,
    Cloudy,
    Rain,
    Thunderstorm,
    Fog,
    Wind,
    Snow,
}

static CONDITIONS: phf::Map<&'static str, Weather> = phf::phf_map! {
    "clear" => Weather::Clear,
    "cloudy" => Weather::Cloudy,
    "rain" => Weather::Rain,
    "thunderstorm" => Weather::Thunderstorm,
    "fog" => Weather::Fog,
    "wind" => Weather::Wind,
    "snow" => Weather::Snow,
};

#[derive(Debug, thiserror::Error)]
#[error("Unknown weather condition `{0}`")]
pub struct UnknownCondition(String);

impl Weather {
    pub const ALL: [Weather; 7] = [
        Weather::Clear,
        Weather::Cloudy,
        Weather::Rain,
        Weather::Thunderstorm,
        Weather::Fog,
        Weather::Wind,
        Weather::Snow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Cloudy => "cloudy",
            Weather::Rain => "rain",
            Weather::Thunderstorm => "thunderstorm",
            Weather::Fog => "fog",
            Weather::Wind => "wind",
            Weather::Snow => "snow",
        }
    }

    /// Signed percentage shifted onto the cast roll.
    pub fn modifier(self) -> i32 {
        match self {
            Weather::Clear => 0,
            Weather::Cloudy => 5,
            Weather::Rain => 10,
            Weather::Thunderstorm => -15,
            Weather::Fog => -5,
            Weather::Wind => -10,
            Weather::Snow => -10,
        }
    }

    pub fn generate(dice: &mut impl Dice) -> Self {
        *Self::ALL.choose(dice).unwrap_or(&Weather::Clear)
    }
}

impl FromStr for Weather {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CONDITIONS
            .get(s.trim().to_lowercase().as_str())
            .copied()
            .ok_or_else(|| UnknownCondition(s.to_string()))
    }
}

impl Display for Weather {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:+}%)", self.as_str(), self.modifier())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WeatherRow {
    condition: String,
    updated_at: DateTime<Utc>,
}

/// Returns the weather at `location`, rolling a new condition when the stored
/// one is missing, unreadable or older than `refresh`.
pub async fn current(
    conn: &mut SqliteConnection,
    location: &str,
    now: DateTime<Utc>,
    refresh: Duration,
    dice: &mut impl Dice,
) -> Result<Weather> {
    let row: Option<WeatherRow> =
        sqlx::query_as("SELECT condition, updated_at FROM weather WHERE location = ?")
            .bind(location)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(row) = row {
        if row.updated_at + refresh > now {
            match row.condition.parse() {
                Ok(weather) => return Ok(weather),
                Err(err) => warn!("Replacing weather at {location}: {err}"),
            }
        }
    }

    let weather = Weather::generate(dice);
    debug!("Weather at {location} is now {weather}");

    sqlx::query(
        "INSERT INTO weather (location, condition, updated_at) VALUES (?, ?, ?)
         ON CONFLICT (location) DO UPDATE SET condition = excluded.condition, updated_at = excluded.updated_at",
    )
    .bind(location)
    .bind(weather.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(weather)
}
