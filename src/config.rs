use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine the config directory")]
    NoConfigDirectory,

    #[error("Could not read config file {path}")]
    Read {
        source: std::io::Error,
        path: String,
    },

    #[error("Could not parse config")]
    Parse(#[from] ron::error::SpannedError),
}

/// Durations are written the way humans read them, e.g. `"10m"` or `"3h"`.
mod human_duration {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub catalog_path: PathBuf,

    #[serde(with = "human_duration")]
    pub cast_cooldown: StdDuration,
    #[serde(with = "human_duration")]
    pub recovery_interval: StdDuration,
    /// Each recovery step restores `max_durability / recovery_divisor`.
    pub recovery_divisor: i64,
    #[serde(with = "human_duration")]
    pub weather_refresh: StdDuration,

    pub season_epoch: DateTime<Utc>,
    pub season_length_days: i64,

    pub starting_coins: i64,
    pub baseline_rod: String,
    pub default_bait: String,
    pub default_location: String,
    pub default_net: String,

    /// Stars charged for a guaranteed cast.
    pub guaranteed_cast_price: i64,
    /// Stars charged for repairing a fully broken rod.
    pub full_repair_price: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://fishinge-economy.db".to_string(),
            catalog_path: PathBuf::from("assets/catalog.ron"),
            cast_cooldown: StdDuration::from_secs(10 * 60),
            recovery_interval: StdDuration::from_secs(10 * 60),
            recovery_divisor: 30,
            weather_refresh: StdDuration::from_secs(3 * 60 * 60),
            season_epoch: Utc
                .with_ymd_and_hms(2026, 2, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            season_length_days: 7,
            starting_coins: 100,
            baseline_rod: "Bamboo Rod".to_string(),
            default_bait: "Worms".to_string(),
            default_location: "City Pond".to_string(),
            default_net: "Basic Net".to_string(),
            guaranteed_cast_price: 1,
            full_repair_price: 20,
        }
    }
}

fn chrono_duration(duration: StdDuration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::max_value())
}

impl Config {
    /// Reads `config.ron` from the platform config directory, falling back
    /// to the defaults, then applies `DATABASE_URL` and `FISHINGE_CATALOG`.
    pub fn load() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("com", "Chronophylos", "FishingeEconomy")
            .ok_or(ConfigError::NoConfigDirectory)?;
        let path = dirs.config_dir().join("config.ron");

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            source,
            path: path.display().to_string(),
        })?;

        Ok(ron::from_str(&text)?)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(path) = env::var("FISHINGE_CATALOG") {
            self.catalog_path = PathBuf::from(path);
        }
    }

    pub fn cast_cooldown(&self) -> Duration {
        chrono_duration(self.cast_cooldown)
    }

    pub fn recovery_interval(&self) -> Duration {
        chrono_duration(self.recovery_interval)
    }

    pub fn weather_refresh(&self) -> Duration {
        chrono_duration(self.weather_refresh)
    }

    pub fn season_length(&self) -> Duration {
        Duration::days(self.season_length_days.max(1))
    }
}
