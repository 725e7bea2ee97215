#![forbid(unsafe_code)]

pub mod cast;
pub mod catalog;
pub mod config;
pub mod equipment;
pub mod ledger;
pub mod models;
pub mod nets;
pub mod payments;
pub mod pricing;
pub mod profile;
pub mod progression;
pub mod recovery;
pub mod roll;
pub mod season;
pub mod selector;
pub mod shop;
pub mod weather;

use std::str::FromStr;

use log::{debug, info};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    ConnectOptions, SqliteConnection,
};

pub use crate::{
    cast::{CastMode, CastOutcome, CastReport, Engine},
    catalog::Catalog,
    config::Config,
    roll::Dice,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not query database")]
    Database(#[from] sqlx::Error),

    #[error("Could not migrate database")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Player {user_id} was changed by another request")]
    Conflict { user_id: i64 },

    #[error("Unknown {kind} `{name}`")]
    Unknown { kind: &'static str, name: String },

    #[error("Stored record is invalid")]
    Invariant(#[from] models::InvariantError),
}

impl Error {
    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Unknown {
            kind,
            name: name.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[error("Could not open database connection")]
pub struct OpenDatabaseError(#[from] sqlx::Error);

pub async fn db_conn(url: &str) -> Result<SqliteConnection, OpenDatabaseError> {
    debug!("Opening database connection");
    let conn = SqliteConnectOptions::from_str(url)?
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true)
        .connect()
        .await?;

    Ok(conn)
}

pub async fn migrate(conn: &mut SqliteConnection) -> Result<()> {
    info!("Running Migrations");
    sqlx::migrate!().run(conn).await?;

    Ok(())
}
