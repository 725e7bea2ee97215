use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("Durability {current} of rod {rod} is outside 0..={max}")]
    Durability {
        rod: String,
        current: i64,
        max: i64,
    },

    #[error("Rod {0} is recovering although it is at full durability")]
    RecoveringAtFull(String),

    #[error("Net {net} has {uses} uses left")]
    NetUses { net: String, uses: i64 },

    #[error("Catch {0} has a negative size")]
    NegativeSize(i64),
}

/// The economic state of one user. Only the global row (no chat) is
/// authoritative; chat rows are read for accounts that predate it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Player {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: Option<i64>,
    pub username: String,
    pub coins: i64,
    pub xp: i64,
    pub level: i64,
    pub current_rod: String,
    pub current_bait: String,
    pub current_location: String,
    pub last_fish_time: Option<DateTime<Utc>>,
    pub last_net_use_time: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Player {
    pub fn is_global(&self) -> bool {
        self.chat_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RodState {
    Intact,
    Recovering,
    Broken,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RodRow {
    id: i64,
    user_id: i64,
    rod_name: String,
    current_durability: i64,
    max_durability: i64,
    recovery_started_at: Option<DateTime<Utc>>,
    recovered_at: Option<DateTime<Utc>>,
    last_repair_time: Option<DateTime<Utc>>,
}

/// A rod owned by a player. For temporary rods the durability counts the
/// catches left.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RodInstance {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) rod_name: String,
    pub(crate) current: i64,
    pub(crate) max: i64,
    pub(crate) recovery_started_at: Option<DateTime<Utc>>,
    /// Last time a recovery step was applied.
    pub(crate) recovered_at: Option<DateTime<Utc>>,
    pub(crate) last_repair_time: Option<DateTime<Utc>>,
}

impl RodInstance {
    pub fn new(
        id: i64,
        user_id: i64,
        rod_name: impl Into<String>,
        current: i64,
        max: i64,
        recovery_started_at: Option<DateTime<Utc>>,
    ) -> Result<Self, InvariantError> {
        let rod = Self {
            id,
            user_id,
            rod_name: rod_name.into(),
            current,
            max,
            recovery_started_at,
            recovered_at: recovery_started_at,
            last_repair_time: None,
        };
        rod.check()?;
        Ok(rod)
    }

    pub(crate) fn check(&self) -> Result<(), InvariantError> {
        if self.current < 0 || self.current > self.max {
            return Err(InvariantError::Durability {
                rod: self.rod_name.clone(),
                current: self.current,
                max: self.max,
            });
        }
        if self.recovery_started_at.is_some() && self.current >= self.max {
            return Err(InvariantError::RecoveringAtFull(self.rod_name.clone()));
        }
        Ok(())
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn rod_name(&self) -> &str {
        &self.rod_name
    }

    pub fn durability(&self) -> i64 {
        self.current
    }

    pub fn max_durability(&self) -> i64 {
        self.max
    }

    pub fn recovery_started_at(&self) -> Option<DateTime<Utc>> {
        self.recovery_started_at
    }

    pub fn last_repair_time(&self) -> Option<DateTime<Utc>> {
        self.last_repair_time
    }

    pub fn state(&self) -> RodState {
        if self.current == 0 {
            RodState::Broken
        } else if self.recovery_started_at.is_some() {
            RodState::Recovering
        } else {
            RodState::Intact
        }
    }

    pub fn is_broken(&self) -> bool {
        self.state() == RodState::Broken
    }
}

impl TryFrom<RodRow> for RodInstance {
    type Error = InvariantError;

    fn try_from(row: RodRow) -> Result<Self, Self::Error> {
        let rod = Self {
            id: row.id,
            user_id: row.user_id,
            rod_name: row.rod_name,
            current: row.current_durability,
            max: row.max_durability,
            recovery_started_at: row.recovery_started_at,
            recovered_at: row.recovered_at,
            last_repair_time: row.last_repair_time,
        };
        rod.check()?;
        Ok(rod)
    }
}

/// Catch record. Prices are derived on read, never stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CaughtItem {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: Option<i64>,
    pub species_name: String,
    pub weight: f64,
    pub length: f64,
    pub location: String,
    pub sold: bool,
    pub caught_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
}

impl CaughtItem {
    pub fn check(&self) -> Result<(), InvariantError> {
        if self.weight < 0.0 || self.length < 0.0 {
            return Err(InvariantError::NegativeSize(self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetUses {
    Unlimited,
    Remaining(u32),
}

impl NetUses {
    const UNLIMITED: i64 = -1;

    pub fn from_column(net: &str, uses: i64) -> Result<Self, InvariantError> {
        match uses {
            Self::UNLIMITED => Ok(NetUses::Unlimited),
            uses if uses >= 0 => Ok(NetUses::Remaining(uses.min(u32::MAX as i64) as u32)),
            uses => Err(InvariantError::NetUses {
                net: net.to_string(),
                uses,
            }),
        }
    }

    pub fn to_column(self) -> i64 {
        match self {
            NetUses::Unlimited => Self::UNLIMITED,
            NetUses::Remaining(uses) => uses as i64,
        }
    }

    pub fn is_exhausted(self) -> bool {
        self == NetUses::Remaining(0)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NetRow {
    id: i64,
    user_id: i64,
    net_name: String,
    uses_left: i64,
    last_use_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetInstance {
    pub id: i64,
    pub user_id: i64,
    pub net_name: String,
    pub uses: NetUses,
    pub last_use_time: Option<DateTime<Utc>>,
}

impl TryFrom<NetRow> for NetInstance {
    type Error = InvariantError;

    fn try_from(row: NetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uses: NetUses::from_column(&row.net_name, row.uses_left)?,
            id: row.id,
            user_id: row.user_id,
            net_name: row.net_name,
            last_use_time: row.last_use_time,
        })
    }
}
