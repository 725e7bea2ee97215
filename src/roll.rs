use std::fmt::Display;

use rand::{
    rngs::{StdRng, ThreadRng},
    Rng, RngCore,
};

use serde::Serialize;

use crate::catalog::Rarity;

pub const CAST_ROLL_MAX: u32 = 10_000;
pub const GUARANTEED_ROLL_MAX: u32 = 1_000;
/// Bait rolls above this snap the line.
pub const BAIT_HOLD_MAX: u32 = 90;
/// Net rolls up to this pull trash instead of fish.
pub const NET_TRASH_MAX: u32 = 20;

/// Source of every random draw the game makes.
///
/// The provided methods describe the shape of each draw so tests can rig
/// individual ones while falling back to a real generator for the rest.
pub trait Dice: RngCore {
    fn cast_roll(&mut self) -> u32 {
        self.gen_range(0..=CAST_ROLL_MAX)
    }

    fn guaranteed_roll(&mut self) -> u32 {
        self.gen_range(0..=GUARANTEED_ROLL_MAX)
    }

    fn bait_roll(&mut self) -> u32 {
        self.gen_range(1..=100)
    }

    fn net_roll(&mut self) -> u32 {
        self.gen_range(1..=100)
    }
}

impl Dice for StdRng {}
impl Dice for ThreadRng {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CastMode {
    Normal,
    /// Paid cast that skips every gate and uses the friendlier table.
    Guaranteed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Roll {
    Jackpot,
    NoBite,
    Catch {
        rarity: Rarity,
        /// The species pool ignores the season.
        any_season: bool,
    },
}

impl Roll {
    pub(crate) fn catch(rarity: Rarity) -> Self {
        Roll::Catch {
            rarity,
            any_season: false,
        }
    }

    pub(crate) fn legendary() -> Self {
        Roll::Catch {
            rarity: Rarity::Legendary,
            any_season: true,
        }
    }
}

impl Display for Roll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Roll::Jackpot => f.write_str("jackpot"),
            Roll::NoBite => f.write_str("no bite"),
            Roll::Catch { rarity, .. } => write!(f, "{rarity}"),
        }
    }
}

/// Shifts a cast roll by the weather modifier, 50 points per percent.
pub fn adjust(raw: u32, modifier: i32) -> u32 {
    (raw as i64 + modifier as i64 * 50).clamp(0, CAST_ROLL_MAX as i64) as u32
}

/// Resolves a normal cast. The jackpot is decided on the raw roll before the
/// weather is applied.
pub fn resolve_normal(raw: u32, modifier: i32) -> Roll {
    if raw == CAST_ROLL_MAX {
        return Roll::Jackpot;
    }

    match adjust(raw, modifier) {
        9701.. => Roll::legendary(),
        0..=3000 => Roll::NoBite,
        3001..=6000 => Roll::catch(Rarity::Trash),
        6001..=8500 => Roll::catch(Rarity::Common),
        8501..=9700 => Roll::catch(Rarity::Rare),
    }
}

/// Resolves a paid cast. Never yields a jackpot or no bite.
pub fn resolve_guaranteed(raw: u32) -> Roll {
    match raw {
        0..=400 => Roll::catch(Rarity::Trash),
        401..=700 => Roll::catch(Rarity::Common),
        701..=950 => Roll::catch(Rarity::Rare),
        _ => Roll::legendary(),
    }
}

pub fn bait_holds(roll: u32) -> bool {
    roll <= BAIT_HOLD_MAX
}

pub fn net_pulls_trash(roll: u32) -> bool {
    roll <= NET_TRASH_MAX
}
