use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{
    catalog::{Rarity, Species},
    pricing::size_ratio,
};

/// XP needed to go from each level to the next.
const LEVEL_REQUIREMENTS: [i64; 100] = [
    100, 250, 700, 1450, 2500, 3850, 5500, 7450, 9700, 12250, //
    15100, 18250, 21700, 25450, 29500, 33850, 38500, 43450, 48700, 54250, //
    60100, 66250, 72700, 79450, 86500, 93850, 101500, 109450, 117700, 126250, //
    135100, 144250, 153700, 163450, 173500, 183850, 194500, 205450, 216700, 228250, //
    240100, 252250, 264700, 277450, 290500, 303850, 317500, 331450, 345700, 360250, //
    375100, 390250, 405700, 421450, 437500, 453850, 470500, 487450, 504700, 522250, //
    540100, 558250, 576700, 595450, 614500, 633850, 653500, 673450, 693700, 714250, //
    735100, 756250, 777700, 799450, 821500, 843850, 866500, 889450, 912700, 936250, //
    960100, 984250, 1008700, 1033450, 1058500, 1083850, 1109500, 1135450, 1161700, 1188250, //
    1215100, 1242250, 1269700, 1297450, 1325500, 1353850, 1382500, 1411450, 1440700, 1470250,
];

pub const MAX_LEVEL: i64 = LEVEL_REQUIREMENTS.len() as i64;

/// Total XP at which each level starts, beginning with level 0 at 0 XP.
static LEVEL_THRESHOLDS: Lazy<Vec<i64>> = Lazy::new(|| {
    let mut thresholds = Vec::with_capacity(LEVEL_REQUIREMENTS.len() + 1);
    thresholds.push(0);
    for requirement in LEVEL_REQUIREMENTS {
        let last = thresholds[thresholds.len() - 1];
        thresholds.push(last + requirement);
    }
    thresholds
});

pub fn level_threshold(level: i64) -> i64 {
    LEVEL_THRESHOLDS[level.clamp(0, MAX_LEVEL) as usize]
}

pub fn level_for(xp: i64) -> i64 {
    let xp = xp.max(0);
    LEVEL_THRESHOLDS[1..]
        .iter()
        .take_while(|threshold| **threshold <= xp)
        .count() as i64
}

fn base_xp(rarity: Rarity) -> f64 {
    match rarity {
        Rarity::Trash => 1.0,
        Rarity::Common => 5.0,
        Rarity::Rare => 20.0,
        Rarity::Legendary => 100.0,
    }
}

fn xp_multiplier(rarity: Rarity) -> f64 {
    match rarity {
        Rarity::Rare => 1.1,
        Rarity::Legendary => 1.2,
        _ => 1.0,
    }
}

/// XP awarded for one item. Trash is always worth 1, fish scale with rarity
/// and with how heavy they are for their species.
pub fn item_xp(species: &Species, weight: f64) -> i64 {
    if species.is_trash() {
        return 1;
    }

    let mut weight_multiplier = 1.0;
    if weight > 0.0 {
        weight_multiplier += 0.6 * size_ratio(weight, species.min_weight, species.max_weight);
    }

    let xp = base_xp(species.rarity) * xp_multiplier(species.rarity) * weight_multiplier;
    (xp.round() as i64).max(1)
}

/// Where a player stands on the level table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: i64,
    pub xp_total: i64,
    pub level_start: i64,
    /// `None` at the max level.
    pub next_level: Option<i64>,
    pub xp_into_level: i64,
    pub xp_needed: i64,
    pub progress: f64,
    pub leveled_up: bool,
}

impl LevelProgress {
    pub fn at(xp: i64) -> Self {
        let xp = xp.max(0);
        let level = level_for(xp);

        if level >= MAX_LEVEL {
            return Self {
                level: MAX_LEVEL,
                xp_total: xp,
                level_start: level_threshold(MAX_LEVEL),
                next_level: None,
                xp_into_level: 0,
                xp_needed: 0,
                progress: 1.0,
                leveled_up: false,
            };
        }

        let level_start = level_threshold(level);
        let next_level = level_threshold(level + 1);
        let xp_into_level = xp - level_start;
        let xp_needed = (next_level - level_start).max(1);

        Self {
            level,
            xp_total: xp,
            level_start,
            next_level: Some(next_level),
            xp_into_level,
            xp_needed,
            progress: (xp_into_level as f64 / xp_needed as f64).clamp(0.0, 1.0),
            leveled_up: false,
        }
    }

    /// Progress after gaining XP, flagging whether a new level was reached.
    pub fn after_gain(xp_before: i64, gained: i64) -> Self {
        let mut progress = Self::at(xp_before + gained.max(0));
        progress.leveled_up = progress.level > level_for(xp_before);
        progress
    }
}
