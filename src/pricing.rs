use crate::{
    catalog::{Rarity, Species},
    roll::CastMode,
};

/// Position of `value` inside `[min, max]`, clamped to `0..=1`.
/// A degenerate range sits in the middle.
pub fn size_ratio(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.5;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

pub fn rarity_multiplier(rarity: Rarity) -> f64 {
    match rarity {
        Rarity::Common => 1.15,
        Rarity::Rare => 1.5,
        Rarity::Legendary => 2.2,
        Rarity::Trash => 1.0,
    }
}

pub fn size_multiplier(species: &Species, weight: f64, length: f64) -> f64 {
    let weight_ratio = size_ratio(weight, species.min_weight, species.max_weight);
    let length_ratio = size_ratio(length, species.min_length, species.max_length);

    0.7 + 0.8 * (0.7 * weight_ratio + 0.3 * length_ratio)
}

/// What a catch sells for. Never stored, always derived from the species and
/// the measured size. Trash sells at its flat base price.
pub fn sale_price(species: &Species, weight: f64, length: f64) -> i64 {
    if species.is_trash() {
        return species.price.max(1);
    }

    let price = species.price as f64
        * rarity_multiplier(species.rarity)
        * size_multiplier(species, weight, length);

    (price.round() as i64).max(1)
}

/// Durability a catch of `rarity` takes out of a durable rod.
pub fn damage(rarity: Rarity, mode: CastMode) -> i64 {
    match (mode, rarity) {
        (CastMode::Normal, Rarity::Trash) => 1,
        (CastMode::Normal, Rarity::Common) => 5,
        (CastMode::Normal, Rarity::Rare) => 10,
        (CastMode::Normal, Rarity::Legendary) => 15,
        (CastMode::Guaranteed, Rarity::Trash) => 0,
        (CastMode::Guaranteed, Rarity::Common) => 1,
        (CastMode::Guaranteed, Rarity::Rare) => 2,
        (CastMode::Guaranteed, Rarity::Legendary) => 3,
    }
}

/// Price of restoring `missing` points on a rod, scaled from the full repair
/// price.
pub fn repair_cost(full_price: i64, missing: i64, max_durability: i64) -> i64 {
    if max_durability <= 0 || missing <= 0 {
        return 0;
    }
    (full_price * missing / max_durability).max(1)
}
