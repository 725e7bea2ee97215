use rand::{seq::SliceRandom, Rng};

use crate::{
    catalog::{Catalog, Rarity, Species},
    season::Season,
};

fn rarity_weight(rarity: Rarity) -> f64 {
    match rarity {
        Rarity::Common => 60.0,
        Rarity::Rare => 30.0,
        Rarity::Legendary => 10.0,
        Rarity::Trash => 5.0,
    }
}

/// Relative chance of a species being picked from a pool. Heavier species
/// are slightly more likely.
pub fn selection_weight(species: &Species) -> f64 {
    let mut weight = rarity_weight(species.rarity);
    if species.max_weight > 0.0 {
        weight += (species.min_weight + species.max_weight) / 2.0;
    }
    weight.max(1.0)
}

/// Fish living at `location` that a player of `level` may catch. With no
/// season given the pool spans the whole year.
pub fn fish_pool<'c>(
    catalog: &'c Catalog,
    location: &str,
    season: Option<Season>,
    level: i64,
) -> Vec<&'c Species> {
    catalog
        .fish
        .iter()
        .filter(|fish| fish.lives_at(location))
        .filter(|fish| season.map_or(true, |season| fish.in_season(season)))
        .filter(|fish| fish.min_level <= level)
        .collect()
}

pub fn trash_pool<'c>(catalog: &'c Catalog, location: &str) -> Vec<&'c Species> {
    catalog
        .trash
        .iter()
        .filter(|trash| trash.lives_at(location))
        .collect()
}

/// Trash at `location`, or any trash at all when the location has none.
pub fn cast_trash_pool<'c>(catalog: &'c Catalog, location: &str) -> Vec<&'c Species> {
    let pool = trash_pool(catalog, location);
    if pool.is_empty() {
        catalog.trash.iter().collect()
    } else {
        pool
    }
}

pub fn of_rarity<'c>(pool: &[&'c Species], rarity: Rarity) -> Vec<&'c Species> {
    pool.iter()
        .copied()
        .filter(|species| species.rarity == rarity)
        .collect()
}

/// Weighted pick, see [`selection_weight`].
pub fn choose<'c, R: Rng + ?Sized>(pool: &[&'c Species], rng: &mut R) -> Option<&'c Species> {
    pool.choose_weighted(rng, |species| selection_weight(species))
        .ok()
        .copied()
}

/// Unweighted pick, used by nets.
pub fn choose_uniform<'c, R: Rng + ?Sized>(
    pool: &[&'c Species],
    rng: &mut R,
) -> Option<&'c Species> {
    pool.choose(rng).copied()
}

fn draw<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Draws the weight (kg, 2 decimals) and length (cm, 1 decimal) of a catch.
pub fn measure<R: Rng + ?Sized>(species: &Species, rng: &mut R) -> (f64, f64) {
    let weight = round_to(draw(rng, species.min_weight, species.max_weight), 2);
    let length = round_to(draw(rng, species.min_length, species.max_length), 1);
    (weight, length)
}
