#![forbid(unsafe_code)]

use std::{collections::BTreeMap, path::PathBuf};

use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use eyre::{bail, Result, WrapErr};
use fishinge_economy::{
    progression::MAX_LEVEL,
    roll::{self, Roll},
    selector, Catalog, CastMode, Config, Dice,
};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

/// Runs the roll tables offline and reports how outcomes and species fall.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// Number of casts to simulate
    #[arg(short = 'n', long, default_value_t = 100_000, value_parser = clap::value_parser!(u64).range(1..))]
    draws: u64,

    /// Weather modifier in percent
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    modifier: i32,

    /// Use the guaranteed roll table
    #[arg(short, long)]
    guaranteed: bool,

    /// Location to fish at (defaults to the configured location)
    #[arg(short, long)]
    location: Option<String>,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Catalog file (defaults to the configured catalog)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Options {
    fn mode(&self) -> CastMode {
        if self.guaranteed {
            CastMode::Guaranteed
        } else {
            CastMode::Normal
        }
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    dotenv().ok();

    let options = Options::parse();
    let mode = options.mode();

    let mut config = Config::default();
    config.apply_env();
    let catalog_path = options
        .catalog
        .clone()
        .unwrap_or_else(|| config.catalog_path.clone());
    let catalog = Catalog::load(&catalog_path)
        .wrap_err_with(|| format!("Could not load catalog {}", catalog_path.display()))?;

    let location = options
        .location
        .clone()
        .unwrap_or_else(|| config.default_location.clone());
    if !catalog.has_location(&location) {
        bail!("unknown location `{location}`");
    }

    let mut dice = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let season = fishinge_economy::season::Season::at(
        Utc::now(),
        config.season_epoch,
        config.season_length(),
    );
    info!(
        "Simulating {} {:?} casts at {location} in {season} with a {:+}% modifier",
        options.draws, mode, options.modifier
    );

    let mut outcomes: BTreeMap<String, u64> = BTreeMap::new();
    let mut species: BTreeMap<String, u64> = BTreeMap::new();

    for _ in 0..options.draws {
        let roll = match mode {
            CastMode::Normal => roll::resolve_normal(dice.cast_roll(), options.modifier),
            CastMode::Guaranteed => roll::resolve_guaranteed(dice.guaranteed_roll()),
        };
        *outcomes.entry(roll.to_string()).or_default() += 1;

        let Roll::Catch { rarity, any_season } = roll else {
            continue;
        };
        let pool = if rarity.is_trash() {
            selector::cast_trash_pool(&catalog, &location)
        } else {
            let pool = selector::fish_pool(
                &catalog,
                &location,
                (!any_season).then_some(season),
                MAX_LEVEL,
            );
            let candidates = selector::of_rarity(&pool, rarity);
            if candidates.is_empty() {
                pool
            } else {
                candidates
            }
        };
        if let Some(picked) = selector::choose(&pool, &mut dice) {
            *species.entry(picked.name.clone()).or_default() += 1;
        }
    }

    let share = |count: u64| count as f64 / options.draws as f64 * 100.0;

    if options.json {
        let report = serde_json::json!({
            "draws": options.draws,
            "mode": mode,
            "modifier": options.modifier,
            "location": location,
            "season": season,
            "outcomes": outcomes,
            "species": species,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Outcomes");
    for (outcome, count) in &outcomes {
        println!("  {outcome:<12} {count:>10} {:>7.2}%", share(*count));
    }

    let mut species: Vec<_> = species.into_iter().collect();
    species.sort_by(|a, b| b.1.cmp(&a.1));
    println!("Species");
    for (name, count) in &species {
        println!("  {name:<24} {count:>10} {:>7.2}%", share(*count));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Options::command().debug_assert();
    }

    #[test]
    fn defaults_to_normal_casts() {
        let options = Options::try_parse_from(["simulate"]).unwrap();

        assert_eq!(options.draws, 100_000);
        assert_eq!(options.modifier, 0);
        assert_eq!(options.mode(), CastMode::Normal);
        assert!(options.location.is_none());
        assert!(!options.json);
    }

    #[test]
    fn reads_every_flag() {
        let options = Options::try_parse_from([
            "simulate",
            "--draws",
            "500",
            "--modifier",
            "-15",
            "--guaranteed",
            "--location",
            "Lake",
            "--seed",
            "7",
            "--catalog",
            "other.ron",
            "--json",
        ])
        .unwrap();

        assert_eq!(options.draws, 500);
        assert_eq!(options.modifier, -15);
        assert_eq!(options.mode(), CastMode::Guaranteed);
        assert_eq!(options.location.as_deref(), Some("Lake"));
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.catalog, Some(PathBuf::from("other.ron")));
        assert!(options.json);
    }

    #[test]
    fn zero_draws_are_rejected() {
        assert!(Options::try_parse_from(["simulate", "--draws", "0"]).is_err());
    }
}
