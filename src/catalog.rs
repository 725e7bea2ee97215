use std::{collections::HashSet, fmt::Display, fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{config::Config, season::Season};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Could not read catalog file {path}")]
    Read {
        source: std::io::Error,
        path: String,
    },

    #[error("Could not parse catalog")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Catalog entry {name} is invalid: {reason}")]
    Invalid { name: String, reason: &'static str },

    #[error("{name} lives at unknown location {location}")]
    UnknownLocation { name: String, location: String },

    #[error("{name} takes unknown bait {bait}")]
    UnknownBait { name: String, bait: String },

    #[error("{kind} {name} is listed twice")]
    Duplicate { kind: &'static str, name: String },

    #[error("Default {kind} {name} is not in the catalog")]
    MissingDefault { kind: &'static str, name: String },
}

fn invalid_default_bait(name: &str) -> CatalogError {
    CatalogError::Invalid {
        name: name.to_string(),
        reason: "the default bait must be infinite",
    }
}

fn find_duplicate<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .find(|name| !seen.insert(name.trim().to_lowercase()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Trash,
    Common,
    Rare,
    Legendary,
}

impl Rarity {
    pub fn is_trash(self) -> bool {
        self == Rarity::Trash
    }
}

impl Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rarity::Trash => "trash",
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Legendary => "legendary",
        };
        f.write_str(name)
    }
}

/// Which baits a species will take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaitRule {
    Any,
    Only(Vec<String>),
}

impl Default for BaitRule {
    fn default() -> Self {
        BaitRule::Any
    }
}

impl BaitRule {
    /// Names compare case-insensitively with surrounding whitespace ignored.
    pub fn accepts(&self, bait: &str) -> bool {
        match self {
            BaitRule::Any => true,
            BaitRule::Only(baits) => {
                let bait = bait.trim();
                !bait.is_empty() && baits.iter().any(|b| b.trim().eq_ignore_ascii_case(bait))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub rarity: Rarity,
    pub min_weight: f64,
    pub max_weight: f64,
    #[serde(default)]
    pub min_length: f64,
    #[serde(default)]
    pub max_length: f64,
    pub price: i64,
    pub locations: Vec<String>,
    /// Empty means the species is around all year.
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub baits: BaitRule,
    #[serde(default)]
    pub min_level: i64,
}

impl Species {
    pub fn is_trash(&self) -> bool {
        self.rarity.is_trash()
    }

    pub fn lives_at(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l == location)
    }

    pub fn in_season(&self, season: Season) -> bool {
        self.seasons.is_empty() || self.seasons.contains(&season)
    }
}

impl Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {:.2}kg - {:.2}kg)",
            self.name, self.rarity, self.min_weight, self.max_weight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RodKind {
    /// Wears down with use and recovers over time.
    Durable { durability: i64 },
    /// Comes with a one-shot number of catches rolled from the range.
    Temporary { min_charges: i64, max_charges: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rod {
    pub name: String,
    pub price: i64,
    pub max_weight: f64,
    pub kind: RodKind,
}

impl Rod {
    pub fn is_temporary(&self) -> bool {
        matches!(self.kind, RodKind::Temporary { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    pub price: i64,
    pub fish_count: u32,
    pub cooldown_hours: i64,
    /// `None` is an unlimited net.
    #[serde(default)]
    pub max_uses: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bait {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub infinite: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub locations: Vec<String>,
    pub fish: Vec<Species>,
    pub trash: Vec<Species>,
    pub rods: Vec<Rod>,
    pub nets: Vec<Net>,
    pub baits: Vec<Bait>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        debug!("Loading catalog from {}", path.display());

        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            source,
            path: path.display().to_string(),
        })?;

        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = ron::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |name: &str, reason| CatalogError::Invalid {
            name: name.to_string(),
            reason,
        };

        for fish in &self.fish {
            if fish.is_trash() {
                return Err(invalid(&fish.name, "fish may not have the trash tier"));
            }
        }
        for trash in &self.trash {
            if !trash.is_trash() {
                return Err(invalid(&trash.name, "trash must have the trash tier"));
            }
        }
        for species in self.fish.iter().chain(&self.trash) {
            if species.min_weight > species.max_weight || species.min_weight < 0.0 {
                return Err(invalid(&species.name, "weight range is inverted"));
            }
            if species.min_length > species.max_length || species.min_length < 0.0 {
                return Err(invalid(&species.name, "length range is inverted"));
            }
        }
        for rod in &self.rods {
            match rod.kind {
                RodKind::Durable { durability } if durability <= 0 => {
                    return Err(invalid(&rod.name, "durability must be positive"))
                }
                RodKind::Temporary {
                    min_charges,
                    max_charges,
                } if min_charges <= 0 || min_charges > max_charges => {
                    return Err(invalid(&rod.name, "charge range is invalid"))
                }
                _ => {}
            }
        }
        for net in &self.nets {
            if net.fish_count == 0 {
                return Err(invalid(&net.name, "a net must pull at least one item"));
            }
        }

        for species in self.fish.iter().chain(&self.trash) {
            if let Some(location) = species.locations.iter().find(|l| !self.has_location(l)) {
                return Err(CatalogError::UnknownLocation {
                    name: species.name.clone(),
                    location: location.clone(),
                });
            }
            if let BaitRule::Only(baits) = &species.baits {
                if let Some(bait) = baits.iter().find(|b| self.bait(b).is_none()) {
                    return Err(CatalogError::UnknownBait {
                        name: species.name.clone(),
                        bait: bait.clone(),
                    });
                }
            }
        }

        let duplicates = [
            (
                "species",
                find_duplicate(self.fish.iter().chain(&self.trash).map(|s| s.name.as_str())),
            ),
            ("rod", find_duplicate(self.rods.iter().map(|r| r.name.as_str()))),
            ("net", find_duplicate(self.nets.iter().map(|n| n.name.as_str()))),
            ("bait", find_duplicate(self.baits.iter().map(|b| b.name.as_str()))),
            ("location", find_duplicate(self.locations.iter().map(String::as_str))),
        ];
        if let Some((kind, name)) = duplicates
            .into_iter()
            .find_map(|(kind, name)| name.map(|name| (kind, name)))
        {
            return Err(CatalogError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Checks that every item a new player starts with exists. The default
    /// bait must be infinite since exhausted baits fall back to it.
    pub fn validate_against(&self, config: &Config) -> Result<(), CatalogError> {
        let missing = |kind, name: &str| CatalogError::MissingDefault {
            kind,
            name: name.to_string(),
        };

        if self.rod(&config.baseline_rod).is_none() {
            return Err(missing("rod", &config.baseline_rod));
        }
        if self.net(&config.default_net).is_none() {
            return Err(missing("net", &config.default_net));
        }
        if !self.has_location(&config.default_location) {
            return Err(missing("location", &config.default_location));
        }
        match self.bait(&config.default_bait) {
            Some(bait) if bait.infinite => Ok(()),
            Some(_) => Err(invalid_default_bait(&config.default_bait)),
            None => Err(missing("bait", &config.default_bait)),
        }
    }

    /// Looks up fish and trash alike.
    pub fn species(&self, name: &str) -> Option<&Species> {
        let name = name.trim();
        self.fish
            .iter()
            .chain(&self.trash)
            .find(|species| species.name == name)
    }

    /// Shop items are looked up ignoring case.
    pub fn rod(&self, name: &str) -> Option<&Rod> {
        self.rods
            .iter()
            .find(|rod| rod.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn net(&self, name: &str) -> Option<&Net> {
        self.nets
            .iter()
            .find(|net| net.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn bait(&self, name: &str) -> Option<&Bait> {
        self.baits
            .iter()
            .find(|bait| bait.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn has_location(&self, name: &str) -> bool {
        self.locations.iter().any(|location| location == name)
    }
}
