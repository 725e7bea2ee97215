use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub const CYCLE: [Season; 4] = [
        Season::Winter,
        Season::Spring,
        Season::Summer,
        Season::Autumn,
    ];

    /// Seasons rotate every `length`, starting with winter at `epoch`.
    /// Instants before the epoch run the cycle backwards.
    pub fn at(now: DateTime<Utc>, epoch: DateTime<Utc>, length: Duration) -> Self {
        let length = length.num_seconds().max(1);
        let periods = (now - epoch).num_seconds().div_euclid(length);

        Self::CYCLE[periods.rem_euclid(Self::CYCLE.len() as i64) as usize]
    }
}

impl Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
        };
        f.write_str(name)
    }
}
