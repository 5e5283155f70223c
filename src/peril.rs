//! # Peril Classifier
//! Best-effort keyword heuristic mapping free text to a hazard category.
//!
//! Rules are checked in a fixed priority order against a lowercase substring
//! test; the first hit wins and anything unmatched is `Other`. Priority matters:
//! "flood fire" is a `Flood`, because floods are checked before wildfires.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hazard category of an article or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Peril {
    Earthquake,
    Storm,
    Flood,
    Wildfire,
    Cyber,
    Other,
}

/// Priority-ordered keyword table.
const RULES: &[(&[&str], Peril)] = &[
    (&["quake", "seismic"], Peril::Earthquake),
    (&["hurricane", "cyclone"], Peril::Storm),
    (&["flood"], Peril::Flood),
    (&["fire"], Peril::Wildfire),
    (&["cyber"], Peril::Cyber),
];

/// Classify `text` into a [`Peril`]. Pure and total.
pub fn classify(text: &str) -> Peril {
    let t = text.to_lowercase();
    RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| t.contains(n)))
        .map(|(_, peril)| *peril)
        .unwrap_or(Peril::Other)
}

impl Peril {
    pub const ALL: [Peril; 6] = [
        Peril::Earthquake,
        Peril::Storm,
        Peril::Flood,
        Peril::Wildfire,
        Peril::Cyber,
        Peril::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Peril::Earthquake => "Earthquake",
            Peril::Storm => "Storm",
            Peril::Flood => "Flood",
            Peril::Wildfire => "Wildfire",
            Peril::Cyber => "Cyber",
            Peril::Other => "Other",
        }
    }
}

impl fmt::Display for Peril {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Peril {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Peril::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown peril: {s}"))
    }
}
