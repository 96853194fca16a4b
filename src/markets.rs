use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{InsightsError, Result};

/// Goal lines evaluated for over/under, stored as the whole part of `n.5`.
pub const GOAL_LINES: [u8; 6] = [0, 1, 2, 3, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Market {
    OneXTwo,
    Btts,
    OverUnder(u8),
}

impl Market {
    pub fn all() -> Vec<Market> {
        let mut out = vec![Market::OneXTwo, Market::Btts];
        out.extend(GOAL_LINES.iter().map(|n| Market::OverUnder(*n)));
        out
    }

    pub fn from_key(key: &str) -> Result<Market> {
        let k = key.trim().to_ascii_lowercase();
        match k.as_str() {
            "1x2" => return Ok(Market::OneXTwo),
            "btts" => return Ok(Market::Btts),
            _ => {}
        }
        // ou_2_5 -> OverUnder(2)
        if let Some(rest) = k.strip_prefix("ou_") {
            if let Some((whole, frac)) = rest.split_once('_') {
                if frac == "5" {
                    if let Ok(n) = whole.parse::<u8>() {
                        if GOAL_LINES.contains(&n) {
                            return Ok(Market::OverUnder(n));
                        }
                    }
                }
            }
        }
        Err(InsightsError::UnknownMarket(key.to_string()))
    }

    pub fn key(&self) -> String {
        match self {
            Market::OneXTwo => "1x2".to_string(),
            Market::Btts => "btts".to_string(),
            Market::OverUnder(n) => format!("ou_{n}_5"),
        }
    }

    pub fn goal_line(&self) -> Option<f64> {
        match self {
            Market::OverUnder(n) => Some(*n as f64 + 0.5),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Serialize for Market {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for Market {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Market::from_key(&raw).map_err(serde::de::Error::custom)
    }
}
