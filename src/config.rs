use std::env;
use std::path::PathBuf;

use serde::Serialize;

use crate::elo::DEFAULT_HOME_ADVANTAGE;
use crate::features::TierGapMode;
use crate::insights::InsightsOptions;
use crate::team_quality::{FORM_WINDOW, MOOD_DEFAULT_WINDOW};

const DEFAULT_MODEL_DIR: &str = "models";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsConfig {
    pub model_dir: PathBuf,
    pub home_advantage: f64,
    pub mood_window: usize,
    pub strict_schema: bool,
    pub tier_gap_mode: TierGapMode,
    pub rating_nudge: bool,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl InsightsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Blank values count as unset; unparsable values fall back to the
    /// default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_dir = get("INSIGHTS_MODEL_DIR")
            .map(|v| PathBuf::from(v.trim()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));
        let home_advantage = get("INSIGHTS_HOME_ADVANTAGE")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_HOME_ADVANTAGE)
            .clamp(0.0, 150.0);
        let mood_window = get("INSIGHTS_MOOD_WINDOW")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(MOOD_DEFAULT_WINDOW)
            .clamp(1, FORM_WINDOW);
        let strict_schema = get("INSIGHTS_STRICT_SCHEMA")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);
        let tier_gap_mode = get("INSIGHTS_TIER_GAP_MODE")
            .and_then(|v| TierGapMode::parse(&v))
            .unwrap_or_default();
        let rating_nudge = get("INSIGHTS_RATING_NUDGE")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        Self {
            model_dir,
            home_advantage,
            mood_window,
            strict_schema,
            tier_gap_mode,
            rating_nudge,
        }
    }

    pub fn insights_options(&self) -> InsightsOptions {
        InsightsOptions {
            mood_window: self.mood_window,
            tier_gap_mode: self.tier_gap_mode,
            rating_nudge: self.rating_nudge,
            home_advantage: self.home_advantage,
            ..InsightsOptions::default()
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
