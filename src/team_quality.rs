use serde::{Deserialize, Serialize};

use crate::team_fixtures::{MatchRecord, MatchResult, recent_first};

pub const MIND_WINDOW: usize = 50;
pub const MIND_SUFFICIENT_MATCHES: usize = 30;
pub const MOOD_DEFAULT_WINDOW: usize = 5;
pub const FORM_WINDOW: usize = 10;
pub const REGRESSION_STREAK: u32 = 5;

const NEUTRAL_PPG: f64 = 1.0;
const QUALITY_FLOOR: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    Elite = 1,
    Strong = 2,
    Average = 3,
    Weak = 4,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Tier> {
        match v {
            1 => Some(Tier::Elite),
            2 => Some(Tier::Strong),
            3 => Some(Tier::Average),
            4 => Some(Tier::Weak),
            _ => None,
        }
    }
}

impl From<Tier> for u8 {
    fn from(t: Tier) -> u8 {
        t.as_u8()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Tier::from_u8(v).ok_or_else(|| format!("tier must be 1..=4, got {v}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Efficiency {
    pub points_per_game: f64,
    pub goal_diff_per_game: f64,
    pub index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindLayer {
    pub tier: Tier,
    pub efficiency_index: f64,
    pub avg_points_per_game: f64,
    pub goal_difference: i32,
    pub match_count: usize,
    pub has_sufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodLayer {
    pub tier: Tier,
    pub sample_size: usize,
    pub last10_points: u32,
    pub last10_goals_for: u32,
    pub last10_goals_against: u32,
    pub form: String,
    pub mind_mood_gap: i8,
    pub is_sleeping_giant: bool,
    pub is_over_performer: bool,
    pub is_one_season_wonder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamQuality {
    pub mind: MindLayer,
    pub mood: MoodLayer,
    pub win_streak: u32,
    pub regression_risk: bool,
    pub data_quality: f64,
}

/// `EI = points per game + goal difference per game / 10`. Empty history
/// yields the neutral 1.0 rather than zero.
pub fn efficiency(matches: &[&MatchRecord]) -> Efficiency {
    if matches.is_empty() {
        return Efficiency {
            points_per_game: NEUTRAL_PPG,
            goal_diff_per_game: 0.0,
            index: NEUTRAL_PPG,
        };
    }
    let n = matches.len() as f64;
    let points: u32 = matches.iter().map(|m| m.result().points()).sum();
    let gd: i32 = matches.iter().map(|m| m.goal_difference()).sum();
    let ppg = points as f64 / n;
    let gdpg = gd as f64 / n;
    Efficiency {
        points_per_game: ppg,
        goal_diff_per_game: gdpg,
        index: ppg + gdpg / 10.0,
    }
}

pub fn efficiency_index(matches: &[MatchRecord]) -> f64 {
    let refs: Vec<&MatchRecord> = matches.iter().collect();
    efficiency(&refs).index
}

pub fn categorize_tier(ei: f64) -> Tier {
    if ei >= 2.0 {
        Tier::Elite
    } else if ei >= 1.5 {
        Tier::Strong
    } else if ei >= 1.0 {
        Tier::Average
    } else {
        // NaN lands here too
        Tier::Weak
    }
}

pub fn mind_layer(matches: &[MatchRecord]) -> MindLayer {
    let recent: Vec<&MatchRecord> = recent_first(matches).into_iter().take(MIND_WINDOW).collect();
    let eff = efficiency(&recent);
    MindLayer {
        tier: categorize_tier(eff.index),
        efficiency_index: eff.index,
        avg_points_per_game: eff.points_per_game,
        goal_difference: recent.iter().map(|m| m.goal_difference()).sum(),
        match_count: recent.len(),
        has_sufficient_data: recent.len() >= MIND_SUFFICIENT_MATCHES,
    }
}

/// Tier over the `window` most recent matches; `None` when there are none.
pub fn mood_tier(matches: &[MatchRecord], window: usize) -> Option<Tier> {
    let recent: Vec<&MatchRecord> = recent_first(matches).into_iter().take(window).collect();
    if recent.is_empty() {
        return None;
    }
    Some(categorize_tier(efficiency(&recent).index))
}

pub fn mood_layer(
    matches: &[MatchRecord],
    mind: &MindLayer,
    window: usize,
    seasons_in_league: Option<u32>,
) -> MoodLayer {
    let window = window.max(1);
    let ordered = recent_first(matches);
    let last10: Vec<&MatchRecord> = ordered.iter().copied().take(FORM_WINDOW).collect();

    let (tier, sample_size) = match mood_tier(matches, window) {
        Some(t) => (t, ordered.len().min(window)),
        None => (mind.tier, 0),
    };
    let gap = if sample_size == 0 {
        0
    } else {
        mind.tier.as_u8() as i8 - tier.as_u8() as i8
    };

    MoodLayer {
        tier,
        sample_size,
        last10_points: last10.iter().map(|m| m.result().points()).sum(),
        last10_goals_for: last10.iter().map(|m| m.goals_for as u32).sum(),
        last10_goals_against: last10.iter().map(|m| m.goals_against as u32).sum(),
        form: ordered
            .iter()
            .take(window)
            .map(|m| m.result().letter())
            .collect(),
        mind_mood_gap: gap,
        is_sleeping_giant: detect_sleeping_giant(mind.tier, tier),
        is_over_performer: detect_over_performer(mind.tier, tier),
        is_one_season_wonder: seasons_in_league
            .is_some_and(|s| detect_one_season_wonder(mind.tier, tier, s)),
    }
}

pub fn detect_sleeping_giant(mind: Tier, mood: Tier) -> bool {
    mind <= Tier::Strong && mood >= Tier::Average
}

pub fn detect_over_performer(mind: Tier, mood: Tier) -> bool {
    mind >= Tier::Average && mood == Tier::Elite
}

pub fn detect_one_season_wonder(mind: Tier, mood: Tier, seasons_in_league: u32) -> bool {
    mind >= Tier::Average && mood <= Tier::Strong && seasons_in_league <= 2
}

/// Consecutive wins counting back from the latest match.
pub fn win_streak(matches: &[MatchRecord]) -> u32 {
    recent_first(matches)
        .iter()
        .take_while(|m| m.result() == MatchResult::Win)
        .count() as u32
}

pub fn regression_risk(mind: Tier, streak: u32) -> bool {
    mind >= Tier::Average && streak >= REGRESSION_STREAK
}

/// 1.0 with full samples, shrinking toward 0.5 as either sample thins out.
pub fn data_quality_multiplier(mind_matches: usize, mood_samples: usize) -> f64 {
    let mind_factor = if mind_matches < MIND_SUFFICIENT_MATCHES {
        0.7 + 0.3 * (mind_matches as f64 / MIND_SUFFICIENT_MATCHES as f64)
    } else {
        1.0
    };
    let mood_factor = if mood_samples < FORM_WINDOW {
        0.8 + 0.2 * (mood_samples as f64 / FORM_WINDOW as f64)
    } else {
        1.0
    };
    (mind_factor * mood_factor).clamp(QUALITY_FLOOR, 1.0)
}

pub fn assess_team(
    matches: &[MatchRecord],
    mood_window: usize,
    seasons_in_league: Option<u32>,
) -> TeamQuality {
    let mind = mind_layer(matches);
    let mood = mood_layer(matches, &mind, mood_window, seasons_in_league);
    let streak = win_streak(matches);
    let recent_samples = matches.len().min(FORM_WINDOW);
    TeamQuality {
        regression_risk: regression_risk(mind.tier, streak),
        data_quality: data_quality_multiplier(mind.match_count, recent_samples),
        win_streak: streak,
        mind,
        mood,
    }
}
