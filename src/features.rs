use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::elo::BASE_RATING;
use crate::gbdt::{FeatureVector, TreeModel};
use crate::h2h::{H2HAggregate, H2HSummary};
use crate::team_fixtures::{FixtureInput, MatchRecord, recent_first};
use crate::team_quality::{FORM_WINDOW, TeamQuality, Tier};

/// Rating points added to the home side in `eloDiff`.
pub const ELO_DIFF_HOME_BONUS: f64 = 100.0;
pub const VENUE_FORM_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    Missing,
    Value(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDescriptor {
    pub name: &'static str,
    pub fallback: Fallback,
}

const fn missing(name: &'static str) -> FeatureDescriptor {
    FeatureDescriptor {
        name,
        fallback: Fallback::Missing,
    }
}

const fn or_value(name: &'static str, v: f64) -> FeatureDescriptor {
    FeatureDescriptor {
        name,
        fallback: Fallback::Value(v),
    }
}

/// Every feature the assembler emits, in emission order.
pub const FEATURE_SCHEMA: [FeatureDescriptor; 34] = [
    missing("season"),
    missing("leagueId"),
    or_value("homeFormScore", 0.0),
    or_value("awayFormScore", 0.0),
    or_value("homePointsLast10", 0.0),
    or_value("awayPointsLast10", 0.0),
    or_value("homeGoalsForLast10", 0.0),
    or_value("homeGoalsAgainstLast10", 0.0),
    or_value("awayGoalsForLast10", 0.0),
    or_value("awayGoalsAgainstLast10", 0.0),
    missing("homeRestDays"),
    missing("awayRestDays"),
    or_value("homeHomeFormScore", 0.0),
    or_value("awayAwayFormScore", 0.0),
    or_value("homeElo", BASE_RATING),
    or_value("awayElo", BASE_RATING),
    or_value("eloDiff", ELO_DIFF_HOME_BONUS),
    or_value("homeTier", 3.0),
    or_value("awayTier", 3.0),
    or_value("tierGap", 0.0),
    or_value("h2h_overall_matches", 0.0),
    missing("h2h_overall_home_win_pct"),
    missing("h2h_overall_away_win_pct"),
    missing("h2h_overall_draw_pct"),
    missing("h2h_overall_avg_goals"),
    missing("h2h_overall_btts_pct"),
    missing("h2h_overall_over_2_5_pct"),
    or_value("h2h_venue_matches", 0.0),
    missing("h2h_venue_home_win_pct"),
    missing("h2h_venue_away_win_pct"),
    missing("h2h_venue_draw_pct"),
    missing("h2h_venue_avg_goals"),
    missing("h2h_venue_btts_pct"),
    missing("h2h_venue_over_2_5_pct"),
];

pub fn schema_index(name: &str) -> Option<usize> {
    FEATURE_SCHEMA.iter().position(|d| d.name == name)
}

/// Duplicate names in the schema, expected empty.
pub fn schema_duplicates() -> Vec<&'static str> {
    let mut seen = HashSet::new();
    FEATURE_SCHEMA
        .iter()
        .filter(|d| !seen.insert(d.name))
        .map(|d| d.name)
        .collect()
}

pub fn unknown_features<'a>(names: &'a [String]) -> Vec<&'a str> {
    names
        .iter()
        .filter(|n| schema_index(n).is_none())
        .map(String::as_str)
        .collect()
}

/// How `awayTier` is produced. Training data paired every domestic fixture
/// with the home side's tier on both sides, so `TrainingParity` reproduces
/// a constant zero gap; `PerTeam` reports each side's own tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierGapMode {
    #[default]
    PerTeam,
    TrainingParity,
}

impl TierGapMode {
    pub fn parse(raw: &str) -> Option<TierGapMode> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "per_team" | "per-team" => Some(TierGapMode::PerTeam),
            "training_parity" | "training-parity" => Some(TierGapMode::TrainingParity),
            _ => None,
        }
    }
}

/// Resolved values in schema order, fallbacks already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    values: Vec<Option<f64>>,
}

impl FeatureSet {
    fn from_raw(raw: [Option<f64>; FEATURE_SCHEMA.len()]) -> Self {
        let values = raw
            .iter()
            .zip(FEATURE_SCHEMA.iter())
            .map(|(v, d)| match (v.filter(|x| x.is_finite()), d.fallback) {
                (Some(x), _) => Some(x),
                (None, Fallback::Value(f)) => Some(f),
                (None, Fallback::Missing) => None,
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        schema_index(name).and_then(|i| self.values[i])
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Present values only; missing features are left out of the map.
    pub fn to_map(&self) -> HashMap<String, f64> {
        FEATURE_SCHEMA
            .iter()
            .zip(&self.values)
            .filter_map(|(d, v)| v.map(|x| (d.name.to_string(), x)))
            .collect()
    }

    /// Values in the model's declared order. Names outside the schema are
    /// emitted as missing.
    pub fn vector_for(&self, model: &TreeModel) -> FeatureVector {
        FeatureVector::new(
            model
                .metadata
                .feature_names
                .iter()
                .map(|name| self.get(name))
                .collect(),
        )
    }
}

/// Points-weighted form over the last 10 results: the two latest count 1.5x,
/// the next two 1.2x. Zero without matches.
pub fn weighted_form_score(matches: &[MatchRecord]) -> f64 {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (k, m) in recent_first(matches).into_iter().take(FORM_WINDOW).enumerate() {
        let w = match k {
            0 | 1 => 1.5,
            2 | 3 => 1.2,
            _ => 1.0,
        };
        weighted += w * m.result().points() as f64;
        weight_sum += w;
    }
    if weight_sum <= 0.0 {
        0.0
    } else {
        weighted / weight_sum
    }
}

fn venue_form_score(matches: &[MatchRecord]) -> f64 {
    let recent: Vec<MatchRecord> = recent_first(matches)
        .into_iter()
        .take(VENUE_FORM_WINDOW)
        .cloned()
        .collect();
    weighted_form_score(&recent)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RecentTotals {
    points: u32,
    goals_for: u32,
    goals_against: u32,
}

fn last10_totals(matches: &[MatchRecord]) -> RecentTotals {
    recent_first(matches)
        .into_iter()
        .take(FORM_WINDOW)
        .fold(RecentTotals::default(), |acc, m| RecentTotals {
            points: acc.points + m.result().points(),
            goals_for: acc.goals_for + m.goals_for as u32,
            goals_against: acc.goals_against + m.goals_against as u32,
        })
}

fn h2h_values(agg: &H2HAggregate) -> [Option<f64>; 7] {
    // An empty sample still reports its zero count; only the rates are unknown.
    [
        Some(agg.matches as f64),
        agg.home_win_pct,
        agg.away_win_pct,
        agg.draw_pct,
        agg.avg_goals,
        agg.btts_pct,
        agg.over_2_5_pct,
    ]
}

pub struct FeatureInputs<'a> {
    pub fixture: &'a FixtureInput,
    pub home_quality: &'a TeamQuality,
    pub away_quality: &'a TeamQuality,
    pub h2h: &'a H2HSummary,
    pub tier_gap_mode: TierGapMode,
}

pub fn build_features(input: &FeatureInputs<'_>) -> FeatureSet {
    let fx = input.fixture;
    let meta = &fx.metadata;

    let home_totals = last10_totals(&fx.home.matches);
    let away_totals = last10_totals(&fx.away.matches);

    let rating = |r: Option<f64>| r.filter(|x| x.is_finite()).unwrap_or(BASE_RATING);
    let home_elo = rating(fx.home.rating.map(|r| r.rating));
    let away_elo = rating(fx.away.rating.map(|r| r.rating));

    let home_tier = input.home_quality.mind.tier;
    let away_tier = match input.tier_gap_mode {
        TierGapMode::PerTeam => input.away_quality.mind.tier,
        TierGapMode::TrainingParity => home_tier,
    };
    let tier = |t: Tier| t.as_u8() as f64;

    let overall = h2h_values(&input.h2h.overall);
    let venue = h2h_values(&input.h2h.venue);

    let mut raw: [Option<f64>; FEATURE_SCHEMA.len()] = [None; FEATURE_SCHEMA.len()];
    let head = [
        meta.season.map(|s| s as f64),
        meta.league_id.map(|id| id as f64),
        Some(weighted_form_score(&fx.home.matches)),
        Some(weighted_form_score(&fx.away.matches)),
        Some(home_totals.points as f64),
        Some(away_totals.points as f64),
        Some(home_totals.goals_for as f64),
        Some(home_totals.goals_against as f64),
        Some(away_totals.goals_for as f64),
        Some(away_totals.goals_against as f64),
        fx.home.rest_days(meta.date).map(|d| d as f64),
        fx.away.rest_days(meta.date).map(|d| d as f64),
        Some(venue_form_score(&fx.home.venue_matches(true))),
        Some(venue_form_score(&fx.away.venue_matches(false))),
        Some(home_elo),
        Some(away_elo),
        Some(home_elo + ELO_DIFF_HOME_BONUS - away_elo),
        Some(tier(home_tier)),
        Some(tier(away_tier)),
        Some(tier(home_tier) - tier(away_tier)),
    ];
    for (slot, v) in raw.iter_mut().zip(head.iter().chain(&overall).chain(&venue)) {
        *slot = *v;
    }
    FeatureSet::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::team_fixtures::{MatchMetadata, TeamRecord, TeamRating};
    use crate::team_quality::assess_team;

    fn series(results: &[(u8, u8)]) -> Vec<MatchRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        results
            .iter()
            .enumerate()
            .map(|(i, (gf, ga))| MatchRecord {
                date: start - Duration::days(7 * i as i64),
                opponent: None,
                is_home: i % 2 == 0,
                goals_for: *gf,
                goals_against: *ga,
            })
            .collect()
    }

    fn fixture(home: Vec<MatchRecord>, away: Vec<MatchRecord>) -> FixtureInput {
        FixtureInput {
            metadata: MatchMetadata {
                league_name: "Premier League".to_string(),
                league_id: Some(39),
                season: Some(2024),
                date: NaiveDate::from_ymd_opt(2024, 5, 5),
                ..Default::default()
            },
            home: TeamRecord {
                name: "Home".to_string(),
                matches: home,
                ..Default::default()
            },
            away: TeamRecord {
                name: "Away".to_string(),
                matches: away,
                ..Default::default()
            },
            h2h: None,
        }
    }

    fn build(fx: &FixtureInput, mode: TierGapMode) -> FeatureSet {
        let hq = assess_team(&fx.home.matches, 5, None);
        let aq = assess_team(&fx.away.matches, 5, None);
        let h2h = H2HSummary::default();
        build_features(&FeatureInputs {
            fixture: fx,
            home_quality: &hq,
            away_quality: &aq,
            h2h: &h2h,
            tier_gap_mode: mode,
        })
    }

    #[test]
    fn schema_has_unique_names() {
        assert!(schema_duplicates().is_empty());
        assert_eq!(schema_index("season"), Some(0));
        assert_eq!(schema_index("h2h_venue_over_2_5_pct"), Some(33));
    }

    #[test]
    fn weighted_form_weights_recent_results() {
        assert_eq!(weighted_form_score(&[]), 0.0);
        // two latest wins, then eight losses
        let mut results = vec![(1, 0); 2];
        results.extend(vec![(0, 1); 8]);
        let score = weighted_form_score(&series(&results));
        let expected = (1.5 * 3.0 * 2.0) / (1.5 * 2.0 + 1.2 * 2.0 + 6.0);
        assert!((score - expected).abs() < 1e-12);
        // an 11th match is ignored
        results.push((5, 0));
        assert!((weighted_form_score(&series(&results)) - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_use_documented_fallbacks() {
        let fx = fixture(Vec::new(), Vec::new());
        let f = build(&fx, TierGapMode::PerTeam);
        assert_eq!(f.values().len(), FEATURE_SCHEMA.len());
        assert_eq!(f.get("homeElo"), Some(1500.0));
        assert_eq!(f.get("eloDiff"), Some(100.0));
        assert_eq!(f.get("homeTier"), Some(3.0));
        assert_eq!(f.get("homeFormScore"), Some(0.0));
        assert_eq!(f.get("homeRestDays"), None);
        assert_eq!(f.get("h2h_overall_matches"), Some(0.0));
        assert_eq!(f.get("h2h_venue_matches"), Some(0.0));
        assert_eq!(f.get("h2h_overall_home_win_pct"), None);
        assert_eq!(f.get("h2h_venue_btts_pct"), None);
        assert_eq!(f.get("season"), Some(2024.0));
        assert!(!f.to_map().contains_key("h2h_overall_avg_goals"));
    }

    #[test]
    fn elo_and_tier_features() {
        let mut fx = fixture(series(&vec![(3, 0); 40]), series(&vec![(0, 2); 40]));
        fx.home.rating = Some(TeamRating {
            rating: 1650.0,
            games_played: Some(40),
            confidence: None,
        });
        let f = build(&fx, TierGapMode::PerTeam);
        assert_eq!(f.get("eloDiff"), Some(1650.0 + 100.0 - 1500.0));
        assert_eq!(f.get("homeTier"), Some(1.0));
        assert_eq!(f.get("awayTier"), Some(4.0));
        assert_eq!(f.get("tierGap"), Some(-3.0));
        assert_eq!(f.get("homeRestDays"), Some(4.0));

        let parity = build(&fx, TierGapMode::TrainingParity);
        assert_eq!(parity.get("awayTier"), Some(1.0));
        assert_eq!(parity.get("tierGap"), Some(0.0));
    }

    #[test]
    fn last10_totals_and_venue_form() {
        let fx = fixture(series(&vec![(2, 1); 12]), Vec::new());
        let f = build(&fx, TierGapMode::PerTeam);
        assert_eq!(f.get("homePointsLast10"), Some(30.0));
        assert_eq!(f.get("homeGoalsForLast10"), Some(20.0));
        assert_eq!(f.get("homeGoalsAgainstLast10"), Some(10.0));
        let home_form = f.get("homeHomeFormScore").unwrap();
        assert!((home_form - 3.0).abs() < 1e-12);
        assert_eq!(f.get("awayAwayFormScore"), Some(0.0));
    }
}
