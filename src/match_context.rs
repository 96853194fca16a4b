use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::elo::CompetitionClass;
use crate::h2h::normalize_team_name;
use crate::season_stakes::{self, SeasonStakes, StakesInput};
use crate::team_fixtures::MatchMetadata;
use crate::team_quality::TeamQuality;

const EARLY_SEASON_ROUNDS: u32 = 5;
const EARLY_SEASON_PROGRESS: f64 = 0.15;
const END_SEASON_ROUNDS_LEFT: u32 = 5;
const END_SEASON_PROGRESS: f64 = 0.85;
const BREAK_REST_DAYS: u32 = 14;

const WEIGHT_MIN: f64 = 0.3;
const WEIGHT_MAX: f64 = 2.0;
const CONFIDENCE_REDUCTION_MAX: f64 = 40.0;
const GOAL_ADJUSTMENT_BOUND: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    League,
    Cup,
    International,
    Friendly,
}

impl MatchType {
    /// Friendlies are rated like league matches.
    pub fn competition_class(self) -> CompetitionClass {
        match self {
            MatchType::League | MatchType::Friendly => CompetitionClass::League,
            MatchType::Cup => CompetitionClass::Cup,
            MatchType::International => CompetitionClass::International,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTypeInfo {
    pub match_type: MatchType,
    pub is_knockout: bool,
    pub is_neutral_venue: bool,
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DerbyIntensity {
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerbyEffect {
    pub form_reliability: f64,
    pub motivation: f64,
    pub goal_scoring: f64,
    pub confidence_reduction: f64,
}

impl DerbyIntensity {
    pub fn effect(self) -> DerbyEffect {
        let (form_reliability, motivation, goal_scoring, confidence_reduction) = match self {
            DerbyIntensity::Low => (0.95, 1.05, 1.0, 2.0),
            DerbyIntensity::Medium => (0.90, 1.10, 0.97, 4.0),
            DerbyIntensity::High => (0.85, 1.15, 0.94, 6.0),
            DerbyIntensity::Extreme => (0.80, 1.20, 0.90, 8.0),
        };
        DerbyEffect {
            form_reliability,
            motivation,
            goal_scoring,
            confidence_reduction,
        }
    }

    fn goal_adjustment(self) -> f64 {
        match self {
            DerbyIntensity::Low => 0.0,
            DerbyIntensity::Medium => -1.0,
            DerbyIntensity::High => -2.0,
            DerbyIntensity::Extreme => -3.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerbyInfo {
    pub is_derby: bool,
    pub name: Option<String>,
    pub intensity: Option<DerbyIntensity>,
}

#[derive(Debug, Clone, Default)]
pub struct DerbyTable {
    pairs: HashMap<(String, String), (String, DerbyIntensity)>,
}

impl DerbyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> &'static DerbyTable {
        &BUILTIN_DERBIES
    }

    pub fn with_pair(mut self, a: &str, b: &str, name: &str, intensity: DerbyIntensity) -> Self {
        self.insert(a, b, name, intensity);
        self
    }

    pub fn insert(&mut self, a: &str, b: &str, name: &str, intensity: DerbyIntensity) {
        self.pairs.insert(pair_key(a, b), (name.to_string(), intensity));
    }

    pub fn lookup(&self, home: &str, away: &str) -> DerbyInfo {
        match self.pairs.get(&pair_key(home, away)) {
            Some((name, intensity)) => DerbyInfo {
                is_derby: true,
                name: Some(name.clone()),
                intensity: Some(*intensity),
            },
            None => DerbyInfo::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    let a = normalize_team_name(a);
    let b = normalize_team_name(b);
    if a <= b { (a, b) } else { (b, a) }
}

static BUILTIN_DERBIES: Lazy<DerbyTable> = Lazy::new(|| {
    use DerbyIntensity::*;
    let rows: &[(&str, &str, &str, DerbyIntensity)] = &[
        ("Manchester United", "Manchester City", "Manchester Derby", Extreme),
        ("Liverpool", "Everton", "Merseyside Derby", High),
        ("Arsenal", "Tottenham Hotspur", "North London Derby", Extreme),
        ("Chelsea", "Tottenham Hotspur", "London Derby", Medium),
        ("Liverpool", "Manchester United", "North West Derby", High),
        ("Newcastle United", "Sunderland", "Tyne-Wear Derby", High),
        ("Aston Villa", "Birmingham City", "Second City Derby", High),
        ("Crystal Palace", "Brighton & Hove Albion", "M23 Derby", Low),
        ("Real Madrid", "Barcelona", "El Clasico", Extreme),
        ("Real Madrid", "Atletico Madrid", "Madrid Derby", High),
        ("Sevilla", "Real Betis", "Seville Derby", Extreme),
        ("Barcelona", "Espanyol", "Barcelona Derby", Medium),
        ("Athletic Club", "Real Sociedad", "Basque Derby", Medium),
        ("Inter", "AC Milan", "Derby della Madonnina", Extreme),
        ("Roma", "Lazio", "Derby della Capitale", Extreme),
        ("Juventus", "Torino", "Derby della Mole", High),
        ("Juventus", "Inter", "Derby d'Italia", High),
        ("Borussia Dortmund", "Schalke 04", "Revierderby", Extreme),
        ("Bayern Munchen", "Borussia Dortmund", "Der Klassiker", High),
        ("Hamburger SV", "Werder Bremen", "Nordderby", Medium),
        ("Paris Saint-Germain", "Marseille", "Le Classique", Extreme),
        ("Lyon", "Saint-Etienne", "Derby du Rhone", High),
        ("Ajax", "Feyenoord", "De Klassieker", Extreme),
        ("PSV Eindhoven", "Ajax", "Topper", Medium),
        ("Benfica", "Sporting CP", "Derby de Lisboa", Extreme),
        ("Porto", "Benfica", "O Classico", High),
        ("Celtic", "Rangers", "Old Firm", Extreme),
        ("Galatasaray", "Fenerbahce", "Kitalararasi Derbi", Extreme),
        ("Boca Juniors", "River Plate", "Superclasico", Extreme),
    ];
    let mut table = DerbyTable::new();
    for (a, b, name, intensity) in rows {
        table.insert(a, b, name, *intensity);
    }
    table
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonPosition {
    pub round: Option<u32>,
    pub total_rounds: Option<u32>,
    pub progress: Option<f64>,
    pub is_early_season: bool,
    pub is_end_of_season: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentWeights {
    pub recent_form: f64,
    pub h2h: f64,
    pub home_advantage: f64,
    pub motivation: f64,
    pub goal_scoring: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextAdjustments {
    pub weights: AdjustmentWeights,
    /// Percentage points to take off a confidence score, 0..40.
    pub confidence_reduction: f64,
    /// Additive goal expectation nudge in percentage points, -10..10.
    pub goal_expectation_adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    pub match_type: MatchTypeInfo,
    pub derby: DerbyInfo,
    pub season: SeasonPosition,
    pub stakes: Option<SeasonStakes>,
    pub post_international_break: bool,
    pub adjustments: ContextAdjustments,
}

pub struct ContextInput<'a> {
    pub metadata: &'a MatchMetadata,
    pub home_name: &'a str,
    pub away_name: &'a str,
    pub home_quality: Option<&'a TeamQuality>,
    pub away_quality: Option<&'a TeamQuality>,
    pub home_rest_days: Option<u32>,
    pub away_rest_days: Option<u32>,
}

const FRIENDLY_KEYWORDS: &[&str] = &["friendl", "pre-season", "preseason", "testspiel"];
const CLUB_CUP_OVERRIDES: &[&str] = &["club world cup", "champions cup"];
const INTERNATIONAL_KEYWORDS: &[&str] = &[
    "world cup",
    "uefa euro",
    "european championship",
    "nations league",
    "copa america",
    "africa cup of nations",
    "asian cup",
    "gold cup",
    "international",
];
const CUP_KEYWORDS: &[&str] = &[
    "cup",
    "copa",
    "coupe",
    "pokal",
    "coppa",
    "taca",
    "taça",
    "beker",
    "trophy",
    "shield",
    "champions league",
    "europa league",
    "conference league",
    "libertadores",
    "sudamericana",
    "supercopa",
    "supercoppa",
];
const LEAGUE_PHASE_COMPETITIONS: &[&str] = &[
    "champions league",
    "europa league",
    "conference league",
    "libertadores",
    "sudamericana",
];
const KNOCKOUT_ROUND_KEYWORDS: &[&str] = &[
    "final",
    "semi",
    "quarter",
    "round of",
    "last 16",
    "1/8",
    "1/16",
    "play-off",
    "playoff",
    "knockout",
];

pub fn detect_match_type(
    league_name: &str,
    round: Option<&str>,
    neutral_venue: Option<bool>,
) -> MatchTypeInfo {
    let name = league_name.trim().to_lowercase();
    let round = round.map(|r| r.trim().to_lowercase()).unwrap_or_default();
    let has = |list: &[&str], s: &str| list.iter().any(|k| s.contains(k));

    let match_type = if has(FRIENDLY_KEYWORDS, &name) {
        MatchType::Friendly
    } else if has(CLUB_CUP_OVERRIDES, &name) {
        MatchType::Cup
    } else if has(INTERNATIONAL_KEYWORDS, &name) {
        MatchType::International
    } else if has(CUP_KEYWORDS, &name) {
        MatchType::Cup
    } else {
        MatchType::League
    };

    let knockout_round = has(KNOCKOUT_ROUND_KEYWORDS, &round);
    let group_round = round.contains("group") || round.contains("league stage");
    let is_qualifier = name.contains("qualif") || round.contains("qualif");
    let is_knockout = match match_type {
        MatchType::Cup => {
            if round.is_empty() {
                !has(LEAGUE_PHASE_COMPETITIONS, &name)
            } else {
                knockout_round || !(group_round || has(LEAGUE_PHASE_COMPETITIONS, &name))
            }
        }
        MatchType::International => knockout_round && !is_qualifier,
        MatchType::League => round.contains("play-off") || round.contains("playoff"),
        MatchType::Friendly => false,
    };
    let is_final = round.contains("final")
        && !round.contains("semi")
        && !round.contains("quarter")
        && !round.contains("1/");
    let is_neutral_venue = neutral_venue.unwrap_or(match match_type {
        MatchType::Cup => is_final,
        MatchType::International => !is_qualifier,
        _ => false,
    });

    MatchTypeInfo {
        match_type,
        is_knockout,
        is_neutral_venue,
        is_final,
    }
}

/// K-factor class for rating a settled fixture in this competition.
pub fn rating_class(league_name: &str, round: Option<&str>) -> CompetitionClass {
    detect_match_type(league_name, round, None)
        .match_type
        .competition_class()
}

pub fn season_position(round: Option<u32>, total_rounds: Option<u32>) -> SeasonPosition {
    let Some(round) = round else {
        return SeasonPosition {
            total_rounds,
            ..Default::default()
        };
    };
    let total = total_rounds.filter(|t| *t > 0);
    let progress = total.map(|t| (round as f64 / t as f64).clamp(0.0, 1.0));
    let is_early_season =
        round <= EARLY_SEASON_ROUNDS || progress.is_some_and(|p| p < EARLY_SEASON_PROGRESS);
    let is_end_of_season = total
        .is_some_and(|t| t.saturating_sub(round) < END_SEASON_ROUNDS_LEFT)
        || progress.is_some_and(|p| p > END_SEASON_PROGRESS);
    SeasonPosition {
        round: Some(round),
        total_rounds: total,
        progress,
        is_early_season,
        is_end_of_season,
    }
}

pub fn is_post_international_break(
    flagged: Option<bool>,
    home_rest_days: Option<u32>,
    away_rest_days: Option<u32>,
) -> bool {
    if flagged == Some(true) {
        return true;
    }
    [home_rest_days, away_rest_days]
        .into_iter()
        .flatten()
        .any(|d| d > BREAK_REST_DAYS)
}

fn base_weights(info: &MatchTypeInfo) -> (AdjustmentWeights, f64) {
    let (mut w, mut conf) = match info.match_type {
        MatchType::League => (
            AdjustmentWeights {
                recent_form: 1.0,
                h2h: 1.0,
                home_advantage: 1.0,
                motivation: 1.0,
                goal_scoring: 1.0,
            },
            0.0,
        ),
        MatchType::Cup => (
            AdjustmentWeights {
                recent_form: 0.9,
                h2h: 0.9,
                home_advantage: 0.9,
                motivation: 1.1,
                goal_scoring: 0.95,
            },
            5.0,
        ),
        MatchType::International => (
            AdjustmentWeights {
                recent_form: 0.8,
                h2h: 0.7,
                home_advantage: 0.6,
                motivation: 1.1,
                goal_scoring: 0.95,
            },
            8.0,
        ),
        MatchType::Friendly => (
            AdjustmentWeights {
                recent_form: 0.6,
                h2h: 0.5,
                home_advantage: 0.8,
                motivation: 0.6,
                goal_scoring: 1.1,
            },
            15.0,
        ),
    };
    if info.is_neutral_venue {
        w.home_advantage = w.home_advantage.min(0.5);
    }
    if info.is_knockout {
        conf += 3.0;
    }
    (w, conf)
}

pub fn analyze(input: &ContextInput<'_>, derbies: &DerbyTable) -> MatchContext {
    let meta = input.metadata;
    let match_type = detect_match_type(&meta.league_name, meta.round.as_deref(), meta.neutral_venue);
    let derby = derbies.lookup(input.home_name, input.away_name);
    let season = if match_type.match_type == MatchType::League {
        season_position(meta.resolved_round(), meta.total_rounds)
    } else {
        SeasonPosition::default()
    };

    // Table position only means something in a league.
    let stakes = match (
        match_type.match_type,
        season.is_end_of_season,
        meta.home_position,
        meta.away_position,
        input.home_quality,
        input.away_quality,
    ) {
        (MatchType::League, true, Some(hp), Some(ap), Some(hq), Some(aq)) => {
            Some(season_stakes::evaluate(&StakesInput {
                home_position: hp,
                away_position: ap,
                team_count: meta.team_count,
                rounds_remaining: season
                    .total_rounds
                    .zip(season.round)
                    .map(|(t, r)| t.saturating_sub(r)),
                home_quality: hq,
                away_quality: aq,
            }))
        }
        _ => None,
    };

    let post_break = is_post_international_break(
        meta.after_international_break,
        input.home_rest_days,
        input.away_rest_days,
    );

    let (mut w, mut conf) = base_weights(&match_type);

    if let Some(intensity) = derby.intensity {
        let fx = intensity.effect();
        w.recent_form *= fx.form_reliability;
        w.motivation *= fx.motivation;
        w.goal_scoring *= fx.goal_scoring;
        conf += fx.confidence_reduction;
    }

    if season.is_early_season {
        w.recent_form *= 0.8;
        w.h2h *= 1.15;
        conf += 5.0;
    }

    if season.is_end_of_season {
        match &stakes {
            Some(s) => {
                w.motivation *= 1.0 + 0.3 * s.motivation_gap.abs() / 100.0;
                if s.is_six_pointer {
                    conf += 5.0;
                }
            }
            None => {
                w.motivation *= 1.0
                    + season_stakes::position_heuristic(
                        meta.home_position,
                        meta.away_position,
                        meta.team_count,
                    );
            }
        }
    }

    if post_break {
        w.recent_form *= 0.85;
        conf += 3.0;
    }

    let goal_adjustment = goal_expectation_adjustment(&match_type, &derby, &season, stakes.as_ref());

    MatchContext {
        match_type,
        derby,
        season,
        stakes,
        post_international_break: post_break,
        adjustments: ContextAdjustments {
            weights: clamp_weights(w),
            confidence_reduction: clamp_finite(conf, 0.0, CONFIDENCE_REDUCTION_MAX),
            goal_expectation_adjustment: goal_adjustment,
        },
    }
}

fn goal_expectation_adjustment(
    info: &MatchTypeInfo,
    derby: &DerbyInfo,
    season: &SeasonPosition,
    stakes: Option<&SeasonStakes>,
) -> f64 {
    let mut adj = 0.0;
    match info.match_type {
        MatchType::Friendly => adj += 5.0,
        MatchType::Cup if info.is_knockout => adj -= 3.0,
        MatchType::International => adj -= 2.0,
        _ => {}
    }
    if let Some(intensity) = derby.intensity {
        adj += intensity.goal_adjustment();
    }
    if info.is_final {
        adj -= 5.0;
    }
    if season.is_end_of_season {
        adj += stakes.map_or(1.0, |s| s.goals_adjustment);
    }
    clamp_finite(adj, -GOAL_ADJUSTMENT_BOUND, GOAL_ADJUSTMENT_BOUND)
}

fn clamp_weights(w: AdjustmentWeights) -> AdjustmentWeights {
    let c = |v: f64| clamp_finite(v, WEIGHT_MIN, WEIGHT_MAX);
    AdjustmentWeights {
        recent_form: c(w.recent_form),
        h2h: c(w.h2h),
        home_advantage: c(w.home_advantage),
        motivation: c(w.motivation),
        goal_scoring: c(w.goal_scoring),
    }
}

fn clamp_finite(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_finite() { v.clamp(lo, hi) } else { lo.max(0.0).min(hi) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team_quality::assess_team;

    fn meta(league: &str, round: Option<&str>) -> MatchMetadata {
        MatchMetadata {
            league_name: league.to_string(),
            round: round.map(str::to_string),
            ..Default::default()
        }
    }

    fn input<'a>(m: &'a MatchMetadata, home: &'a str, away: &'a str) -> ContextInput<'a> {
        ContextInput {
            metadata: m,
            home_name: home,
            away_name: away,
            home_quality: None,
            away_quality: None,
            home_rest_days: None,
            away_rest_days: None,
        }
    }

    #[test]
    fn detects_match_types() {
        let t = detect_match_type("Premier League", Some("Regular Season - 3"), None);
        assert_eq!(t.match_type, MatchType::League);
        assert!(!t.is_knockout && !t.is_neutral_venue);

        let t = detect_match_type("FA Cup", Some("Final"), None);
        assert_eq!(t.match_type, MatchType::Cup);
        assert!(t.is_knockout && t.is_final && t.is_neutral_venue);

        let t = detect_match_type("UEFA Champions League", Some("League Stage - 2"), None);
        assert_eq!(t.match_type, MatchType::Cup);
        assert!(!t.is_knockout);

        let t = detect_match_type("Copa America", Some("Quarter-finals"), None);
        assert_eq!(t.match_type, MatchType::International);
        assert!(t.is_knockout && !t.is_final);

        let t = detect_match_type("World Cup - Qualification Europe", Some("Group A - 4"), None);
        assert_eq!(t.match_type, MatchType::International);
        assert!(!t.is_neutral_venue);

        let t = detect_match_type("Club Friendlies", None, Some(true));
        assert_eq!(t.match_type, MatchType::Friendly);
        assert!(t.is_neutral_venue);

        let t = detect_match_type("FIFA Club World Cup", Some("Round of 16"), None);
        assert_eq!(t.match_type, MatchType::Cup);
    }

    #[test]
    fn derby_lookup_is_order_and_spelling_insensitive() {
        let table = DerbyTable::builtin();
        let d = table.lookup("Tottenham Hotspur", "Arsenal FC");
        assert!(d.is_derby);
        assert_eq!(d.intensity, Some(DerbyIntensity::Extreme));
        assert!(!table.lookup("Arsenal", "Brentford").is_derby);

        let custom = DerbyTable::new().with_pair("Brentford", "Fulham", "West London", DerbyIntensity::Low);
        assert!(custom.lookup("Fulham", "Brentford").is_derby);
    }

    #[test]
    fn season_position_windows() {
        let p = season_position(Some(3), Some(38));
        assert!(p.is_early_season && !p.is_end_of_season);
        let p = season_position(Some(35), Some(38));
        assert!(p.is_end_of_season);
        let p = season_position(Some(20), Some(38));
        assert!(!p.is_early_season && !p.is_end_of_season);
        let p = season_position(None, Some(38));
        assert!(!p.is_early_season && !p.is_end_of_season);
    }

    #[test]
    fn end_of_season_by_rounds_left_or_progress() {
        // four rounds left at 60% progress
        let p = season_position(Some(6), Some(10));
        assert!(p.is_end_of_season);
        assert_eq!(p.progress, Some(0.6));
        // fifteen rounds left, progress decides
        assert!(!season_position(Some(85), Some(100)).is_end_of_season);
        assert!(season_position(Some(86), Some(100)).is_end_of_season);
        // exactly five left and under 85%
        assert!(!season_position(Some(25), Some(30)).is_end_of_season);
    }

    #[test]
    fn break_detection() {
        assert!(is_post_international_break(Some(true), None, None));
        assert!(is_post_international_break(None, Some(15), Some(3)));
        assert!(!is_post_international_break(Some(false), Some(14), Some(7)));
    }

    #[test]
    fn plain_league_match_is_neutral() {
        let m = meta("Premier League", Some("Regular Season - 20"));
        let ctx = analyze(&input(&m, "Brentford", "Fulham"), DerbyTable::builtin());
        let w = ctx.adjustments.weights;
        assert_eq!(w.recent_form, 1.0);
        assert_eq!(w.h2h, 1.0);
        assert_eq!(ctx.adjustments.confidence_reduction, 0.0);
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, 0.0);
        assert!(ctx.stakes.is_none());
    }

    #[test]
    fn derby_in_early_season_compounds() {
        let m = MatchMetadata {
            total_rounds: Some(38),
            ..meta("Premier League", Some("Regular Season - 2"))
        };
        let ctx = analyze(&input(&m, "Manchester United", "Manchester City"), DerbyTable::builtin());
        let w = ctx.adjustments.weights;
        assert!((w.recent_form - 0.8 * 0.8).abs() < 1e-9);
        assert!((w.h2h - 1.15).abs() < 1e-9);
        assert!((w.motivation - 1.2).abs() < 1e-9);
        assert_eq!(ctx.adjustments.confidence_reduction, 13.0);
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, -3.0);
    }

    #[test]
    fn stakes_only_for_league_with_quality() {
        let q = assess_team(&[], 5, None);
        let m = MatchMetadata {
            total_rounds: Some(38),
            home_position: Some(17),
            away_position: Some(18),
            ..meta("Premier League", Some("Regular Season - 36"))
        };
        let mut inp = input(&m, "Luton", "Burnley");
        let without = analyze(&inp, DerbyTable::builtin());
        assert!(without.stakes.is_none());
        assert_eq!(without.adjustments.goal_expectation_adjustment, 1.0);

        inp.home_quality = Some(&q);
        inp.away_quality = Some(&q);
        let with = analyze(&inp, DerbyTable::builtin());
        let s = with.stakes.expect("league end of season computes stakes");
        assert!(s.is_six_pointer);
        assert_eq!(with.adjustments.confidence_reduction, 5.0);
        assert!(with.adjustments.weights.motivation > 1.0);

        let cup = MatchMetadata {
            league_name: "FA Cup".to_string(),
            ..m.clone()
        };
        let mut inp = input(&cup, "Luton", "Burnley");
        inp.home_quality = Some(&q);
        inp.away_quality = Some(&q);
        assert!(analyze(&inp, DerbyTable::builtin()).stakes.is_none());
    }

    #[test]
    fn end_of_season_motivation_scales_with_gap() {
        let q = assess_team(&[], 5, None);
        let m = MatchMetadata {
            total_rounds: Some(38),
            home_position: Some(1),
            away_position: Some(11),
            team_count: Some(20),
            ..meta("Premier League", Some("Regular Season - 36"))
        };
        let mut inp = input(&m, "Arsenal", "Brentford");
        inp.home_quality = Some(&q);
        inp.away_quality = Some(&q);
        let ctx = analyze(&inp, DerbyTable::builtin());
        let s = ctx.stakes.expect("stakes at end of season");
        // title race at 100 against mid-table at 20
        assert_eq!(s.motivation_gap, 80.0);
        assert!((ctx.adjustments.weights.motivation - 1.24).abs() < 1e-12);
        assert_eq!(ctx.adjustments.confidence_reduction, 0.0);
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, 1.0);
    }

    #[test]
    fn knockout_cup_and_international_goal_adjustments() {
        let m = meta("FA Cup", Some("Round of 16"));
        let ctx = analyze(&input(&m, "A", "B"), DerbyTable::builtin());
        assert!(ctx.match_type.is_knockout && !ctx.match_type.is_final);
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, -3.0);
        assert_eq!(ctx.adjustments.confidence_reduction, 8.0);

        let m = meta("World Cup - Qualification Europe", Some("Group A - 4"));
        let ctx = analyze(&input(&m, "A", "B"), DerbyTable::builtin());
        assert_eq!(ctx.match_type.match_type, MatchType::International);
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, -2.0);
        assert_eq!(ctx.adjustments.confidence_reduction, 8.0);
    }

    #[test]
    fn stacked_goal_adjustments_are_clamped() {
        // knockout -3, extreme derby -3, final -5
        let table = DerbyTable::new().with_pair("Rangers", "Celtic", "Old Firm", DerbyIntensity::Extreme);
        let m = meta("Scottish Cup", Some("Final"));
        let ctx = analyze(&input(&m, "Rangers", "Celtic"), &table);
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, -10.0);
        assert_eq!(ctx.adjustments.confidence_reduction, 16.0);
    }

    #[test]
    fn rating_class_follows_match_type() {
        assert_eq!(rating_class("Premier League", None), CompetitionClass::League);
        assert_eq!(rating_class("Copa del Rey", Some("Semi-finals")), CompetitionClass::Cup);
        assert_eq!(rating_class("Nations League", None), CompetitionClass::International);
        assert_eq!(rating_class("Club Friendlies", None), CompetitionClass::League);
    }

    #[test]
    fn friendly_and_final_goal_adjustments() {
        let m = meta("Club Friendlies", None);
        let ctx = analyze(&input(&m, "A", "B"), DerbyTable::builtin());
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, 5.0);
        assert_eq!(ctx.adjustments.confidence_reduction, 15.0);

        let m = meta("FA Cup", Some("Final"));
        let ctx = analyze(&input(&m, "A", "B"), DerbyTable::builtin());
        assert_eq!(ctx.adjustments.goal_expectation_adjustment, -8.0);
        assert_eq!(ctx.adjustments.weights.home_advantage, 0.5);
    }

    #[test]
    fn post_break_dampens_form() {
        let m = meta("Serie A", Some("Regular Season - 12"));
        let mut inp = input(&m, "A", "B");
        inp.home_rest_days = Some(16);
        let ctx = analyze(&inp, DerbyTable::builtin());
        assert!(ctx.post_international_break);
        assert!((ctx.adjustments.weights.recent_form - 0.85).abs() < 1e-9);
        assert_eq!(ctx.adjustments.confidence_reduction, 3.0);
    }
}
