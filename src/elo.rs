use std::collections::HashMap;

use chrono::NaiveDate;

use crate::team_fixtures::TeamRating;

pub const BASE_RATING: f64 = 1500.0;
pub const DEFAULT_HOME_ADVANTAGE: f64 = 60.0;
pub const FULL_CONFIDENCE_GAMES: u32 = 50;

const GAP_SCALE_POINTS: f64 = 50.0;
const GAP_SCALE_SHIFT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompetitionClass {
    League,
    Cup,
    International,
}

impl CompetitionClass {
    pub fn k_factor(self) -> f64 {
        match self {
            CompetitionClass::League => 20.0,
            CompetitionClass::Cup => 18.0,
            CompetitionClass::International => 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EloConfig {
    pub home_adv_pts: f64,
    pub season_regression: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            home_adv_pts: DEFAULT_HOME_ADVANTAGE,
            season_regression: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloUpdate {
    pub home_rating: f64,
    pub away_rating: f64,
    pub home_delta: f64,
    pub away_delta: f64,
}

pub fn expected_score(r_a: f64, r_b: f64, home_advantage: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b + home_advantage) / 400.0))
}

pub fn goal_multiplier(goal_diff: i32) -> f64 {
    let margin = goal_diff.unsigned_abs() as f64;
    if margin <= 1.0 {
        return 1.0;
    }
    (1.0 + (margin - 1.0) * 0.25).clamp(1.0, 1.5)
}

/// `goal_diff` is home goals minus away goals.
pub fn update(
    home_rating: f64,
    away_rating: f64,
    class: CompetitionClass,
    goal_diff: i32,
    home_advantage: f64,
) -> EloUpdate {
    let expected_home = expected_score(home_rating, away_rating, home_advantage);
    let actual_home = match goal_diff.signum() {
        1 => 1.0,
        0 => 0.5,
        _ => 0.0,
    };

    let delta = class.k_factor() * goal_multiplier(goal_diff) * (actual_home - expected_home);
    let delta = if delta.is_finite() { delta } else { 0.0 };
    EloUpdate {
        home_rating: home_rating + delta,
        away_rating: away_rating - delta,
        home_delta: delta,
        away_delta: -delta,
    }
}

pub fn season_regression(rating: f64, factor: f64) -> f64 {
    let f = factor.clamp(0.0, 0.3);
    BASE_RATING + (rating - BASE_RATING) * (1.0 - f)
}

pub fn confidence(games_played: u32, full_games: u32) -> f64 {
    if full_games == 0 {
        return 1.0;
    }
    (games_played as f64 / full_games as f64).clamp(0.0, 1.0)
}

/// Rating-gap nudge in percentage points, damped by sample confidence.
pub fn gap_adjustment(elo_gap: f64, confidence: f64, max_points: f64) -> f64 {
    bounded_nudge(elo_gap, GAP_SCALE_POINTS, confidence, max_points)
}

/// Rating-gap nudge as a probability share.
pub fn balance_shift(elo_gap: f64, confidence: f64, max_shift: f64) -> f64 {
    bounded_nudge(elo_gap, GAP_SCALE_SHIFT, confidence, max_shift)
}

fn bounded_nudge(gap: f64, scale: f64, confidence: f64, bound: f64) -> f64 {
    if !gap.is_finite() || !confidence.is_finite() {
        return 0.0;
    }
    let normalized = (gap / scale).clamp(-1.0, 1.0);
    (normalized * bound * confidence.clamp(0.0, 1.0)).clamp(-bound.abs(), bound.abs())
}

/// Seed rating for a team entering the book from association/club coefficients
/// and its division.
pub fn starting_rating(
    association_coefficient: Option<f64>,
    club_coefficient: Option<f64>,
    division_offset: Option<f64>,
) -> f64 {
    let assoc = association_coefficient
        .filter(|c| c.is_finite())
        .map(|c| ((c - 30.0) * 2.0).clamp(-120.0, 120.0))
        .unwrap_or(0.0);
    let club = club_coefficient
        .filter(|c| c.is_finite())
        .map(|c| ((c - 40.0) * 2.0).clamp(-80.0, 120.0))
        .unwrap_or(0.0);
    let division = division_offset.filter(|d| d.is_finite()).unwrap_or(0.0);
    BASE_RATING + assoc + club + division
}

pub fn division_offset(level: u8) -> f64 {
    match level {
        1 => 0.0,
        2 => -120.0,
        3 => -200.0,
        4 => -260.0,
        _ => -280.0,
    }
}

const YOUTH_KEYWORDS: &[&str] = &[
    "u17", "u18", "u19", "u20", "u21", "u23", "youth", "primavera", "reserve", "premier league 2",
    "juniores", "next pro",
];

// Checked in order; more specific names sit above the top-flight names they contain.
const DIVISION_KEYWORDS: &[(&str, u8)] = &[
    ("national league north", 6),
    ("national league south", 6),
    ("national league", 5),
    ("league two", 4),
    ("regionalliga", 4),
    ("serie d", 4),
    ("fourth division", 4),
    ("league one", 3),
    ("3. liga", 3),
    ("serie c", 3),
    ("championnat national", 3),
    ("primera rfef", 3),
    ("third division", 3),
    ("championship", 2),
    ("2. bundesliga", 2),
    ("segunda", 2),
    ("serie b", 2),
    ("ligue 2", 2),
    ("eerste divisie", 2),
    ("liga portugal 2", 2),
    ("1. lig", 2),
    ("second division", 2),
    ("premier league", 1),
    ("la liga", 1),
    ("laliga", 1),
    ("primera division", 1),
    ("serie a", 1),
    ("bundesliga", 1),
    ("ligue 1", 1),
    ("eredivisie", 1),
    ("primeira liga", 1),
    ("liga portugal", 1),
    ("super lig", 1),
    ("jupiler pro league", 1),
    ("first division", 1),
    ("premiership", 1),
];

/// Division level from a league name, `None` for youth competitions and
/// names that carry no recognisable division keyword.
pub fn infer_division_level(league_name: &str) -> Option<u8> {
    let name = league_name.trim().to_lowercase();
    if name.is_empty() || YOUTH_KEYWORDS.iter().any(|k| name.contains(k)) {
        return None;
    }
    DIVISION_KEYWORDS
        .iter()
        .find(|(k, _)| name.contains(k))
        .map(|(_, level)| *level)
}

pub fn division_offset_for_league(league_name: &str) -> Option<f64> {
    infer_division_level(league_name).map(division_offset)
}

#[derive(Debug, Clone)]
pub struct SettledFixture {
    pub date: NaiveDate,
    pub home_id: u32,
    pub away_id: u32,
    pub home_goals: u8,
    pub away_goals: u8,
    pub class: CompetitionClass,
}

/// Per-team ratings replayed from settled fixtures.
#[derive(Debug, Clone, Default)]
pub struct EloBook {
    ratings: HashMap<u32, TeamRating>,
    cfg: EloConfig,
}

impl EloBook {
    pub fn new(cfg: EloConfig) -> Self {
        Self {
            ratings: HashMap::new(),
            cfg,
        }
    }

    pub fn rating(&self, team_id: u32) -> TeamRating {
        self.ratings.get(&team_id).copied().unwrap_or(TeamRating {
            rating: BASE_RATING,
            games_played: Some(0),
            confidence: None,
        })
    }

    pub fn seed(&mut self, team_id: u32, rating: f64) {
        self.ratings.entry(team_id).or_insert(TeamRating {
            rating,
            games_played: Some(0),
            confidence: None,
        });
    }

    pub fn record(&mut self, fixture: &SettledFixture) -> EloUpdate {
        let home = self.rating(fixture.home_id);
        let away = self.rating(fixture.away_id);
        let goal_diff = fixture.home_goals as i32 - fixture.away_goals as i32;
        let out = update(
            home.rating,
            away.rating,
            fixture.class,
            goal_diff,
            self.cfg.home_adv_pts,
        );
        self.ratings.insert(fixture.home_id, advance(home, out.home_rating));
        self.ratings.insert(fixture.away_id, advance(away, out.away_rating));
        out
    }

    /// Replays fixtures in date order (ties broken by home id).
    pub fn replay(&mut self, fixtures: &[SettledFixture]) {
        let mut ordered: Vec<&SettledFixture> = fixtures.iter().collect();
        ordered.sort_by(|a, b| a.date.cmp(&b.date).then(a.home_id.cmp(&b.home_id)));
        for f in ordered {
            self.record(f);
        }
    }

    pub fn regress_season(&mut self) {
        let factor = self.cfg.season_regression;
        for r in self.ratings.values_mut() {
            r.rating = season_regression(r.rating, factor);
        }
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

fn advance(prev: TeamRating, rating: f64) -> TeamRating {
    let games = prev.games_played.unwrap_or(0).saturating_add(1);
    TeamRating {
        rating,
        games_played: Some(games),
        confidence: Some(confidence(games, FULL_CONFIDENCE_GAMES)),
    }
}
