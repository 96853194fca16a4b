use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::elo::{self, DEFAULT_HOME_ADVANTAGE, FULL_CONFIDENCE_GAMES};
use crate::error::{InsightsError, Result};
use crate::features::{FeatureInputs, FeatureSet, TierGapMode, build_features};
use crate::h2h::{self, H2HSummary};
use crate::markets::Market;
use crate::match_context::{self, ContextInput, DerbyTable, MatchContext};
use crate::model_registry::ModelRegistry;
use crate::team_fixtures::{FixtureInput, TeamRecord};
use crate::team_quality::{
    FORM_WINDOW, MIND_SUFFICIENT_MATCHES, MOOD_DEFAULT_WINDOW, TeamQuality, assess_team,
    data_quality_multiplier, mood_layer, regression_risk,
};

const MIN_RECENT_FORM: usize = 5;
const HIGH_RATING_CONFIDENCE: f64 = 0.6;
const H2H_SOME: usize = 3;
const H2H_PLENTY: usize = 5;
const HIGH_SCORE: u32 = 6;
const MEDIUM_SCORE: u32 = 3;
/// Largest home/away share moved by the optional rating nudge.
pub const MAX_RATING_SHIFT: f64 = 0.08;
const PROB_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: u32) -> ConfidenceLevel {
        if score >= HIGH_SCORE {
            ConfidenceLevel::High
        } else if score >= MEDIUM_SCORE {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MarketPrediction {
    Result {
        home: f64,
        draw: f64,
        away: f64,
        confidence: ConfidenceLevel,
    },
    BothScore {
        yes: f64,
        no: f64,
        confidence: ConfidenceLevel,
    },
    Goals {
        over: f64,
        under: f64,
        line: f64,
        confidence: ConfidenceLevel,
    },
}

impl MarketPrediction {
    pub fn confidence(&self) -> ConfidenceLevel {
        match self {
            MarketPrediction::Result { confidence, .. }
            | MarketPrediction::BothScore { confidence, .. }
            | MarketPrediction::Goals { confidence, .. } => *confidence,
        }
    }

    /// Outcome probabilities in output order.
    pub fn probabilities(&self) -> Vec<f64> {
        match *self {
            MarketPrediction::Result { home, draw, away, .. } => vec![home, draw, away],
            MarketPrediction::BothScore { yes, no, .. } => vec![yes, no],
            MarketPrediction::Goals { over, under, .. } => vec![over, under],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightsOptions {
    pub mood_window: usize,
    pub tier_gap_mode: TierGapMode,
    pub rating_nudge: bool,
    pub home_advantage: f64,
    pub include_context: bool,
}

impl Default for InsightsOptions {
    fn default() -> Self {
        Self {
            mood_window: MOOD_DEFAULT_WINDOW,
            tier_gap_mode: TierGapMode::PerTeam,
            rating_nudge: false,
            home_advantage: DEFAULT_HOME_ADVANTAGE,
            include_context: true,
        }
    }
}

/// Inputs to the eight confidence checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceSignals {
    pub home_recent: usize,
    pub away_recent: usize,
    pub home_mind_matches: usize,
    pub away_mind_matches: usize,
    pub home_rating_confidence: f64,
    pub away_rating_confidence: f64,
    pub h2h_matches: usize,
}

impl ConfidenceSignals {
    pub fn score(&self) -> u32 {
        [
            self.home_recent >= MIN_RECENT_FORM,
            self.away_recent >= MIN_RECENT_FORM,
            self.home_mind_matches >= MIND_SUFFICIENT_MATCHES,
            self.away_mind_matches >= MIND_SUFFICIENT_MATCHES,
            self.home_rating_confidence >= HIGH_RATING_CONFIDENCE,
            self.away_rating_confidence >= HIGH_RATING_CONFIDENCE,
            self.h2h_matches >= H2H_SOME,
            self.h2h_matches >= H2H_PLENTY,
        ]
        .into_iter()
        .filter(|ok| *ok)
        .count() as u32
    }

    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.score())
    }
}

/// Explicit confidence wins, then games played, else zero.
pub fn rating_confidence(team: &TeamRecord) -> f64 {
    team.rating
        .and_then(|r| {
            r.confidence
                .or_else(|| r.games_played.map(|g| elo::confidence(g, FULL_CONFIDENCE_GAMES)))
        })
        .filter(|c| c.is_finite())
        .map_or(0.0, |c| c.clamp(0.0, 1.0))
}

/// Quality computed from the history, with any supplied Mind/Mood summary
/// taking precedence over the recomputed layer.
pub fn resolve_quality(team: &TeamRecord, mood_window: usize) -> TeamQuality {
    let mut quality = assess_team(&team.matches, mood_window, team.seasons_in_league);
    if let Some(mind) = &team.mind {
        quality.mind = mind.clone();
        // Gap flags must be measured against the Mind actually used.
        quality.mood = mood_layer(&team.matches, mind, mood_window, team.seasons_in_league);
    }
    if let Some(mood) = &team.mood {
        quality.mood = mood.clone();
    }
    if team.mind.is_some() || team.mood.is_some() {
        quality.regression_risk = regression_risk(quality.mind.tier, quality.win_streak);
        quality.data_quality = data_quality_multiplier(
            quality.mind.match_count,
            team.matches.len().min(FORM_WINDOW).max(quality.mood.sample_size),
        );
    }
    quality
}

/// Moves probability between home and away, draw untouched, then
/// re-normalises.
pub fn apply_rating_nudge(probs: [f64; 3], shift: f64) -> [f64; 3] {
    let [home, draw, away] = probs;
    normalize3([(home + shift).max(PROB_FLOOR), draw, (away - shift).max(PROB_FLOOR)])
}

fn normalize3(probs: [f64; 3]) -> [f64; 3] {
    let clean = probs.map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 });
    let sum: f64 = clean.iter().sum();
    if sum <= 0.0 {
        return [1.0 / 3.0; 3];
    }
    clean.map(|p| p / sum)
}

fn unit_prob(p: f64) -> f64 {
    if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.5 }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamSnapshot {
    pub name: String,
    pub quality: TeamQuality,
    pub rating_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsReport {
    pub home: TeamSnapshot,
    pub away: TeamSnapshot,
    pub confidence: ConfidenceLevel,
    pub h2h: H2HSummary,
    pub predictions: BTreeMap<Market, MarketPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<MatchContext>,
}

pub struct InsightsEngine<'a> {
    registry: &'a ModelRegistry,
    derbies: &'a DerbyTable,
    options: InsightsOptions,
}

impl<'a> InsightsEngine<'a> {
    pub fn new(registry: &'a ModelRegistry, options: InsightsOptions) -> Self {
        Self {
            registry,
            derbies: DerbyTable::builtin(),
            options,
        }
    }

    pub fn with_derbies(mut self, derbies: &'a DerbyTable) -> Self {
        self.derbies = derbies;
        self
    }

    pub fn options(&self) -> &InsightsOptions {
        &self.options
    }

    /// Every market the registry has a model for.
    pub fn analyze(&self, fixture: &FixtureInput) -> Result<InsightsReport> {
        self.analyze_markets(fixture, &self.registry.markets())
    }

    pub fn analyze_markets(&self, fixture: &FixtureInput, markets: &[Market]) -> Result<InsightsReport> {
        let opts = &self.options;
        let home_quality = resolve_quality(&fixture.home, opts.mood_window);
        let away_quality = resolve_quality(&fixture.away, opts.mood_window);
        let h2h = h2h::summarize(
            fixture.h2h.as_ref(),
            &fixture.home.name,
            &fixture.away.name,
            fixture.metadata.date,
        );

        let features = build_features(&FeatureInputs {
            fixture,
            home_quality: &home_quality,
            away_quality: &away_quality,
            h2h: &h2h,
            tier_gap_mode: opts.tier_gap_mode,
        });

        let signals = ConfidenceSignals {
            home_recent: fixture.home.matches.len().min(FORM_WINDOW),
            away_recent: fixture.away.matches.len().min(FORM_WINDOW),
            home_mind_matches: home_quality.mind.match_count,
            away_mind_matches: away_quality.mind.match_count,
            home_rating_confidence: rating_confidence(&fixture.home),
            away_rating_confidence: rating_confidence(&fixture.away),
            h2h_matches: h2h.overall.matches,
        };
        let confidence = signals.level();

        let mut predictions = BTreeMap::new();
        for market in markets {
            let prediction = self.predict_market(*market, &features, fixture, confidence)?;
            predictions.insert(*market, prediction);
        }

        let context = opts.include_context.then(|| {
            match_context::analyze(
                &ContextInput {
                    metadata: &fixture.metadata,
                    home_name: &fixture.home.name,
                    away_name: &fixture.away.name,
                    home_quality: Some(&home_quality),
                    away_quality: Some(&away_quality),
                    home_rest_days: fixture.home.rest_days(fixture.metadata.date),
                    away_rest_days: fixture.away.rest_days(fixture.metadata.date),
                },
                self.derbies,
            )
        });

        Ok(InsightsReport {
            home: TeamSnapshot {
                name: fixture.home.name.clone(),
                quality: home_quality,
                rating_confidence: signals.home_rating_confidence,
            },
            away: TeamSnapshot {
                name: fixture.away.name.clone(),
                quality: away_quality,
                rating_confidence: signals.away_rating_confidence,
            },
            confidence,
            h2h,
            predictions,
            context,
        })
    }

    pub fn predict_market(
        &self,
        market: Market,
        features: &FeatureSet,
        fixture: &FixtureInput,
        confidence: ConfidenceLevel,
    ) -> Result<MarketPrediction> {
        let model = self.registry.get(market)?;
        let vector = features.vector_for(model);
        let probs = model.predict(&vector)?;
        debug!(
            market = %market,
            missing = vector.missing_count(),
            probs = ?probs,
            "market inference"
        );

        match market {
            Market::OneXTwo => {
                let [home, draw, away] = <[f64; 3]>::try_from(probs.as_slice()).map_err(|_| {
                    InsightsError::InvalidObjective(format!(
                        "{market} needs 3 class outputs, model gives {}",
                        probs.len()
                    ))
                })?;
                let mut out = normalize3([home, draw, away]);
                if self.options.rating_nudge {
                    out = apply_rating_nudge(out, self.rating_shift(fixture));
                }
                Ok(MarketPrediction::Result {
                    home: out[0],
                    draw: out[1],
                    away: out[2],
                    confidence,
                })
            }
            Market::Btts => {
                let yes = unit_prob(single_output(market, &probs)?);
                Ok(MarketPrediction::BothScore {
                    yes,
                    no: 1.0 - yes,
                    confidence,
                })
            }
            Market::OverUnder(_) => {
                let over = unit_prob(single_output(market, &probs)?);
                Ok(MarketPrediction::Goals {
                    over,
                    under: 1.0 - over,
                    line: market.goal_line().unwrap_or_default(),
                    confidence,
                })
            }
        }
    }

    fn rating_shift(&self, fixture: &FixtureInput) -> f64 {
        let (Some(home), Some(away)) = (fixture.home.rating, fixture.away.rating) else {
            return 0.0;
        };
        let gap = home.rating + self.options.home_advantage - away.rating;
        let conf = rating_confidence(&fixture.home).min(rating_confidence(&fixture.away));
        elo::balance_shift(gap, conf, MAX_RATING_SHIFT)
    }
}

fn single_output(market: Market, probs: &[f64]) -> Result<f64> {
    match probs {
        [p] => Ok(*p),
        _ => Err(InsightsError::InvalidObjective(format!(
            "{market} needs a single binary output, model gives {}",
            probs.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team_fixtures::TeamRating;

    fn signals() -> ConfidenceSignals {
        ConfidenceSignals {
            home_recent: 10,
            away_recent: 10,
            home_mind_matches: 10,
            away_mind_matches: 10,
            home_rating_confidence: 0.0,
            away_rating_confidence: 0.0,
            h2h_matches: 0,
        }
    }

    #[test]
    fn confidence_thresholds() {
        assert_eq!(signals().score(), 2);
        assert_eq!(signals().level(), ConfidenceLevel::Low);

        let medium = ConfidenceSignals {
            h2h_matches: 3,
            ..signals()
        };
        assert_eq!(medium.level(), ConfidenceLevel::Medium);

        let high = ConfidenceSignals {
            home_mind_matches: 40,
            away_mind_matches: 40,
            h2h_matches: 5,
            ..signals()
        };
        assert_eq!(high.score(), 6);
        assert_eq!(high.level(), ConfidenceLevel::High);
    }

    #[test]
    fn rating_confidence_prefers_explicit_value() {
        let mut team = TeamRecord {
            name: "A".to_string(),
            ..Default::default()
        };
        assert_eq!(rating_confidence(&team), 0.0);
        team.rating = Some(TeamRating {
            rating: 1600.0,
            games_played: Some(25),
            confidence: None,
        });
        assert!((rating_confidence(&team) - 0.5).abs() < 1e-12);
        team.rating = Some(TeamRating {
            rating: 1600.0,
            games_played: Some(25),
            confidence: Some(0.9),
        });
        assert_eq!(rating_confidence(&team), 0.9);
    }

    #[test]
    fn nudge_keeps_draw_share_and_sums_to_one() {
        let out = apply_rating_nudge([0.4, 0.3, 0.3], 0.05);
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((out[0] - 0.45).abs() < 1e-12);
        assert!((out[1] - 0.3).abs() < 1e-12);
        assert!((out[2] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn supplied_mind_layer_overrides_history() {
        let mut team = TeamRecord {
            name: "A".to_string(),
            ..Default::default()
        };
        let mut mind = assess_team(&[], 5, None).mind;
        mind.tier = crate::team_quality::Tier::Elite;
        mind.match_count = 40;
        team.mind = Some(mind);
        let q = resolve_quality(&team, 5);
        assert_eq!(q.mind.tier, crate::team_quality::Tier::Elite);
        assert_eq!(q.mind.match_count, 40);
    }

    #[test]
    fn supplied_elite_mind_with_losing_run_is_sleeping_giant() {
        use crate::team_fixtures::MatchRecord;
        use crate::team_quality::Tier;
        use chrono::{Duration, NaiveDate};

        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let losses: Vec<MatchRecord> = (0..5)
            .map(|i| MatchRecord {
                date: start - Duration::days(7 * i),
                opponent: None,
                is_home: i % 2 == 0,
                goals_for: 0,
                goals_against: 2,
            })
            .collect();
        let mut mind = assess_team(&[], 5, None).mind;
        mind.tier = Tier::Elite;
        mind.match_count = 45;
        let team = TeamRecord {
            name: "A".to_string(),
            matches: losses,
            mind: Some(mind),
            ..Default::default()
        };

        let q = resolve_quality(&team, 5);
        assert_eq!(q.mind.tier, Tier::Elite);
        assert_eq!(q.mood.tier, Tier::Weak);
        assert_eq!(q.mood.mind_mood_gap, -3);
        assert!(q.mood.is_sleeping_giant);
        assert!(!q.mood.is_over_performer);
    }

    #[test]
    fn prediction_shapes_serialize_flat() {
        let p = MarketPrediction::Goals {
            over: 0.6,
            under: 0.4,
            line: 2.5,
            confidence: ConfidenceLevel::Medium,
        };
        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["line"], 2.5);
        assert_eq!(v["confidence"], "MEDIUM");
        assert!(v.get("Goals").is_none());
    }
}
