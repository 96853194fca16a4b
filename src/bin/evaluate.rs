use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fixture_insights::calibration::{self, Metrics, Outcome, Prob3};
use fixture_insights::config::InsightsConfig;
use fixture_insights::team_fixtures::FixtureInput;
use fixture_insights::{InsightsEngine, Market, MarketPrediction, ModelRegistry, logging};

const DEFAULT_BINS: usize = 10;

/// A fixture with its final score.
#[derive(Debug, Deserialize)]
struct EvalCase {
    #[serde(default)]
    id: Option<String>,
    fixture: FixtureInput,
    home_goals: u8,
    away_goals: u8,
}

#[derive(Debug, Default)]
struct MarketSamples {
    result_preds: Vec<Prob3>,
    result_outcomes: Vec<Outcome>,
    binary_preds: Vec<f64>,
    binary_outcomes: Vec<bool>,
}

#[derive(Debug, Serialize)]
struct MarketReport {
    metrics: Metrics,
    bins: Vec<calibration::CalibrationBin>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: evaluate <cases.json> [bins]"))?;
    let bins = std::env::args()
        .nth(2)
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_BINS)
        .clamp(2, 50);

    let cfg = InsightsConfig::from_env();
    let registry = ModelRegistry::load_dir(&cfg.model_dir, cfg.strict_schema)
        .with_context(|| format!("loading models from {}", cfg.model_dir.display()))?;
    if registry.is_empty() {
        return Err(anyhow!("no models found under {}", cfg.model_dir.display()));
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cases: Vec<EvalCase> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    info!(cases = cases.len(), "evaluating");

    let mut options = cfg.insights_options();
    options.include_context = false;
    let engine = InsightsEngine::new(&registry, options);

    let scored: Vec<_> = cases
        .par_iter()
        .filter_map(|case| match engine.analyze(&case.fixture) {
            Ok(report) => Some((case, report.predictions)),
            Err(err) => {
                warn!(case = case.id.as_deref().unwrap_or("?"), error = %err, "skipping case");
                None
            }
        })
        .collect();

    let mut samples: BTreeMap<Market, MarketSamples> = BTreeMap::new();
    for (case, predictions) in &scored {
        for (market, prediction) in predictions {
            let entry = samples.entry(*market).or_default();
            match *prediction {
                MarketPrediction::Result { home, draw, away, .. } => {
                    entry.result_preds.push(Prob3 { home, draw, away });
                    entry.result_outcomes.push(calibration::classify_outcome(
                        case.home_goals as i32,
                        case.away_goals as i32,
                    ));
                }
                MarketPrediction::BothScore { yes: p, .. } | MarketPrediction::Goals { over: p, .. } => {
                    if let Some(hit) =
                        calibration::binary_outcome(*market, case.home_goals, case.away_goals)
                    {
                        entry.binary_preds.push(p);
                        entry.binary_outcomes.push(hit);
                    }
                }
            }
        }
    }

    let mut out: BTreeMap<Market, MarketReport> = BTreeMap::new();
    for (market, s) in samples {
        let report = if market == Market::OneXTwo {
            MarketReport {
                metrics: calibration::evaluate_probs(&s.result_preds, &s.result_outcomes),
                bins: calibration::calibration_bins(
                    &s.result_preds,
                    &s.result_outcomes,
                    Outcome::Home,
                    bins,
                ),
            }
        } else {
            MarketReport {
                metrics: calibration::evaluate_binary(&s.binary_preds, &s.binary_outcomes),
                bins: calibration::binary_calibration_bins(&s.binary_preds, &s.binary_outcomes, bins),
            }
        };
        info!(
            market = %market,
            samples = report.metrics.samples,
            brier = report.metrics.brier,
            log_loss = report.metrics.log_loss,
            "market scored"
        );
        out.insert(market, report);
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
