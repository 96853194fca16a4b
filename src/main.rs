use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

use fixture_insights::config::InsightsConfig;
use fixture_insights::team_fixtures::parse_fixture_json;
use fixture_insights::{InsightsEngine, Market, ModelRegistry, logging};

const USAGE: &str = "usage: fixture_insights <fixture.json> [--markets 1x2,btts,ou_2_5] [--no-context]";

struct Args {
    fixture: PathBuf,
    markets: Option<Vec<Market>>,
    include_context: bool,
}

fn parse_args() -> Result<Args> {
    let mut fixture = None;
    let mut markets = None;
    let mut include_context = true;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--markets" => {
                let raw = args.next().context("--markets needs a comma separated list")?;
                let parsed = raw
                    .split(',')
                    .filter(|k| !k.trim().is_empty())
                    .map(Market::from_key)
                    .collect::<Result<Vec<_>, _>>()?;
                markets = Some(parsed);
            }
            "--no-context" => include_context = false,
            "-h" | "--help" => bail!(USAGE),
            _ if fixture.is_none() => fixture = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }
    Ok(Args {
        fixture: fixture.context(USAGE)?,
        markets,
        include_context,
    })
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init();

    let args = parse_args()?;
    let cfg = InsightsConfig::from_env();

    let registry = ModelRegistry::load_dir(&cfg.model_dir, cfg.strict_schema)
        .with_context(|| format!("loading models from {}", cfg.model_dir.display()))?
        .install();
    if registry.is_empty() {
        bail!("no models found under {}", cfg.model_dir.display());
    }

    let raw = fs::read_to_string(&args.fixture)
        .with_context(|| format!("reading {}", args.fixture.display()))?;
    let fixture = parse_fixture_json(&raw)
        .with_context(|| format!("parsing fixture {}", args.fixture.display()))?;

    let mut options = cfg.insights_options();
    options.include_context = args.include_context;
    let engine = InsightsEngine::new(registry, options);
    let report = match &args.markets {
        Some(markets) => engine.analyze_markets(&fixture, markets)?,
        None => engine.analyze(&fixture)?,
    };
    info!(
        home = %report.home.name,
        away = %report.away.name,
        markets = report.predictions.len(),
        confidence = ?report.confidence,
        "fixture analysed"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
