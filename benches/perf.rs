use std::path::Path;

use chrono::{Duration, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use fixture_insights::features::{FeatureInputs, TierGapMode, build_features};
use fixture_insights::gbdt::{FeatureVector, TreeModel};
use fixture_insights::h2h::H2HSummary;
use fixture_insights::team_fixtures::{FixtureInput, MatchMetadata, MatchRecord, TeamRecord};
use fixture_insights::team_quality::assess_team;

fn history(seed: u8) -> Vec<MatchRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
    (0..60)
        .map(|i| MatchRecord {
            date: start - Duration::days(5 * i as i64),
            opponent: None,
            is_home: i % 2 == 0,
            goals_for: ((i as u8).wrapping_mul(seed) % 4),
            goals_against: ((i as u8 + seed) % 3),
        })
        .collect()
}

fn sample_fixture() -> FixtureInput {
    FixtureInput {
        metadata: MatchMetadata {
            league_name: "Premier League".to_string(),
            league_id: Some(39),
            season: Some(2024),
            date: NaiveDate::from_ymd_opt(2024, 5, 4),
            ..Default::default()
        },
        home: TeamRecord {
            name: "Home".to_string(),
            matches: history(3),
            ..Default::default()
        },
        away: TeamRecord {
            name: "Away".to_string(),
            matches: history(5),
            ..Default::default()
        },
        h2h: None,
    }
}

/// Complete binary trees of `depth` over `features` inputs, `trees` of them.
fn synthetic_model(trees: usize, depth: usize, features: usize) -> TreeModel {
    fn node(depth: usize, idx: usize, features: usize) -> serde_json::Value {
        if depth == 0 {
            return serde_json::json!({ "leaf_value": (idx % 7) as f64 * 0.01 - 0.03 });
        }
        serde_json::json!({
            "split_feature": idx % features,
            "threshold": (idx % 5) as f64,
            "default_left": idx % 2 == 0,
            "left_child": node(depth - 1, idx * 2 + 1, features),
            "right_child": node(depth - 1, idx * 2 + 2, features),
        })
    }
    let names: Vec<String> = (0..features).map(|i| format!("f{i}")).collect();
    let tree_info: Vec<serde_json::Value> = (0..trees)
        .map(|t| serde_json::json!({ "tree_index": t, "tree_structure": node(depth, t, features) }))
        .collect();
    let raw = serde_json::json!({
        "metadata": {
            "market": "1x2",
            "num_class": 3,
            "feature_names": names,
            "objective": "multiclass num_class:3"
        },
        "tree_info": tree_info,
    });
    TreeModel::from_json_str(&raw.to_string(), Path::new("synthetic")).expect("valid model")
}

fn bench_feature_assembly(c: &mut Criterion) {
    let fixture = sample_fixture();
    let home_quality = assess_team(&fixture.home.matches, 5, None);
    let away_quality = assess_team(&fixture.away.matches, 5, None);
    let h2h = H2HSummary::default();
    c.bench_function("build_features_60_match_histories", |b| {
        b.iter(|| {
            let features = build_features(&FeatureInputs {
                fixture: black_box(&fixture),
                home_quality: &home_quality,
                away_quality: &away_quality,
                h2h: &h2h,
                tier_gap_mode: TierGapMode::PerTeam,
            });
            black_box(features.values().len())
        })
    });
    c.bench_function("assess_team_60_matches", |b| {
        b.iter(|| black_box(assess_team(black_box(&fixture.home.matches), 5, Some(3))))
    });
}

fn bench_inference(c: &mut Criterion) {
    let model = synthetic_model(300, 6, 34);
    let input = FeatureVector::new(
        (0..34)
            .map(|i| if i % 9 == 0 { None } else { Some((i % 6) as f64) })
            .collect(),
    );
    c.bench_function("predict_300_trees_depth_6", |b| {
        b.iter(|| black_box(model.predict(black_box(&input))))
    });
}

criterion_group!(benches, bench_feature_assembly, bench_inference);
criterion_main!(benches);
