use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{InsightsError, Result};
use crate::features::unknown_features;
use crate::gbdt::TreeModel;
use crate::markets::Market;

static REGISTRY: OnceCell<ModelRegistry> = OnceCell::new();

/// Loaded models keyed by market. Read-only after loading.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<Market, TreeModel>,
}

/// `<dir>/<market>/model.json` first, then `<dir>/<market>.json`.
pub fn model_path(dir: &Path, market: Market) -> Option<PathBuf> {
    let key = market.key();
    [dir.join(&key).join("model.json"), dir.join(format!("{key}.json"))]
        .into_iter()
        .find(|p| p.is_file())
}

pub fn load_model_file(path: &Path) -> Result<TreeModel> {
    let raw = fs::read_to_string(path).map_err(|source| InsightsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    TreeModel::from_json_str(&raw, path)
}

/// Checks declared feature names against the assembler's schema. Strict
/// mode rejects the model; otherwise unknown names are logged and will be
/// fed as missing.
pub fn check_schema(model: &TreeModel, strict: bool) -> Result<()> {
    let unknown = unknown_features(&model.metadata.feature_names);
    if unknown.is_empty() {
        return Ok(());
    }
    if strict {
        return Err(InsightsError::UnknownFeatures {
            market: model.market().key(),
            names: unknown.iter().map(|s| s.to_string()).collect(),
        });
    }
    warn!(
        market = %model.market(),
        unknown = ?unknown,
        "model declares features outside the schema; they will be missing"
    );
    Ok(())
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every market found under `dir`. Markets without a file are
    /// skipped; unreadable or malformed files fail the whole load.
    pub fn load_dir(dir: &Path, strict_schema: bool) -> Result<Self> {
        let mut registry = Self::new();
        for market in Market::all() {
            let Some(path) = model_path(dir, market) else {
                warn!(market = %market, dir = %dir.display(), "model file not found, market disabled");
                continue;
            };
            let model = load_model_file(&path)?;
            if model.market() != market {
                return Err(InsightsError::MarketMismatch {
                    path,
                    expected: market,
                    declared: model.market(),
                });
            }
            check_schema(&model, strict_schema)?;
            debug!(
                market = %market,
                trees = model.trees.len(),
                features = model.feature_count(),
                "loaded model"
            );
            registry.models.insert(market, model);
        }
        info!(
            loaded = registry.len(),
            dir = %dir.display(),
            "model registry ready"
        );
        Ok(registry)
    }

    pub fn from_models(models: impl IntoIterator<Item = TreeModel>, strict_schema: bool) -> Result<Self> {
        let mut registry = Self::new();
        for model in models {
            check_schema(&model, strict_schema)?;
            registry.models.insert(model.market(), model);
        }
        Ok(registry)
    }

    pub fn get(&self, market: Market) -> Result<&TreeModel> {
        self.models
            .get(&market)
            .ok_or(InsightsError::ModelNotLoaded(market))
    }

    pub fn get_by_key(&self, key: &str) -> Result<&TreeModel> {
        self.get(Market::from_key(key)?)
    }

    pub fn contains(&self, market: Market) -> bool {
        self.models.contains_key(&market)
    }

    /// Loaded markets in catalogue order.
    pub fn markets(&self) -> Vec<Market> {
        let mut out: Vec<Market> = self.models.keys().copied().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Installs the process-wide registry. Returns the one already installed
    /// if called twice.
    pub fn install(self) -> &'static ModelRegistry {
        REGISTRY.get_or_init(|| self)
    }

    pub fn global() -> Option<&'static ModelRegistry> {
        REGISTRY.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(market: &str, feature: &str) -> String {
        format!(
            r#"{{
              "metadata": {{"market": "{market}", "num_trees": 1, "num_class": 1,
                            "feature_names": ["{feature}"], "objective": "binary"}},
              "tree_info": [{{"tree_index": 0, "shrinkage": 1.0,
                             "tree_structure": {{"leaf_value": 0.0}}}}]
            }}"#
        )
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fixture_insights_registry_{tag}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_both_layouts_and_skips_missing() {
        let dir = temp_dir("layouts");
        fs::create_dir_all(dir.join("btts")).unwrap();
        fs::write(dir.join("btts").join("model.json"), stump("btts", "homeElo")).unwrap();
        fs::write(dir.join("ou_2_5.json"), stump("ou_2_5", "awayElo")).unwrap();

        let reg = ModelRegistry::load_dir(&dir, true).unwrap();
        assert_eq!(reg.markets(), vec![Market::Btts, Market::OverUnder(2)]);
        assert!(matches!(
            reg.get(Market::OneXTwo),
            Err(InsightsError::ModelNotLoaded(Market::OneXTwo))
        ));
        assert!(reg.get_by_key("ou_2_5").is_ok());
        assert!(matches!(
            reg.get_by_key("ou_9_5"),
            Err(InsightsError::UnknownMarket(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn strict_schema_rejects_unknown_features() {
        let model = TreeModel::from_json_str(&stump("btts", "shotsOnTarget"), Path::new("mem")).unwrap();
        let err = ModelRegistry::from_models([model.clone()], true).unwrap_err();
        match err {
            InsightsError::UnknownFeatures { market, names } => {
                assert_eq!(market, "btts");
                assert_eq!(names, vec!["shotsOnTarget".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        let lenient = ModelRegistry::from_models([model], false).unwrap();
        assert_eq!(lenient.len(), 1);
    }

    #[test]
    fn model_saved_under_wrong_market_fails_load() {
        let dir = temp_dir("mismatch");
        fs::write(dir.join("btts.json"), stump("1x2", "homeElo")).unwrap();
        match ModelRegistry::load_dir(&dir, true) {
            Err(InsightsError::MarketMismatch {
                path,
                expected,
                declared,
            }) => {
                assert_eq!(path, dir.join("btts.json"));
                assert_eq!(expected, Market::Btts);
                assert_eq!(declared, Market::OneXTwo);
            }
            other => panic!("unexpected result {other:?}"),
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn broken_file_fails_load() {
        let dir = temp_dir("broken");
        fs::write(dir.join("1x2.json"), "{ not json").unwrap();
        assert!(matches!(
            ModelRegistry::load_dir(&dir, true),
            Err(InsightsError::Json { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
