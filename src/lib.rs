pub mod calibration;
pub mod config;
pub mod elo;
pub mod error;
pub mod features;
pub mod gbdt;
pub mod h2h;
pub mod insights;
pub mod logging;
pub mod markets;
pub mod match_context;
pub mod model_registry;
pub mod season_stakes;
pub mod team_fixtures;
pub mod team_quality;

pub use error::{InsightsError, Result};
pub use insights::{ConfidenceLevel, InsightsEngine, InsightsOptions, InsightsReport, MarketPrediction};
pub use markets::Market;
pub use model_registry::ModelRegistry;
