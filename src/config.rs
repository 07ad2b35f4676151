use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::dataset::DateOrder;
use crate::estimator::{EstimatorConfig, HomeAdvantage};

const MAX_HOME_ADVANTAGE: f64 = 20.0;

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub data_path: Option<PathBuf>,
    pub date_order: DateOrder,
    pub estimator: EstimatorConfig,
}

impl AppConfig {
    /// Reads the process environment; call `load_dotenv` first to pick up `.env`.
    /// `config_file` (the `--config` flag) takes the place of `FORECAST_CONFIG`;
    /// the individual `FORECAST_*` keys still apply on top of it.
    pub fn from_env(config_file: Option<&Path>) -> Result<Self> {
        Self::layered(|key| env::var(key).ok(), config_file)
    }

    /// Builds the config from an arbitrary key lookup. Layering: defaults, then
    /// the `FORECAST_CONFIG` JSON file, then individual `FORECAST_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::layered(lookup, None)
    }

    fn layered(
        lookup: impl Fn(&str) -> Option<String>,
        config_file: Option<&Path>,
    ) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let file = config_file
            .map(Path::to_path_buf)
            .or_else(|| get("FORECAST_CONFIG").map(PathBuf::from));
        let mut estimator = match file {
            Some(path) => load_estimator_file(&path)?,
            None => EstimatorConfig::default(),
        };

        if let Some(n) = get("FORECAST_FORM_MATCHES").and_then(|v| v.parse::<usize>().ok()) {
            estimator.form_matches = n.clamp(1, 20);
        }
        if let Some(n) = get("FORECAST_H2H_CAP").and_then(|v| v.parse::<usize>().ok()) {
            estimator.h2h_cap = n.clamp(1, 50);
        }
        if let Some(raw) = get("FORECAST_HOME_ADV") {
            match parse_home_advantage(&raw) {
                Some(adv) => estimator.home_advantage = adv,
                None => tracing::warn!(value = %raw, "ignoring unparseable FORECAST_HOME_ADV"),
            }
        }

        let date_order = match get("FORECAST_DATE_ORDER") {
            Some(raw) => raw.parse::<DateOrder>().unwrap_or_else(|err| {
                tracing::warn!(%err, "falling back to ISO dates");
                DateOrder::default()
            }),
            None => DateOrder::default(),
        };

        estimator
            .validate()
            .map_err(|err| anyhow!("invalid estimator config: {err}"))?;

        Ok(Self {
            data_path: get("FORECAST_DATA").map(PathBuf::from),
            date_order,
            estimator,
        })
    }
}

pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// Estimator settings from JSON; omitted fields keep their defaults.
pub fn load_estimator_file(path: &Path) -> Result<EstimatorConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read estimator config {}", path.display()))?;
    let cfg = serde_json::from_str::<EstimatorConfig>(&raw)
        .with_context(|| format!("parse estimator config {}", path.display()))?;
    cfg.validate()
        .map_err(|err| anyhow!("invalid estimator config {}: {err}", path.display()))?;
    Ok(cfg)
}

/// `team` for per-team advantage, otherwise a flat number of points (0-20).
pub fn parse_home_advantage(raw: &str) -> Option<HomeAdvantage> {
    let t = raw.trim().to_ascii_lowercase();
    if t == "team" || t == "team-specific" || t == "team_specific" {
        return Some(HomeAdvantage::TeamSpecific);
    }
    let points = t.parse::<f64>().ok().filter(|p| p.is_finite())?;
    Some(HomeAdvantage::Fixed(points.clamp(0.0, MAX_HOME_ADVANTAGE)))
}
