use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dataset::{MatchTable, Outcome};
use crate::estimator::{EstimatorConfig, Probabilities};
use crate::memo::StatsCache;
use crate::season::{SeasonSet, season_start_year};

const CALIBRATION_BINS: usize = 10;
// Floor for the probability of the observed outcome in log loss.
const MIN_PROBABILITY: f64 = 1e-12;

/// Scores over a set of predictions. Brier and log loss use fractions, not
/// percentages; accuracy counts the headline pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

/// One reliability bucket for a single outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestOptions {
    /// Seasons whose matches are predicted.
    pub target_seasons: SeasonSet,
    /// Earlier seasons added to each prediction's history window.
    pub history_seasons: usize,
    /// Skip a match when either side has fewer earlier matches in the window.
    pub min_history: usize,
    pub use_model: bool,
}

impl BacktestOptions {
    pub fn for_seasons(target_seasons: SeasonSet) -> Self {
        Self {
            target_seasons,
            history_seasons: 1,
            min_history: 5,
            use_model: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub evaluated: usize,
    pub skipped: usize,
    pub model: Metrics,
    /// Predicting the historical home/draw/away base rates for every match.
    pub baseline: Metrics,
    pub home_calibration: Vec<CalibrationBin>,
}

/// Walk-forward evaluation: each match is estimated from strictly earlier
/// matches only.
pub fn run_backtest(
    table: &MatchTable,
    cfg: &EstimatorConfig,
    opts: &BacktestOptions,
) -> BacktestReport {
    let mut cache = StatsCache::new();
    let mut predictions = Vec::new();
    let mut baseline = Vec::new();
    let mut outcomes = Vec::new();
    let mut skipped = 0usize;

    let targets = table
        .matches()
        .iter()
        .filter(|m| opts.target_seasons.contains(&m.season))
        .collect::<Vec<_>>();

    let mut windows: HashMap<String, SeasonSet> = HashMap::new();
    let mut snapshot: Option<(NaiveDate, MatchTable)> = None;
    for m in targets {
        // Matches on the same day share one history snapshot.
        if snapshot.as_ref().is_none_or(|(date, _)| *date != m.date) {
            snapshot = Some((m.date, table.before(m.date)));
        }
        let Some((_, history)) = snapshot.as_ref() else {
            continue;
        };
        let window: &SeasonSet = windows
            .entry(m.season.clone())
            .or_insert_with(|| history_window(table, &m.season, opts.history_seasons));

        let played = |team: &str| {
            history
                .in_seasons(window)
                .filter(|r| r.involves(team))
                .count()
        };
        if played(&m.home_team) < opts.min_history || played(&m.away_team) < opts.min_history {
            skipped += 1;
            continue;
        }

        let estimate = cache.predict_match(
            history,
            window,
            &m.home_team,
            &m.away_team,
            cfg,
            opts.use_model,
        );
        let past = history
            .in_seasons(window)
            .map(|r| r.result)
            .collect::<Vec<Outcome>>();

        predictions.push(estimate.probabilities);
        baseline.push(base_rates(&past));
        outcomes.push(m.result);
    }

    let report = BacktestReport {
        evaluated: outcomes.len(),
        skipped,
        model: score(&predictions, &outcomes),
        baseline: score(&baseline, &outcomes),
        home_calibration: reliability(&predictions, &outcomes, Outcome::Home, CALIBRATION_BINS),
    };
    tracing::info!(
        evaluated = report.evaluated,
        skipped = report.skipped,
        brier = report.model.brier,
        baseline_brier = report.baseline.brier,
        "backtest finished"
    );
    report
}

/// `season` plus up to `extra` immediately preceding seasons present in `table`.
pub fn history_window(table: &MatchTable, season: &str, extra: usize) -> SeasonSet {
    let Some(start) = season_start_year(season) else {
        return SeasonSet::single(season);
    };
    let earliest = start.saturating_sub(i32::try_from(extra).unwrap_or(i32::MAX));
    let mut window = table
        .seasons()
        .into_iter()
        .filter(|label| season_start_year(label).is_some_and(|y| y >= earliest && y <= start))
        .collect::<SeasonSet>();
    window.insert(season);
    window
}

/// Observed home/draw/away shares in percent; uniform with no history.
pub fn base_rates(outcomes: &[Outcome]) -> Probabilities {
    if outcomes.is_empty() {
        return Probabilities::uniform();
    }
    let share = |want: Outcome| {
        outcomes.iter().filter(|o| **o == want).count() as f64 * 100.0 / outcomes.len() as f64
    };
    Probabilities {
        home_win: share(Outcome::Home),
        draw: share(Outcome::Draw),
        away_win: share(Outcome::Away),
    }
}

pub fn score(predictions: &[Probabilities], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }
    let mut brier = 0.0_f64;
    let mut log_loss = 0.0_f64;
    let mut hits = 0usize;
    for (p, actual) in predictions.iter().zip(outcomes) {
        let total = p.total();
        let fraction = |o: Outcome| if total > 0.0 { p.get(o) / total } else { 1.0 / 3.0 };
        brier += [Outcome::Home, Outcome::Draw, Outcome::Away]
            .into_iter()
            .map(|o| {
                let hit = if o == *actual { 1.0 } else { 0.0 };
                (fraction(o) - hit).powi(2)
            })
            .sum::<f64>();
        log_loss -= fraction(*actual).max(MIN_PROBABILITY).ln();
        if p.most_likely() == *actual {
            hits += 1;
        }
    }
    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier / n,
        log_loss: log_loss / n,
        accuracy: hits as f64 / n,
    }
}

/// Buckets predictions by the share given to `class` and compares each
/// bucket's mean prediction with how often `class` happened. Shares are
/// fractions in `[0, 1]`.
pub fn reliability(
    predictions: &[Probabilities],
    outcomes: &[Outcome],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let width = 1.0 / bins as f64;
    let mut buckets = vec![(0usize, 0.0_f64, 0usize); bins];
    for (p, actual) in predictions.iter().zip(outcomes) {
        let share = (p.get(class) / 100.0).clamp(0.0, 1.0);
        let idx = ((share / width) as usize).min(bins - 1);
        let bucket = &mut buckets[idx];
        bucket.0 += 1;
        bucket.1 += share;
        if *actual == class {
            bucket.2 += 1;
        }
    }
    buckets
        .into_iter()
        .enumerate()
        .map(|(i, (count, pred_sum, happened))| {
            let n = count.max(1) as f64;
            CalibrationBin {
                bucket_start: i as f64 * width,
                bucket_end: (i + 1) as f64 * width,
                count,
                avg_pred: pred_sum / n,
                actual_rate: happened as f64 / n,
            }
        })
        .collect()
}
