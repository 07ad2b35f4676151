use serde::{Deserialize, Serialize};

use crate::dataset::{MatchRecord, MatchTable};
use crate::season::SeasonSet;
use crate::team_stats::TeamStats;

pub const MIN_TRAINING_ROWS: usize = 10;

const FEATURE_COUNT: usize = 4;
const RIDGE: f64 = 1e-3;
const MAX_GOALS: f64 = 6.0;

/// Linear model `goals ~ 1 + shots_on_target + shots + corners`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub coeffs: [f64; FEATURE_COUNT],
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, shots_on_target: f64, shots: f64, corners: f64) -> f64 {
        dot(self.coeffs, [1.0, shots_on_target, shots, corners])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalModel {
    pub home: LinearFit,
    pub away: LinearFit,
    pub training_rows: usize,
}

impl GoalModel {
    /// Fits both sides on rows of `seasons` that carry all six shot and
    /// corner columns. Too few complete rows yields `None`.
    pub fn fit(table: &MatchTable, seasons: &SeasonSet) -> Option<GoalModel> {
        let mut home_rows = Vec::new();
        let mut away_rows = Vec::new();
        for m in table.in_seasons(seasons) {
            let Some((h, a)) = complete_features(m) else {
                continue;
            };
            home_rows.push((h, f64::from(m.home_goals)));
            away_rows.push((a, f64::from(m.away_goals)));
        }
        if home_rows.len() < MIN_TRAINING_ROWS {
            tracing::debug!(
                rows = home_rows.len(),
                "not enough complete rows for the goal model"
            );
            return None;
        }
        Some(GoalModel {
            home: fit_ols(&home_rows)?,
            away: fit_ols(&away_rows)?,
            training_rows: home_rows.len(),
        })
    }

    /// Expected goals from the home side's home averages and the away side's
    /// away averages, each limited to 0..=6.
    pub fn predict(&self, home: &TeamStats, away: &TeamStats) -> (f64, f64) {
        let h = self.home.predict(
            home.home.avg_shots_on_target,
            home.home.avg_shots,
            home.home.avg_corners,
        );
        let a = self.away.predict(
            away.away.avg_shots_on_target,
            away.away.avg_shots,
            away.away.avg_corners,
        );
        (h.clamp(0.0, MAX_GOALS), a.clamp(0.0, MAX_GOALS))
    }
}

type Features = [f64; FEATURE_COUNT];

fn complete_features(m: &MatchRecord) -> Option<(Features, Features)> {
    let home = [
        1.0,
        f64::from(m.home_shots_on_target?),
        f64::from(m.home_shots?),
        f64::from(m.home_corners?),
    ];
    let away = [
        1.0,
        f64::from(m.away_shots_on_target?),
        f64::from(m.away_shots?),
        f64::from(m.away_corners?),
    ];
    Some((home, away))
}

fn fit_ols(rows: &[(Features, f64)]) -> Option<LinearFit> {
    let mut xtx = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
    let mut xty = [0.0; FEATURE_COUNT];
    for (x, y) in rows {
        for i in 0..FEATURE_COUNT {
            xty[i] += x[i] * y;
            for j in 0..FEATURE_COUNT {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }
    // Intercept is not penalized.
    for (i, row) in xtx.iter_mut().enumerate().skip(1) {
        row[i] += RIDGE * rows.len() as f64;
    }
    let coeffs = solve(xtx, xty)?;

    let mean = rows.iter().map(|(_, y)| y).sum::<f64>() / rows.len() as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in rows {
        ss_res += (y - dot(coeffs, *x)).powi(2);
        ss_tot += (y - mean).powi(2);
    }
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
    Some(LinearFit { coeffs, r_squared })
}

/// Gaussian elimination with partial pivoting.
fn solve(
    mut a: [[f64; FEATURE_COUNT]; FEATURE_COUNT],
    mut b: [f64; FEATURE_COUNT],
) -> Option<[f64; FEATURE_COUNT]> {
    for col in 0..FEATURE_COUNT {
        let pivot = (col..FEATURE_COUNT)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..FEATURE_COUNT {
            let factor = a[row][col] / a[col][col];
            for k in col..FEATURE_COUNT {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; FEATURE_COUNT];
    for row in (0..FEATURE_COUNT).rev() {
        let mut acc = b[row];
        for k in row + 1..FEATURE_COUNT {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn dot(a: [f64; FEATURE_COUNT], b: [f64; FEATURE_COUNT]) -> f64 {
    let mut out = 0.0;
    for i in 0..FEATURE_COUNT {
        out += a[i] * b[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn synthetic(rows: usize) -> MatchTable {
        let start = NaiveDate::from_ymd_opt(2023, 8, 1).unwrap();
        let matches = (0..rows)
            .map(|i| {
                let k = i as u32;
                let home_sot = (k % 4) * 2;
                let away_sot = ((k + 1) % 3) * 2;
                MatchRecord::new(
                    start + chrono::Days::new(i as u64),
                    "H",
                    "A",
                    home_sot / 2,
                    away_sot / 2,
                )
                .with_shots_on_target(home_sot, away_sot)
                .with_shots(home_sot + 3 + k % 5, away_sot + 2 + k % 7)
                .with_corners((k * 7) % 5, (k * 3) % 4)
            })
            .collect();
        MatchTable::new(matches)
    }

    #[test]
    fn recovers_a_linear_relationship() {
        let table = synthetic(40);
        let model = GoalModel::fit(&table, &SeasonSet::single("2023-2024")).unwrap();
        assert_eq!(model.training_rows, 40);
        assert!((model.home.coeffs[1] - 0.5).abs() < 0.05);
        assert!(model.home.r_squared > 0.95);
        let goals = model.home.predict(4.0, 9.0, 2.0);
        assert!((goals - 2.0).abs() < 0.1);
    }

    #[test]
    fn too_few_rows_is_none() {
        let table = synthetic(MIN_TRAINING_ROWS - 1);
        assert!(GoalModel::fit(&table, &SeasonSet::single("2023-2024")).is_none());
    }

    #[test]
    fn rows_missing_a_column_are_skipped() {
        let start = NaiveDate::from_ymd_opt(2023, 8, 1).unwrap();
        let matches = (0..20)
            .map(|i| {
                MatchRecord::new(start + chrono::Days::new(i), "H", "A", 1, 0).with_shots(10, 8)
            })
            .collect();
        let table = MatchTable::new(matches);
        assert!(GoalModel::fit(&table, &SeasonSet::single("2023-2024")).is_none());
    }

    #[test]
    fn predictions_are_clamped() {
        let model = GoalModel {
            home: LinearFit {
                coeffs: [10.0, 0.0, 0.0, 0.0],
                r_squared: 0.0,
            },
            away: LinearFit {
                coeffs: [-3.0, 0.0, 0.0, 0.0],
                r_squared: 0.0,
            },
            training_rows: 0,
        };
        let (h, a) = model.predict(&TeamStats::default(), &TeamStats::default());
        assert_eq!(h, 6.0);
        assert_eq!(a, 0.0);
    }
}
