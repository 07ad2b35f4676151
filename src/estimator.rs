use serde::{Deserialize, Serialize};

use crate::dataset::{MatchTable, Outcome};
use crate::form::{DEFAULT_FORM_MATCHES, RecentForm, recent_form};
use crate::head_to_head::{DEFAULT_H2H_CAP, HeadToHead, head_to_head};
use crate::regression::GoalModel;
use crate::season::SeasonSet;
use crate::team_stats::{TeamStats, compute_team_stats, home_advantage_factor};

const NEUTRAL_STRENGTH: f64 = 50.0;
const NEUTRAL_FORM: f64 = 50.0;
const H2H_PARITY: f64 = 33.3;
const MAX_EXPECTED_GOALS: f64 = 6.0;
const SCORE_GRID: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeAdvantage {
    /// Flat bonus in percentage points.
    Fixed(f64),
    /// Derived from the home side's own home/away win-rate gap.
    TeamSpecific,
}

impl Default for HomeAdvantage {
    fn default() -> Self {
        HomeAdvantage::Fixed(7.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub form_matches: usize,
    pub h2h_cap: usize,
    pub form_weight: f64,
    pub h2h_weight: f64,
    pub h2h_min_meetings: u32,
    pub home_advantage: HomeAdvantage,
    pub draw_base: f64,
    pub draw_floor: f64,
    pub draw_balance_divisor: f64,
    pub prob_floor: f64,
    pub prob_ceiling: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub default_home_goals: f64,
    pub default_away_goals: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            form_matches: DEFAULT_FORM_MATCHES,
            h2h_cap: DEFAULT_H2H_CAP,
            form_weight: 0.3,
            h2h_weight: 0.2,
            h2h_min_meetings: 3,
            home_advantage: HomeAdvantage::default(),
            draw_base: 35.0,
            draw_floor: 15.0,
            draw_balance_divisor: 3.0,
            prob_floor: 10.0,
            prob_ceiling: 75.0,
            confidence_floor: 40.0,
            confidence_ceiling: 95.0,
            default_home_goals: 1.5,
            default_away_goals: 1.2,
        }
    }
}

impl EstimatorConfig {
    /// Rejects settings under which the three probabilities could not sum to 100.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=50.0).contains(&self.prob_floor) {
            return Err(format!("prob_floor {} must be within 0..=50", self.prob_floor));
        }
        if self.prob_ceiling < self.prob_floor || self.prob_ceiling + self.prob_floor > 100.0 {
            return Err(format!(
                "prob_ceiling {} must be >= prob_floor and leave room for the floor",
                self.prob_ceiling
            ));
        }
        if self.draw_balance_divisor <= 0.0 {
            return Err("draw_balance_divisor must be positive".to_string());
        }
        if self.confidence_ceiling < self.confidence_floor {
            return Err("confidence_ceiling must be >= confidence_floor".to_string());
        }
        if let HomeAdvantage::Fixed(points) = self.home_advantage
            && !points.is_finite()
        {
            return Err("home advantage must be finite".to_string());
        }
        Ok(())
    }
}

/// Percentages summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

impl Probabilities {
    pub fn uniform() -> Self {
        Self {
            home_win: 33.3,
            draw: 33.3,
            away_win: 33.4,
        }
    }

    pub fn total(&self) -> f64 {
        self.home_win + self.draw + self.away_win
    }

    /// Same numbers seen from the other side's perspective.
    pub fn flipped(&self) -> Self {
        Self {
            home_win: self.away_win,
            draw: self.draw,
            away_win: self.home_win,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home_win,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away_win,
        }
    }

    /// The strictly largest outcome; an exact tie for the top is a draw.
    pub fn most_likely(&self) -> Outcome {
        let top = self.home_win.max(self.draw).max(self.away_win);
        let leaders = [self.home_win, self.draw, self.away_win]
            .iter()
            .filter(|p| **p == top)
            .count();
        if leaders > 1 || self.draw == top {
            Outcome::Draw
        } else if self.home_win == top {
            Outcome::Home
        } else {
            Outcome::Away
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthBreakdown {
    pub home_base: f64,
    pub away_base: f64,
    pub home_form: f64,
    pub away_form: f64,
    pub home_h2h: f64,
    pub away_h2h: f64,
    pub h2h_applied: bool,
    pub home_advantage: f64,
    pub home_strength: f64,
    pub away_strength: f64,
    pub draw_strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorelineSummary {
    pub home_goals: u32,
    pub away_goals: u32,
    /// Percent.
    pub probability: f64,
    pub outcome: Probabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEstimate {
    pub home_team: String,
    pub away_team: String,
    pub expected_goals: ExpectedGoals,
    pub probabilities: Probabilities,
    pub confidence: f64,
    pub most_likely: Outcome,
    pub breakdown: StrengthBreakdown,
    pub scoreline: ScorelineSummary,
}

/// Everything the estimator reads. `h2h` is seen from the home side (team1).
#[derive(Debug, Clone, Copy)]
pub struct EstimateInputs<'a> {
    pub home: &'a TeamStats,
    pub away: &'a TeamStats,
    pub home_form: &'a RecentForm,
    pub away_form: &'a RecentForm,
    pub h2h: &'a HeadToHead,
    pub model_goals: Option<(f64, f64)>,
}

pub fn estimate(inputs: &EstimateInputs<'_>, cfg: &EstimatorConfig) -> OutcomeEstimate {
    let home_venue = &inputs.home.home;
    let away_venue = &inputs.away.away;

    let home_base = if home_venue.matches == 0 {
        NEUTRAL_STRENGTH
    } else {
        home_venue.win_rate * 100.0
    };
    let away_base = if away_venue.matches == 0 {
        NEUTRAL_STRENGTH
    } else {
        away_venue.win_rate * 100.0
    };

    let home_form = (inputs.home_form.form_score - NEUTRAL_FORM) * cfg.form_weight;
    let away_form = (inputs.away_form.form_score - NEUTRAL_FORM) * cfg.form_weight;

    let h2h_applied = inputs.h2h.matches > 0 && inputs.h2h.matches >= cfg.h2h_min_meetings;
    let (home_h2h, away_h2h) = if h2h_applied {
        (
            (inputs.h2h.team1_win_rate() * 100.0 - H2H_PARITY) * cfg.h2h_weight,
            (inputs.h2h.team2_win_rate() * 100.0 - H2H_PARITY) * cfg.h2h_weight,
        )
    } else {
        (0.0, 0.0)
    };

    let home_advantage = match cfg.home_advantage {
        HomeAdvantage::Fixed(points) => points,
        HomeAdvantage::TeamSpecific => home_advantage_factor(inputs.home),
    };

    let home_strength = (home_base + home_form + home_h2h + home_advantage).max(0.0);
    let away_strength = (away_base + away_form + away_h2h).max(0.0);

    let balance = (home_strength - away_strength).abs();
    let mut draw_strength =
        (cfg.draw_base - balance / cfg.draw_balance_divisor).max(cfg.draw_floor);
    if h2h_applied {
        draw_strength = (draw_strength + inputs.h2h.draw_rate() * 100.0) / 2.0;
    }

    let probabilities = normalize(home_strength, draw_strength, away_strength, cfg);
    let confidence = confidence(inputs, &probabilities, cfg);
    let expected_goals = expected_goals(inputs, cfg);
    let scoreline = scoreline_summary(expected_goals.home, expected_goals.away);

    let breakdown = StrengthBreakdown {
        home_base,
        away_base,
        home_form,
        away_form,
        home_h2h,
        away_h2h,
        h2h_applied,
        home_advantage,
        home_strength,
        away_strength,
        draw_strength,
    };
    tracing::debug!(
        home = %inputs.home.team,
        away = %inputs.away.team,
        home_strength,
        away_strength,
        draw_strength,
        h2h_applied,
        "strength breakdown"
    );

    OutcomeEstimate {
        home_team: inputs.home.team.clone(),
        away_team: inputs.away.team.clone(),
        expected_goals,
        most_likely: probabilities.most_likely(),
        probabilities,
        confidence,
        breakdown,
        scoreline,
    }
}

/// Gathers stats, form and head-to-head for `home` vs `away` and estimates.
pub fn predict_match(
    table: &MatchTable,
    seasons: &SeasonSet,
    home: &str,
    away: &str,
    cfg: &EstimatorConfig,
    model: Option<&GoalModel>,
) -> OutcomeEstimate {
    let home_stats = compute_team_stats(table, seasons, home);
    let away_stats = compute_team_stats(table, seasons, away);
    let home_form = recent_form(table, home, cfg.form_matches, Some(seasons));
    let away_form = recent_form(table, away, cfg.form_matches, Some(seasons));
    let h2h = head_to_head(table, home, away, Some(seasons), Some(cfg.h2h_cap));
    let model_goals = model.map(|m| m.predict(&home_stats, &away_stats));
    estimate(
        &EstimateInputs {
            home: &home_stats,
            away: &away_stats,
            home_form: &home_form,
            away_form: &away_form,
            h2h: &h2h,
            model_goals,
        },
        cfg,
    )
}

fn normalize(home: f64, draw: f64, away: f64, cfg: &EstimatorConfig) -> Probabilities {
    let total = home + draw + away;
    if total.is_nan() || total <= 0.0 {
        return Probabilities::uniform();
    }
    let home_win = round1(home / total * 100.0).clamp(cfg.prob_floor, cfg.prob_ceiling);
    let away_win = round1(away / total * 100.0).clamp(cfg.prob_floor, cfg.prob_ceiling);
    // Draw takes whatever the clamped sides leave.
    let draw = round1((100.0 - home_win - away_win).max(0.0));
    Probabilities {
        home_win,
        draw,
        away_win,
    }
}

fn confidence(inputs: &EstimateInputs<'_>, p: &Probabilities, cfg: &EstimatorConfig) -> f64 {
    let parts = [
        inputs.home_form.matches_used().min(5) as f64 * 10.0,
        inputs.away_form.matches_used().min(5) as f64 * 10.0,
        inputs.h2h.matches.min(10) as f64 * 5.0,
        (p.home_win - p.away_win).abs(),
    ];
    let mean = parts.iter().sum::<f64>() / parts.len() as f64;
    round1(mean.clamp(cfg.confidence_floor, cfg.confidence_ceiling))
}

fn expected_goals(inputs: &EstimateInputs<'_>, cfg: &EstimatorConfig) -> ExpectedGoals {
    let home_venue = &inputs.home.home;
    let away_venue = &inputs.away.away;

    let or_default = |matches: u32, value: f64, default: f64| {
        if matches == 0 { default } else { value }
    };
    let home_attack = or_default(
        home_venue.matches,
        home_venue.avg_goals_scored,
        cfg.default_home_goals,
    );
    let away_leak = or_default(
        away_venue.matches,
        away_venue.avg_goals_conceded,
        cfg.default_home_goals,
    );
    let away_attack = or_default(
        away_venue.matches,
        away_venue.avg_goals_scored,
        cfg.default_away_goals,
    );
    let home_leak = or_default(
        home_venue.matches,
        home_venue.avg_goals_conceded,
        cfg.default_away_goals,
    );

    let mut home = (home_attack + away_leak) / 2.0 * form_multiplier(inputs.home_form);
    let mut away = (away_attack + home_leak) / 2.0 * form_multiplier(inputs.away_form);
    if let Some((model_home, model_away)) = inputs.model_goals {
        home = (home + model_home) / 2.0;
        away = (away + model_away) / 2.0;
    }
    ExpectedGoals {
        home: home.clamp(0.0, MAX_EXPECTED_GOALS),
        away: away.clamp(0.0, MAX_EXPECTED_GOALS),
    }
}

fn form_multiplier(form: &RecentForm) -> f64 {
    0.8 + 0.4 * (form.form_score / 100.0)
}

fn scoreline_summary(lambda_home: f64, lambda_away: f64) -> ScorelineSummary {
    let pmf_h = poisson_pmf(lambda_home, SCORE_GRID);
    let pmf_a = poisson_pmf(lambda_away, SCORE_GRID);

    let mut best = (0u32, 0u32, 0.0_f64);
    for (i, p_i) in pmf_h.iter().enumerate() {
        for (j, p_j) in pmf_a.iter().enumerate() {
            let p = p_i * p_j;
            if p > best.2 {
                best = (i as u32, j as u32, p);
            }
        }
    }

    let (p_home, _, p_away) = outcome_probs_poisson(&pmf_h, &pmf_a);
    let home_win = round1(p_home * 100.0);
    let away_win = round1(p_away * 100.0);
    // Rounding residue goes into draw.
    let draw = round1(100.0 - home_win - away_win);

    ScorelineSummary {
        home_goals: best.0,
        away_goals: best.1,
        probability: round1(best.2 * 100.0),
        outcome: Probabilities {
            home_win,
            draw,
            away_win,
        },
    }
}

fn outcome_probs_poisson(pmf_h: &[f64], pmf_a: &[f64]) -> (f64, f64, f64) {
    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;

    for (i, p_i) in pmf_h.iter().enumerate() {
        for (j, p_j) in pmf_a.iter().enumerate() {
            let p = p_i * p_j;
            if i > j {
                p_home += p;
            } else if i < j {
                p_away += p;
            } else {
                p_draw += p;
            }
        }
    }

    // Guard against tiny float drift.
    let sum = p_home + p_draw + p_away;
    if sum > 0.0 {
        (p_home / sum, p_draw / sum, p_away / sum)
    } else {
        (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    }
}

fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let mut out = vec![0.0; max_k + 1];
    let lambda = lambda.max(0.0);

    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }

    // Fold the tail into the last bucket.
    let sum: f64 = out.iter().sum();
    if sum < 1.0 {
        out[max_k] += 1.0 - sum;
    }
    out
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
