use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dataset::{BookmakerOdds, MatchRecord, MatchTable, Outcome};
use crate::estimator::Probabilities;

pub const DEFAULT_ODDS_MEETINGS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpliedOdds {
    pub bookmaker: String,
    /// `1/odds` per outcome, in percent, still carrying the margin.
    pub raw: Probabilities,
    /// Sum of the raw percentages minus 100.
    pub overround: f64,
    /// Margin removed; sums to 100.
    pub fair: Probabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsComparison {
    pub home_edge: f64,
    pub draw_edge: f64,
    pub away_edge: f64,
    /// Outcome where the model exceeds the market the most, if any does.
    pub best_value: Option<Outcome>,
}

impl ImpliedOdds {
    /// Swap home and away, for meetings played at the other ground.
    pub fn flipped(&self) -> Self {
        Self {
            bookmaker: self.bookmaker.clone(),
            raw: self.raw.flipped(),
            overround: self.overround,
            fair: self.fair.flipped(),
        }
    }
}

pub fn implied_probabilities(odds: &BookmakerOdds) -> Option<ImpliedOdds> {
    if odds.home <= 1.0 || odds.draw <= 1.0 || odds.away <= 1.0 {
        return None;
    }
    let ih = 100.0 / odds.home;
    let id = 100.0 / odds.draw;
    let ia = 100.0 / odds.away;
    let sum = ih + id + ia;
    if !sum.is_finite() || sum <= 0.0 {
        return None;
    }
    Some(ImpliedOdds {
        bookmaker: odds.bookmaker.clone(),
        raw: Probabilities {
            home_win: ih,
            draw: id,
            away_win: ia,
        },
        overround: sum - 100.0,
        fair: Probabilities {
            home_win: ih / sum * 100.0,
            draw: id / sum * 100.0,
            away_win: ia / sum * 100.0,
        },
    })
}

/// Median decimal price per outcome across bookmakers.
pub fn consensus(prices: &[BookmakerOdds]) -> Option<BookmakerOdds> {
    let valid = prices
        .iter()
        .filter(|o| o.home > 1.0 && o.draw > 1.0 && o.away > 1.0)
        .collect::<Vec<_>>();
    let home = median_f64(&valid.iter().map(|o| o.home).collect::<Vec<_>>())?;
    let draw = median_f64(&valid.iter().map(|o| o.draw).collect::<Vec<_>>())?;
    let away = median_f64(&valid.iter().map(|o| o.away).collect::<Vec<_>>())?;
    Some(BookmakerOdds {
        bookmaker: "Consensus".to_string(),
        home,
        draw,
        away,
    })
}

/// Edges in percentage points, model minus margin-free market.
pub fn compare(model: &Probabilities, market: &ImpliedOdds) -> OddsComparison {
    let home_edge = model.home_win - market.fair.home_win;
    let draw_edge = model.draw - market.fair.draw;
    let away_edge = model.away_win - market.fair.away_win;
    let best_value = [
        (Outcome::Home, home_edge),
        (Outcome::Draw, draw_edge),
        (Outcome::Away, away_edge),
    ]
    .into_iter()
    .filter(|(_, edge)| *edge > 0.0)
    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    .map(|(outcome, _)| outcome);
    OddsComparison {
        home_edge,
        draw_edge,
        away_edge,
        best_value,
    }
}

/// Latest meetings of `a` and `b` (either venue) that carry odds, newest first.
pub fn recent_meeting_odds<'a>(
    table: &'a MatchTable,
    a: &str,
    b: &str,
    limit: usize,
) -> Vec<&'a MatchRecord> {
    table
        .matches()
        .iter()
        .rev()
        .filter(|m| {
            !m.odds.is_empty()
                && ((m.home_team == a && m.away_team == b) || (m.home_team == b && m.away_team == a))
        })
        .take(limit)
        .collect()
}

fn median_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn book(name: &str, home: f64, draw: f64, away: f64) -> BookmakerOdds {
        BookmakerOdds {
            bookmaker: name.to_string(),
            home,
            draw,
            away,
        }
    }

    #[test]
    fn implied_probabilities_strip_the_margin() {
        let implied = implied_probabilities(&book("B365", 2.0, 3.5, 4.0)).unwrap();
        assert!((implied.raw.home_win - 50.0).abs() < 1e-9);
        assert!(implied.overround > 0.0);
        assert!((implied.fair.total() - 100.0).abs() < 1e-9);
        assert!(implied.fair.home_win < 50.0);
    }

    #[test]
    fn prices_of_one_or_less_are_rejected() {
        assert!(implied_probabilities(&book("X", 1.0, 3.0, 4.0)).is_none());
        assert!(implied_probabilities(&book("X", 2.0, 0.0, 4.0)).is_none());
    }

    #[test]
    fn consensus_is_the_median_price() {
        let c = consensus(&[
            book("A", 2.0, 3.0, 4.0),
            book("B", 2.2, 3.2, 3.6),
            book("C", 2.1, 3.4, 3.8),
            book("bad", 0.0, 3.0, 3.0),
        ])
        .unwrap();
        assert!((c.home - 2.1).abs() < 1e-12);
        assert!((c.draw - 3.2).abs() < 1e-12);
        assert!((c.away - 3.8).abs() < 1e-12);
        assert!(consensus(&[]).is_none());
    }

    #[test]
    fn compare_picks_the_largest_positive_edge() {
        let market = implied_probabilities(&book("A", 2.0, 3.5, 4.0)).unwrap();
        let model = Probabilities {
            home_win: 40.0,
            draw: 25.0,
            away_win: 35.0,
        };
        let cmp = compare(&model, &market);
        assert!(cmp.home_edge < 0.0);
        assert!(cmp.away_edge > 0.0);
        assert_eq!(cmp.best_value, Some(Outcome::Away));

        let no_value = compare(&market.fair, &market);
        assert_eq!(no_value.best_value, None);

        let swapped = compare(&model.flipped(), &market.flipped());
        assert_eq!(swapped.best_value, Some(Outcome::Home));
        assert!((swapped.home_edge - cmp.away_edge).abs() < 1e-12);
    }

    #[test]
    fn meeting_odds_are_newest_first_and_limited() {
        let d = |m, day| NaiveDate::from_ymd_opt(2023, m, day).unwrap();
        let table = MatchTable::new(vec![
            MatchRecord::new(d(8, 1), "A", "B", 1, 0).with_odds(book("B365", 2.0, 3.0, 4.0)),
            MatchRecord::new(d(9, 1), "B", "A", 1, 0).with_odds(book("B365", 2.5, 3.0, 3.0)),
            MatchRecord::new(d(10, 1), "A", "B", 2, 2),
            MatchRecord::new(d(11, 1), "A", "B", 0, 0).with_odds(book("B365", 1.9, 3.1, 4.5)),
            MatchRecord::new(d(12, 1), "A", "C", 0, 0).with_odds(book("B365", 1.9, 3.1, 4.5)),
        ]);
        let found = recent_meeting_odds(&table, "A", "B", 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].date, d(11, 1));
        assert_eq!(found[1].date, d(9, 1));
    }
}
