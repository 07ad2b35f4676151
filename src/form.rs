use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dataset::MatchTable;
use crate::season::{SeasonSet, matches_filter};

pub const DEFAULT_FORM_MATCHES: usize = 5;

const NEUTRAL_POINTS_PER_MATCH: f64 = 1.5;
const NEUTRAL_FORM_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    fn from_goals(goals_for: u32, goals_against: u32) -> Self {
        if goals_for > goals_against {
            MatchResult::Win
        } else if goals_for < goals_against {
            MatchResult::Loss
        } else {
            MatchResult::Draw
        }
    }

    pub fn points(self) -> u32 {
        match self {
            MatchResult::Win => 3,
            MatchResult::Draw => 1,
            MatchResult::Loss => 0,
        }
    }

    pub fn letter(self) -> char {
        match self {
            MatchResult::Win => 'W',
            MatchResult::Draw => 'D',
            MatchResult::Loss => 'L',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormMatch {
    pub date: NaiveDate,
    pub opponent: String,
    pub venue: Venue,
    pub goals_for: u32,
    pub goals_against: u32,
    pub result: MatchResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentForm {
    pub team: String,
    /// Oldest first.
    pub matches: Vec<FormMatch>,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points_per_match: f64,
    pub goal_difference: i64,
    pub form_score: f64,
}

impl RecentForm {
    fn neutral(team: &str) -> Self {
        Self {
            team: team.to_string(),
            matches: Vec::new(),
            wins: 0,
            draws: 0,
            losses: 0,
            points: 0,
            goals_for: 0,
            goals_against: 0,
            points_per_match: NEUTRAL_POINTS_PER_MATCH,
            goal_difference: 0,
            form_score: NEUTRAL_FORM_SCORE,
        }
    }

    pub fn matches_used(&self) -> usize {
        self.matches.len()
    }

    /// Results as letters, oldest to newest, e.g. "WWDLW".
    pub fn form_string(&self) -> String {
        self.matches.iter().map(|m| m.result.letter()).collect()
    }
}

/// Form over the last `n` matches `team` played at either venue.
pub fn recent_form(
    table: &MatchTable,
    team: &str,
    n: usize,
    seasons: Option<&SeasonSet>,
) -> RecentForm {
    if n == 0 {
        return RecentForm::neutral(team);
    }

    let played = table
        .matches()
        .iter()
        .filter(|m| m.involves(team) && matches_filter(seasons, &m.season))
        .collect::<Vec<_>>();
    if played.is_empty() {
        return RecentForm::neutral(team);
    }
    let recent = &played[played.len().saturating_sub(n)..];

    let mut form = RecentForm::neutral(team);
    for m in recent {
        let (venue, opponent, goals_for, goals_against) = if m.home_team == team {
            (Venue::Home, &m.away_team, m.home_goals, m.away_goals)
        } else {
            (Venue::Away, &m.home_team, m.away_goals, m.home_goals)
        };
        let result = MatchResult::from_goals(goals_for, goals_against);
        match result {
            MatchResult::Win => form.wins += 1,
            MatchResult::Draw => form.draws += 1,
            MatchResult::Loss => form.losses += 1,
        }
        form.points += result.points();
        form.goals_for += goals_for;
        form.goals_against += goals_against;
        form.matches.push(FormMatch {
            date: m.date,
            opponent: opponent.clone(),
            venue,
            goals_for,
            goals_against,
            result,
        });
    }

    let used = form.matches.len() as f64;
    form.points_per_match = f64::from(form.points) / used;
    form.goal_difference = i64::from(form.goals_for) - i64::from(form.goals_against);
    form.form_score = f64::from(form.points) / (3.0 * used) * 100.0;
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MatchRecord;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table() -> MatchTable {
        MatchTable::new(vec![
            MatchRecord::new(d(2023, 8, 1), "A", "B", 3, 0),
            MatchRecord::new(d(2023, 8, 8), "C", "A", 1, 1),
            MatchRecord::new(d(2023, 8, 15), "A", "D", 0, 1),
            MatchRecord::new(d(2023, 8, 22), "B", "A", 0, 2),
            MatchRecord::new(d(2023, 8, 29), "B", "C", 4, 4),
        ])
    }

    #[test]
    fn counts_points_from_the_teams_side() {
        let form = recent_form(&table(), "A", 5, None);
        assert_eq!(form.matches_used(), 4);
        assert_eq!((form.wins, form.draws, form.losses), (2, 1, 1));
        assert_eq!(form.points, 7);
        assert_eq!(form.goals_for, 6);
        assert_eq!(form.goals_against, 2);
        assert_eq!(form.goal_difference, 4);
        assert!((form.points_per_match - 1.75).abs() < 1e-12);
        assert!((form.form_score - 7.0 / 12.0 * 100.0).abs() < 1e-9);
        assert_eq!(form.form_string(), "WDLW");
        assert_eq!(form.matches[1].venue, Venue::Away);
        assert_eq!(form.matches[1].opponent, "C");
    }

    #[test]
    fn keeps_only_the_most_recent_n() {
        let form = recent_form(&table(), "A", 2, None);
        assert_eq!(form.form_string(), "LW");
        assert_eq!(form.matches[0].date, d(2023, 8, 15));
    }

    #[test]
    fn no_matches_is_neutral() {
        for form in [
            recent_form(&table(), "Z", 5, None),
            recent_form(&table(), "A", 0, None),
            recent_form(&table(), "A", 5, Some(&SeasonSet::single("1999-2000"))),
        ] {
            assert_eq!(form.matches_used(), 0);
            assert_eq!(form.points_per_match, 1.5);
            assert_eq!(form.form_score, 50.0);
            assert_eq!(form.points, 0);
        }
    }

    #[test]
    fn perfect_run_scores_one_hundred() {
        let form = recent_form(&table(), "A", 5, None);
        assert!(form.form_score < 100.0);
        let wins = MatchTable::new(vec![
            MatchRecord::new(d(2023, 8, 1), "A", "B", 1, 0),
            MatchRecord::new(d(2023, 8, 2), "B", "A", 0, 1),
        ]);
        assert_eq!(recent_form(&wins, "A", 5, None).form_score, 100.0);
    }
}
