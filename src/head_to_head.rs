use serde::{Deserialize, Serialize};

use crate::dataset::MatchTable;
use crate::season::{SeasonSet, matches_filter};

pub const DEFAULT_H2H_CAP: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub team1: String,
    pub team2: String,
    pub matches: u32,
    pub team1_wins: u32,
    pub team2_wins: u32,
    pub draws: u32,
    pub team1_goals: u32,
    pub team2_goals: u32,
    pub avg_team1_goals: f64,
    pub avg_team2_goals: f64,
    /// "Home 2-1 Away" of the most recent meeting.
    pub last_result: Option<String>,
}

impl HeadToHead {
    pub fn team1_win_rate(&self) -> f64 {
        rate(self.team1_wins, self.matches)
    }

    pub fn team2_win_rate(&self) -> f64 {
        rate(self.team2_wins, self.matches)
    }

    pub fn draw_rate(&self) -> f64 {
        rate(self.draws, self.matches)
    }

    /// The same record seen from team2's side.
    pub fn mirrored(&self) -> Self {
        Self {
            team1: self.team2.clone(),
            team2: self.team1.clone(),
            matches: self.matches,
            team1_wins: self.team2_wins,
            team2_wins: self.team1_wins,
            draws: self.draws,
            team1_goals: self.team2_goals,
            team2_goals: self.team1_goals,
            avg_team1_goals: self.avg_team2_goals,
            avg_team2_goals: self.avg_team1_goals,
            last_result: self.last_result.clone(),
        }
    }
}

fn rate(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(total)
    }
}

/// Meetings between `team1` and `team2` at either venue, limited to the most
/// recent `cap` (all of them when `cap` is `None`).
pub fn head_to_head(
    table: &MatchTable,
    team1: &str,
    team2: &str,
    seasons: Option<&SeasonSet>,
    cap: Option<usize>,
) -> HeadToHead {
    let meetings = table
        .matches()
        .iter()
        .filter(|m| {
            ((m.home_team == team1 && m.away_team == team2)
                || (m.home_team == team2 && m.away_team == team1))
                && matches_filter(seasons, &m.season)
        })
        .collect::<Vec<_>>();
    let keep = cap.unwrap_or(meetings.len()).min(meetings.len());
    let recent = &meetings[meetings.len() - keep..];

    let mut out = HeadToHead {
        team1: team1.to_string(),
        team2: team2.to_string(),
        ..HeadToHead::default()
    };
    for m in recent {
        let (g1, g2) = if m.home_team == team1 {
            (m.home_goals, m.away_goals)
        } else {
            (m.away_goals, m.home_goals)
        };
        out.matches += 1;
        out.team1_goals += g1;
        out.team2_goals += g2;
        if g1 > g2 {
            out.team1_wins += 1;
        } else if g1 < g2 {
            out.team2_wins += 1;
        } else {
            out.draws += 1;
        }
    }
    if out.matches > 0 {
        out.avg_team1_goals = f64::from(out.team1_goals) / f64::from(out.matches);
        out.avg_team2_goals = f64::from(out.team2_goals) / f64::from(out.matches);
    }
    out.last_result = recent.last().map(|m| m.score_line());
    out
}
