use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{MatchRecord, MatchTable, Outcome};
use crate::season::SeasonSet;

const DEFAULT_HOME_ADVANTAGE: f64 = 7.0;
const MAX_HOME_ADVANTAGE: f64 = 15.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueStats {
    pub matches: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_scored: u32,
    pub goals_conceded: u32,
    pub win_rate: f64,
    pub draw_rate: f64,
    pub avg_goals_scored: f64,
    pub avg_goals_conceded: f64,
    pub avg_shots: f64,
    pub avg_shots_on_target: f64,
    pub avg_corners: f64,
}

impl VenueStats {
    pub fn points(&self) -> u32 {
        self.wins * 3 + self.draws
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team: String,
    pub home: VenueStats,
    pub away: VenueStats,
}

impl TeamStats {
    pub fn total_matches(&self) -> u32 {
        self.home.matches + self.away.matches
    }

    pub fn overall_points_per_match(&self) -> f64 {
        let n = self.total_matches();
        if n == 0 {
            return 0.0;
        }
        f64::from(self.home.points() + self.away.points()) / f64::from(n)
    }

    pub fn overall_goal_difference_per_match(&self) -> f64 {
        let n = self.total_matches();
        if n == 0 {
            return 0.0;
        }
        let scored = f64::from(self.home.goals_scored + self.away.goals_scored);
        let conceded = f64::from(self.home.goals_conceded + self.away.goals_conceded);
        (scored - conceded) / f64::from(n)
    }

    fn weighted(&self, pick: impl Fn(&VenueStats) -> f64) -> f64 {
        let n = self.total_matches();
        if n == 0 {
            return 0.0;
        }
        (pick(&self.home) * f64::from(self.home.matches)
            + pick(&self.away) * f64::from(self.away.matches))
            / f64::from(n)
    }
}

#[derive(Default)]
struct VenueAcc {
    matches: u32,
    wins: u32,
    draws: u32,
    scored: u32,
    conceded: u32,
    shots: Sum,
    shots_on_target: Sum,
    corners: Sum,
}

#[derive(Default)]
struct Sum {
    total: u64,
    n: u32,
}

impl Sum {
    fn push(&mut self, value: Option<u32>) {
        if let Some(v) = value {
            self.total += u64::from(v);
            self.n += 1;
        }
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.total as f64 / f64::from(self.n)
        }
    }
}

impl VenueAcc {
    fn push_home(&mut self, m: &MatchRecord) {
        self.push(
            m.home_goals,
            m.away_goals,
            m.result == Outcome::Home,
            m.result == Outcome::Draw,
        );
        self.shots.push(m.home_shots);
        self.shots_on_target.push(m.home_shots_on_target);
        self.corners.push(m.home_corners);
    }

    fn push_away(&mut self, m: &MatchRecord) {
        self.push(
            m.away_goals,
            m.home_goals,
            m.result == Outcome::Away,
            m.result == Outcome::Draw,
        );
        self.shots.push(m.away_shots);
        self.shots_on_target.push(m.away_shots_on_target);
        self.corners.push(m.away_corners);
    }

    fn push(&mut self, scored: u32, conceded: u32, won: bool, drew: bool) {
        self.matches += 1;
        self.scored += scored;
        self.conceded += conceded;
        if won {
            self.wins += 1;
        } else if drew {
            self.draws += 1;
        }
    }

    fn finish(&self) -> VenueStats {
        if self.matches == 0 {
            return VenueStats::default();
        }
        let n = f64::from(self.matches);
        VenueStats {
            matches: self.matches,
            wins: self.wins,
            draws: self.draws,
            losses: self.matches - self.wins - self.draws,
            goals_scored: self.scored,
            goals_conceded: self.conceded,
            win_rate: f64::from(self.wins) / n,
            draw_rate: f64::from(self.draws) / n,
            avg_goals_scored: f64::from(self.scored) / n,
            avg_goals_conceded: f64::from(self.conceded) / n,
            avg_shots: self.shots.mean(),
            avg_shots_on_target: self.shots_on_target.mean(),
            avg_corners: self.corners.mean(),
        }
    }
}

/// Home and away aggregates for `team` over the matches of `seasons`.
/// A team that never appears gets all-zero statistics.
pub fn compute_team_stats(table: &MatchTable, seasons: &SeasonSet, team: &str) -> TeamStats {
    let mut home = VenueAcc::default();
    let mut away = VenueAcc::default();
    for m in table.in_seasons(seasons) {
        if m.home_team == team {
            home.push_home(m);
        }
        if m.away_team == team {
            away.push_away(m);
        }
    }
    TeamStats {
        team: team.to_string(),
        home: home.finish(),
        away: away.finish(),
    }
}

/// Statistics for every team that appears in `seasons`, in one pass.
pub fn compute_league_stats(table: &MatchTable, seasons: &SeasonSet) -> BTreeMap<String, TeamStats> {
    let mut accs: BTreeMap<&str, (VenueAcc, VenueAcc)> = BTreeMap::new();
    for m in table.in_seasons(seasons) {
        accs.entry(m.home_team.as_str()).or_default().0.push_home(m);
        accs.entry(m.away_team.as_str()).or_default().1.push_away(m);
    }
    accs.into_iter()
        .map(|(team, (home, away))| {
            let stats = TeamStats {
                team: team.to_string(),
                home: home.finish(),
                away: away.finish(),
            };
            (team.to_string(), stats)
        })
        .collect()
}

/// Composite 0-100 rating: points per match (40%), goal difference per match
/// (30%), shots on target (20%) and shot volume (10%).
pub fn power_rating(stats: &TeamStats) -> f64 {
    if stats.total_matches() == 0 {
        return 0.0;
    }
    let ppm = stats.overall_points_per_match() / 3.0;
    let gd = (stats.overall_goal_difference_per_match() + 2.0) / 4.0;
    let sot = stats.weighted(|v| v.avg_shots_on_target) / 10.0;
    let volume = (stats.weighted(|v| v.avg_shots) / 15.0).min(1.0);
    let rating = (0.4 * ppm + 0.3 * gd + 0.2 * sot + 0.1 * volume) * 100.0;
    rating.clamp(0.0, 100.0)
}

/// Home advantage in percentage points: the gap between home and away win
/// rates, limited to 0..=15. Falls back to 7 when either venue is unplayed.
pub fn home_advantage_factor(stats: &TeamStats) -> f64 {
    if stats.home.matches == 0 || stats.away.matches == 0 {
        return DEFAULT_HOME_ADVANTAGE;
    }
    ((stats.home.win_rate - stats.away.win_rate) * 100.0).clamp(0.0, MAX_HOME_ADVANTAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn table() -> MatchTable {
        MatchTable::new(vec![
            MatchRecord::new(d(2023, 8, 12), "Brugge", "Anderlecht", 2, 1)
                .with_shots(14, 9)
                .with_shots_on_target(6, 3)
                .with_corners(7, 4),
            MatchRecord::new(d(2023, 9, 2), "Anderlecht", "Brugge", 1, 1),
            MatchRecord::new(d(2023, 10, 8), "Brugge", "Genk", 0, 2).with_shots(10, 12),
            MatchRecord::new(d(2022, 10, 8), "Brugge", "Genk", 5, 0),
        ])
    }

    #[test]
    fn venue_partitions_cover_every_match_of_the_team() {
        let seasons = SeasonSet::single("2023-2024");
        let stats = compute_team_stats(&table(), &seasons, "Brugge");
        assert_eq!(stats.home.matches, 2);
        assert_eq!(stats.away.matches, 1);
        assert_eq!(stats.total_matches(), 3);
        assert_eq!(stats.home.wins, 1);
        assert_eq!(stats.home.losses, 1);
        assert_eq!(stats.away.draws, 1);
        assert_eq!(stats.home.goals_scored, 2);
        assert_eq!(stats.home.goals_conceded, 3);
        assert!((stats.home.win_rate - 0.5).abs() < 1e-12);
        assert!((stats.home.avg_shots - 12.0).abs() < 1e-12);
        // Only one home row carries shots on target.
        assert!((stats.home.avg_shots_on_target - 6.0).abs() < 1e-12);
        assert_eq!(stats.away.avg_shots, 0.0);
    }

    #[test]
    fn unknown_team_is_all_zero() {
        let stats = compute_team_stats(&table(), &SeasonSet::single("2023-2024"), "Nobody");
        assert_eq!(stats.home, VenueStats::default());
        assert_eq!(stats.away, VenueStats::default());
        assert_eq!(power_rating(&stats), 0.0);
        assert_eq!(stats.overall_points_per_match(), 0.0);
    }

    #[test]
    fn league_stats_agree_with_single_team_calls() {
        let t = table();
        let seasons: SeasonSet = ["2022-2023", "2023-2024"].into_iter().collect();
        let league = compute_league_stats(&t, &seasons);
        assert_eq!(league.len(), 3);
        for (team, stats) in &league {
            assert_eq!(*stats, compute_team_stats(&t, &seasons, team));
        }
    }

    #[test]
    fn home_advantage_defaults_and_clamps() {
        let mut stats = TeamStats::default();
        assert_eq!(home_advantage_factor(&stats), 7.0);
        stats.home.matches = 10;
        stats.away.matches = 10;
        stats.home.win_rate = 0.9;
        stats.away.win_rate = 0.1;
        assert_eq!(home_advantage_factor(&stats), 15.0);
        stats.home.win_rate = 0.2;
        assert_eq!(home_advantage_factor(&stats), 0.0);
    }

    #[test]
    fn power_rating_stays_in_range() {
        let seasons = SeasonSet::single("2022-2023");
        let stats = compute_team_stats(&table(), &seasons, "Brugge");
        let r = power_rating(&stats);
        assert!((0.0..=100.0).contains(&r));
        assert!(r > 50.0);
    }
}
