use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use fixture_forecast::config::{self, AppConfig};
use fixture_forecast::dataset::{self, DateOrder, MatchTable};
use fixture_forecast::estimator::{OutcomeEstimate, predict_match};
use fixture_forecast::export;
use fixture_forecast::form::{RecentForm, Venue, recent_form};
use fixture_forecast::head_to_head::{HeadToHead, head_to_head};
use fixture_forecast::logging::{self, LogFormat};
use fixture_forecast::odds::{self, DEFAULT_ODDS_MEETINGS};
use fixture_forecast::regression::GoalModel;
use fixture_forecast::team_stats::{
    TeamStats, VenueStats, compute_team_stats, home_advantage_factor, power_rating,
};

/// Football match outcome estimates from historical results.
#[derive(Parser, Debug)]
#[command(name = "fixture_forecast", version, about, long_about = None)]
struct Cli {
    /// Match history CSV in football-data.co.uk layout (or FORECAST_DATA)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Date layout of the CSV: iso, day-first or month-first
    #[arg(long, global = true)]
    date_order: Option<DateOrder>,

    /// Comma-separated season labels such as 2022-2023,2023-2024, or "all".
    /// Defaults to the latest season in the file.
    #[arg(long, global = true)]
    seasons: Option<String>,

    /// JSON file with estimator settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use JSON log format instead of pretty
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List teams in the selected seasons
    Teams,
    /// List seasons in the file, newest first
    Seasons,
    /// Home and away statistics for one team
    Stats { team: String },
    /// Recent form over the last N matches
    Form {
        team: String,
        #[arg(short = 'n', long)]
        matches: Option<usize>,
    },
    /// Head-to-head record between two teams
    H2h {
        team1: String,
        team2: String,
        /// Only the most recent N meetings
        #[arg(long)]
        last: Option<usize>,
    },
    /// Outcome estimate for a hypothetical fixture
    Predict {
        home: String,
        away: String,
        /// Blend in the shots/corners goal regression
        #[arg(long)]
        model: bool,
        /// Print the estimate as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bookmaker odds of recent meetings against the model
    Odds {
        home: String,
        away: String,
        #[arg(long, default_value_t = DEFAULT_ODDS_MEETINGS)]
        meetings: usize,
    },
    /// Estimates for every fixture of a two-column CSV
    Batch {
        fixtures: PathBuf,
        #[arg(long)]
        xlsx: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        model: bool,
    },
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    };
    logging::init("info", format);

    let mut app = AppConfig::from_env(cli.config.as_deref())?;
    if let Some(order) = cli.date_order {
        app.date_order = order;
    }
    let data = cli
        .data
        .clone()
        .or(app.data_path.clone())
        .ok_or_else(|| anyhow!("no match data: pass --data or set FORECAST_DATA"))?;

    let (table, report) = dataset::load_csv(&data, app.date_order)?;
    for err in &report.errors {
        tracing::debug!(%err, "dropped row");
    }
    if table.is_empty() {
        return Err(anyhow!(
            "no usable rows in {} (read {}, dropped {})",
            data.display(),
            report.rows_read,
            report.rows_dropped
        ));
    }
    let seasons = table.select_seasons(cli.seasons.as_deref())?;
    let cfg = &app.estimator;

    match cli.command {
        Command::Teams => {
            for team in table.teams_in(&seasons) {
                println!("{team}");
            }
        }
        Command::Seasons => {
            for season in table.seasons() {
                println!("{season}");
            }
        }
        Command::Stats { team } => {
            warn_unknown(&table, &[team.as_str()]);
            print_stats(&compute_team_stats(&table, &seasons, &team));
        }
        Command::Form { team, matches } => {
            warn_unknown(&table, &[team.as_str()]);
            let n = matches.unwrap_or(cfg.form_matches);
            print_form(&recent_form(&table, &team, n, Some(&seasons)));
        }
        Command::H2h { team1, team2, last } => {
            warn_unknown(&table, &[team1.as_str(), team2.as_str()]);
            let cap = last.or(Some(cfg.h2h_cap));
            print_h2h(&head_to_head(&table, &team1, &team2, Some(&seasons), cap));
        }
        Command::Predict {
            home,
            away,
            model,
            json,
        } => {
            warn_unknown(&table, &[home.as_str(), away.as_str()]);
            let goal_model = model.then(|| GoalModel::fit(&table, &seasons)).flatten();
            if model && goal_model.is_none() {
                tracing::warn!("not enough shot/corner data for the goal model; skipping it");
            }
            let estimate = predict_match(&table, &seasons, &home, &away, cfg, goal_model.as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                print_estimate(&estimate, goal_model.as_ref());
            }
        }
        Command::Odds {
            home,
            away,
            meetings,
        } => {
            warn_unknown(&table, &[home.as_str(), away.as_str()]);
            let estimate = predict_match(&table, &seasons, &home, &away, cfg, None);
            print_odds(&table, &estimate, meetings);
        }
        Command::Batch {
            fixtures,
            xlsx,
            json,
            model,
        } => {
            let list = export::read_fixture_list(&fixtures)?;
            let rows = export::predict_fixtures(&table, &seasons, cfg, &list, model);
            for row in &rows {
                let p = &row.estimate.probabilities;
                println!(
                    "{:<24} {:<24} H {:>5.1}  D {:>5.1}  A {:>5.1}  -> {}",
                    row.fixture.home, row.fixture.away, p.home_win, p.draw, p.away_win,
                    row.estimate.most_likely
                );
            }
            if let Some(path) = xlsx {
                export::export_predictions_xlsx(&path, &rows)?;
                tracing::info!(path = %path.display(), rows = rows.len(), "wrote workbook");
            }
            if let Some(path) = json {
                export::write_predictions_json(&path, &rows)?;
                tracing::info!(path = %path.display(), rows = rows.len(), "wrote json");
            }
        }
    }
    Ok(())
}

fn warn_unknown(table: &MatchTable, teams: &[&str]) {
    let known = table.teams();
    for team in teams {
        if !known.iter().any(|k| k == team) {
            tracing::warn!(team = *team, "team not found; its statistics will be empty");
        }
    }
}

fn print_venue(label: &str, v: &VenueStats) {
    println!(
        "  {label:<5} P {:>3}  W {:>3}  D {:>3}  L {:>3}  GF {:>3}  GA {:>3}  win {:>5.1}%  draw {:>5.1}%",
        v.matches,
        v.wins,
        v.draws,
        v.losses,
        v.goals_scored,
        v.goals_conceded,
        v.win_rate * 100.0,
        v.draw_rate * 100.0
    );
    println!(
        "        avg scored {:.2}  conceded {:.2}  shots {:.1}  on target {:.1}  corners {:.1}",
        v.avg_goals_scored, v.avg_goals_conceded, v.avg_shots, v.avg_shots_on_target, v.avg_corners
    );
}

fn print_stats(stats: &TeamStats) {
    println!("{}", stats.team);
    print_venue("Home", &stats.home);
    print_venue("Away", &stats.away);
    println!(
        "  Points/match {:.2}  Power rating {:.1}  Home advantage {:.1} pts",
        stats.overall_points_per_match(),
        power_rating(stats),
        home_advantage_factor(stats)
    );
}

fn print_form(form: &RecentForm) {
    println!(
        "{}: {} ({} pts from {}, {:.2}/match, GD {:+}, form {:.1})",
        form.team,
        if form.matches.is_empty() {
            "-".to_string()
        } else {
            form.form_string()
        },
        form.points,
        form.matches_used(),
        form.points_per_match,
        form.goal_difference,
        form.form_score
    );
    for m in &form.matches {
        let venue = match m.venue {
            Venue::Home => "vs",
            Venue::Away => "at",
        };
        println!(
            "  {}  {} {:<24} {}-{}  {}",
            m.date,
            venue,
            m.opponent,
            m.goals_for,
            m.goals_against,
            m.result.letter()
        );
    }
}

fn print_h2h(h: &HeadToHead) {
    println!("{} vs {}: {} meetings", h.team1, h.team2, h.matches);
    if h.matches == 0 {
        return;
    }
    println!(
        "  {} wins {}  draws {}  {} wins {}",
        h.team1, h.team1_wins, h.draws, h.team2, h.team2_wins
    );
    println!(
        "  goals {}-{} (avg {:.2}-{:.2})",
        h.team1_goals, h.team2_goals, h.avg_team1_goals, h.avg_team2_goals
    );
    if let Some(last) = &h.last_result {
        println!("  last: {last}");
    }
}

fn print_estimate(e: &OutcomeEstimate, model: Option<&GoalModel>) {
    let p = &e.probabilities;
    println!("{} vs {}", e.home_team, e.away_team);
    println!(
        "  Home {:.1}%  Draw {:.1}%  Away {:.1}%  -> {} (confidence {:.1})",
        p.home_win, p.draw, p.away_win, e.most_likely, e.confidence
    );
    println!(
        "  Expected goals {:.2} - {:.2}; most likely score {}-{} ({:.1}%)",
        e.expected_goals.home,
        e.expected_goals.away,
        e.scoreline.home_goals,
        e.scoreline.away_goals,
        e.scoreline.probability
    );
    let b = &e.breakdown;
    println!(
        "  Strength home {:.1} (base {:.1}, form {:+.1}, h2h {:+.1}, adv {:+.1})  away {:.1} (base {:.1}, form {:+.1}, h2h {:+.1})  draw {:.1}",
        b.home_strength,
        b.home_base,
        b.home_form,
        b.home_h2h,
        b.home_advantage,
        b.away_strength,
        b.away_base,
        b.away_form,
        b.away_h2h,
        b.draw_strength
    );
    if let Some(m) = model {
        println!(
            "  Goal model trained on {} rows (R2 home {:.2}, away {:.2})",
            m.training_rows, m.home.r_squared, m.away.r_squared
        );
    }
}

fn print_odds(table: &MatchTable, estimate: &OutcomeEstimate, meetings: usize) {
    let found = odds::recent_meeting_odds(table, &estimate.home_team, &estimate.away_team, meetings);
    if found.is_empty() {
        println!("No meetings with odds between {} and {}", estimate.home_team, estimate.away_team);
        return;
    }
    let p = &estimate.probabilities;
    println!(
        "Model: Home {:.1}%  Draw {:.1}%  Away {:.1}%",
        p.home_win, p.draw, p.away_win
    );
    for m in found {
        println!("{}  {}", m.date, m.score_line());
        let Some(market) = odds::consensus(&m.odds).and_then(|c| odds::implied_probabilities(&c))
        else {
            continue;
        };
        let market = if m.home_team == estimate.home_team {
            market
        } else {
            market.flipped()
        };
        let cmp = odds::compare(p, &market);
        println!(
            "  market {:.1}/{:.1}/{:.1} (margin {:.1}%)  edge {:+.1}/{:+.1}/{:+.1}{}",
            market.fair.home_win,
            market.fair.draw,
            market.fair.away_win,
            market.overround,
            cmp.home_edge,
            cmp.draw_edge,
            cmp.away_edge,
            cmp.best_value
                .map(|o| format!("  value: {o}"))
                .unwrap_or_default()
        );
    }
}
