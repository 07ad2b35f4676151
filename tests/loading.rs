use std::path::PathBuf;

use fixture_forecast::dataset::{DateOrder, MatchTable, load_csv};
use fixture_forecast::season::SeasonSet;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn sample() -> MatchTable {
    let (table, _) = load_csv(&fixture_path("sample_matches.csv"), DateOrder::DayFirst)
        .expect("fixture should load");
    table
}

#[test]
fn loads_football_data_export() {
    let (table, report) = load_csv(&fixture_path("sample_matches.csv"), DateOrder::DayFirst)
        .expect("fixture should load");
    assert_eq!(report.rows_read, 63);
    assert_eq!(report.rows_kept, 61);
    assert_eq!(report.rows_dropped, 2);
    assert_eq!(table.len(), 61);
    assert!(report.errors.iter().any(|e| e.contains("bad date")));
    assert!(report.errors.iter().any(|e| e.contains("contradicts")));
}

#[test]
fn seasons_follow_july_start() {
    let table = sample();
    assert_eq!(table.seasons(), vec!["2023-2024", "2022-2023"]);
    assert_eq!(table.latest_season().as_deref(), Some("2023-2024"));

    // 29/07/23 is the first match of the file's second season.
    let first_2023 = table
        .matches()
        .iter()
        .find(|m| m.season == "2023-2024")
        .expect("season present");
    assert_eq!(first_2023.date.to_string(), "2023-07-29");
}

#[test]
fn teams_and_season_filtering() {
    let table = sample();
    assert_eq!(
        table.teams(),
        vec!["Anderlecht", "Antwerp", "Club Brugge", "Genk", "Gent", "Standard"]
    );
    let latest = SeasonSet::single("2023-2024");
    assert_eq!(table.in_seasons(&latest).count(), 31);
    assert_eq!(table.in_seasons(&SeasonSet::single("2022-2023")).count(), 30);
    assert_eq!(table.in_seasons(&SeasonSet::single("2019-2020")).count(), 0);
}

#[test]
fn odds_columns_are_collected_when_present() {
    let table = sample();
    let last = table.matches().last().expect("non-empty");
    assert_eq!(last.score_line(), "Club Brugge 0-2 Anderlecht");
    let books = last.odds.iter().map(|o| o.bookmaker.as_str()).collect::<Vec<_>>();
    assert_eq!(books, vec!["B365", "PS"]);

    let unpriced = table
        .matches()
        .iter()
        .filter(|m| m.odds.is_empty())
        .count();
    assert!(unpriced > 0);
}

#[test]
fn wrong_date_order_drops_rows_instead_of_failing() {
    let (table, report) = load_csv(&fixture_path("sample_matches.csv"), DateOrder::Iso)
        .expect("file itself is readable");
    assert!(table.is_empty());
    assert_eq!(report.rows_dropped, report.rows_read);
    assert!(report.errors.len() <= 20);
}

#[test]
fn missing_file_is_an_error() {
    assert!(load_csv(&fixture_path("nope.csv"), DateOrder::DayFirst).is_err());
}

#[test]
fn season_selection_rejects_empty_and_unknown_lists() {
    let table = sample();
    let latest = table.select_seasons(None).expect("latest season");
    assert_eq!(latest, SeasonSet::single("2023-2024"));
    assert_eq!(table.select_seasons(Some("all")).expect("all").len(), 2);

    let err = table.select_seasons(Some(",")).unwrap_err();
    assert!(err.to_string().contains("no season selected"));
    assert!(table.select_seasons(Some("2010-2011,2011-2012")).is_err());
    assert!(table.select_seasons(Some("2010-2011,2022-2023")).is_ok());
}

#[test]
fn same_team_rows_never_reach_the_table() {
    let table = sample();
    assert!(table.matches().iter().all(|m| m.home_team != m.away_team));
}
