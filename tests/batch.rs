use std::fs;
use std::path::PathBuf;

use fixture_forecast::backtest::{BacktestOptions, history_window, run_backtest};
use fixture_forecast::dataset::{DateOrder, MatchTable, load_csv};
use fixture_forecast::estimator::EstimatorConfig;
use fixture_forecast::export::{
    BatchRow, export_predictions_xlsx, predict_fixtures, read_fixture_list,
    write_predictions_json,
};
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

fn batch() -> Vec<BatchRow> {
    let table = sample();
    let fixtures = read_fixture_list(&fixture_path("fixtures.csv")).expect("fixture list");
    predict_fixtures(
        &table,
        &SeasonSet::single("2023-2024"),
        &EstimatorConfig::default(),
        &fixtures,
        false,
    )
}

#[test]
fn batch_keeps_fixture_order_and_handles_unknown_teams() {
    let rows = batch();
    let pairs = rows
        .iter()
        .map(|r| (r.fixture.home.as_str(), r.fixture.away.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        pairs,
        vec![
            ("Club Brugge", "Anderlecht"),
            ("Genk", "Gent"),
            ("Standard", "Antwerp"),
            ("Kortrijk", "Genk"),
        ]
    );
    let unknown = &rows[3].estimate;
    assert_eq!(unknown.breakdown.home_base, 50.0);
    assert_eq!(unknown.breakdown.home_form, 0.0);
    assert!(!unknown.breakdown.h2h_applied);
}

#[test]
fn workbook_is_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("predictions.xlsx");
    export_predictions_xlsx(&path, &batch()).expect("export should succeed");
    let bytes = fs::read(&path).expect("workbook exists");
    // xlsx is a zip container.
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn json_output_reads_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("predictions.json");
    let rows = batch();
    write_predictions_json(&path, &rows).expect("write json");
    assert!(!path.with_extension("json.tmp").exists());

    let raw = fs::read_to_string(&path).expect("json exists");
    let back: Vec<BatchRow> = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(back.len(), rows.len());
    assert_eq!(back[0].fixture, rows[0].fixture);
    assert_eq!(back[0].estimate.most_likely, rows[0].estimate.most_likely);
}

#[test]
fn backtest_accounts_for_every_target_match() {
    let table = sample();
    let opts = BacktestOptions {
        target_seasons: SeasonSet::single("2023-2024"),
        history_seasons: 1,
        min_history: 3,
        use_model: false,
    };
    let report = run_backtest(&table, &EstimatorConfig::default(), &opts);
    assert_eq!(report.evaluated + report.skipped, 31);
    assert!(report.evaluated > 0);
    assert_eq!(report.model.samples, report.evaluated);
    assert!(report.model.accuracy >= 0.0 && report.model.accuracy <= 1.0);

    let window = history_window(&table, "2023-2024", 1);
    assert_eq!(window.to_string(), "2022-2023,2023-2024");
}
