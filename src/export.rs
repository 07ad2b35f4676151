use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};

use crate::dataset::MatchTable;
use crate::estimator::{EstimatorConfig, OutcomeEstimate};
use crate::memo::StatsCache;
use crate::season::SeasonSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub home: String,
    pub away: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    pub fixture: Fixture,
    pub estimate: OutcomeEstimate,
}

pub fn predict_fixtures(
    table: &MatchTable,
    seasons: &SeasonSet,
    cfg: &EstimatorConfig,
    fixtures: &[Fixture],
    use_model: bool,
) -> Vec<BatchRow> {
    let mut cache = StatsCache::new();
    let rows = fixtures
        .iter()
        .map(|f| BatchRow {
            fixture: f.clone(),
            estimate: cache.predict_match(table, seasons, &f.home, &f.away, cfg, use_model),
        })
        .collect::<Vec<_>>();
    tracing::debug!(
        fixtures = rows.len(),
        hits = cache.hits(),
        misses = cache.misses(),
        "batch predictions done"
    );
    rows
}

/// Two-column fixture list. Header names `home`/`away` or `HomeTeam`/`AwayTeam`
/// are recognised in any case; without one the first two columns are used.
pub fn read_fixture_list(path: &Path) -> Result<Vec<Fixture>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read fixtures {}", path.display()))?;
    parse_fixture_list(&raw).with_context(|| format!("parse fixtures {}", path.display()))
}

pub fn parse_fixture_list(raw: &str) -> Result<Vec<Fixture>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut out = Vec::new();
    let mut home_col = 0usize;
    let mut away_col = 1usize;
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("fixture line {}", idx + 1))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if idx == 0 && let Some((h, a)) = header_columns(&record) {
            home_col = h;
            away_col = a;
            continue;
        }
        let home = record.get(home_col).unwrap_or("").to_string();
        let away = record.get(away_col).unwrap_or("").to_string();
        if home.is_empty() || away.is_empty() {
            return Err(anyhow!("fixture line {} needs a home and an away team", idx + 1));
        }
        out.push(Fixture { home, away });
    }
    Ok(out)
}

fn header_columns(record: &csv::StringRecord) -> Option<(usize, usize)> {
    let find = |names: &[&str]| {
        record
            .iter()
            .position(|cell| names.iter().any(|n| cell.eq_ignore_ascii_case(n)))
    };
    Some((find(&["home", "hometeam"])?, find(&["away", "awayteam"])?))
}

pub fn export_predictions_xlsx(path: &Path, rows: &[BatchRow]) -> Result<()> {
    let mut prediction_rows = vec![vec![
        "Home".to_string(),
        "Away".to_string(),
        "Home Win %".to_string(),
        "Draw %".to_string(),
        "Away Win %".to_string(),
        "Most Likely".to_string(),
        "Confidence".to_string(),
        "xG Home".to_string(),
        "xG Away".to_string(),
        "Likely Score".to_string(),
    ]];
    let mut breakdown_rows = vec![vec![
        "Home".to_string(),
        "Away".to_string(),
        "Home Base".to_string(),
        "Away Base".to_string(),
        "Home Form".to_string(),
        "Away Form".to_string(),
        "Home H2H".to_string(),
        "Away H2H".to_string(),
        "Home Advantage".to_string(),
        "Home Strength".to_string(),
        "Draw Strength".to_string(),
        "Away Strength".to_string(),
    ]];

    for row in rows {
        let e = &row.estimate;
        let p = &e.probabilities;
        prediction_rows.push(vec![
            row.fixture.home.clone(),
            row.fixture.away.clone(),
            format!("{:.1}", p.home_win),
            format!("{:.1}", p.draw),
            format!("{:.1}", p.away_win),
            e.most_likely.to_string(),
            format!("{:.1}", e.confidence),
            format!("{:.2}", e.expected_goals.home),
            format!("{:.2}", e.expected_goals.away),
            format!("{}-{}", e.scoreline.home_goals, e.scoreline.away_goals),
        ]);
        let b = &e.breakdown;
        breakdown_rows.push(vec![
            row.fixture.home.clone(),
            row.fixture.away.clone(),
            format!("{:.1}", b.home_base),
            format!("{:.1}", b.away_base),
            format!("{:.1}", b.home_form),
            format!("{:.1}", b.away_form),
            format!("{:.1}", b.home_h2h),
            format!("{:.1}", b.away_h2h),
            format!("{:.1}", b.home_advantage),
            format!("{:.1}", b.home_strength),
            format!("{:.1}", b.draw_strength),
            format!("{:.1}", b.away_strength),
        ]);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Breakdown")?;
        write_rows(sheet, &breakdown_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

pub fn write_predictions_json(path: &Path, rows: &[BatchRow]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows).context("serialize predictions")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_list_accepts_header_in_any_order() {
        let list = parse_fixture_list("AwayTeam,HomeTeam\nGenk,Gent\n\nAnderlecht,Club Brugge\n")
            .unwrap();
        assert_eq!(
            list,
            vec![
                Fixture {
                    home: "Gent".to_string(),
                    away: "Genk".to_string()
                },
                Fixture {
                    home: "Club Brugge".to_string(),
                    away: "Anderlecht".to_string()
                },
            ]
        );
    }

    #[test]
    fn fixture_list_without_header_uses_first_columns() {
        let list = parse_fixture_list("Gent, Genk\nAntwerp,Standard,extra\n").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].away, "Genk");
        assert_eq!(list[1].home, "Antwerp");
    }

    #[test]
    fn fixture_missing_a_team_is_an_error() {
        assert!(parse_fixture_list("home,away\nGent,\n").is_err());
    }
}
