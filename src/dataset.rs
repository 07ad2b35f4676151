use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::season::{SeasonSet, season_label};

/// Bookmaker column prefixes in football-data style exports (`B365H`, `B365D`, `B365A`, ...).
pub const ODDS_PREFIXES: &[&str] = &["B365", "BW", "IW", "PS", "WH", "VC", "Max", "Avg"];

const MAX_REPORTED_ERRORS: usize = 20;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn from_goals(home_goals: u32, away_goals: u32) -> Self {
        if home_goals > away_goals {
            Outcome::Home
        } else if home_goals < away_goals {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    /// Full-time result code: `H`, `D` or `A`.
    pub fn from_code(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H" => Some(Outcome::Home),
            "D" => Some(Outcome::Draw),
            "A" => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Outcome::Home => 'H',
            Outcome::Draw => 'D',
            Outcome::Away => 'A',
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Outcome::Home => Outcome::Away,
            Outcome::Draw => Outcome::Draw,
            Outcome::Away => Outcome::Home,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Home => "home win",
            Outcome::Draw => "draw",
            Outcome::Away => "away win",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerOdds {
    pub bookmaker: String,
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    // Derived from `date` when the record is built.
    pub season: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub result: Outcome,
    pub home_shots: Option<u32>,
    pub away_shots: Option<u32>,
    pub home_shots_on_target: Option<u32>,
    pub away_shots_on_target: Option<u32>,
    pub home_corners: Option<u32>,
    pub away_corners: Option<u32>,
    pub odds: Vec<BookmakerOdds>,
}

impl MatchRecord {
    pub fn new(
        date: NaiveDate,
        home_team: &str,
        away_team: &str,
        home_goals: u32,
        away_goals: u32,
    ) -> Self {
        Self {
            date,
            season: season_label(date),
            home_team: home_team.trim().to_string(),
            away_team: away_team.trim().to_string(),
            home_goals,
            away_goals,
            result: Outcome::from_goals(home_goals, away_goals),
            home_shots: None,
            away_shots: None,
            home_shots_on_target: None,
            away_shots_on_target: None,
            home_corners: None,
            away_corners: None,
            odds: Vec::new(),
        }
    }

    pub fn with_shots(mut self, home: u32, away: u32) -> Self {
        self.home_shots = Some(home);
        self.away_shots = Some(away);
        self
    }

    pub fn with_shots_on_target(mut self, home: u32, away: u32) -> Self {
        self.home_shots_on_target = Some(home);
        self.away_shots_on_target = Some(away);
        self
    }

    pub fn with_corners(mut self, home: u32, away: u32) -> Self {
        self.home_corners = Some(home);
        self.away_corners = Some(away);
        self
    }

    pub fn with_odds(mut self, odds: BookmakerOdds) -> Self {
        self.odds.push(odds);
        self
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// Goals as (for, against) from `team`'s point of view.
    pub fn goals_for(&self, team: &str) -> Option<(u32, u32)> {
        if self.home_team == team {
            Some((self.home_goals, self.away_goals))
        } else if self.away_team == team {
            Some((self.away_goals, self.home_goals))
        } else {
            None
        }
    }

    pub fn score_line(&self) -> String {
        format!(
            "{} {}-{} {}",
            self.home_team, self.home_goals, self.away_goals, self.away_team
        )
    }
}

/// Immutable, date-ordered match history.
#[derive(Debug, Clone)]
pub struct MatchTable {
    matches: Vec<MatchRecord>,
    generation: u64,
}

impl MatchTable {
    pub fn new(mut matches: Vec<MatchRecord>) -> Self {
        // Stable sort keeps file order for same-day fixtures.
        matches.sort_by_key(|m| m.date);
        Self {
            matches,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Changes whenever a table is rebuilt; memo tables key on it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn teams(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        for m in &self.matches {
            out.insert(m.home_team.as_str());
            out.insert(m.away_team.as_str());
        }
        out.into_iter().map(str::to_string).collect()
    }

    pub fn teams_in(&self, seasons: &SeasonSet) -> Vec<String> {
        let mut out = BTreeSet::new();
        for m in self.in_seasons(seasons) {
            out.insert(m.home_team.as_str());
            out.insert(m.away_team.as_str());
        }
        out.into_iter().map(str::to_string).collect()
    }

    /// Distinct season labels, newest first.
    pub fn seasons(&self) -> Vec<String> {
        let labels = self
            .matches
            .iter()
            .map(|m| m.season.as_str())
            .collect::<BTreeSet<_>>();
        labels.into_iter().rev().map(str::to_string).collect()
    }

    pub fn latest_season(&self) -> Option<String> {
        self.matches.last().map(|m| m.season.clone())
    }

    /// Resolves a CLI-style season list against the table: `None` or blank
    /// means the latest season, `all` means every season. Fails when nothing
    /// is selected or none of the labels occur in the table.
    pub fn select_seasons(&self, raw: Option<&str>) -> Result<SeasonSet> {
        let selected: SeasonSet = match raw.map(str::trim) {
            None | Some("") => self.latest_season().iter().map(String::as_str).collect(),
            Some(all) if all.eq_ignore_ascii_case("all") => self.seasons().into_iter().collect(),
            Some(list) => SeasonSet::parse(list),
        };
        if selected.is_empty() {
            return Err(anyhow!(
                "no season selected (pass labels like 2023-2024, or \"all\")"
            ));
        }
        let known = self.seasons();
        let missing = selected
            .iter()
            .filter(|label| !known.iter().any(|k| k == label))
            .map(str::to_string)
            .collect::<Vec<_>>();
        if missing.len() == selected.len() {
            return Err(anyhow!(
                "none of the selected seasons ({selected}) are in the data; available: {}",
                known.join(",")
            ));
        }
        for label in &missing {
            tracing::warn!(season = %label, "season not present in the data");
        }
        Ok(selected)
    }

    pub fn in_seasons<'a>(
        &'a self,
        seasons: &'a SeasonSet,
    ) -> impl Iterator<Item = &'a MatchRecord> + 'a {
        self.matches
            .iter()
            .filter(move |m| seasons.contains(&m.season))
    }

    /// A new table holding only matches played strictly before `date`.
    pub fn before(&self, date: NaiveDate) -> MatchTable {
        let cut = self.matches.partition_point(|m| m.date < date);
        MatchTable::new(self.matches[..cut].to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    /// `YYYY-MM-DD`
    #[default]
    Iso,
    /// `DD/MM/YYYY` or `DD/MM/YY`
    DayFirst,
    /// `MM/DD/YYYY` or `MM/DD/YY`
    MonthFirst,
}

impl FromStr for DateOrder {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "iso" | "ymd" => Ok(DateOrder::Iso),
            "day-first" | "dmy" => Ok(DateOrder::DayFirst),
            "month-first" | "mdy" => Ok(DateOrder::MonthFirst),
            other => Err(format!(
                "unknown date order '{other}' (expected iso, day-first or month-first)"
            )),
        }
    }
}

pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Drop any time-of-day suffix.
    let date_part = trimmed
        .split(|ch: char| ch == 'T' || ch.is_whitespace())
        .next()?;

    let parts = date_part.split(['/', '-', '.']).collect::<Vec<_>>();
    if order == DateOrder::Iso {
        let [year, month, day] = parts.as_slice() else {
            return None;
        };
        if year.len() != 4 {
            return None;
        }
        return NaiveDate::from_ymd_opt(
            year.parse().ok()?,
            month.parse().ok()?,
            day.parse().ok()?,
        );
    }

    let [a, b, year] = parts.as_slice() else {
        return None;
    };
    let a = a.parse::<u32>().ok()?;
    let b = b.parse::<u32>().ok()?;
    let year = expand_year(year)?;
    let (day, month) = match order {
        DateOrder::DayFirst => (a, b),
        _ => (b, a),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(raw: &str) -> Option<i32> {
    let n = raw.parse::<i32>().ok()?;
    match raw.len() {
        4 => Some(n),
        // football-data archives go back to 1993.
        2 if n >= 70 => Some(1900 + n),
        2 => Some(2000 + n),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    pub errors: Vec<String>,
}

pub fn load_csv(path: &Path, order: DateOrder) -> Result<(MatchTable, LoadReport)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read match file {}", path.display()))?;
    let (table, report) =
        parse_csv(bytes.as_slice(), order).with_context(|| format!("parse {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        kept = report.rows_kept,
        dropped = report.rows_dropped,
        seasons = table.seasons().len(),
        "loaded match history"
    );
    Ok((table, report))
}

pub fn parse_csv<R: Read>(mut reader: R, order: DateOrder) -> Result<(MatchTable, LoadReport)> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .context("read match data")?;
    let text = decode_text(bytes);

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr.headers().context("read csv header")?.clone();
    let columns = Columns::resolve(&headers)?;

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        report.rows_read += 1;
        // +2: header line and 1-based numbering.
        let line = idx + 2;
        let parsed = record
            .map_err(|err| err.to_string())
            .and_then(|rec| parse_row(&rec, &columns, order));
        match parsed {
            Ok(row) => rows.push(row),
            Err(reason) => {
                report.rows_dropped += 1;
                if report.errors.len() < MAX_REPORTED_ERRORS {
                    report.errors.push(format!("line {line}: {reason}"));
                }
            }
        }
    }
    report.rows_kept = rows.len();
    if report.rows_dropped > 0 {
        tracing::warn!(
            dropped = report.rows_dropped,
            first = report.errors.first().map(String::as_str).unwrap_or(""),
            "dropped unparseable match rows"
        );
    }
    Ok((MatchTable::new(rows), report))
}

fn decode_text(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        // Latin-1 maps every byte straight to the code point of the same value.
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

struct Columns {
    date: usize,
    home_team: usize,
    away_team: usize,
    home_goals: usize,
    away_goals: usize,
    result: Option<usize>,
    home_shots: Option<usize>,
    away_shots: Option<usize>,
    home_shots_on_target: Option<usize>,
    away_shots_on_target: Option<usize>,
    home_corners: Option<usize>,
    away_corners: Option<usize>,
    odds: Vec<(&'static str, usize, usize, usize)>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect::<HashMap<_, _>>();
        let get = |name: &str| index.get(name).copied();
        let require = |name: &str| get(name).ok_or_else(|| anyhow!("missing required column {name}"));

        let mut odds = Vec::new();
        for prefix in ODDS_PREFIXES {
            if let (Some(h), Some(d), Some(a)) = (
                get(&format!("{prefix}H")),
                get(&format!("{prefix}D")),
                get(&format!("{prefix}A")),
            ) {
                odds.push((*prefix, h, d, a));
            }
        }

        Ok(Self {
            date: require("Date")?,
            home_team: require("HomeTeam")?,
            away_team: require("AwayTeam")?,
            home_goals: require("FTHG")?,
            away_goals: require("FTAG")?,
            result: get("FTR"),
            home_shots: get("HS"),
            away_shots: get("AS"),
            home_shots_on_target: get("HST"),
            away_shots_on_target: get("AST"),
            home_corners: get("HC"),
            away_corners: get("AC"),
            odds,
        })
    }
}

fn parse_row(
    rec: &csv::StringRecord,
    cols: &Columns,
    order: DateOrder,
) -> std::result::Result<MatchRecord, String> {
    let cell = |idx: usize| rec.get(idx).unwrap_or("").trim();
    let opt_cell = |idx: Option<usize>| idx.map(|i| cell(i)).filter(|s| !s.is_empty());

    let raw_date = cell(cols.date);
    let date = parse_date(raw_date, order).ok_or_else(|| format!("bad date '{raw_date}'"))?;
    let home_team = cell(cols.home_team);
    let away_team = cell(cols.away_team);
    if home_team.is_empty() || away_team.is_empty() {
        return Err("missing team name".to_string());
    }
    if home_team == away_team {
        return Err(format!("home and away team are the same ('{home_team}')"));
    }
    let home_goals = parse_count(cell(cols.home_goals)).ok_or("bad FTHG")?;
    let away_goals = parse_count(cell(cols.away_goals)).ok_or("bad FTAG")?;

    let mut row = MatchRecord::new(date, home_team, away_team, home_goals, away_goals);
    if let Some(code) = opt_cell(cols.result) {
        let stated = Outcome::from_code(code).ok_or_else(|| format!("bad FTR '{code}'"))?;
        if stated != row.result {
            return Err(format!(
                "FTR '{code}' contradicts score {home_goals}-{away_goals}"
            ));
        }
    }

    row.home_shots = opt_cell(cols.home_shots).and_then(parse_count);
    row.away_shots = opt_cell(cols.away_shots).and_then(parse_count);
    row.home_shots_on_target = opt_cell(cols.home_shots_on_target).and_then(parse_count);
    row.away_shots_on_target = opt_cell(cols.away_shots_on_target).and_then(parse_count);
    row.home_corners = opt_cell(cols.home_corners).and_then(parse_count);
    row.away_corners = opt_cell(cols.away_corners).and_then(parse_count);

    for (prefix, h, d, a) in &cols.odds {
        let (Some(home), Some(draw), Some(away)) = (
            parse_price(cell(*h)),
            parse_price(cell(*d)),
            parse_price(cell(*a)),
        ) else {
            continue;
        };
        row.odds.push(BookmakerOdds {
            bookmaker: (*prefix).to_string(),
            home,
            draw,
            away,
        });
    }

    Ok(row)
}

fn parse_count(raw: &str) -> Option<u32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    // Some exports write counts as floats ("2.0").
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

fn parse_price(raw: &str) -> Option<f64> {
    let p = raw.trim().parse::<f64>().ok()?;
    (p.is_finite() && p > 1.0).then_some(p)
}
