use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use fixture_forecast::dataset::{DateOrder, MatchTable, parse_csv};
use fixture_forecast::estimator::{EstimatorConfig, predict_match};
use fixture_forecast::memo::StatsCache;
use fixture_forecast::season::SeasonSet;
use fixture_forecast::team_stats::compute_league_stats;

fn sample_table() -> MatchTable {
    let (table, _) = parse_csv(SAMPLE_CSV.as_bytes(), DateOrder::DayFirst).unwrap();
    table
}

fn all_seasons(table: &MatchTable) -> SeasonSet {
    table.seasons().into_iter().collect()
}

fn bench_csv_parse(c: &mut Criterion) {
    c.bench_function("csv_parse", |b| {
        b.iter(|| {
            let (table, _) = parse_csv(black_box(SAMPLE_CSV.as_bytes()), DateOrder::DayFirst).unwrap();
            black_box(table.len());
        })
    });
}

fn bench_league_stats(c: &mut Criterion) {
    let table = sample_table();
    let seasons = all_seasons(&table);
    c.bench_function("league_stats", |b| {
        b.iter(|| {
            let stats = compute_league_stats(black_box(&table), &seasons);
            black_box(stats.len());
        })
    });
}

fn bench_predict_direct(c: &mut Criterion) {
    let table = sample_table();
    let seasons = all_seasons(&table);
    let teams = table.teams();
    let cfg = EstimatorConfig::default();
    c.bench_function("predict_round_robin_direct", |b| {
        b.iter(|| {
            for home in &teams {
                for away in &teams {
                    if home != away {
                        black_box(predict_match(&table, &seasons, home, away, &cfg, None));
                    }
                }
            }
        })
    });
}

fn bench_predict_memo(c: &mut Criterion) {
    let table = sample_table();
    let seasons = all_seasons(&table);
    let teams = table.teams();
    let cfg = EstimatorConfig::default();
    c.bench_function("predict_round_robin_memo", |b| {
        b.iter(|| {
            let mut cache = StatsCache::new();
            for home in &teams {
                for away in &teams {
                    if home != away {
                        black_box(cache.predict_match(&table, &seasons, home, away, &cfg, false));
                    }
                }
            }
        })
    });
}

criterion_group!(
    perf,
    bench_csv_parse,
    bench_league_stats,
    bench_predict_direct,
    bench_predict_memo
);
criterion_main!(perf);

static SAMPLE_CSV: &str = include_str!("../tests/fixtures/sample_matches.csv");
