use std::collections::HashMap;
use std::hash::Hash;

use crate::dataset::MatchTable;
use crate::estimator::{EstimateInputs, EstimatorConfig, OutcomeEstimate, estimate};
use crate::form::{RecentForm, recent_form};
use crate::head_to_head::{HeadToHead, head_to_head};
use crate::regression::GoalModel;
use crate::season::SeasonSet;
use crate::team_stats::{TeamStats, compute_team_stats};

type FormKey = (String, usize, Option<SeasonSet>);
type H2hKey = (String, String, Option<SeasonSet>, Option<usize>);

/// Per-query memo tables bound to one `MatchTable` generation.
///
/// Every getter first checks the table's generation; a different one drops all
/// cached results, so a rebuilt table can never serve stale values.
#[derive(Debug, Default)]
pub struct StatsCache {
    generation: Option<u64>,
    team_stats: HashMap<(SeasonSet, String), TeamStats>,
    forms: HashMap<FormKey, RecentForm>,
    h2h: HashMap<H2hKey, HeadToHead>,
    models: HashMap<SeasonSet, Option<GoalModel>>,
    hits: u64,
    misses: u64,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.team_stats.clear();
        self.forms.clear();
        self.h2h.clear();
        self.models.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    fn bind(&mut self, table: &MatchTable) {
        if self.generation == Some(table.generation()) {
            return;
        }
        if self.generation.is_some() {
            tracing::debug!(
                old = self.generation,
                new = table.generation(),
                "match table changed; dropping memo tables"
            );
        }
        self.clear();
        self.generation = Some(table.generation());
    }

    pub fn team_stats(
        &mut self,
        table: &MatchTable,
        seasons: &SeasonSet,
        team: &str,
    ) -> TeamStats {
        self.bind(table);
        let key = (seasons.clone(), team.to_string());
        lookup(&mut self.team_stats, &mut self.hits, &mut self.misses, key, || {
            compute_team_stats(table, seasons, team)
        })
    }

    pub fn recent_form(
        &mut self,
        table: &MatchTable,
        team: &str,
        n: usize,
        seasons: Option<&SeasonSet>,
    ) -> RecentForm {
        self.bind(table);
        let key = (team.to_string(), n, seasons.cloned());
        lookup(&mut self.forms, &mut self.hits, &mut self.misses, key, || {
            recent_form(table, team, n, seasons)
        })
    }

    pub fn head_to_head(
        &mut self,
        table: &MatchTable,
        team1: &str,
        team2: &str,
        seasons: Option<&SeasonSet>,
        cap: Option<usize>,
    ) -> HeadToHead {
        self.bind(table);
        let key = (team1.to_string(), team2.to_string(), seasons.cloned(), cap);
        lookup(&mut self.h2h, &mut self.hits, &mut self.misses, key, || {
            head_to_head(table, team1, team2, seasons, cap)
        })
    }

    pub fn goal_model(&mut self, table: &MatchTable, seasons: &SeasonSet) -> Option<GoalModel> {
        self.bind(table);
        lookup(
            &mut self.models,
            &mut self.hits,
            &mut self.misses,
            seasons.clone(),
            || GoalModel::fit(table, seasons),
        )
    }

    /// Same result as `estimator::predict_match`, served from the memo tables.
    pub fn predict_match(
        &mut self,
        table: &MatchTable,
        seasons: &SeasonSet,
        home: &str,
        away: &str,
        cfg: &EstimatorConfig,
        use_model: bool,
    ) -> OutcomeEstimate {
        let home_stats = self.team_stats(table, seasons, home);
        let away_stats = self.team_stats(table, seasons, away);
        let home_form = self.recent_form(table, home, cfg.form_matches, Some(seasons));
        let away_form = self.recent_form(table, away, cfg.form_matches, Some(seasons));
        let h2h = self.head_to_head(table, home, away, Some(seasons), Some(cfg.h2h_cap));
        let model = if use_model {
            self.goal_model(table, seasons)
        } else {
            None
        };
        let model_goals = model.map(|m| m.predict(&home_stats, &away_stats));
        estimate(
            &EstimateInputs {
                home: &home_stats,
                away: &away_stats,
                home_form: &home_form,
                away_form: &away_form,
                h2h: &h2h,
                model_goals,
            },
            cfg,
        )
    }
}

fn lookup<K, V, F>(
    map: &mut HashMap<K, V>,
    hits: &mut u64,
    misses: &mut u64,
    key: K,
    compute: F,
) -> V
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> V,
{
    if let Some(v) = map.get(&key) {
        *hits += 1;
        return v.clone();
    }
    *misses += 1;
    let v = compute();
    map.insert(key, v.clone());
    v
}
