//! Ranking of dataset rows against a projected query.
//!
//! Every policy scores the whole dataset first. The per-identity policies
//! cannot be derived from a truncated raw top-k, so the O(N·D) pass is paid
//! on every call regardless of `top_k`.

use std::collections::HashMap;
use std::fmt;

use facematch_space::{Dataset, FeatureSpace, Result, SpaceError};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::similarity::{Metric, Ranking};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_PER_PERSON: usize = 2;

/// One scored dataset row. `rank` is 1-based within the returned list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub label: String,
    pub score: f32,
    pub source_index: usize,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match_type", rename_all = "lowercase")]
pub enum Policy {
    /// Plain top-k over raw scores.
    All { top_k: usize },
    /// Best row of each identity, top-k identities.
    Person { top_k: usize },
    /// Global order, at most `max_per_person` rows per identity.
    Diverse { top_k: usize, max_per_person: usize },
}

impl Default for Policy {
    fn default() -> Self {
        Policy::All {
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Policy {
    /// Build a policy from its selector name (`all`, `person`, `diverse`).
    /// Takes signed counts so that negative request values are rejected
    /// instead of wrapping.
    pub fn from_selector(name: &str, top_k: i64, max_per_person: i64) -> Result<Self> {
        let top_k = positive("top_k", top_k)?;
        let policy = match name.to_ascii_lowercase().as_str() {
            "all" => Policy::All { top_k },
            "person" => Policy::Person { top_k },
            "diverse" => Policy::Diverse {
                top_k,
                max_per_person: positive("max_per_person", max_per_person)?,
            },
            other => return Err(SpaceError::invalid(format!("unknown match type '{other}'"))),
        };
        Ok(policy)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::All { .. } => "all",
            Policy::Person { .. } => "person",
            Policy::Diverse { .. } => "diverse",
        }
    }

    pub fn top_k(&self) -> usize {
        match *self {
            Policy::All { top_k } | Policy::Person { top_k } | Policy::Diverse { top_k, .. } => {
                top_k
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_k(self.top_k())?;
        if let Policy::Diverse { max_per_person, .. } = *self {
            if max_per_person == 0 {
                return Err(SpaceError::invalid("max_per_person must be positive"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn positive(name: &str, value: i64) -> Result<usize> {
    if value <= 0 {
        return Err(SpaceError::invalid(format!("{name} must be positive, got {value}")));
    }
    usize::try_from(value).map_err(|_| SpaceError::invalid(format!("{name} out of range")))
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(SpaceError::invalid("top_k must be positive"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    index: usize,
    score: f32,
}

impl Scored {
    fn key(&self) -> (f32, usize) {
        (self.score, self.index)
    }
}

fn check_query(query: &[f32], dataset: &Dataset) -> Result<()> {
    if dataset.is_empty() {
        return Err(SpaceError::NotInitialized);
    }
    if query.len() != dataset.dim() {
        return Err(SpaceError::DimensionMismatch {
            expected: dataset.dim(),
            actual: query.len(),
        });
    }
    Ok(())
}

/// Scores in row order.
fn score_rows(query: &[f32], dataset: &Dataset, metric: Metric) -> Result<Vec<Scored>> {
    check_query(query, dataset)?;
    let query = ArrayView1::from(query);
    let scores: Vec<Scored> = dataset
        .entries()
        .map(|entry| Scored {
            index: entry.index,
            score: metric.score(query, entry.features),
        })
        .collect();
    log::debug!(
        "scored {} rows with {} (dim={})",
        scores.len(),
        metric,
        dataset.dim()
    );
    Ok(scores)
}

/// Scores in global order: best first, ties by ascending index.
fn scored(query: &[f32], dataset: &Dataset, metric: Metric) -> Result<Vec<Scored>> {
    let mut scores = score_rows(query, dataset, metric)?;
    sort(&mut scores, metric.ranking());
    Ok(scores)
}

fn sort(scores: &mut [Scored], ranking: Ranking) {
    scores.sort_by(|a, b| ranking.compare(a.key(), b.key()));
}

/// Attach labels and assign ranks 1..=len in the given order.
fn into_records(dataset: &Dataset, scores: impl IntoIterator<Item = Scored>) -> Vec<MatchRecord> {
    let labels = dataset.labels();
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| MatchRecord {
            label: labels[s.index].clone(),
            score: s.score,
            source_index: s.index,
            rank: i + 1,
        })
        .collect()
}

/// Every dataset row, ranked.
pub fn score_all(query: &[f32], dataset: &Dataset, metric: Metric) -> Result<Vec<MatchRecord>> {
    let scores = scored(query, dataset, metric)?;
    Ok(into_records(dataset, scores))
}

/// The first `k` rows of [`score_all`]. `k` beyond the dataset size yields
/// every row.
pub fn raw_top_k(query: &[f32], dataset: &Dataset, metric: Metric, k: usize) -> Result<Vec<MatchRecord>> {
    check_k(k)?;
    let scores = scored(query, dataset, metric)?;
    Ok(into_records(dataset, scores.into_iter().take(k)))
}

/// Best row per identity, identities ranked by that row's score.
pub fn best_per_identity(
    query: &[f32],
    dataset: &Dataset,
    metric: Metric,
    k: usize,
) -> Result<Vec<MatchRecord>> {
    check_k(k)?;
    let ranking = metric.ranking();
    // Row order, so an exact tie keeps the lowest index.
    let scores = score_rows(query, dataset, metric)?;

    let labels = dataset.labels();
    let mut best: HashMap<&str, Scored> = HashMap::new();
    for s in scores {
        best.entry(labels[s.index].as_str())
            .and_modify(|current| {
                if ranking.is_better(s.score, current.score) {
                    *current = s;
                }
            })
            .or_insert(s);
    }

    let mut survivors: Vec<Scored> = best.into_values().collect();
    sort(&mut survivors, ranking);
    survivors.truncate(k);
    Ok(into_records(dataset, survivors))
}

/// Walk the global order, admitting a row while its identity has fewer
/// than `max_per_identity` admitted rows, until `k` rows are admitted.
pub fn diverse_capped(
    query: &[f32],
    dataset: &Dataset,
    metric: Metric,
    k: usize,
    max_per_identity: usize,
) -> Result<Vec<MatchRecord>> {
    check_k(k)?;
    if max_per_identity == 0 {
        return Err(SpaceError::invalid("max_per_person must be positive"));
    }
    let scores = scored(query, dataset, metric)?;

    let labels = dataset.labels();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut admitted = Vec::with_capacity(k.min(scores.len()));
    for s in scores {
        if admitted.len() == k {
            break;
        }
        let count = counts.entry(labels[s.index].as_str()).or_insert(0);
        if *count < max_per_identity {
            *count += 1;
            admitted.push(s);
        }
    }
    Ok(into_records(dataset, admitted))
}

/// Run `policy` for an already projected query against a snapshot.
pub fn find_matches(
    query: &[f32],
    space: &FeatureSpace,
    metric: Metric,
    policy: Policy,
) -> Result<Vec<MatchRecord>> {
    policy.validate()?;
    let dataset = space.dataset();
    match policy {
        Policy::All { top_k } => raw_top_k(query, dataset, metric, top_k),
        Policy::Person { top_k } => best_per_identity(query, dataset, metric, top_k),
        Policy::Diverse {
            top_k,
            max_per_person,
        } => diverse_capped(query, dataset, metric, top_k, max_per_person),
    }
}
