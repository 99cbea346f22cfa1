use std::collections::HashSet;

use facematch_space::Dataset;
use serde::Serialize;

use crate::matcher::{MatchRecord, Policy};
use crate::similarity::Metric;

/// Response shape of a match request.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub matches: Vec<MatchView>,
    pub total_matches: usize,
    pub unique_identities: usize,
    pub match_type: &'static str,
    pub metric: Metric,
}

/// A [`MatchRecord`] with the fields a client needs to fetch the image.
#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub label: String,
    pub score: f32,
    pub rank: usize,
    pub source_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl MatchReport {
    pub fn new(
        records: Vec<MatchRecord>,
        dataset: &Dataset,
        policy: Policy,
        metric: Metric,
        image_base_url: Option<&str>,
    ) -> Self {
        let unique_identities = records
            .iter()
            .map(|r| r.label.as_str())
            .collect::<HashSet<_>>()
            .len();

        let matches: Vec<MatchView> = records
            .into_iter()
            .map(|r| MatchView {
                reference: dataset.reference(r.source_index).map(str::to_owned),
                image_url: image_base_url
                    .map(|base| format!("{}/{}", base.trim_end_matches('/'), r.source_index)),
                label: r.label,
                score: r.score,
                rank: r.rank,
                source_index: r.source_index,
            })
            .collect();

        Self {
            total_matches: matches.len(),
            unique_identities,
            matches,
            match_type: policy.name(),
            metric,
        }
    }
}
