use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use facematch_space::SpaceError;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Similarity function used to score a query against dataset rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity, higher is more similar.
    #[default]
    Cosine,
    /// Euclidean distance, lower is more similar.
    Euclidean,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
        }
    }

    pub fn score(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
        match self {
            Metric::Cosine => cosine(a, b),
            Metric::Euclidean => euclidean(a, b),
        }
    }

    pub fn ranking(&self) -> Ranking {
        Ranking {
            higher_is_better: matches!(self, Metric::Cosine),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(SpaceError::invalid(format!("unknown metric '{other}'"))),
        }
    }
}

/// Score direction of a metric. Every sort and best-of comparison in the
/// matcher goes through this, never through raw `<`/`>` on scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranking {
    higher_is_better: bool,
}

impl Ranking {
    /// `Less` when score `a` ranks ahead of score `b`.
    pub fn compare_scores(&self, a: f32, b: f32) -> Ordering {
        if self.higher_is_better {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }

    /// Total order over `(score, source_index)`: best score first, then
    /// lowest index.
    pub fn compare(&self, a: (f32, usize), b: (f32, usize)) -> Ordering {
        self.compare_scores(a.0, b.0).then(a.1.cmp(&b.1))
    }

    /// Strictly better. Equal scores are never better, so the first one seen
    /// is kept.
    pub fn is_better(&self, a: f32, b: f32) -> bool {
        self.compare_scores(a, b) == Ordering::Less
    }
}

/// Cosine similarity. Zero when either vector has zero norm.
pub fn cosine(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub fn euclidean(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine() {
        let a = array![1.0f32, 0.0];
        let b = array![0.9f32, 0.1];
        let c = array![0.0f32, 1.0];
        assert_eq!(cosine(a.view(), a.view()), 1.0);
        assert!((cosine(a.view(), b.view()) - 0.993_883_7).abs() < 1e-5);
        assert_eq!(cosine(a.view(), c.view()), 0.0);
        assert_eq!(cosine(a.view(), (-&a).view()), -1.0);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let zero = array![0.0f32, 0.0];
        let a = array![3.0f32, 4.0];
        assert_eq!(cosine(zero.view(), a.view()), 0.0);
        assert_eq!(cosine(a.view(), zero.view()), 0.0);
        assert_eq!(cosine(zero.view(), zero.view()), 0.0);
    }

    #[test]
    fn test_euclidean() {
        let a = array![0.0f32, 0.0];
        let b = array![3.0f32, 4.0];
        assert_eq!(euclidean(a.view(), b.view()), 5.0);
        assert_eq!(euclidean(b.view(), b.view()), 0.0);
    }

    #[test]
    fn test_ranking_direction() {
        let cos = Metric::Cosine.ranking();
        assert!(cos.is_better(0.9, 0.1));
        assert!(!cos.is_better(0.1, 0.9));
        assert!(!cos.is_better(0.5, 0.5));
        assert_eq!(cos.compare((0.5, 3), (0.5, 1)), Ordering::Greater);

        let euc = Metric::Euclidean.ranking();
        assert!(euc.is_better(0.1, 0.9));
        assert!(!euc.is_better(0.9, 0.1));
        assert_eq!(euc.compare((0.2, 0), (0.1, 5)), Ordering::Greater);
        assert_eq!(euc.compare((0.1, 2), (0.1, 5)), Ordering::Less);
    }

    #[test]
    fn test_metric_selector() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("Euclidean".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!(matches!(
            "manhattan".parse::<Metric>(),
            Err(SpaceError::InvalidArgument(_))
        ));
        assert_eq!(Metric::default(), Metric::Cosine);
    }
}
