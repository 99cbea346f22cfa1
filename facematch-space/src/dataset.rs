use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpaceError};
use crate::model::ProjectionModel;

/// Reduced feature matrix with parallel label and reference arrays.
///
/// Row `i` of `features`, `labels[i]` and (when present) `references[i]`
/// describe the same image. The row index is the only handle handed out to
/// callers, so rows are never reordered in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Vec<String>,
    references: Vec<String>,
}

/// Borrowed view of one dataset row.
#[derive(Debug, Clone, Copy)]
pub struct DatasetEntry<'a> {
    pub index: usize,
    pub label: &'a str,
    pub features: ArrayView1<'a, f32>,
    pub reference: Option<&'a str>,
}

impl Dataset {
    pub fn new(features: Array2<f32>, labels: Vec<String>, references: Vec<String>) -> Result<Self> {
        let dataset = Self {
            features,
            labels,
            references,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Project raw feature rows through `model` and pair them with labels.
    pub fn build(
        model: &ProjectionModel,
        raw: ArrayView2<'_, f32>,
        labels: Vec<String>,
        references: Vec<String>,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(raw.nrows() * model.reduced_dim());
        for row in raw.rows() {
            let row = row.to_vec();
            data.extend(model.project(&row)?);
        }
        let features = Array2::from_shape_vec((raw.nrows(), model.reduced_dim()), data)
            .map_err(|e| SpaceError::invalid(e.to_string()))?;
        log::debug!(
            "built dataset: rows={} reduced_dim={}",
            features.nrows(),
            features.ncols()
        );
        Self::new(features, labels, references)
    }

    /// Enforces the parallel-array invariant.
    pub fn validate(&self) -> Result<()> {
        let rows = self.features.nrows();
        if self.labels.len() != rows {
            return Err(SpaceError::invalid(format!(
                "{} labels for {} feature rows",
                self.labels.len(),
                rows
            )));
        }
        if !self.references.is_empty() && self.references.len() != rows {
            return Err(SpaceError::invalid(format!(
                "{} references for {} feature rows",
                self.references.len(),
                rows
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Reduced dimensionality D. Zero for an empty dataset.
    pub fn dim(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn reference(&self, index: usize) -> Option<&str> {
        self.references.get(index).map(String::as_str)
    }

    pub fn entry(&self, index: usize) -> Option<DatasetEntry<'_>> {
        let label = self.labels.get(index)?;
        Some(DatasetEntry {
            index,
            label,
            features: self.features.row(index),
            reference: self.reference(index),
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = DatasetEntry<'_>> {
        self.features
            .rows()
            .into_iter()
            .zip(&self.labels)
            .enumerate()
            .map(|(index, (features, label))| DatasetEntry {
                index,
                label,
                features,
                reference: self.reference(index),
            })
    }

    pub fn unique_identities(&self) -> usize {
        self.labels.iter().collect::<HashSet<_>>().len()
    }

    /// Append an already-reduced vector. Returns the new row index.
    pub fn push(&mut self, label: String, reduced: Vec<f32>, reference: Option<String>) -> Result<usize> {
        if !self.is_empty() && reduced.len() != self.dim() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.dim(),
                actual: reduced.len(),
            });
        }
        if !self.is_empty() && reference.is_some() == self.references.is_empty() {
            return Err(SpaceError::invalid(
                "references must be given for every entry or for none",
            ));
        }

        if self.is_empty() {
            self.features = Array2::from_shape_vec((1, reduced.len()), reduced)
                .map_err(|e| SpaceError::invalid(e.to_string()))?;
            self.references.clear();
        } else {
            self.features
                .push_row(ArrayView1::from(&reduced))
                .map_err(|e| SpaceError::invalid(e.to_string()))?;
        }
        self.labels.push(label);
        if let Some(reference) = reference {
            self.references.push(reference);
        }
        Ok(self.len() - 1)
    }

    /// Drop every row of one identity. Later rows shift down, so this is an
    /// offline edit and never applied to a snapshot being served.
    pub fn remove_identity(&mut self, label: &str) -> usize {
        let keep: Vec<usize> = (0..self.len()).filter(|&i| self.labels[i] != label).collect();
        let removed = self.len() - keep.len();
        if removed == 0 {
            return 0;
        }

        self.features = self.features.select(Axis(0), &keep);
        self.labels = keep.iter().map(|&i| self.labels[i].clone()).collect();
        if !self.references.is_empty() {
            self.references = keep.iter().map(|&i| self.references[i].clone()).collect();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_checks_parallel_arrays() {
        let features = array![[1.0, 0.0], [0.0, 1.0]];
        assert!(Dataset::new(features.clone(), labels(&["a"]), vec![]).is_err());
        assert!(Dataset::new(features.clone(), labels(&["a", "b"]), labels(&["x"])).is_err());
        let ds = Dataset::new(features, labels(&["a", "a"]), vec![]).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.dim(), 2);
        assert_eq!(ds.unique_identities(), 1);
        assert_eq!(ds.reference(0), None);
    }

    #[test]
    fn test_entries_follow_row_order() {
        let ds = Dataset::new(
            array![[1.0, 0.0], [0.5, 0.5], [0.0, 1.0]],
            labels(&["a", "b", "c"]),
            labels(&["a.jpg", "b.jpg", "c.jpg"]),
        )
        .unwrap();
        let seen: Vec<_> = ds.entries().map(|e| (e.index, e.label, e.reference)).collect();
        assert_eq!(
            seen,
            vec![
                (0, "a", Some("a.jpg")),
                (1, "b", Some("b.jpg")),
                (2, "c", Some("c.jpg"))
            ]
        );
        assert_eq!(ds.entry(1).unwrap().features.to_vec(), vec![0.5, 0.5]);
        assert!(ds.entry(3).is_none());
    }

    #[test]
    fn test_push_and_remove_identity() {
        let mut ds = Dataset::default();
        assert_eq!(ds.push("a".into(), vec![1.0, 0.0], Some("a0".into())).unwrap(), 0);
        assert_eq!(ds.push("b".into(), vec![0.0, 1.0], Some("b0".into())).unwrap(), 1);
        assert_eq!(ds.push("a".into(), vec![0.7, 0.7], Some("a1".into())).unwrap(), 2);
        assert!(ds.push("c".into(), vec![1.0], Some("c0".into())).is_err());
        assert!(ds.push("c".into(), vec![1.0, 1.0], None).is_err());

        assert_eq!(ds.remove_identity("a"), 2);
        assert_eq!(ds.labels(), &["b".to_string()]);
        assert_eq!(ds.references(), &["b0".to_string()]);
        assert_eq!(ds.features().row(0).to_vec(), vec![0.0, 1.0]);
        assert_eq!(ds.remove_identity("missing"), 0);
    }

    #[test]
    fn test_build_projects_rows() {
        let model = ProjectionModel::new(
            vec![0.0, 0.0, 0.0],
            vec![1.0, 1.0, 1.0],
            array![[1.0, 1.0, 0.0]],
            vec![1.0],
        )
        .unwrap();
        let raw = array![[1.0, 2.0, 3.0], [0.0, 0.0, 9.0]];
        let ds = Dataset::build(&model, raw.view(), labels(&["a", "b"]), vec![]).unwrap();
        assert_eq!(ds.dim(), 1);
        assert_eq!(ds.features().column(0).to_vec(), vec![3.0, 0.0]);
    }
}
