use std::sync::{Arc, PoisonError, RwLock};

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Result, SpaceError};
use crate::model::ProjectionModel;

/// Immutable model + dataset pair. Matching calls borrow one snapshot for
/// their whole duration; reloads build a new one instead of editing this.
#[derive(Debug, Clone)]
pub struct FeatureSpace {
    model: ProjectionModel,
    dataset: Dataset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub total_entries: usize,
    pub unique_identity_count: usize,
    pub feature_dimension: usize,
    pub reduced_dimension: usize,
}

impl FeatureSpace {
    pub fn new(model: ProjectionModel, dataset: Dataset) -> Result<Self> {
        model.validate()?;
        dataset.validate()?;
        if !dataset.is_empty() && dataset.dim() != model.reduced_dim() {
            return Err(SpaceError::DimensionMismatch {
                expected: model.reduced_dim(),
                actual: dataset.dim(),
            });
        }
        Ok(Self { model, dataset })
    }

    pub fn model(&self) -> &ProjectionModel {
        &self.model
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn project(&self, raw: &[f32]) -> Result<Vec<f32>> {
        self.model.project(raw)
    }

    /// Reduced matrix with its parallel label and reference arrays.
    pub fn dataset_features(&self) -> (ArrayView2<'_, f32>, &[String], &[String]) {
        (
            self.dataset.features(),
            self.dataset.labels(),
            self.dataset.references(),
        )
    }

    pub fn info(&self) -> SpaceInfo {
        SpaceInfo {
            total_entries: self.dataset.len(),
            unique_identity_count: self.dataset.unique_identities(),
            feature_dimension: self.model.input_dim(),
            reduced_dimension: self.model.reduced_dim(),
        }
    }

    pub fn into_parts(self) -> (ProjectionModel, Dataset) {
        (self.model, self.dataset)
    }
}

/// Shared provider of the current [`FeatureSpace`].
///
/// Readers clone the inner `Arc` and release the lock at once, so a reload
/// only waits for other lock holders, never for in-flight matching.
#[derive(Debug, Default)]
pub struct SpaceHandle {
    current: RwLock<Option<Arc<FeatureSpace>>>,
}

impl SpaceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_space(space: FeatureSpace) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(space))),
        }
    }

    /// Swap in a new snapshot. Returns the one it replaced.
    pub fn install(&self, space: FeatureSpace) -> Option<Arc<FeatureSpace>> {
        let info = space.info();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = guard.replace(Arc::new(space));
        log::debug!(
            "installed feature space: entries={} identities={} dim={}->{}",
            info.total_entries,
            info.unique_identity_count,
            info.feature_dimension,
            info.reduced_dimension
        );
        previous
    }

    pub fn is_initialized(&self) -> bool {
        self.peek().is_some()
    }

    pub fn snapshot(&self) -> Result<Arc<FeatureSpace>> {
        self.peek().ok_or(SpaceError::NotInitialized)
    }

    pub fn project(&self, raw: &[f32]) -> Result<Vec<f32>> {
        self.snapshot()?.project(raw)
    }

    pub fn info(&self) -> SpaceInfo {
        self.peek().map(|s| s.info()).unwrap_or_default()
    }

    fn peek(&self) -> Option<Arc<FeatureSpace>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn space(labels: &[&str]) -> FeatureSpace {
        let rows = labels.len();
        let features = ndarray::Array2::from_shape_fn((rows, 2), |(i, j)| (i + j) as f32);
        let dataset = Dataset::new(
            features,
            labels.iter().map(|s| s.to_string()).collect(),
            vec![],
        )
        .unwrap();
        FeatureSpace::new(ProjectionModel::passthrough(2), dataset).unwrap()
    }

    #[test]
    fn test_uninitialized_handle() {
        let handle = SpaceHandle::new();
        assert!(!handle.is_initialized());
        assert_eq!(handle.info(), SpaceInfo::default());
        assert!(matches!(handle.snapshot(), Err(SpaceError::NotInitialized)));
        assert!(matches!(
            handle.project(&[1.0, 2.0]),
            Err(SpaceError::NotInitialized)
        ));
    }

    #[test]
    fn test_install_keeps_old_snapshot_alive() {
        let handle = SpaceHandle::with_space(space(&["a", "b", "a"]));
        let before = handle.snapshot().unwrap();
        assert_eq!(
            handle.info(),
            SpaceInfo {
                total_entries: 3,
                unique_identity_count: 2,
                feature_dimension: 2,
                reduced_dimension: 2,
            }
        );

        let previous = handle.install(space(&["c"])).unwrap();
        assert!(Arc::ptr_eq(&previous, &before));
        assert_eq!(before.dataset().len(), 3);
        assert_eq!(handle.info().total_entries, 1);
    }

    #[test]
    fn test_new_rejects_dimension_disagreement() {
        let dataset = Dataset::new(array![[1.0, 2.0, 3.0]], vec!["a".into()], vec![]).unwrap();
        let err = FeatureSpace::new(ProjectionModel::passthrough(2), dataset).unwrap_err();
        assert!(matches!(
            err,
            SpaceError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }
}
