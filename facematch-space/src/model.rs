use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpaceError};

/// Fitted linear reduction: standardize per feature, then project onto the
/// principal components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionModel {
    mean: Array1<f32>,
    scale: Array1<f32>,
    /// Shape (reduced_dim, input_dim), one component per row.
    components: Array2<f32>,
    explained_variance_ratio: Vec<f32>,
}

impl ProjectionModel {
    pub fn new(
        mean: Vec<f32>,
        scale: Vec<f32>,
        components: Array2<f32>,
        explained_variance_ratio: Vec<f32>,
    ) -> Result<Self> {
        let model = Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
            components,
            explained_variance_ratio,
        };
        model.validate()?;
        Ok(model)
    }

    /// Identity projection, for datasets whose features are already reduced.
    pub fn passthrough(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            scale: Array1::ones(dim),
            components: Array2::eye(dim),
            explained_variance_ratio: vec![1.0 / dim.max(1) as f32; dim],
        }
    }

    /// Checks that every fitted array agrees on the input dimensionality.
    pub fn validate(&self) -> Result<()> {
        let input_dim = self.components.ncols();
        if self.mean.len() != input_dim {
            return Err(SpaceError::invalid(format!(
                "mean has {} features, components expect {}",
                self.mean.len(),
                input_dim
            )));
        }
        if self.scale.len() != input_dim {
            return Err(SpaceError::invalid(format!(
                "scale has {} features, components expect {}",
                self.scale.len(),
                input_dim
            )));
        }
        if !self.explained_variance_ratio.is_empty()
            && self.explained_variance_ratio.len() != self.components.nrows()
        {
            return Err(SpaceError::invalid(format!(
                "{} explained variance ratios for {} components",
                self.explained_variance_ratio.len(),
                self.components.nrows()
            )));
        }
        if self.components.nrows() == 0 || input_dim == 0 {
            return Err(SpaceError::invalid("model has no components"));
        }
        Ok(())
    }

    pub fn input_dim(&self) -> usize {
        self.components.ncols()
    }

    pub fn reduced_dim(&self) -> usize {
        self.components.nrows()
    }

    /// Total share of variance retained by the components.
    pub fn explained_variance(&self) -> f32 {
        self.explained_variance_ratio.iter().sum()
    }

    /// Map a raw feature vector into the reduced space.
    pub fn project(&self, raw: &[f32]) -> Result<Vec<f32>> {
        if raw.len() != self.input_dim() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.input_dim(),
                actual: raw.len(),
            });
        }

        let raw = ArrayView1::from(raw);
        let standardized: Array1<f32> = ndarray::Zip::from(&raw)
            .and(&self.mean)
            .and(&self.scale)
            .map_collect(|&x, &m, &s| {
                // sklearn leaves constant features unscaled
                let s = if s == 0.0 { 1.0 } else { s };
                (x - m) / s
            });

        Ok(self.components.dot(&standardized).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn model() -> ProjectionModel {
        ProjectionModel::new(
            vec![1.0, 1.0, 1.0],
            vec![2.0, 0.0, 1.0],
            array![[1.0, 0.0, 0.0], [0.0, 1.0, 1.0]],
            vec![0.6, 0.3],
        )
        .unwrap()
    }

    #[test]
    fn test_project_standardizes_then_reduces() {
        let m = model();
        let out = m.project(&[3.0, 2.0, 4.0]).unwrap();
        // (3-1)/2 = 1; (2-1)/1 + (4-1)/1 = 4
        assert_eq!(out, vec![1.0, 4.0]);
        assert_eq!(m.input_dim(), 3);
        assert_eq!(m.reduced_dim(), 2);
        assert!((m.explained_variance() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_project_rejects_wrong_length() {
        let err = model().project(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            SpaceError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_new_rejects_inconsistent_shapes() {
        let err = ProjectionModel::new(
            vec![0.0; 2],
            vec![1.0; 3],
            array![[1.0, 0.0, 0.0]],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, SpaceError::InvalidArgument(_)));
    }

    #[test]
    fn test_passthrough_is_identity() {
        let m = ProjectionModel::passthrough(2);
        assert_eq!(m.project(&[0.25, -3.0]).unwrap(), vec![0.25, -3.0]);
    }
}
