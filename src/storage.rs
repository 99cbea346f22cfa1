use anyhow::{Context, Result};
use facematch_space::{Dataset, FeatureSpace, ProjectionModel, SpaceError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MODEL_FILE: &str = "model.bin";
pub const DATASET_FILE: &str = "dataset.bin";
pub const METADATA_FILE: &str = "metadata.json";

/// Descriptive counts stored next to the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub total_entries: usize,
    pub unique_identities: usize,
    pub feature_dimension: usize,
    pub reduced_dimension: usize,
    pub explained_variance: f32,
}

impl DatasetMetadata {
    pub fn describe(model: &ProjectionModel, dataset: &Dataset) -> Self {
        Self {
            total_entries: dataset.len(),
            unique_identities: dataset.unique_identities(),
            feature_dimension: model.input_dim(),
            reduced_dimension: model.reduced_dim(),
            explained_variance: model.explained_variance(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DatasetArtifact {
    metadata: DatasetMetadata,
    dataset: Dataset,
}

pub fn save_model(dir: &Path, model: &ProjectionModel) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let file = dir.join(MODEL_FILE);
    let data = postcard::to_allocvec(model)?;
    std::fs::write(&file, data).with_context(|| format!("writing {}", file.display()))?;
    Ok(())
}

/// Write the dataset artifact plus a human-readable metadata copy.
pub fn save_dataset(dir: &Path, model: &ProjectionModel, dataset: &Dataset) -> Result<DatasetMetadata> {
    std::fs::create_dir_all(dir)?;
    let metadata = DatasetMetadata::describe(model, dataset);
    let artifact = DatasetArtifact {
        metadata: metadata.clone(),
        dataset: dataset.clone(),
    };

    let file = dir.join(DATASET_FILE);
    let data = postcard::to_allocvec(&artifact)?;
    std::fs::write(&file, data).with_context(|| format!("writing {}", file.display()))?;

    let file = dir.join(METADATA_FILE);
    std::fs::write(&file, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("writing {}", file.display()))?;
    Ok(metadata)
}

fn read_artifact(file: &Path) -> Result<Vec<u8>, SpaceError> {
    if !file.exists() {
        return Err(SpaceError::missing(format!("{} not found", file.display())));
    }
    std::fs::read(file).map_err(|e| SpaceError::missing(format!("reading {}: {e}", file.display())))
}

pub fn load_model(dir: &Path) -> Result<ProjectionModel, SpaceError> {
    let file = dir.join(MODEL_FILE);
    let data = read_artifact(&file)?;
    let model: ProjectionModel = postcard::from_bytes(&data)
        .map_err(|e| SpaceError::missing(format!("decoding {}: {e}", file.display())))?;
    model
        .validate()
        .map_err(|e| SpaceError::missing(format!("{}: {e}", file.display())))?;
    Ok(model)
}

pub fn load_dataset(dir: &Path) -> Result<(Dataset, DatasetMetadata), SpaceError> {
    let file = dir.join(DATASET_FILE);
    let data = read_artifact(&file)?;
    let artifact: DatasetArtifact = postcard::from_bytes(&data)
        .map_err(|e| SpaceError::missing(format!("decoding {}: {e}", file.display())))?;
    let DatasetArtifact { metadata, dataset } = artifact;

    dataset
        .validate()
        .map_err(|e| SpaceError::missing(format!("{}: {e}", file.display())))?;
    if metadata.total_entries != dataset.len() {
        return Err(SpaceError::missing(format!(
            "{}: metadata lists {} entries, found {}",
            file.display(),
            metadata.total_entries,
            dataset.len()
        )));
    }
    if metadata.unique_identities != dataset.unique_identities() {
        return Err(SpaceError::missing(format!(
            "{}: metadata lists {} identities, found {}",
            file.display(),
            metadata.unique_identities,
            dataset.unique_identities()
        )));
    }
    if !dataset.is_empty() && metadata.reduced_dimension != dataset.dim() {
        return Err(SpaceError::missing(format!(
            "{}: metadata lists dimension {}, found {}",
            file.display(),
            metadata.reduced_dimension,
            dataset.dim()
        )));
    }
    Ok((dataset, metadata))
}

/// Load both artifacts and check they describe the same space.
pub fn load_space(dir: &Path) -> Result<FeatureSpace, SpaceError> {
    let model = load_model(dir)?;
    let (dataset, metadata) = load_dataset(dir)?;

    if metadata.feature_dimension != model.input_dim()
        || metadata.reduced_dimension != model.reduced_dim()
    {
        return Err(SpaceError::missing(format!(
            "dataset was built for {}->{} but model is {}->{}",
            metadata.feature_dimension,
            metadata.reduced_dimension,
            model.input_dim(),
            model.reduced_dim()
        )));
    }
    let space = FeatureSpace::new(model, dataset)
        .map_err(|e| SpaceError::missing(format!("inconsistent artifacts: {e}")))?;
    log::debug!("loaded feature space from {}", dir.display());
    Ok(space)
}
