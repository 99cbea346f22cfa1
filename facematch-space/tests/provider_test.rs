use std::sync::Arc;
use std::thread;

use anyhow::Result;
use facematch_space::{Dataset, FeatureSpace, ProjectionModel, SpaceError, SpaceHandle};
use ndarray::array;

fn model() -> Result<ProjectionModel> {
    // Two raw features collapsed onto their sum and difference
    Ok(ProjectionModel::new(
        vec![0.0, 0.0],
        vec![1.0, 1.0],
        array![[1.0, 1.0], [1.0, -1.0]],
        vec![0.7, 0.3],
    )?)
}

fn space(labels: &[&str]) -> Result<FeatureSpace> {
    let model = model()?;
    let raw = ndarray::Array2::from_shape_fn((labels.len(), 2), |(i, j)| (i * 2 + j) as f32);
    let dataset = Dataset::build(
        &model,
        raw.view(),
        labels.iter().map(|s| s.to_string()).collect(),
        labels.iter().map(|s| format!("{s}.jpg")).collect(),
    )?;
    Ok(FeatureSpace::new(model, dataset)?)
}

#[test]
fn test_project_matches_dataset_rows() -> Result<()> {
    env_logger::try_init().ok();
    let handle = SpaceHandle::with_space(space(&["ann", "bob", "ann"])?);

    let snapshot = handle.snapshot()?;
    let (features, labels, references) = snapshot.dataset_features();
    assert_eq!(features.dim(), (3, 2));
    assert_eq!(labels.len(), 3);
    assert_eq!(references[1], "bob.jpg");

    // Row 2 came from raw [4, 5]
    assert_eq!(handle.project(&[4.0, 5.0])?, features.row(2).to_vec());

    let info = handle.info();
    assert_eq!(info.total_entries, 3);
    assert_eq!(info.unique_identity_count, 2);
    assert_eq!(info.feature_dimension, 2);
    assert_eq!(info.reduced_dimension, 2);
    Ok(())
}

#[test]
fn test_project_wrong_raw_length() -> Result<()> {
    let handle = SpaceHandle::with_space(space(&["ann"])?);
    let err = handle.project(&[1.0, 2.0, 3.0]).unwrap_err();
    assert!(matches!(
        err,
        SpaceError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
    Ok(())
}

#[test]
fn test_readers_keep_snapshot_across_reload() -> Result<()> {
    let handle = Arc::new(SpaceHandle::with_space(space(&["ann", "bob"])?));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                let snapshot = handle.snapshot().unwrap();
                let len = snapshot.dataset().len();
                // A snapshot never changes under its reader
                for _ in 0..100 {
                    assert_eq!(snapshot.dataset().len(), len);
                    assert_eq!(snapshot.dataset().labels().len(), len);
                }
                len
            })
        })
        .collect();

    handle.install(space(&["ann", "bob", "cat", "dan"])?);

    for reader in readers {
        let len = reader.join().unwrap();
        assert!(len == 2 || len == 4);
    }
    assert_eq!(handle.info().total_entries, 4);
    Ok(())
}
