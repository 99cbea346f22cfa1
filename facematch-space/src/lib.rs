pub mod dataset;
pub mod error;
pub mod model;
pub mod preprocess;
pub mod space;

// Re-export commonly used types
pub use dataset::{Dataset, DatasetEntry};
pub use error::{Result, SpaceError};
pub use model::ProjectionModel;
pub use preprocess::ImagePreprocessor;
pub use space::{FeatureSpace, SpaceHandle, SpaceInfo};
