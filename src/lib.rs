pub mod config;
pub mod matcher;
pub mod report;
pub mod similarity;
pub mod storage;

// Re-export feature space types for convenience
pub use facematch_space::{
    Dataset, FeatureSpace, ImagePreprocessor, ProjectionModel, SpaceError, SpaceHandle, SpaceInfo,
};
pub use matcher::{find_matches, MatchRecord, Policy};
pub use report::MatchReport;
pub use similarity::Metric;
