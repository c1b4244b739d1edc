pub mod artifact;
pub mod error;
pub mod manifest;
pub mod service;

pub use error::ModelError;
pub use service::{ChurnModelService, FeatureRecord};
