pub mod config;
pub mod distance;
pub mod encoder;
pub mod error;
pub mod loss;
pub mod model;
pub mod preprocess;
pub mod summary;

pub use config::{DeviceSpec, InputShape, NetworkConfig};
pub use distance::DistanceKind;
pub use encoder::{Encoder, EMBEDDING_DIM};
pub use error::{Result, SiameseError};
pub use model::SiameseNetwork;
pub use summary::ModelSummary;
