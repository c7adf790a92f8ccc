use thiserror::Error;

use crate::config::InputShape;

#[derive(Debug, Error)]
pub enum SiameseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("num_classes must be at least 1, got {0}")]
    InvalidNumClasses(i64),
    #[error("Invalid input shape {0}: every dimension must be positive")]
    InvalidInputShape(InputShape),
    #[error("Input shape {input} leaves no spatial extent after {stage}")]
    DegenerateShape { stage: String, input: InputShape },
    #[error("Expected an image pair, got {0} inputs")]
    PairArity(usize),
    #[error("Shape mismatch at {stage}: expected {expected:?}, actual {actual:?}")]
    ShapeMismatch {
        stage: String,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },
    #[error("Unsupported channel count: {0} (expected 1 or 3)")]
    UnsupportedChannels(i64),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),
}

pub type Result<T> = std::result::Result<T, SiameseError>;
