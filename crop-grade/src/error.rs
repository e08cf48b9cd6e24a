use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing exists at the configured model path
    #[error("Model artifact not found at {0}")]
    ArtifactMissing(PathBuf),

    /// The artifact exists but a loader could not make sense of it
    #[error("Could not load model: {0}")]
    ModelLoad(String),

    /// Weight tensors missing or with the wrong shape
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Malformed weights file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "tensorflow")]
    #[error("TensorFlow error: {0}")]
    Tensorflow(#[from] tensorflow::Status),
}
