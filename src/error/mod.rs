#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration Error: {0} should be {1}")]
    Configuration(String, String),

    #[error("Device Error: {0} should be on {1}")]
    Device(String, String),

    #[error("Invalid Data Error: {0} should be {1}")]
    InvalidData(String, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shape Mismatch Error: {0} should be {1}")]
    ShapeMismatch(String, String),
}
