use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    // Rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported configuration: {0}")]
    Unsupported(String),

    // Shape inference and kernel preconditions
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Failed to build compute thread pool: {0}")]
    ThreadPool(String),
}
