use thiserror::Error;

/// Errors that can occur in lattix-latent.
#[derive(Error, Debug)]
pub enum Error {
    /// Entity id outside `[0, count)`.
    #[error("Entity id {id} out of range (graph has {count} entities)")]
    EntityOutOfRange { id: usize, count: usize },
    /// Relation id outside `[0, count)`.
    #[error("Relation id {id} out of range (graph has {count} relations)")]
    RelationOutOfRange { id: usize, count: usize },
    /// The negative sampler could not produce a corrupted triplet.
    #[error("Negative sampling failed: {0}")]
    Sampler(String),
    /// Hyperparameters rejected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// The training driver was handed no triplets.
    #[error("No training triplets provided")]
    EmptyTrainingSet,
    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for lattix-latent.
pub type Result<T> = std::result::Result<T, Error>;
