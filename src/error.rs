//! Error types for the GAN crate.

use std::fmt;

use thiserror::Error;

/// Which of the two adversarial networks an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Generator,
    Discriminator,
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Generator => write!(f, "generator"),
            NetworkKind::Discriminator => write!(f, "discriminator"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GanError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{0} layer: backward called before forward")]
    MissingForward(&'static str),

    #[error("Non-finite {network} loss ({value}) at epoch {epoch}, batch {batch}")]
    NonFiniteLoss {
        network: NetworkKind,
        epoch: usize,
        batch: usize,
        value: f32,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GanError>;

impl GanError {
    pub(crate) fn shape(context: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        GanError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
