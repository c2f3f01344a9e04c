pub mod config;
pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod loss;
pub mod mnist_dataset;
pub mod model;
pub mod networks;
pub mod optim;
pub mod plot;
pub mod report;
pub mod train;
pub mod upscale;

pub use config::GanConfig;
pub use context::{Device, ExecutionContext};
pub use error::{GanError, NetworkKind, Result};
pub use networks::{Discriminator, Generator};
pub use train::Trainer;
