use crate::error::{GanError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Hyperparameters and output locations for a run.
///
/// Built once at startup (defaults, optionally a JSON file, then CLI overrides)
/// and handed around by shared reference. Nothing mutates it afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GanConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub latent_size: usize,
    pub image_height: usize,
    pub image_width: usize,
    /// Generator widths after the latent layer; the discriminator mirrors them.
    pub hidden_sizes: Vec<usize>,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub adam_epsilon: f32,
    pub init_std: f32,
    pub batch_norm_epsilon: f32,
    pub report_every: usize,
    pub grid_size: usize,
    pub grid_columns: usize,
    pub upscale_rows: usize,
    pub upscale_cols: usize,
    pub data_dir: PathBuf,
    pub samples_dir: PathBuf,
    pub plots_dir: PathBuf,
    pub loss_csv: Option<PathBuf>,
    pub upscale_dir: PathBuf,
    pub seed: Option<u64>,
}

impl Default for GanConfig {
    fn default() -> Self {
        GanConfig {
            epochs: 100,
            batch_size: 60,
            latent_size: 100,
            image_height: 28,
            image_width: 28,
            hidden_sizes: vec![128, 256, 512],
            learning_rate: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
            adam_epsilon: 1e-8,
            init_std: 0.02,
            batch_norm_epsilon: 1e-5,
            report_every: 250,
            grid_size: 36,
            grid_columns: 6,
            upscale_rows: 10,
            upscale_cols: 10,
            data_dir: PathBuf::from("data/"),
            samples_dir: PathBuf::from("generated_images"),
            plots_dir: PathBuf::from("loss_images"),
            loss_csv: Some(PathBuf::from("loss.csv")),
            upscale_dir: PathBuf::from("image_data"),
            seed: None,
        }
    }
}

impl GanConfig {
    /// Load a config from a JSON file. Keys absent from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json_str = fs::read_to_string(path)?;
        let config: GanConfig = serde_json::from_str(&json_str)?;
        Ok(config)
    }

    pub fn image_pixels(&self) -> usize {
        self.image_height * self.image_width
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("latent_size", self.latent_size),
            ("image_height", self.image_height),
            ("image_width", self.image_width),
            ("report_every", self.report_every),
            ("grid_columns", self.grid_columns),
            ("upscale_rows", self.upscale_rows),
            ("upscale_cols", self.upscale_cols),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(GanError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.hidden_sizes.is_empty() || self.hidden_sizes.contains(&0) {
            return Err(GanError::InvalidConfig(format!(
                "hidden_sizes must be non-empty and positive, got {:?}",
                self.hidden_sizes
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(GanError::InvalidConfig(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(GanError::InvalidConfig(format!(
                    "{name} must be in [0, 1), got {beta}"
                )));
            }
        }
        for (name, value) in [
            ("adam_epsilon", self.adam_epsilon),
            ("init_std", self.init_std),
            ("batch_norm_epsilon", self.batch_norm_epsilon),
        ] {
            if !(value > 0.0) {
                return Err(GanError::InvalidConfig(format!(
                    "{name} must be > 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.image_pixels(), 784);
        assert_eq!(config.report_every, 250);
        assert_eq!((config.grid_size, config.grid_columns), (36, 6));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GanConfig =
            serde_json::from_str(r#"{ "epochs": 3, "seed": 7 }"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.batch_size, 60);
        assert_eq!(config.hidden_sizes, vec![128, 256, 512]);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = GanConfig::default();
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(GanError::InvalidConfig(_))));

        let mut config = GanConfig::default();
        config.beta2 = 1.0;
        assert!(config.validate().is_err());

        let mut config = GanConfig::default();
        config.learning_rate = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = GanConfig::default();
        config.hidden_sizes.clear();
        assert!(config.validate().is_err());
    }
}
