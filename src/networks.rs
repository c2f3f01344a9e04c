//! The two adversarial networks.
//!
//! Generator: latent (B, L) -> L -> h1 -> h2 -> ... -> H*W, reshaped to (B, H, W).
//! Every hidden affine layer is followed by batch norm and ReLU; the output layer
//! has no activation, so generated pixels are unbounded.
//!
//! Discriminator: images (B, H, W) flattened to (B, H*W) -> ... -> h2 -> h1 -> 1,
//! hidden layers again followed by batch norm and ReLU, output squashed by a sigmoid.

use crate::config::GanConfig;
use crate::context::ExecutionContext;
use crate::error::{GanError, Result};
use crate::init::initialize;
use crate::layers::{BatchNormLayer, FcLayer, Layer, ReluLayer, SigmoidLayer};
use crate::model::{Module, Param, ParamId, ParamSnapshot, Sequential};
use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// Affine -> BatchNorm -> ReLU blocks for each consecutive pair of `widths`.
fn hidden_stack(widths: &[usize], bn_epsilon: f32) -> Vec<Layer> {
    widths
        .windows(2)
        .flat_map(|w| {
            [
                Layer::FC(FcLayer::new(w[0], w[1])),
                Layer::BatchNorm(BatchNormLayer::new(w[1], bn_epsilon)),
                Layer::ReLU(ReluLayer::new()),
            ]
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Generator {
    latent_size: usize,
    image_shape: (usize, usize),
    pub nn: Sequential,
}

impl Generator {
    pub fn new(config: &GanConfig, ctx: &mut ExecutionContext) -> Result<Generator> {
        let mut widths = vec![config.latent_size];
        widths.extend_from_slice(&config.hidden_sizes);

        let mut layers = hidden_stack(&widths, config.batch_norm_epsilon);
        let last_hidden = widths[widths.len() - 1];
        layers.push(Layer::FC(FcLayer::new(last_hidden, config.image_pixels())));

        let mut nn = Sequential::new(layers);
        initialize(&mut nn, config.init_std, &mut ctx.rng)?;

        Ok(Generator {
            latent_size: config.latent_size,
            image_shape: (config.image_height, config.image_width),
            nn,
        })
    }

    pub fn latent_size(&self) -> usize {
        self.latent_size
    }

    /// Fresh latent batch, each entry uniform in [0, 1).
    pub fn sample_latent(&self, batch_size: usize, ctx: &mut ExecutionContext) -> Array2<f32> {
        Array2::random_using(
            (batch_size, self.latent_size),
            Uniform::new(0.0, 1.0),
            &mut ctx.rng,
        )
    }

    /// (B, L) latent vectors -> (B, H, W) images.
    pub fn forward(&mut self, latent: Array2<f32>) -> Result<Array3<f32>> {
        let batch_size = latent.nrows();
        if batch_size == 0 || latent.ncols() != self.latent_size {
            return Err(GanError::shape(
                "generator latent batch",
                &[batch_size.max(1), self.latent_size],
                latent.shape(),
            ));
        }
        let (h, w) = self.image_shape;
        let out = self.nn.forward(latent.into_dyn())?;
        out.into_shape_with_order((batch_size, h, w))
            .map_err(|e| GanError::InvalidInput(format!("generator output reshape: {e}")))
    }

    /// Backpropagate dLoss/dImages, accumulating generator gradients.
    /// Returns dLoss/dLatent.
    pub fn backward(&mut self, d_images: Array3<f32>) -> Result<Array2<f32>> {
        let (batch_size, h, w) = d_images.dim();
        let flat = d_images
            .into_shape_with_order((batch_size, h * w))
            .map_err(|e| GanError::InvalidInput(format!("generator gradient reshape: {e}")))?;
        let d_latent = self.nn.backward(flat.into_dyn())?;
        d_latent
            .into_dimensionality::<Ix2>()
            .map_err(|e| GanError::InvalidInput(format!("generator latent gradient: {e}")))
    }

    pub fn zero_grad(&mut self) {
        self.nn.zero_grad();
    }

    pub fn parameters(&mut self) -> Vec<(ParamId, Param<'_>)> {
        self.nn.parameters()
    }

    pub fn parameter_snapshot(&mut self) -> ParamSnapshot {
        self.nn.snapshot()
    }
}

#[derive(Debug, Clone)]
pub struct Discriminator {
    image_shape: (usize, usize),
    pub nn: Sequential,
}

impl Discriminator {
    pub fn new(config: &GanConfig, ctx: &mut ExecutionContext) -> Result<Discriminator> {
        let mut widths = vec![config.image_pixels()];
        widths.extend(config.hidden_sizes.iter().rev());

        let mut layers = hidden_stack(&widths, config.batch_norm_epsilon);
        let last_hidden = widths[widths.len() - 1];
        layers.push(Layer::FC(FcLayer::new(last_hidden, 1)));
        layers.push(Layer::Sigmoid(SigmoidLayer::new()));

        let mut nn = Sequential::new(layers);
        initialize(&mut nn, config.init_std, &mut ctx.rng)?;

        Ok(Discriminator {
            image_shape: (config.image_height, config.image_width),
            nn,
        })
    }

    /// (B, H, W) images -> (B,) probabilities of being real.
    pub fn forward(&mut self, images: &Array3<f32>) -> Result<Array1<f32>> {
        let (batch_size, h, w) = images.dim();
        if batch_size == 0 || (h, w) != self.image_shape {
            return Err(GanError::shape(
                "discriminator image batch",
                &[batch_size.max(1), self.image_shape.0, self.image_shape.1],
                images.shape(),
            ));
        }
        let flat = images
            .to_shape((batch_size, h * w))
            .map_err(|e| GanError::InvalidInput(format!("discriminator flatten: {e}")))?
            .to_owned();
        let out = self.nn.forward(flat.into_dyn())?;
        let out = out
            .into_dimensionality::<Ix2>()
            .map_err(|e| GanError::InvalidInput(format!("discriminator output: {e}")))?;
        Ok(out.column(0).to_owned())
    }

    /// Backpropagate dLoss/dScores, accumulating discriminator gradients.
    /// Returns dLoss/dImages.
    pub fn backward(&mut self, d_scores: Array1<f32>) -> Result<Array3<f32>> {
        let batch_size = d_scores.len();
        let (h, w) = self.image_shape;
        let d_flat = self.nn.backward(d_scores.insert_axis(Axis(1)).into_dyn())?;
        d_flat
            .into_shape_with_order((batch_size, h, w))
            .map_err(|e| GanError::InvalidInput(format!("discriminator input gradient: {e}")))
    }

    pub fn zero_grad(&mut self) {
        self.nn.zero_grad();
    }

    pub fn parameters(&mut self) -> Vec<(ParamId, Param<'_>)> {
        self.nn.parameters()
    }

    pub fn parameter_snapshot(&mut self) -> ParamSnapshot {
        self.nn.snapshot()
    }
}
