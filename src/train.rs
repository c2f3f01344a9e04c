use crate::config::GanConfig;
use crate::context::ExecutionContext;
use crate::error::{GanError, NetworkKind, Result};
use crate::loss::{binary_cross_entropy, LossFunction};
use crate::mnist_dataset::Dataset;
use crate::networks::{Discriminator, Generator};
use crate::optim::{Adam, Optimizer};
use crate::report::{ReportPosition, Reporter};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::prelude::*;

/// Position of a training step, used to locate numeric failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepIndex {
    pub epoch: usize,
    pub batch: usize,
}

/// Output of the generator phase of a step.
#[derive(Debug, Clone)]
pub struct GeneratorPhase {
    pub loss: f32,
    /// Synthetic batch, produced before the generator update.
    pub fake: Array3<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscriminatorLosses {
    pub real: f32,
    pub fake: f32,
    /// `real + fake`, not averaged.
    pub total: f32,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub gen_loss: f32,
    pub dis: DiscriminatorLosses,
    pub fake: Array3<f32>,
}

fn check_finite(value: f32, network: NetworkKind, step: StepIndex) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GanError::NonFiniteLoss {
            network,
            epoch: step.epoch,
            batch: step.batch,
            value,
        })
    }
}

/// Both networks, their optimizers and the loss that ties them together.
pub struct Trainer<'a> {
    config: &'a GanConfig,
    pub generator: Generator,
    pub discriminator: Discriminator,
    gen_optimizer: Adam,
    dis_optimizer: Adam,
    loss_fn: LossFunction,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a GanConfig, ctx: &mut ExecutionContext) -> Result<Trainer<'a>> {
        config.validate()?;
        let generator = Generator::new(config, ctx)?;
        let discriminator = Discriminator::new(config, ctx)?;
        Ok(Trainer {
            config,
            generator,
            discriminator,
            gen_optimizer: Adam::from_config(config),
            dis_optimizer: Adam::from_config(config),
            loss_fn: binary_cross_entropy,
        })
    }

    /// Update the generator so the discriminator scores fresh fakes as real.
    ///
    /// The discriminator is only read here: its gradients are computed on the way back
    /// to the generator but never applied.
    pub fn generator_phase(
        &mut self,
        batch_size: usize,
        ctx: &mut ExecutionContext,
        step: StepIndex,
    ) -> Result<GeneratorPhase> {
        self.generator.zero_grad();
        self.discriminator.zero_grad();

        let latent = self.generator.sample_latent(batch_size, ctx);
        let fake = self.generator.forward(latent)?;
        let scores = self.discriminator.forward(&fake)?;
        let (loss, d_scores) = (self.loss_fn)(&scores, &Array1::ones(batch_size))?;
        let loss = check_finite(loss, NetworkKind::Generator, step)?;

        let d_fake = self.discriminator.backward(d_scores)?;
        self.generator.backward(d_fake)?;
        self.gen_optimizer.step(&mut self.generator.nn)?;

        Ok(GeneratorPhase { loss, fake })
    }

    /// Update the discriminator on a real batch (target 1) and a fake batch (target 0).
    ///
    /// `fake` is plain data here: the gradient w.r.t. it is dropped, so nothing reaches
    /// the generator.
    pub fn discriminator_phase(
        &mut self,
        real: &Array3<f32>,
        fake: &Array3<f32>,
        step: StepIndex,
    ) -> Result<DiscriminatorLosses> {
        self.discriminator.zero_grad();

        let real_scores = self.discriminator.forward(real)?;
        let (real_loss, d_real) = (self.loss_fn)(&real_scores, &Array1::ones(real.len_of(Axis(0))))?;
        self.discriminator.backward(d_real)?;

        let fake_scores = self.discriminator.forward(fake)?;
        let (fake_loss, d_fake) = (self.loss_fn)(&fake_scores, &Array1::zeros(fake.len_of(Axis(0))))?;
        self.discriminator.backward(d_fake)?;

        let total = check_finite(real_loss + fake_loss, NetworkKind::Discriminator, step)?;
        self.dis_optimizer.step(&mut self.discriminator.nn)?;

        Ok(DiscriminatorLosses {
            real: real_loss,
            fake: fake_loss,
            total,
        })
    }

    /// One adversarial step: generator phase, then discriminator phase on the
    /// pre-update fakes.
    pub fn train_step(
        &mut self,
        real: &Array3<f32>,
        ctx: &mut ExecutionContext,
        step: StepIndex,
    ) -> Result<StepOutcome> {
        let batch_size = real.len_of(Axis(0));
        let GeneratorPhase { loss: gen_loss, fake } = self.generator_phase(batch_size, ctx, step)?;
        let dis = self.discriminator_phase(real, &fake, step)?;
        Ok(StepOutcome { gen_loss, dis, fake })
    }

    /// Train for `config.epochs` passes over `dataset`, reporting through `reporter`.
    pub fn fit(
        &mut self,
        dataset: &Dataset,
        ctx: &mut ExecutionContext,
        reporter: &mut Reporter,
    ) -> Result<()> {
        let config = self.config;
        if dataset.image_shape() != (config.image_height, config.image_width) {
            return Err(GanError::InvalidConfig(format!(
                "dataset images are {:?}, networks expect {:?}",
                dataset.image_shape(),
                (config.image_height, config.image_width)
            )));
        }
        let batches = dataset.batches_per_epoch(config.batch_size);
        if batches == 0 {
            return Err(GanError::InvalidConfig(format!(
                "dataset has {} samples, fewer than one batch of {}",
                dataset.len(),
                config.batch_size
            )));
        }

        let pb = progress_bar((config.epochs * batches) as u64);
        reporter.log(&pb, &format!("[TRAIN] len: {}", dataset.len()));
        reporter.log(
            &pb,
            &format!(
                "[TRAIN] generator params: {}, discriminator params: {}",
                self.generator.nn.num_parameters(),
                self.discriminator.nn.num_parameters()
            ),
        );

        for epoch in 0..config.epochs {
            for (batch, (real, _labels)) in dataset.epoch_batches(config.batch_size, ctx).enumerate() {
                let step = StepIndex { epoch, batch };
                let outcome = self.train_step(&real, ctx, step)?;

                if reporter.is_due(batch) {
                    let position = ReportPosition {
                        epoch,
                        epochs: config.epochs,
                        batch,
                        batches,
                    };
                    reporter.report(&position, outcome.dis.total, outcome.gen_loss, &outcome.fake, &pb);
                }
                pb.inc(1);
            }
        }

        pb.finish_and_clear();
        let summary = format!("Training completed! {} reports written", reporter.counter());
        reporter.log(&pb, &summary);
        Ok(())
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
