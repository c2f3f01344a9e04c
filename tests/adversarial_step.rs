use mnist_gan::layers::Layer;
use mnist_gan::model::ParamSnapshot;
use mnist_gan::train::StepIndex;
use mnist_gan::{ExecutionContext, GanConfig, GanError, NetworkKind, Trainer};
use ndarray::prelude::*;

/// Batch of 2, latent vectors of length 4 and 2x2 "images".
fn tiny_config() -> GanConfig {
    GanConfig {
        batch_size: 2,
        latent_size: 4,
        image_height: 2,
        image_width: 2,
        learning_rate: 1e-3,
        ..GanConfig::default()
    }
}

fn real_batch() -> Array3<f32> {
    array![[[0.0, 1.0], [1.0, 0.0]], [[0.2, 0.9], [0.8, 0.1]]]
}

fn differs(a: &ParamSnapshot, b: &ParamSnapshot) -> bool {
    a.iter().any(|(id, value)| b.get(id) != Some(value))
}

#[test]
/// Run exactly one full step and check which parameters moved at each phase.
fn one_step_updates_each_network_in_its_own_phase() -> Result<(), Box<dyn std::error::Error>> {
    let config = tiny_config();
    let mut ctx = ExecutionContext::new(Some(42));
    let mut trainer = Trainer::new(&config, &mut ctx)?;
    let step = StepIndex::default();

    let gen_initial = trainer.generator.parameter_snapshot();
    let dis_initial = trainer.discriminator.parameter_snapshot();

    let gen_phase = trainer.generator_phase(2, &mut ctx, step)?;
    let gen_after_gen_phase = trainer.generator.parameter_snapshot();
    assert!(gen_phase.loss >= 0.0);
    assert_eq!(gen_phase.fake.dim(), (2, 2, 2));
    assert!(differs(&gen_initial, &gen_after_gen_phase));
    assert_eq!(trainer.discriminator.parameter_snapshot(), dis_initial);

    let dis = trainer.discriminator_phase(&real_batch(), &gen_phase.fake, step)?;
    assert!(dis.real >= 0.0 && dis.fake >= 0.0);
    assert_eq!(dis.total, dis.real + dis.fake);
    assert!(differs(&dis_initial, &trainer.discriminator.parameter_snapshot()));
    assert_eq!(trainer.generator.parameter_snapshot(), gen_after_gen_phase);

    Ok(())
}

#[test]
/// The discriminator phase must not produce any gradient for the generator.
fn discriminator_phase_is_detached_from_generator() -> Result<(), Box<dyn std::error::Error>> {
    let config = tiny_config();
    let mut ctx = ExecutionContext::new(Some(7));
    let mut trainer = Trainer::new(&config, &mut ctx)?;
    let step = StepIndex::default();

    let gen_phase = trainer.generator_phase(2, &mut ctx, step)?;
    trainer.generator.zero_grad();
    trainer.discriminator_phase(&real_batch(), &gen_phase.fake, step)?;

    // zero_grad leaves no gradient at all, so any entry came from the discriminator phase
    assert!(
        trainer.generator.parameters().iter().all(|(_, p)| p.grad.is_none()),
        "generator received gradient from the discriminator phase"
    );
    assert!(trainer.generator.nn.grad_snapshot().is_empty());
    // the discriminator, on the other hand, has gradients for every parameter
    let dis_grads = trainer.discriminator.nn.grad_snapshot();
    assert_eq!(dis_grads.len(), trainer.discriminator.parameters().len());
    Ok(())
}

#[test]
fn train_step_reports_both_losses() -> Result<(), Box<dyn std::error::Error>> {
    let config = tiny_config();
    let mut ctx = ExecutionContext::new(Some(3));
    let mut trainer = Trainer::new(&config, &mut ctx)?;

    for batch in 0..20 {
        let outcome = trainer.train_step(&real_batch(), &mut ctx, StepIndex { epoch: 0, batch })?;
        assert!(outcome.gen_loss.is_finite() && outcome.gen_loss >= 0.0);
        assert!(outcome.dis.total.is_finite());
        assert_eq!(outcome.fake.dim(), (2, 2, 2));
    }
    Ok(())
}

#[test]
fn same_seed_same_run() -> Result<(), Box<dyn std::error::Error>> {
    let config = tiny_config();
    let run = |seed: u64| -> Result<Vec<f32>, GanError> {
        let mut ctx = ExecutionContext::new(Some(seed));
        let mut trainer = Trainer::new(&config, &mut ctx)?;
        (0..3)
            .map(|batch| {
                trainer
                    .train_step(&real_batch(), &mut ctx, StepIndex { epoch: 0, batch })
                    .map(|o| o.dis.total)
            })
            .collect()
    };
    assert_eq!(run(11)?, run(11)?);
    assert_ne!(run(11)?, run(12)?);
    Ok(())
}

#[test]
fn nan_loss_aborts_with_context() -> Result<(), Box<dyn std::error::Error>> {
    let config = tiny_config();
    let mut ctx = ExecutionContext::new(Some(5));
    let mut trainer = Trainer::new(&config, &mut ctx)?;
    for layer in trainer.discriminator.nn.layers.iter_mut() {
        if let Layer::FC(fc) = layer {
            fc.weights.fill(f32::NAN);
        }
    }

    let err = trainer
        .train_step(&real_batch(), &mut ctx, StepIndex { epoch: 4, batch: 17 })
        .unwrap_err();
    match err {
        GanError::NonFiniteLoss {
            network,
            epoch,
            batch,
            ..
        } => {
            assert_eq!(network, NetworkKind::Generator);
            assert_eq!((epoch, batch), (4, 17));
        }
        other => panic!("unexpected error {other}"),
    }
    Ok(())
}

#[test]
fn malformed_real_batch_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let config = tiny_config();
    let mut ctx = ExecutionContext::new(Some(5));
    let mut trainer = Trainer::new(&config, &mut ctx)?;
    let wrong = Array3::<f32>::zeros((2, 3, 3));
    let err = trainer
        .train_step(&wrong, &mut ctx, StepIndex::default())
        .unwrap_err();
    assert!(matches!(err, GanError::ShapeMismatch { .. }));
    Ok(())
}
