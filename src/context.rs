use rand::rngs::StdRng;
use rand::SeedableRng;

/// Where tensors live. Only the CPU is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
}

/// Execution context threaded through network construction, data shuffling and
/// latent sampling. Every random draw of a run comes from `rng`.
#[derive(Debug)]
pub struct ExecutionContext {
    pub device: Device,
    pub rng: StdRng,
}

impl ExecutionContext {
    pub fn new(seed: Option<u64>) -> ExecutionContext {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        ExecutionContext {
            device: Device::Cpu,
            rng,
        }
    }
}
