use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

/// RandMode controls random generator behaviour. Predictable for tests and
/// replays, truly random for gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandMode {
    Predictable,
    RandomUniform,
}

/// Random source behind the `random` API instruction
pub struct ScriptRng {
    rng: Box<dyn RngCore>,
    rand_mode: RandMode,
}

impl ScriptRng {
    pub fn new_uniform() -> ScriptRng {
        ScriptRng {
            rng: Box::new(StdRng::from_entropy()),
            rand_mode: RandMode::RandomUniform,
        }
    }

    pub fn new_predictable(seed: u64) -> ScriptRng {
        ScriptRng {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            rand_mode: RandMode::Predictable,
        }
    }

    pub fn from_seed(seed: Option<u64>) -> ScriptRng {
        match seed {
            Some(seed) => Self::new_predictable(seed),
            None => Self::new_uniform(),
        }
    }

    pub fn mode(&self) -> RandMode {
        self.rand_mode
    }

    /// Integer in [0, max); `max` must be at least 1
    pub fn below(&mut self, max: u32) -> u32 {
        self.rng.gen_range(0..max)
    }
}
