//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG during sampling.
//! All draws flow through IterationRng streams derived from the single
//! master seed reported in the run header.
//!
//! Each Monte Carlo iteration gets its own stream, seeded deterministically
//! from (master_seed, iteration index). This means:
//!   - Iterations can be partitioned across worker threads in any order
//!     without losing reproducibility.
//!   - Iteration k draws the same values at every checkpoint, so carried
//!     forward totals are exact, not an approximation.

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64Mcg;

/// A deterministic RNG for a single Monte Carlo iteration.
pub struct IterationRng {
    inner: Pcg64Mcg,
}

impl IterationRng {
    /// Derive the stream for one iteration from the master seed. The index
    /// must be the iteration's stable position, never a thread id.
    pub fn new(master_seed: u64, iteration: u64) -> Self {
        let derived = master_seed ^ (iteration.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived),
        }
    }

    /// Roll a float in [0.0, 1.0). Drives the Bernoulli risk gates.
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a standard normal N(0, 1).
    pub fn next_standard_normal(&mut self) -> f64 {
        self.inner.sample(StandardNormal)
    }
}
