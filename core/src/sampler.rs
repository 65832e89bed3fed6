//! Monte Carlo sampling for one checkpoint.
//!
//! Iterations are embarrassingly parallel and partitioned into chunks;
//! each iteration derives its own RNG stream from the master seed, so the
//! totals are byte-identical for a fixed seed regardless of thread count.
//! The cancellation token is checked once per chunk.
//!
//! Draw order within an iteration is fixed and must never change:
//! all standard normals first (one per element), then one uniform per
//! risk. Uniforms are drawn even for risks that are not logged yet, so a
//! risk entering the register mid-horizon does not shift any other draw.

use crate::cancel::CancelToken;
use crate::correlation::CholeskyFactor;
use crate::error::{SimError, SimResult};
use crate::rng::IterationRng;
use crate::snapshot::StateSnapshot;
use rayon::prelude::*;

/// Iterations between cancellation checks.
const CHUNK: usize = 2_048;

/// Per-iteration total project cost at one checkpoint.
pub fn sample_totals(
    snapshot: &StateSnapshot,
    logged: &[bool],
    factor: &CholeskyFactor,
    master_seed: u64,
    n_iterations: usize,
    cancel: &CancelToken,
) -> SimResult<Vec<f64>> {
    let n_items = snapshot.items.len();
    let n_total = n_items + snapshot.risks.len();
    debug_assert_eq!(factor.dim(), n_total);
    debug_assert_eq!(logged.len(), snapshot.risks.len());

    let mut totals = vec![0.0f64; n_iterations];
    totals
        .par_chunks_mut(CHUNK)
        .enumerate()
        .try_for_each(|(chunk_index, chunk)| {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled);
            }
            let mut z = vec![0.0f64; n_total];
            let mut y = vec![0.0f64; n_total];

            for (offset, slot) in chunk.iter_mut().enumerate() {
                let iteration = (chunk_index * CHUNK + offset) as u64;
                *slot = one_iteration(
                    snapshot, logged, factor, master_seed, iteration, &mut z, &mut y,
                );
            }
            Ok(())
        })?;

    Ok(totals)
}

fn one_iteration(
    snapshot: &StateSnapshot,
    logged: &[bool],
    factor: &CholeskyFactor,
    master_seed: u64,
    iteration: u64,
    z: &mut [f64],
    y: &mut [f64],
) -> f64 {
    let mut rng = IterationRng::new(master_seed, iteration);
    let n_items = snapshot.items.len();

    for slot in z.iter_mut() {
        *slot = rng.next_standard_normal();
    }
    factor.transform_into(z, y);

    let mut total = 0.0;
    for (i, item) in snapshot.items.iter().enumerate() {
        total += item.sample_at(y[i]);
    }
    for (j, risk) in snapshot.risks.iter().enumerate() {
        let u = rng.next_f64();
        if logged[j] && u < risk.probability {
            total += risk.impact.sample_at(y[n_items + j]);
        }
    }
    total
}
