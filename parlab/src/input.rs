//! Deterministic input generation.
//!
//! Inputs are generated once per run from a seed and a size, so a run can be
//! replayed exactly. Values are drawn uniformly from `0..10_000_000`.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) for generated values.
pub const VALUE_BOUND: i64 = 10_000_000;

/// Generates `size` values from the given seed.
#[must_use]
pub fn generate(seed: u64, size: usize) -> Vec<i64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..size).map(|_| rng.gen_range(0..VALUE_BOUND)).collect()
}
