// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::{RngCore, SeedableRng};
use rand_xoshiro::SplitMix64;

/// Reproducibility mode used to control determinism/performance trade-offs.
///
/// `Strict` runs chains sequentially on the calling thread. Results are the
/// same in every mode; only scheduling changes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReproMode {
    Strict,
    #[default]
    Balanced,
    Fast,
}

/// Seed for chain `chain` of a run seeded with `seed`.
///
/// Depends only on `(seed, chain)`, never on scheduling.
pub fn derive_chain_seed(seed: u64, chain: usize) -> u64 {
    SplitMix64::seed_from_u64(seed ^ (chain as u64).wrapping_mul(0xd1b54a32d192ed03)).next_u64()
}
