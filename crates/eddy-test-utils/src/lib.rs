//! Test fixtures for Eddy development.
//!
//! Decomposition builders, deterministic initial conditions keyed on
//! global coordinates (so every partition of a domain starts from the
//! same state), and small post-processors for pipeline tests in
//! [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use eddy_block::BlockLattice;
use eddy_core::{Descriptor, LatticeCoord};
use eddy_geometry::{Cuboid, CuboidDecomposition};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use fixtures::{ConstFieldWriter, CountingPostProcessor, StageRecorder};

/// Unit-spaced domain at the origin split into `count` cuboids.
pub fn decomposition(extent: [i32; 3], dim: usize, count: usize) -> CuboidDecomposition {
    CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, extent), dim, count)
        .unwrap_or_else(|e| panic!("fixture decomposition {extent:?} into {count}: {e}"))
}

/// As [`decomposition`], periodic on every active axis.
pub fn periodic_decomposition(extent: [i32; 3], dim: usize, count: usize) -> CuboidDecomposition {
    let mut d = decomposition(extent, dim, count);
    d.set_periodicity([true; 3]);
    d
}

/// Equilibrium at rest with a small random perturbation per population.
///
/// The perturbation depends only on `seed` and the global coordinate,
/// never on visiting order.
pub fn perturbed_populations<D: Descriptor>(seed: u64, amplitude: f64) -> impl FnMut(LatticeCoord, &mut [f64]) {
    move |p, f| {
        let key = (p[0] as u64 & 0xffff) | ((p[1] as u64 & 0xffff) << 16) | ((p[2] as u64 & 0xffff) << 32);
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ key.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        for (i, fi) in f.iter_mut().enumerate() {
            *fi = D::W[i] * (1.0 + amplitude * (rng.random::<f64>() - 0.5));
        }
    }
}

/// Sum of every population over the core sites of a block.
pub fn block_mass<D: Descriptor>(block: &BlockLattice<D>) -> f64 {
    let mut mass = 0.0;
    block.for_each_core_cell(|_, cell| mass += cell.populations().iter().sum::<f64>());
    mass
}

/// Compensated sum, for comparing masses over many steps.
pub fn kahan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let (mut sum, mut c) = (0.0, 0.0);
    for v in values {
        let y = v - c;
        let t = sum + y;
        c = (t - sum) - y;
        sum = t;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::D2Q9;

    #[test]
    fn perturbation_depends_on_coordinate_only() {
        let mut a = [0.0; 9];
        let mut b = [0.0; 9];
        perturbed_populations::<D2Q9>(3, 0.1)([2, 1, 0], &mut a);
        let mut other = perturbed_populations::<D2Q9>(3, 0.1);
        other([5, 5, 0], &mut b);
        other([2, 1, 0], &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn kahan_matches_exact_sum() {
        assert_eq!(kahan_sum([1.0, 2.0, 3.5]), 6.5);
    }
}
