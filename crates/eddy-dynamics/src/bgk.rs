//! Single-relaxation-time (BGK) collision.
//!
//! ```text
//! f_i <- f_i + omega * (f_i^eq(rho, u) - f_i)
//! ```
//!
//! The batched kernel works on transposed lane chunks and performs the
//! same floating-point operations in the same order as the per-cell
//! path, so both produce identical bits.

use eddy_block::{Batch, Cell, CellStatistic, Dynamics, LaneChunk, LANES};
use eddy_core::{Descriptor, ParameterId, ParameterSet};

/// BGK collision with relaxation frequency `OMEGA`.
#[derive(Clone, Copy, Debug)]
pub struct Bgk {
    default_omega: f64,
}

impl Bgk {
    /// BGK dynamics relaxing at `omega` until the parameter is set.
    pub fn new(omega: f64) -> Self {
        Self { default_omega: omega }
    }

    fn omega(&self, params: &ParameterSet) -> f64 {
        params.scalar(ParameterId::OMEGA).unwrap_or(self.default_omega)
    }
}

impl Default for Bgk {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Relax one site towards equilibrium.
pub(crate) fn relax<D: Descriptor>(f: &mut [f64], omega: f64) -> CellStatistic {
    let (rho, u) = D::rho_u(f);
    let u_sqr = u[0] * u[0] + u[1] * u[1] + u[2] * u[2];
    for (i, fi) in f.iter_mut().enumerate() {
        *fi += omega * (D::equilibrium(i, rho, u, u_sqr) - *fi);
    }
    CellStatistic { rho, u_sqr }
}

fn relax_chunk<D: Descriptor>(chunk: &mut LaneChunk<'_>, omega: f64) {
    let mut rho = [0.0; LANES];
    let mut j = [[0.0; 3]; LANES];
    for (i, c) in D::C.iter().enumerate() {
        let c = [c[0] as f64, c[1] as f64, c[2] as f64];
        for l in 0..LANES {
            let f = chunk.f[i][l];
            rho[l] += f;
            j[l][0] += f * c[0];
            j[l][1] += f * c[1];
            j[l][2] += f * c[2];
        }
    }
    let mut u = [[0.0; 3]; LANES];
    let mut u_sqr = [0.0; LANES];
    for l in 0..LANES {
        if rho[l].abs() >= f64::EPSILON {
            u[l] = [j[l][0] / rho[l], j[l][1] / rho[l], j[l][2] / rho[l]];
        }
        u_sqr[l] = u[l][0] * u[l][0] + u[l][1] * u[l][1] + u[l][2] * u[l][2];
    }
    for i in 0..D::Q {
        for l in 0..LANES {
            let f = &mut chunk.f[i][l];
            *f += omega * (D::equilibrium(i, rho[l], u[l], u_sqr[l]) - *f);
        }
    }
    for l in 0..chunk.len() {
        chunk.record(rho[l], u_sqr[l]);
    }
}

impl<D: Descriptor> Dynamics<D> for Bgk {
    fn name(&self) -> &str {
        "bgk"
    }

    fn parameters(&self) -> &[ParameterId] {
        &[ParameterId::OMEGA]
    }

    fn collide(&self, cell: &mut Cell<'_>, params: &ParameterSet) -> Option<CellStatistic> {
        Some(relax::<D>(cell.populations_mut(), self.omega(params)))
    }

    fn collide_batch(&self, batch: &mut Batch<'_>, params: &ParameterSet) -> bool {
        let omega = self.omega(params);
        batch.for_each_chunk(|chunk| relax_chunk::<D>(chunk, omega));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use eddy_block::BlockLattice;
    use eddy_core::{Platform, ProcessingContext, D2Q9, D3Q19};
    use proptest::prelude::*;

    fn wavy(p: [i32; 3], f: &mut [f64], w: &[f64]) {
        for (i, fi) in f.iter_mut().enumerate() {
            *fi = w[i] * (1.0 + 0.1 * ((p[0] * 7 + p[1] * 3 + p[2] + i as i32) as f64).cos());
        }
    }

    #[test]
    fn relaxation_conserves_mass_and_momentum() {
        let mut f = [0.0; 9];
        wavy([1, 2, 0], &mut f, D2Q9::W);
        let (rho0, u0) = D2Q9::rho_u(&f);
        relax::<D2Q9>(&mut f, 1.7);
        let (rho1, u1) = D2Q9::rho_u(&f);
        assert!((rho0 - rho1).abs() < 1e-14);
        assert!((u0[0] - u1[0]).abs() < 1e-14);
        assert!((u0[1] - u1[1]).abs() < 1e-14);
    }

    #[test]
    fn omega_one_reaches_equilibrium() {
        let mut f = [0.0; 9];
        wavy([0, 0, 0], &mut f, D2Q9::W);
        let s = relax::<D2Q9>(&mut f, 1.0);
        let u = D2Q9::rho_u(&f).1;
        for (i, fi) in f.iter().enumerate() {
            assert!((fi - D2Q9::equilibrium(i, s.rho, u, s.u_sqr)).abs() < 1e-14);
        }
    }

    #[test]
    fn batched_path_matches_per_cell_path() {
        let run = |platform| {
            let mut block = BlockLattice::<D3Q19>::new([5, 3, 2], 1, platform).unwrap();
            let bgk: Arc<dyn Dynamics<D3Q19>> = Arc::new(Bgk::new(0.6));
            block.set_dynamics_where(&bgk, |_| true).unwrap();
            block.set_parameter_scalar(ParameterId::OMEGA, 1.4);
            block.define_populations_with(|p, f| wavy(p, f, D3Q19::W));
            block.collide();
            block.reset_statistics();
            block.set_processing_context(ProcessingContext::Evaluation);
            block
        };
        let scalar = run(Platform::CpuScalar);
        let simd = run(Platform::CpuSimd);
        for p in scalar.geometry().core_box().iter() {
            assert_eq!(scalar.cell_populations(p), simd.cell_populations(p), "at {p:?}");
        }
        assert_eq!(scalar.statistics(), simd.statistics());
    }

    #[test]
    fn default_omega_applies_until_set() {
        let bgk = Bgk::new(0.8);
        assert_eq!(bgk.omega(&ParameterSet::new()), 0.8);
        let mut params = ParameterSet::new();
        params.set_scalar(ParameterId::OMEGA, 1.9);
        assert_eq!(bgk.omega(&params), 1.9);
    }

    proptest! {
        #[test]
        fn any_positive_state_keeps_its_moments(
            scale in prop::collection::vec(0.5f64..1.5, 9),
            omega in 0.1f64..1.95,
        ) {
            let mut f = [0.0; 9];
            for (i, fi) in f.iter_mut().enumerate() {
                *fi = D2Q9::W[i] * scale[i];
            }
            let (rho0, u0) = D2Q9::rho_u(&f);
            relax::<D2Q9>(&mut f, omega);
            let (rho1, u1) = D2Q9::rho_u(&f);
            prop_assert!((rho0 - rho1).abs() < 1e-12);
            prop_assert!((rho0 * u0[0] - rho1 * u1[0]).abs() < 1e-12);
            prop_assert!((rho0 * u0[1] - rho1 * u1[1]).abs() < 1e-12);
        }
    }
}
