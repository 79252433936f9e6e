//! BGK collision with a per-site body force (Guo forcing).
//!
//! The force density is read from the `FORCE` field, which an operator
//! such as [`ForceCoupling`](crate::ForceCoupling) or an initial
//! condition writes. The macroscopic velocity is shifted by half the
//! force, and a second-order source term is added so that mass is
//! conserved exactly and momentum grows by `F` per step.

use eddy_block::{Cell, CellRef, CellStatistic, Dynamics};
use eddy_core::{Descriptor, FieldId, FieldSet, ParameterId, ParameterSet};

/// Forced BGK collision with relaxation frequency `OMEGA`.
#[derive(Clone, Copy, Debug)]
pub struct ForcedBgk {
    default_omega: f64,
}

impl ForcedBgk {
    /// Forced BGK relaxing at `omega` until the parameter is set.
    pub fn new(omega: f64) -> Self {
        Self { default_omega: omega }
    }
}

impl Default for ForcedBgk {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Velocity including the half-force shift.
fn shifted_velocity(rho: f64, u: [f64; 3], force: [f64; 3]) -> [f64; 3] {
    if rho.abs() < f64::EPSILON {
        return u;
    }
    [
        u[0] + 0.5 * force[0] / rho,
        u[1] + 0.5 * force[1] / rho,
        u[2] + 0.5 * force[2] / rho,
    ]
}

impl<D: Descriptor> Dynamics<D> for ForcedBgk {
    fn name(&self) -> &str {
        "forced_bgk"
    }

    fn parameters(&self) -> &[ParameterId] {
        &[ParameterId::OMEGA]
    }

    fn fields(&self) -> FieldSet {
        FieldSet::empty().with(FieldId::FORCE)
    }

    fn collide(&self, cell: &mut Cell<'_>, params: &ParameterSet) -> Option<CellStatistic> {
        let omega = params.scalar(ParameterId::OMEGA).unwrap_or(self.default_omega);
        let force = cell.field(FieldId::FORCE).unwrap_or([0.0; 3]);
        let (rho, u) = D::rho_u(cell.populations());
        let u = shifted_velocity(rho, u, force);
        let u_sqr = u[0] * u[0] + u[1] * u[1] + u[2] * u[2];
        let k = D::INV_CS2;
        let prefactor = 1.0 - 0.5 * omega;
        for (i, fi) in cell.populations_mut().iter_mut().enumerate() {
            let c = D::C[i].map(f64::from);
            let cu = c[0] * u[0] + c[1] * u[1] + c[2] * u[2];
            let cf = c[0] * force[0] + c[1] * force[1] + c[2] * force[2];
            let uf = u[0] * force[0] + u[1] * force[1] + u[2] * force[2];
            let source = prefactor * D::W[i] * (k * (cf - uf) + k * k * cu * cf);
            *fi += omega * (D::equilibrium(i, rho, u, u_sqr) - *fi) + source;
        }
        Some(CellStatistic { rho, u_sqr })
    }

    fn compute_rho_u(&self, cell: &CellRef<'_>) -> (f64, [f64; 3]) {
        let force = cell.field(FieldId::FORCE).unwrap_or([0.0; 3]);
        let (rho, u) = D::rho_u(cell.populations());
        (rho, shifted_velocity(rho, u, force))
    }
}
