//! Pass-through dynamics: populations stream unchanged.

use eddy_block::{Cell, CellStatistic, Dynamics};
use eddy_core::{Descriptor, ParameterSet};

/// Leaves populations untouched but still reports `(rho, u²)`, so a
/// lattice of pure streaming carries statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCollision;

impl<D: Descriptor> Dynamics<D> for NoCollision {
    fn name(&self) -> &str {
        "no_collision"
    }

    fn collide(&self, cell: &mut Cell<'_>, _params: &ParameterSet) -> Option<CellStatistic> {
        let (rho, u) = D::rho_u(cell.populations());
        Some(CellStatistic {
            rho,
            u_sqr: u[0] * u[0] + u[1] * u[1] + u[2] * u[2],
        })
    }
}
