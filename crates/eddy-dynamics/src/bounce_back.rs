//! Full-way bounce-back for solid sites.

use eddy_block::{Cell, CellRef, CellStatistic, Dynamics};
use eddy_core::{Descriptor, ParameterSet};

/// Reflects every population into its opposite direction. Solid sites
/// carry no velocity and do not count towards statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct BounceBack;

impl<D: Descriptor> Dynamics<D> for BounceBack {
    fn name(&self) -> &str {
        "bounce_back"
    }

    fn collide(&self, cell: &mut Cell<'_>, _params: &ParameterSet) -> Option<CellStatistic> {
        let f = cell.populations_mut();
        for (i, &o) in D::OPPOSITE.iter().enumerate() {
            if i < o {
                f.swap(i, o);
            }
        }
        None
    }

    fn compute_rho_u(&self, cell: &CellRef<'_>) -> (f64, [f64; 3]) {
        (cell.populations().iter().sum(), [0.0; 3])
    }
}
