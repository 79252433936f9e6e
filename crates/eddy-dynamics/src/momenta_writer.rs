//! Writes density and velocity into auxiliary fields for output.

use std::marker::PhantomData;

use eddy_block::{BlockAccess, PostProcessor};
use eddy_core::{Descriptor, FieldId, FieldSet};

/// Stores each site's `(rho, u)`, as its dynamics computes them, in the
/// `DENSITY` and `VELOCITY` fields.
#[derive(Debug, Default)]
pub struct MomentaWriter<D: Descriptor> {
    _descriptor: PhantomData<D>,
}

impl<D: Descriptor> MomentaWriter<D> {
    /// A new writer.
    pub fn new() -> Self {
        Self {
            _descriptor: PhantomData,
        }
    }
}

impl<D: Descriptor> PostProcessor<D> for MomentaWriter<D> {
    fn name(&self) -> &str {
        "momenta_writer"
    }

    // Runs after every other operator of its stage.
    fn priority(&self) -> i32 {
        i32::MAX
    }

    fn fields(&self) -> FieldSet {
        FieldSet::empty().with(FieldId::DENSITY).with(FieldId::VELOCITY)
    }

    fn apply(&self, block: &mut BlockAccess<'_, D>, cells: &[usize]) {
        let moments: Vec<(f64, [f64; 3])> = cells.iter().map(|&c| block.compute_rho_u(c)).collect();
        if let Ok(density) = block.field_mut(FieldId::DENSITY) {
            for (&c, (rho, _)) in cells.iter().zip(&moments) {
                density.set(c, &[*rho]);
            }
        }
        if let Ok(velocity) = block.field_mut(FieldId::VELOCITY) {
            for (&c, (_, u)) in cells.iter().zip(&moments) {
                velocity.set(c, &u[..D::D]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use eddy_block::{BlockLattice, Dynamics};
    use eddy_core::{Platform, Stage, D2Q9};

    use crate::NoCollision;

    #[test]
    fn fields_hold_moments_after_stage() {
        let mut block = BlockLattice::<D2Q9>::new([3, 2, 1], 1, Platform::CpuScalar).unwrap();
        let dynamics: Arc<dyn Dynamics<D2Q9>> = Arc::new(NoCollision);
        block.set_dynamics_where(&dynamics, |_| true).unwrap();
        block.define_rho_u(|p| p[0] == 2, 1.3, [0.0, 0.05, 0.0]);

        let writer: Arc<dyn PostProcessor<D2Q9>> = Arc::new(MomentaWriter::<D2Q9>::new());
        block.add_post_processor_everywhere(Stage::PostPostProcess, &writer).unwrap();
        block.post_process(Stage::PostPostProcess);

        let g = *block.geometry();
        let density = block.get_data(FieldId::DENSITY).unwrap();
        let velocity = block.get_data(FieldId::VELOCITY).unwrap();
        assert!((density.get(g.cell_index([2, 1, 0]))[0] - 1.3).abs() < 1e-12);
        assert!((density.get(g.cell_index([0, 1, 0]))[0] - 1.0).abs() < 1e-12);
        assert!((velocity.get(g.cell_index([2, 0, 0]))[1] - 0.05).abs() < 1e-12);
        assert_eq!(velocity.components(), 2);
    }
}
