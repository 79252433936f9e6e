//! Boussinesq-style coupling from a scalar field to the body force.
//!
//! ```text
//! FORCE = strength * (SCALAR - reference) * direction
//! ```
//!
//! Runs at the coupling stage so that [`ForcedBgk`](crate::ForcedBgk)
//! sees the updated force in the next collision.

use std::marker::PhantomData;

use eddy_block::{BlockAccess, PostProcessor};
use eddy_core::{Descriptor, FieldId, FieldSet};

/// Derives the body force of each site from its scalar value.
#[derive(Debug)]
pub struct ForceCoupling<D: Descriptor> {
    direction: [f64; 3],
    strength: f64,
    reference: f64,
    _descriptor: PhantomData<D>,
}

impl<D: Descriptor> ForceCoupling<D> {
    /// Force along `direction` proportional to `SCALAR - reference`.
    pub fn new(direction: [f64; 3], strength: f64, reference: f64) -> Self {
        Self {
            direction,
            strength,
            reference,
            _descriptor: PhantomData,
        }
    }
}

impl<D: Descriptor> PostProcessor<D> for ForceCoupling<D> {
    fn name(&self) -> &str {
        "force_coupling"
    }

    fn fields(&self) -> FieldSet {
        FieldSet::empty().with(FieldId::FORCE).with(FieldId::SCALAR)
    }

    fn apply(&self, block: &mut BlockAccess<'_, D>, cells: &[usize]) {
        let Ok(scalar) = block.field(FieldId::SCALAR) else {
            return;
        };
        let magnitudes: Vec<f64> = cells
            .iter()
            .map(|&c| self.strength * (scalar.get(c)[0] - self.reference))
            .collect();
        let Ok(force) = block.field_mut(FieldId::FORCE) else {
            return;
        };
        for (&c, m) in cells.iter().zip(magnitudes) {
            let f = self.direction.map(|d| d * m);
            force.set(c, &f[..D::D]);
        }
    }
}
