//! Equilibrium boundary: overwrite boundary sites with an equilibrium.
//!
//! Two variants:
//!
//! - **fixed**: prescribed `(rho, u)`, e.g. a velocity inlet.
//! - **extrapolated**: `(rho, u)` copied from the interior neighbour
//!   opposite the outward normal, a zero-gradient outlet. The neighbour
//!   may sit in another block, so this variant asks for populations to
//!   be exchanged at its stage.

use std::marker::PhantomData;

use eddy_block::{BlockAccess, PostProcessor};
use eddy_core::{Descriptor, FieldSet, MAX_Q};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Source {
    Fixed { rho: f64, u: [f64; 3] },
    Extrapolated { normal: [i32; 3] },
}

/// Sets boundary populations to `f^eq(rho, u)`.
#[derive(Debug)]
pub struct EquilibriumBoundary<D: Descriptor> {
    source: Source,
    priority: i32,
    _descriptor: PhantomData<D>,
}

impl<D: Descriptor> EquilibriumBoundary<D> {
    /// Prescribed density and velocity.
    pub fn fixed(rho: f64, u: [f64; 3]) -> Self {
        Self::with_source(Source::Fixed { rho, u })
    }

    /// Density and velocity of the site at `-normal`.
    pub fn extrapolated(normal: [i32; 3]) -> Self {
        Self::with_source(Source::Extrapolated { normal })
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            priority: 0,
            _descriptor: PhantomData,
        }
    }

    /// Order among operators of the same stage.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<D: Descriptor> PostProcessor<D> for EquilibriumBoundary<D> {
    fn name(&self) -> &str {
        match self.source {
            Source::Fixed { .. } => "equilibrium_boundary",
            Source::Extrapolated { .. } => "extrapolated_boundary",
        }
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn communicates(&self) -> FieldSet {
        match self.source {
            Source::Fixed { .. } => FieldSet::empty(),
            Source::Extrapolated { .. } => FieldSet::populations(),
        }
    }

    fn apply(&self, block: &mut BlockAccess<'_, D>, cells: &[usize]) {
        let mut eq = [0.0; MAX_Q];
        for &cell in cells {
            let (rho, u) = match self.source {
                Source::Fixed { rho, u } => (rho, u),
                Source::Extrapolated { normal } => {
                    block.compute_rho_u(block.neighbour(cell, normal.map(|n| -n)))
                }
            };
            let u_sqr = u[0] * u[0] + u[1] * u[1] + u[2] * u[2];
            for (i, e) in eq.iter_mut().enumerate().take(D::Q) {
                *e = D::equilibrium(i, rho, u, u_sqr);
            }
            block.set_populations(cell, &eq[..D::Q]);
        }
    }
}
