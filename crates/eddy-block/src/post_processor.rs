//! Staged non-local operators and their per-block schedule.

use std::sync::Arc;

use eddy_core::{Descriptor, FieldId, FieldSet, LatticeCoord, Stage, MAX_Q};
use indexmap::IndexMap;

use crate::cell::CellRef;
use crate::dynamics::DynamicsMap;
use crate::error::BlockError;
use crate::geometry::BlockGeometry;
use crate::store::{FieldArray, FieldStore};

/// An operator applied to a set of sites at a named [`Stage`].
///
/// Unlike [`Dynamics`](crate::Dynamics), a post-processor may read
/// neighbouring sites, halo included. Fields it needs from neighbouring
/// blocks are declared through [`PostProcessor::communicates`], which
/// configures that stage's communicator.
pub trait PostProcessor<D: Descriptor>: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Ascending order within a stage. Equal priorities keep
    /// registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Fields that must be exchanged at this operator's stage.
    fn communicates(&self) -> FieldSet {
        FieldSet::empty()
    }

    /// Auxiliary fields the block must allocate.
    fn fields(&self) -> FieldSet {
        FieldSet::empty()
    }

    /// Apply to the given sites (flat indices).
    fn apply(&self, block: &mut BlockAccess<'_, D>, cells: &[usize]);
}

/// Read/write access to a block's execution store during post-processing.
pub struct BlockAccess<'a, D: Descriptor> {
    store: &'a mut FieldStore,
    geometry: &'a BlockGeometry,
    dynamics: &'a DynamicsMap<D>,
}

impl<'a, D: Descriptor> BlockAccess<'a, D> {
    pub(crate) fn new(store: &'a mut FieldStore, geometry: &'a BlockGeometry, dynamics: &'a DynamicsMap<D>) -> Self {
        Self {
            store,
            geometry,
            dynamics,
        }
    }

    /// Block shape.
    pub fn geometry(&self) -> &BlockGeometry {
        self.geometry
    }

    /// Local coordinate of a flat index.
    pub fn coord(&self, index: usize) -> LatticeCoord {
        self.geometry.coord(index)
    }

    /// Flat index of the neighbour at offset `c`.
    #[inline]
    pub fn neighbour(&self, index: usize, c: [i32; 3]) -> usize {
        (index as isize + self.geometry.flat_offset(c)) as usize
    }

    /// Population `i` at a site.
    #[inline]
    pub fn population(&self, index: usize, i: usize) -> f64 {
        self.store.population(index, i)
    }

    /// Set population `i` at a site.
    #[inline]
    pub fn set_population(&mut self, index: usize, i: usize, value: f64) {
        self.store.set_population(index, i, value);
    }

    /// All populations of a site (first `Q` entries valid).
    #[inline]
    pub fn populations(&self, index: usize) -> [f64; MAX_Q] {
        let mut out = [0.0; MAX_Q];
        self.store.gather(index, &mut out);
        out
    }

    /// Overwrite all populations of a site.
    #[inline]
    pub fn set_populations(&mut self, index: usize, values: &[f64]) {
        self.store.scatter(index, values);
    }

    /// Density and velocity of a site from its populations.
    pub fn rho_u(&self, index: usize) -> (f64, [f64; 3]) {
        let f = self.populations(index);
        D::rho_u(&f[..D::Q])
    }

    /// Density and velocity of a site as its dynamics defines them.
    pub fn compute_rho_u(&self, index: usize) -> (f64, [f64; 3]) {
        let f = self.populations(index);
        let cell = CellRef::new(&f[..D::Q], &self.store.aux, index);
        self.dynamics.slot_at(index).dynamics.compute_rho_u(&cell)
    }

    /// Auxiliary field by id.
    pub fn field(&self, id: FieldId) -> Result<&FieldArray, BlockError> {
        self.store.field(id)
    }

    /// Mutable auxiliary field by id.
    pub fn field_mut(&mut self, id: FieldId) -> Result<&mut FieldArray, BlockError> {
        self.store.field_mut(id)
    }

    /// Name of the dynamics at a site.
    pub fn dynamics_name(&self, index: usize) -> &str {
        self.dynamics.slot_at(index).dynamics.name()
    }
}

/// A post-processor bound to the sites it runs on.
pub(crate) struct Scheduled<D: Descriptor> {
    pub(crate) op: Arc<dyn PostProcessor<D>>,
    pub(crate) cells: Vec<usize>,
}

/// Post-processors of one block, by stage, in ascending priority.
pub(crate) struct Schedule<D: Descriptor> {
    stages: IndexMap<Stage, Vec<Scheduled<D>>>,
}

impl<D: Descriptor> Default for Schedule<D> {
    fn default() -> Self {
        Self {
            stages: IndexMap::new(),
        }
    }
}

impl<D: Descriptor> Schedule<D> {
    /// Add `op` on `cells`. Re-adding the same instance at the same
    /// stage extends its site list.
    pub(crate) fn add(&mut self, stage: Stage, op: &Arc<dyn PostProcessor<D>>, cells: Vec<usize>) {
        let ops = self.stages.entry(stage).or_default();
        if let Some(existing) = ops.iter_mut().find(|s| Arc::ptr_eq(&s.op, op)) {
            existing.cells.extend(cells);
            existing.cells.sort_unstable();
            existing.cells.dedup();
            return;
        }
        let prio = op.priority();
        let at = ops.partition_point(|s| s.op.priority() <= prio);
        ops.insert(
            at,
            Scheduled {
                op: Arc::clone(op),
                cells,
            },
        );
    }

    pub(crate) fn get(&self, stage: Stage) -> &[Scheduled<D>] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of fields communicated by operators at `stage`.
    pub(crate) fn communicated(&self, stage: Stage) -> FieldSet {
        self.get(stage)
            .iter()
            .fold(FieldSet::empty(), |acc, s| acc.union(&s.op.communicates()))
    }

    pub(crate) fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.keys().copied()
    }
}
