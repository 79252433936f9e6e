//! The [`Dynamics`] contract and the per-block assignment map.
//!
//! Every site references exactly one shared dynamics instance. At setup
//! the block groups core sites into contiguous runs per instance, so the
//! collision loop dispatches once per run instead of once per site.

use std::fmt;
use std::sync::Arc;

use eddy_core::{Descriptor, FieldSet, ParameterId, ParameterSet};

use crate::cell::{Batch, Cell, CellRef};
use crate::geometry::BlockGeometry;
use crate::statistics::CellStatistic;

/// A local collision rule.
///
/// # Contract
///
/// - `collide()` must give the same result on every platform; the
///   batched path, when provided, must match the per-cell path.
/// - `&self`: instances are shared between sites and blocks; per-site
///   state lives in auxiliary fields.
/// - `parameters()` and `fields()` are read at assignment time, never
///   inside the collision loop.
pub trait Dynamics<D: Descriptor>: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Parameters this dynamics accepts. Broadcast values for other ids
    /// never reach it.
    fn parameters(&self) -> &[ParameterId] {
        &[]
    }

    /// Auxiliary fields the block must allocate for this dynamics.
    fn fields(&self) -> FieldSet {
        FieldSet::empty()
    }

    /// Collide one site in place. Returns the site's `(rho, u²)` if it
    /// should count towards lattice statistics.
    fn collide(&self, cell: &mut Cell<'_>, params: &ParameterSet) -> Option<CellStatistic>;

    /// Vectorisable fast path over a contiguous run. Returns `false` if
    /// not implemented, in which case the block falls back to
    /// [`Dynamics::collide`] per site.
    fn collide_batch(&self, batch: &mut Batch<'_>, params: &ParameterSet) -> bool {
        let _ = (batch, params);
        false
    }

    /// Prepare a site that has just been assigned this dynamics, and
    /// again when the lattice is initialised.
    fn initialize(&self, cell: &mut Cell<'_>) {
        let _ = cell;
    }

    /// Macroscopic density and velocity of a site.
    fn compute_rho_u(&self, cell: &CellRef<'_>) -> (f64, [f64; 3]) {
        D::rho_u(cell.populations())
    }
}

/// Dynamics of unassigned sites: never collides, reports unit density.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDynamics;

impl<D: Descriptor> Dynamics<D> for NoDynamics {
    fn name(&self) -> &str {
        "no_dynamics"
    }

    fn collide(&self, _cell: &mut Cell<'_>, _params: &ParameterSet) -> Option<CellStatistic> {
        None
    }

    fn collide_batch(&self, _batch: &mut Batch<'_>, _params: &ParameterSet) -> bool {
        true
    }

    fn compute_rho_u(&self, _cell: &CellRef<'_>) -> (f64, [f64; 3]) {
        (1.0, [0.0; 3])
    }
}

/// A dynamics instance together with its parameter values in one block.
pub struct DynamicsSlot<D: Descriptor> {
    /// The shared instance.
    pub dynamics: Arc<dyn Dynamics<D>>,
    /// Values of the parameters it declared.
    pub params: ParameterSet,
}

impl<D: Descriptor> fmt::Debug for DynamicsSlot<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicsSlot")
            .field("dynamics", &self.dynamics.name())
            .field("params", &self.params)
            .finish()
    }
}

/// Consecutive core sites sharing one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    /// Index into the slot table.
    pub slot: usize,
    /// First flat index.
    pub start: usize,
    /// Number of sites.
    pub len: usize,
}

/// Per-site dynamics assignment of one block.
pub struct DynamicsMap<D: Descriptor> {
    slots: Vec<DynamicsSlot<D>>,
    cell_slot: Vec<u32>,
    runs: Vec<Run>,
    broadcast: ParameterSet,
}

impl<D: Descriptor> DynamicsMap<D> {
    /// Every site assigned [`NoDynamics`].
    pub fn new(geometry: &BlockGeometry) -> Self {
        let none: Arc<dyn Dynamics<D>> = Arc::new(NoDynamics);
        let mut map = Self {
            slots: vec![DynamicsSlot {
                dynamics: none,
                params: ParameterSet::new(),
            }],
            cell_slot: vec![0; geometry.cell_count()],
            runs: Vec::new(),
            broadcast: ParameterSet::new(),
        };
        map.rebuild_runs(geometry);
        map
    }

    /// Slot of an instance, adding it if unseen. Instances are compared
    /// by pointer.
    pub(crate) fn slot_of(&mut self, dynamics: &Arc<dyn Dynamics<D>>) -> usize {
        if let Some(i) = self.slots.iter().position(|s| Arc::ptr_eq(&s.dynamics, dynamics)) {
            return i;
        }
        let mut params = ParameterSet::new();
        for id in dynamics.parameters() {
            if let Some(v) = self.broadcast.vector(*id) {
                params.set(*id, v);
            }
        }
        self.slots.push(DynamicsSlot {
            dynamics: Arc::clone(dynamics),
            params,
        });
        self.slots.len() - 1
    }

    pub(crate) fn assign(&mut self, index: usize, slot: usize) {
        self.cell_slot[index] = slot as u32;
    }

    /// Regroup core sites into runs. Called after every assignment batch.
    pub(crate) fn rebuild_runs(&mut self, geometry: &BlockGeometry) {
        self.runs.clear();
        for (row_start, row_len) in geometry.core_rows() {
            let mut start = row_start;
            for i in row_start + 1..=row_start + row_len {
                let at_end = i == row_start + row_len;
                if at_end || self.cell_slot[i] != self.cell_slot[start] {
                    self.runs.push(Run {
                        slot: self.cell_slot[start] as usize,
                        start,
                        len: i - start,
                    });
                    start = i;
                }
            }
        }
    }

    /// Broadcast a parameter to every instance declaring it. Instances
    /// assigned later pick the value up too.
    pub fn set_parameter(&mut self, id: ParameterId, value: [f64; 3]) -> usize {
        self.broadcast.set(id, value);
        let mut hit = 0;
        for slot in &mut self.slots {
            if slot.dynamics.parameters().contains(&id) {
                slot.params.set(id, value);
                hit += 1;
            }
        }
        hit
    }

    /// Slot of the site at a flat index.
    #[inline]
    pub fn slot_at(&self, index: usize) -> &DynamicsSlot<D> {
        &self.slots[self.cell_slot[index] as usize]
    }

    /// All slots.
    pub fn slots(&self) -> &[DynamicsSlot<D>] {
        &self.slots
    }

    /// Current runs over core sites.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }
}

impl<D: Descriptor> fmt::Debug for DynamicsMap<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicsMap")
            .field("slots", &self.slots)
            .field("runs", &self.runs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::D2Q9;

    struct Relax;

    impl Dynamics<D2Q9> for Relax {
        fn name(&self) -> &str {
            "relax"
        }

        fn parameters(&self) -> &[ParameterId] {
            &[ParameterId::OMEGA]
        }

        fn collide(&self, _cell: &mut Cell<'_>, _params: &ParameterSet) -> Option<CellStatistic> {
            None
        }
    }

    #[test]
    fn fresh_map_is_one_run_per_row() {
        let g = BlockGeometry::new([5, 3, 1], 1, 2).unwrap();
        let map = DynamicsMap::<D2Q9>::new(&g);
        assert_eq!(map.runs().len(), 3);
        assert!(map.runs().iter().all(|r| r.len == 5 && r.slot == 0));
    }

    #[test]
    fn instances_are_deduplicated_by_pointer() {
        let g = BlockGeometry::new([4, 4, 1], 1, 2).unwrap();
        let mut map = DynamicsMap::<D2Q9>::new(&g);
        let a: Arc<dyn Dynamics<D2Q9>> = Arc::new(Relax);
        let b: Arc<dyn Dynamics<D2Q9>> = Arc::new(Relax);
        assert_eq!(map.slot_of(&a), 1);
        assert_eq!(map.slot_of(&Arc::clone(&a)), 1);
        assert_eq!(map.slot_of(&b), 2);
    }

    #[test]
    fn runs_split_where_assignment_changes() {
        let g = BlockGeometry::new([4, 1, 1], 1, 2).unwrap();
        let mut map = DynamicsMap::<D2Q9>::new(&g);
        let a: Arc<dyn Dynamics<D2Q9>> = Arc::new(Relax);
        let s = map.slot_of(&a);
        map.assign(g.cell_index([1, 0, 0]), s);
        map.assign(g.cell_index([2, 0, 0]), s);
        map.rebuild_runs(&g);
        let runs: Vec<(usize, usize)> = map.runs().iter().map(|r| (r.slot, r.len)).collect();
        assert_eq!(runs, vec![(0, 1), (1, 2), (0, 1)]);
    }

    #[test]
    fn parameters_reach_only_declaring_instances() {
        let g = BlockGeometry::new([2, 2, 1], 1, 2).unwrap();
        let mut map = DynamicsMap::<D2Q9>::new(&g);
        let early: Arc<dyn Dynamics<D2Q9>> = Arc::new(Relax);
        map.slot_of(&early);
        assert_eq!(map.set_parameter(ParameterId::OMEGA, [1.5, 0.0, 0.0]), 1);
        let late: Arc<dyn Dynamics<D2Q9>> = Arc::new(Relax);
        let s = map.slot_of(&late);
        assert_eq!(map.slots()[s].params.scalar(ParameterId::OMEGA), Some(1.5));
        assert!(!map.slots()[0].params.contains(ParameterId::OMEGA));
    }
}
