//! [`BlockLattice`]: storage and kernels of one cuboid on one platform.
//!
//! A block owns the populations and auxiliary fields of its cuboid plus
//! `overlap` halo layers, the per-site dynamics assignment, and the
//! post-processor schedule. Its platform is fixed at construction; the
//! public contract is identical on every platform.
//!
//! # Step kernels
//!
//! - [`BlockLattice::collide`] runs the collision of every core site in
//!   place, one dispatch per run of sites sharing a dynamics instance.
//! - [`BlockLattice::stream`] shifts every population column by its
//!   lattice vector over the whole padded block.
//! - [`BlockLattice::post_process`] runs one stage's operators.
//!
//! Halo contents are owned by the engine's communicators; a block never
//! fills its own halo.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use eddy_core::{
    Descriptor, FieldId, FieldSet, LatticeCoord, ParameterId, Platform, ProcessingContext, Stage, MAX_Q,
};
use eddy_geometry::LatticeBox;
use tracing::{debug, trace};

use crate::cell::{Batch, Cell, CellRef};
use crate::dynamics::{Dynamics, DynamicsMap};
use crate::error::BlockError;
use crate::geometry::BlockGeometry;
use crate::memory::Memory;
use crate::post_processor::{BlockAccess, PostProcessor, Schedule};
use crate::statistics::BlockStatistics;
use crate::store::{FieldArray, FieldStore};

/// Populations, fields, dynamics and post-processors of one cuboid.
pub struct BlockLattice<D: Descriptor> {
    geometry: BlockGeometry,
    platform: Platform,
    memory: Memory,
    dynamics: DynamicsMap<D>,
    schedule: Schedule<D>,
    stats: BlockStatistics,
    last_stats: BlockStatistics,
    stats_enabled: bool,
    context: ProcessingContext,
}

/// Gather a site, hand it to `f` as a [`Cell`], scatter it back.
fn with_cell<R>(store: &mut FieldStore, index: usize, f: impl FnOnce(&mut Cell<'_>) -> R) -> R {
    let q = store.q();
    let mut scratch = [0.0; MAX_Q];
    store.gather(index, &mut scratch);
    let out = {
        let mut cell = Cell::new(&mut scratch[..q], &mut store.aux, index);
        f(&mut cell)
    };
    store.scatter(index, &scratch[..q]);
    out
}

impl<D: Descriptor> BlockLattice<D> {
    /// Allocate a block of `extent` core sites with `overlap` halo
    /// layers, every site at rest equilibrium (`rho = 1`, `u = 0`) and
    /// assigned [`NoDynamics`](crate::NoDynamics).
    pub fn new(extent: [i32; 3], overlap: i32, platform: Platform) -> Result<Self, BlockError> {
        let geometry = BlockGeometry::new(extent, overlap, D::D)?;
        let store = FieldStore::new(D::Q, geometry.cell_count(), D::W);
        debug!(
            descriptor = D::NAME,
            ?extent,
            overlap,
            %platform,
            cells = geometry.cell_count(),
            "block allocated"
        );
        Ok(Self {
            dynamics: DynamicsMap::new(&geometry),
            geometry,
            platform,
            memory: Memory::new(platform, store),
            schedule: Schedule::default(),
            stats: BlockStatistics::default(),
            last_stats: BlockStatistics::default(),
            stats_enabled: true,
            context: ProcessingContext::Simulation,
        })
    }

    /// Block shape.
    pub fn geometry(&self) -> &BlockGeometry {
        &self.geometry
    }

    /// Execution platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Dynamics assignment.
    pub fn dynamics(&self) -> &DynamicsMap<D> {
        &self.dynamics
    }

    // ── Setup ───────────────────────────────────────────────────────

    /// Allocate an auxiliary field declared by the descriptor. Populations
    /// are always allocated; re-allocating is a no-op.
    pub fn allocate(&mut self, field: FieldId) -> Result<(), BlockError> {
        if field == FieldId::POPULATION {
            return Ok(());
        }
        let def = D::field_def(field).ok_or(BlockError::FieldNotDeclared {
            field,
            descriptor: D::NAME,
        })?;
        self.memory.allocate(field, def.components);
        Ok(())
    }

    /// Allocate every field in `fields`.
    pub fn allocate_all(&mut self, fields: &FieldSet) -> Result<(), BlockError> {
        fields.iter().try_for_each(|f| self.allocate(f))
    }

    /// Whether `field` is available on this block.
    pub fn has_field(&self, field: FieldId) -> bool {
        field == FieldId::POPULATION || self.memory.host().has_field(field)
    }

    /// Assign `dynamics` to every site of the padded block for which
    /// `select` holds and run its [`Dynamics::initialize`] hook there.
    /// Returns the number of core sites assigned.
    ///
    /// Halo sites never collide; their assignment only decides how
    /// operators read them (see [`BlockAccess::compute_rho_u`]).
    pub fn set_dynamics_where(
        &mut self,
        dynamics: &Arc<dyn Dynamics<D>>,
        select: impl Fn(LatticeCoord) -> bool,
    ) -> Result<usize, BlockError> {
        self.allocate_all(&dynamics.fields())?;
        let slot = self.dynamics.slot_of(dynamics);
        let store = self.memory.host_mut(self.context);
        let core = self.geometry.core_box();
        let mut assigned = 0;
        for p in self.geometry.padded_box().iter().filter(|&p| select(p)) {
            let index = self.geometry.cell_index(p);
            self.dynamics.assign(index, slot);
            with_cell(store, index, |cell| dynamics.initialize(cell));
            if core.contains(p) {
                assigned += 1;
            }
        }
        self.dynamics.rebuild_runs(&self.geometry);
        trace!(dynamics = dynamics.name(), assigned, runs = self.dynamics.runs().len(), "dynamics assigned");
        Ok(assigned)
    }

    /// Assign `dynamics` over a region in local coordinates, halo
    /// included.
    pub fn set_dynamics(&mut self, region: &LatticeBox, dynamics: &Arc<dyn Dynamics<D>>) -> Result<usize, BlockError> {
        self.set_dynamics_where(dynamics, |p| region.contains(p))
    }

    /// Broadcast a parameter to every dynamics instance declaring it.
    /// Returns how many instances accepted it; zero is not an error.
    pub fn set_parameter(&mut self, id: ParameterId, value: [f64; 3]) -> usize {
        self.dynamics.set_parameter(id, value)
    }

    /// Scalar form of [`BlockLattice::set_parameter`].
    pub fn set_parameter_scalar(&mut self, id: ParameterId, value: f64) -> usize {
        self.set_parameter(id, [value, 0.0, 0.0])
    }

    /// Schedule `op` at `stage` on every core site for which `select`
    /// holds. Returns the number of sites selected; an operator selecting
    /// nothing is not scheduled.
    pub fn add_post_processor(
        &mut self,
        stage: Stage,
        op: &Arc<dyn PostProcessor<D>>,
        select: impl Fn(LatticeCoord) -> bool,
    ) -> Result<usize, BlockError> {
        let cells: Vec<usize> = self
            .geometry
            .core_box()
            .iter()
            .filter(|&p| select(p))
            .map(|p| self.geometry.cell_index(p))
            .collect();
        if cells.is_empty() {
            return Ok(0);
        }
        self.allocate_all(&op.fields())?;
        let n = cells.len();
        self.schedule.add(stage, op, cells);
        trace!(%stage, op = op.name(), sites = n, "post-processor scheduled");
        Ok(n)
    }

    /// Schedule `op` on every core site.
    pub fn add_post_processor_everywhere(
        &mut self,
        stage: Stage,
        op: &Arc<dyn PostProcessor<D>>,
    ) -> Result<usize, BlockError> {
        self.add_post_processor(stage, op, |_| true)
    }

    /// Schedule `op` at one core site.
    pub fn add_post_processor_at(
        &mut self,
        stage: Stage,
        local: LatticeCoord,
        op: &Arc<dyn PostProcessor<D>>,
    ) -> Result<usize, BlockError> {
        if !self.geometry.core_box().contains(local) {
            return Err(BlockError::OutOfBounds(local));
        }
        self.add_post_processor(stage, op, |p| p == local)
    }

    /// Fields the operators scheduled at `stage` need communicated.
    pub fn communicated_fields(&self, stage: Stage) -> FieldSet {
        self.schedule.communicated(stage)
    }

    /// Stages with at least one scheduled operator.
    pub fn scheduled_stages(&self) -> Vec<Stage> {
        self.schedule.stages().collect()
    }

    // ── Step kernels ────────────────────────────────────────────────

    /// Collide every core site in place. Halo sites are never touched.
    pub fn collide(&mut self) {
        let q = D::Q;
        let store = self.memory.exec_mut();
        let mut stats = self.stats_enabled.then_some(&mut self.stats);
        for run in self.dynamics.runs() {
            // Slot 0 is `NoDynamics`.
            if run.slot == 0 {
                continue;
            }
            let slot = &self.dynamics.slots()[run.slot];
            let batched = match self.platform {
                Platform::CpuScalar => false,
                Platform::CpuSimd | Platform::Gpu => {
                    let mut batch = Batch::new(
                        &mut store.pops,
                        &store.aux,
                        q,
                        run.start,
                        run.len,
                        stats.as_deref_mut(),
                    );
                    slot.dynamics.collide_batch(&mut batch, &slot.params)
                }
            };
            if batched {
                continue;
            }
            let mut scratch = [0.0; MAX_Q];
            for index in run.start..run.start + run.len {
                store.gather(index, &mut scratch);
                let stat = {
                    let mut cell = Cell::new(&mut scratch[..q], &mut store.aux, index);
                    slot.dynamics.collide(&mut cell, &slot.params)
                };
                store.scatter(index, &scratch[..q]);
                if let (Some(s), Some(c)) = (stats.as_deref_mut(), stat) {
                    s.increment(c.rho, c.u_sqr);
                }
            }
        }
    }

    /// Stream every population along its lattice vector over the padded
    /// block. Afterwards `f_i(x + c_i)` holds the old `f_i(x)` for every
    /// site whose source lies in the block; wrapped sites at the padded
    /// boundary are halo and are overwritten by the next exchange.
    pub fn stream(&mut self) {
        let n = self.geometry.cell_count();
        let store = self.memory.exec_mut();
        for (i, c) in D::C.iter().enumerate() {
            let column = &mut store.pops[i * n..(i + 1) * n];
            let shift = self.geometry.flat_offset(*c);
            match shift.cmp(&0) {
                Ordering::Greater => column.rotate_right(shift.unsigned_abs()),
                Ordering::Less => column.rotate_left(shift.unsigned_abs()),
                Ordering::Equal => {}
            }
        }
    }

    /// Run the operators scheduled at `stage` in ascending priority.
    pub fn post_process(&mut self, stage: Stage) {
        let scheduled = self.schedule.get(stage);
        if scheduled.is_empty() {
            return;
        }
        let store = self.memory.exec_mut();
        let mut access = BlockAccess::new(store, &self.geometry, &self.dynamics);
        for s in scheduled {
            s.op.apply(&mut access, &s.cells);
        }
    }

    /// Re-run every core site's [`Dynamics::initialize`] hook. Initial
    /// conditions already defined are left to the hook.
    pub fn initialize(&mut self) {
        let store = self.memory.host_mut(self.context);
        for run in self.dynamics.runs() {
            let dynamics = &self.dynamics.slots()[run.slot].dynamics;
            for index in run.start..run.start + run.len {
                with_cell(store, index, |cell| dynamics.initialize(cell));
            }
        }
    }

    // ── Statistics ──────────────────────────────────────────────────

    /// Statistics of the last completed step.
    pub fn statistics(&self) -> &BlockStatistics {
        &self.last_stats
    }

    /// Accumulator of the step in progress.
    pub fn current_statistics(&self) -> &BlockStatistics {
        &self.stats
    }

    /// Freeze the running accumulator as the last completed step and
    /// clear it.
    pub fn reset_statistics(&mut self) {
        self.last_stats = self.stats;
        self.stats.reset();
    }

    /// Enable or disable statistics accumulation during collision.
    pub fn set_statistics_enabled(&mut self, enabled: bool) {
        self.stats_enabled = enabled;
    }

    /// Whether collision folds site statistics.
    pub fn statistics_enabled(&self) -> bool {
        self.stats_enabled
    }

    // ── Processing context ──────────────────────────────────────────

    /// Switch between evaluation and simulation. On the GPU platform
    /// entering evaluation downloads the device store into the host
    /// mirror, and leaving it uploads host writes made meanwhile.
    pub fn set_processing_context(&mut self, context: ProcessingContext) {
        if context == self.context {
            return;
        }
        self.memory.transition(self.context, context);
        self.context = context;
    }

    /// Current processing context.
    pub fn processing_context(&self) -> ProcessingContext {
        self.context
    }

    /// Bytes moved between host and device so far (zero on host platforms).
    pub fn bytes_transferred(&self) -> u64 {
        self.memory.device().map_or(0, |d| d.bytes_transferred())
    }

    // ── Host access ─────────────────────────────────────────────────

    /// Auxiliary field array as host readers see it.
    ///
    /// On the GPU platform this is the host mirror, current only after
    /// the block entered [`ProcessingContext::Evaluation`]. Populations
    /// are read through [`BlockLattice::population_column`].
    pub fn get_data(&self, field: FieldId) -> Result<&FieldArray, BlockError> {
        self.memory.host().field(field)
    }

    /// Mutable auxiliary field array for host writers.
    pub fn get_data_mut(&mut self, field: FieldId) -> Result<&mut FieldArray, BlockError> {
        self.memory.host_mut(self.context).field_mut(field)
    }

    /// Population `i` over every padded site, as host readers see it.
    pub fn population_column(&self, i: usize) -> &[f64] {
        self.memory.host().column(i)
    }

    /// Population `i` at a local coordinate.
    pub fn population(&self, local: LatticeCoord, i: usize) -> f64 {
        self.memory.host().population(self.geometry.cell_index(local), i)
    }

    /// All populations at a local coordinate; the first `Q` are valid.
    pub fn cell_populations(&self, local: LatticeCoord) -> [f64; MAX_Q] {
        let mut out = [0.0; MAX_Q];
        self.memory.host().gather(self.geometry.cell_index(local), &mut out);
        out
    }

    /// Density and velocity at a local coordinate, as the site's
    /// dynamics defines them.
    pub fn compute_rho_u(&self, local: LatticeCoord) -> (f64, [f64; 3]) {
        let index = self.geometry.cell_index(local);
        let store = self.memory.host();
        let mut scratch = [0.0; MAX_Q];
        store.gather(index, &mut scratch);
        let cell = CellRef::new(&scratch[..D::Q], &store.aux, index);
        self.dynamics.slot_at(index).dynamics.compute_rho_u(&cell)
    }

    /// Name of the dynamics at a local coordinate.
    pub fn dynamics_name(&self, local: LatticeCoord) -> &str {
        self.dynamics.slot_at(self.geometry.cell_index(local)).dynamics.name()
    }

    /// Visit every core site with a read-only view.
    pub fn for_each_core_cell(&self, mut f: impl FnMut(LatticeCoord, CellRef<'_>)) {
        let store = self.memory.host();
        let mut scratch = [0.0; MAX_Q];
        for p in self.geometry.core_box().iter() {
            let index = self.geometry.cell_index(p);
            store.gather(index, &mut scratch);
            f(p, CellRef::new(&scratch[..D::Q], &store.aux, index));
        }
    }

    // ── Initial conditions ──────────────────────────────────────────

    /// Set the populations of selected core sites to the equilibrium of
    /// `(rho, u)`. Returns the number of sites written.
    pub fn define_rho_u(&mut self, select: impl Fn(LatticeCoord) -> bool, rho: f64, u: [f64; 3]) -> usize {
        let u_sqr = u[0] * u[0] + u[1] * u[1] + u[2] * u[2];
        let mut eq = [0.0; MAX_Q];
        for (i, e) in eq.iter_mut().enumerate().take(D::Q) {
            *e = D::equilibrium(i, rho, u, u_sqr);
        }
        let store = self.memory.host_mut(self.context);
        let mut written = 0;
        for p in self.geometry.core_box().iter().filter(|&p| select(p)) {
            store.scatter(self.geometry.cell_index(p), &eq[..D::Q]);
            written += 1;
        }
        written
    }

    /// Set an auxiliary field on selected core sites, allocating it if
    /// needed. `value` must have the field's component count.
    pub fn define_field(
        &mut self,
        select: impl Fn(LatticeCoord) -> bool,
        field: FieldId,
        value: &[f64],
    ) -> Result<usize, BlockError> {
        let def = D::field_def(field).ok_or(BlockError::FieldNotDeclared {
            field,
            descriptor: D::NAME,
        })?;
        if value.len() != def.components {
            return Err(BlockError::ComponentMismatch {
                field,
                expected: def.components,
                got: value.len(),
            });
        }
        self.allocate(field)?;
        let array = self.memory.host_mut(self.context).field_mut(field)?;
        let mut written = 0;
        for p in self.geometry.core_box().iter().filter(|&p| select(p)) {
            array.set(self.geometry.cell_index(p), value);
            written += 1;
        }
        Ok(written)
    }

    /// Overwrite the populations of every core site with `f(coord, pops)`.
    pub fn define_populations_with(&mut self, mut f: impl FnMut(LatticeCoord, &mut [f64])) {
        let store = self.memory.host_mut(self.context);
        let mut scratch = [0.0; MAX_Q];
        for p in self.geometry.core_box().iter() {
            let index = self.geometry.cell_index(p);
            store.gather(index, &mut scratch);
            f(p, &mut scratch[..D::Q]);
            store.scatter(index, &scratch[..D::Q]);
        }
    }

    // ── Halo transfer ───────────────────────────────────────────────

    /// Values per site carried for `fields`.
    pub fn values_per_site(&self, fields: &FieldSet) -> Result<usize, BlockError> {
        self.memory.exec().values_per_site(fields)
    }

    /// Append `fields` at `cells` of the execution store to `out`. On
    /// the GPU platform this is a counted device download.
    pub fn pack(&self, fields: &FieldSet, cells: &[usize], out: &mut Vec<f64>) -> Result<(), BlockError> {
        match self.memory.device() {
            Some(device) => device.download(fields, cells, out),
            None => self.memory.exec().pack(fields, cells, out),
        }
    }

    /// Scatter a packed payload into `fields` at `cells`. Returns the
    /// number of values consumed.
    pub fn unpack(&mut self, fields: &FieldSet, cells: &[usize], data: &[f64]) -> Result<usize, BlockError> {
        match self.memory.device_mut() {
            Some(device) => device.upload(fields, cells, data),
            None => self.memory.exec_mut().unpack(fields, cells, data),
        }
    }

    /// Copy `fields` from another block of the same rank. Two host
    /// blocks copy directly; otherwise the data is staged through host
    /// memory with explicit transfers.
    pub fn copy_from(
        &mut self,
        src: &BlockLattice<D>,
        fields: &FieldSet,
        src_cells: &[usize],
        dst_cells: &[usize],
    ) -> Result<(), BlockError> {
        if self.platform.is_host_resident() && src.platform.is_host_resident() {
            return self
                .memory
                .exec_mut()
                .copy_from(src.memory.exec(), fields, src_cells, dst_cells);
        }
        let mut staging = Vec::with_capacity(src.values_per_site(fields)? * src_cells.len());
        src.pack(fields, src_cells, &mut staging)?;
        self.unpack(fields, dst_cells, &staging)?;
        Ok(())
    }

    /// Copy `fields` between cell lists of this block (periodic
    /// self-images).
    pub fn copy_within(&mut self, fields: &FieldSet, src_cells: &[usize], dst_cells: &[usize]) -> Result<(), BlockError> {
        self.memory.exec_mut().copy_within(fields, src_cells, dst_cells)
    }
}

impl<D: Descriptor> fmt::Debug for BlockLattice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockLattice")
            .field("descriptor", &D::NAME)
            .field("geometry", &self.geometry)
            .field("platform", &self.platform)
            .field("context", &self.context)
            .field("dynamics", &self.dynamics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::CellStatistic;
    use eddy_core::{ParameterSet, D2Q9, D3Q27};

    /// Moves every population towards the rest weights by `omega`.
    struct Damp;

    impl Dynamics<D2Q9> for Damp {
        fn name(&self) -> &str {
            "damp"
        }
        fn parameters(&self) -> &[ParameterId] {
            &[ParameterId::OMEGA]
        }
        fn collide(&self, cell: &mut Cell<'_>, params: &ParameterSet) -> Option<CellStatistic> {
            let omega = params.scalar(ParameterId::OMEGA).unwrap_or(0.0);
            for (f, w) in cell.populations_mut().iter_mut().zip(D2Q9::W) {
                *f += omega * (w - *f);
            }
            Some(CellStatistic { rho: 1.0, u_sqr: 0.0 })
        }
    }

    fn block(platform: Platform) -> BlockLattice<D2Q9> {
        BlockLattice::new([4, 3, 1], 1, platform).unwrap()
    }

    #[test]
    fn new_block_is_at_rest() {
        let b = block(Platform::CpuScalar);
        let (rho, u) = D2Q9::rho_u(&b.cell_populations([2, 1, 0])[..9]);
        assert!((rho - 1.0).abs() < 1e-12);
        assert!(u.iter().all(|c| c.abs() < 1e-15));
        assert_eq!(b.dynamics_name([0, 0, 0]), "no_dynamics");
    }

    #[test]
    fn stream_shifts_each_population() {
        let mut b = block(Platform::CpuScalar);
        b.define_populations_with(|p, f| {
            for (i, v) in f.iter_mut().enumerate() {
                *v = (100 * i) as f64 + (p[0] + 10 * p[1]) as f64;
            }
        });
        let before: Vec<[f64; MAX_Q]> = b.geometry().core_box().iter().map(|p| b.cell_populations(p)).collect();
        b.stream();
        for (k, p) in b.geometry().core_box().iter().enumerate() {
            for (i, c) in D2Q9::C.iter().enumerate() {
                let dst = [p[0] + c[0], p[1] + c[1], 0];
                if b.geometry().core_box().contains(dst) {
                    assert_eq!(b.population(dst, i), before[k][i], "direction {i} from {p:?}");
                }
            }
        }
    }

    #[test]
    fn stream_keeps_rest_state_in_core() {
        let mut b = BlockLattice::<D3Q27>::new([3, 3, 3], 1, Platform::CpuScalar).unwrap();
        b.stream();
        for p in b.geometry().core_box().iter() {
            for (i, w) in D3Q27::W.iter().enumerate() {
                assert_eq!(b.population(p, i), *w);
            }
        }
    }

    #[test]
    fn collide_skips_halo_and_unassigned_sites() {
        let mut b = block(Platform::CpuScalar);
        let damp: Arc<dyn Dynamics<D2Q9>> = Arc::new(Damp);
        b.set_dynamics(&LatticeBox::new([0, 0, 0], [2, 3, 1]), &damp).unwrap();
        b.set_parameter_scalar(ParameterId::OMEGA, 1.0);
        b.define_populations_with(|_, f| f.fill(0.0));
        b.collide();
        assert_eq!(b.population([0, 0, 0], 0), D2Q9::W[0]);
        assert_eq!(b.population([3, 0, 0], 0), 0.0);
        assert_eq!(b.population([-1, 0, 0], 0), D2Q9::W[0]);
        assert_eq!(b.current_statistics().count, 6);
    }

    #[test]
    fn predicate_assignment_reaches_halo_without_colliding_it() {
        let mut b = block(Platform::CpuScalar);
        let damp: Arc<dyn Dynamics<D2Q9>> = Arc::new(Damp);
        assert_eq!(b.set_dynamics_where(&damp, |p| p[0] < 1).unwrap(), 3);
        assert_eq!(b.dynamics_name([-1, 1, 0]), "damp");
        assert_eq!(b.dynamics_name([-1, -1, 0]), "damp");
        assert_eq!(b.dynamics_name([4, 1, 0]), "no_dynamics");

        b.set_parameter_scalar(ParameterId::OMEGA, 1.0);
        b.define_populations_with(|_, f| f.fill(0.0));
        b.collide();
        assert_eq!(b.population([-1, 1, 0], 0), D2Q9::W[0]);
        assert_eq!(b.current_statistics().count, 3);
    }

    #[test]
    fn reset_freezes_last_step() {
        let mut b = block(Platform::CpuSimd);
        let damp: Arc<dyn Dynamics<D2Q9>> = Arc::new(Damp);
        b.set_dynamics_where(&damp, |_| true).unwrap();
        b.collide();
        b.reset_statistics();
        assert_eq!(b.statistics().count, 12);
        assert_eq!(b.current_statistics().count, 0);
        b.set_statistics_enabled(false);
        b.collide();
        assert_eq!(b.current_statistics().count, 0);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut b = block(Platform::CpuScalar);
        assert_eq!(
            b.get_data(FieldId::VELOCITY).unwrap_err(),
            BlockError::FieldNotAllocated(FieldId::VELOCITY)
        );
        assert!(matches!(
            b.allocate(FieldId(40)),
            Err(BlockError::FieldNotDeclared { .. })
        ));
        assert_eq!(
            b.define_field(|_| true, FieldId::FORCE, &[1.0]),
            Err(BlockError::ComponentMismatch {
                field: FieldId::FORCE,
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn define_field_allocates_and_writes_core_only() {
        let mut b = block(Platform::CpuScalar);
        assert_eq!(b.define_field(|_| true, FieldId::FORCE, &[0.5, -0.5]).unwrap(), 12);
        let force = b.get_data(FieldId::FORCE).unwrap();
        assert_eq!(force.get(b.geometry().cell_index([1, 1, 0])), [0.5, -0.5, 0.0]);
        assert_eq!(force.get(b.geometry().cell_index([-1, 1, 0])), [0.0; 3]);
    }

    #[test]
    fn gpu_reads_need_evaluation_context() {
        let mut b = block(Platform::Gpu);
        b.define_populations_with(|_, f| f.fill(0.0));
        // The host mirror is stale until the block enters evaluation.
        assert_eq!(b.population([1, 1, 0], 0), D2Q9::W[0]);
        b.set_processing_context(ProcessingContext::Evaluation);
        assert_eq!(b.population([1, 1, 0], 0), 0.0);
        let downloaded = b.bytes_transferred();
        assert!(downloaded > 0);

        b.define_rho_u(|p| p == [1, 1, 0], 1.0, [0.0; 3]);
        b.set_processing_context(ProcessingContext::Simulation);
        assert!(b.bytes_transferred() > downloaded);
        b.set_processing_context(ProcessingContext::Evaluation);
        assert_eq!(b.population([1, 1, 0], 0), D2Q9::W[0]);
        assert_eq!(b.population([2, 1, 0], 0), 0.0);
    }

    #[test]
    fn add_post_processor_at_rejects_halo() {
        struct Nop;
        impl PostProcessor<D2Q9> for Nop {
            fn name(&self) -> &str {
                "nop"
            }
            fn apply(&self, _block: &mut BlockAccess<'_, D2Q9>, _cells: &[usize]) {}
        }
        let mut b = block(Platform::CpuScalar);
        let op: Arc<dyn PostProcessor<D2Q9>> = Arc::new(Nop);
        assert_eq!(
            b.add_post_processor_at(Stage::PostCoupling, [-1, 0, 0], &op),
            Err(BlockError::OutOfBounds([-1, 0, 0]))
        );
        assert_eq!(b.add_post_processor_at(Stage::PostCoupling, [3, 2, 0], &op), Ok(1));
        assert_eq!(b.scheduled_stages(), vec![Stage::PostCoupling]);
    }
}
