//! The distributed lattice: every local block, its communicators, and
//! the per-iteration pipeline.
//!
//! # Lifecycle
//!
//! ```text
//! Constructed ──setup──▶ Configuring ──initialize()──▶ Initialized
//!                                                          │
//!                                            collide_and_stream()
//!                                                          ▼
//!                                                      Iterating
//! ```
//!
//! Setup operations (dynamics, post-processors, initial conditions,
//! field allocation) are rejected once the lattice is initialized; there
//! is no way back to configuring. Parameters may change at any time.
//! Evaluation snapshots ([`SuperLattice::set_processing_context`]) do
//! not change the lifecycle state.
//!
//! # Step pipeline
//!
//! | phase | post-processors | communication |
//! |---|---|---|
//! | collide | | |
//! | `PostCollide` | first | populations (+ requested) |
//! | stream | | |
//! | `PostStream` | after | populations (+ requested) |
//! | `PreCoupling` | first | after |
//! | `Coupling` | first | after |
//! | `PostCoupling` | after | first |
//! | `PostPostProcess` | after | first |
//!
//! A stage whose operators read the halo (they declare
//! [`PostProcessor::communicates`]) is also exchanged right before those
//! operators run, so every operator sees the neighbours' current state
//! whatever the cut. Statistics of the step are frozen at the end.
//! Stages with neither operators nor fields are skipped.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use eddy_block::{BlockLattice, CellRef, Dynamics, PostProcessor};
use eddy_comm::{Comm, CommError};
use eddy_core::{CuboidId, Descriptor, FieldId, FieldSet, LatticeCoord, ParameterId, ProcessingContext, RankId, Stage};
use eddy_geometry::{CuboidDecomposition, LoadBalancer};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, error, info, trace};

use crate::communicator::BlockCommunicator;
use crate::config::LatticeConfig;
use crate::context::RunContext;
use crate::domain::Domain;
use crate::error::{ExchangeError, SetupError};
use crate::metrics::StepMetrics;
use crate::statistics::LatticeStatistics;

/// Lifecycle state of a [`SuperLattice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LatticeState {
    /// Built, nothing configured yet.
    Constructed,
    /// At least one setup operation applied.
    Configuring,
    /// Communicators established, ready to step.
    Initialized,
    /// At least one step taken.
    Iterating,
}

impl fmt::Display for LatticeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructed => write!(f, "constructed"),
            Self::Configuring => write!(f, "configuring"),
            Self::Initialized => write!(f, "initialized"),
            Self::Iterating => write!(f, "iterating"),
        }
    }
}

/// Communication requested for one stage: fields, halo depth, and
/// whether an operator of the stage reads the halo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct StageRequest {
    fields: FieldSet,
    width: i32,
    readers: bool,
}

impl StageRequest {
    fn merge(&mut self, other: StageRequest) {
        self.fields = self.fields.union(&other.fields);
        self.width = self.width.max(other.width);
        self.readers |= other.readers;
    }
}

/// Bytes of one encoded `(stage, request)` entry.
const REQUEST_BYTES: usize = 2 + 4 + 16 + 1;

fn stage_from_code(code: u16) -> Option<Stage> {
    match code {
        0 => Some(Stage::PostCollide),
        1 => Some(Stage::PostStream),
        2 => Some(Stage::PreCoupling),
        3 => Some(Stage::Coupling),
        4 => Some(Stage::PostCoupling),
        5 => Some(Stage::PostPostProcess),
        n if n >= 16 => Some(Stage::Custom(n - 16)),
        _ => None,
    }
}

fn encode_requests(requests: &IndexMap<Stage, StageRequest>) -> Vec<u8> {
    let mut out = Vec::with_capacity(requests.len() * REQUEST_BYTES);
    for (stage, r) in requests {
        out.extend_from_slice(&stage.code().to_le_bytes());
        out.extend_from_slice(&r.width.to_le_bytes());
        out.extend_from_slice(&r.fields.bits().to_le_bytes());
        out.push(u8::from(r.readers));
    }
    out
}

fn decode_requests(bytes: &[u8], into: &mut IndexMap<Stage, StageRequest>) {
    for chunk in bytes.chunks_exact(REQUEST_BYTES) {
        let (code, rest) = chunk.split_at(2);
        let (width, rest) = rest.split_at(4);
        let (bits, readers) = rest.split_at(16);
        let Some(stage) = code.try_into().ok().map(u16::from_le_bytes).and_then(stage_from_code) else {
            continue;
        };
        let request = StageRequest {
            width: width.try_into().map(i32::from_le_bytes).unwrap_or(0),
            fields: FieldSet::from_bits(bits.try_into().map(u128::from_le_bytes).unwrap_or(0)),
            readers: readers.first().is_some_and(|&b| b != 0),
        };
        into.entry(stage).or_default().merge(request);
    }
}

/// Every block of this rank plus the machinery that steps them together.
///
/// All ranks of a universe hold a `SuperLattice` over the same
/// decomposition; [`SuperLattice::initialize`],
/// [`SuperLattice::collide_and_stream`], [`SuperLattice::exchange`] and
/// [`SuperLattice::statistics`] are collective.
pub struct SuperLattice<D: Descriptor> {
    comm: Arc<Comm>,
    context: RunContext,
    decomposition: CuboidDecomposition,
    balancer: LoadBalancer,
    config: LatticeConfig,
    blocks: Vec<BlockLattice<D>>,
    requested: IndexMap<Stage, StageRequest>,
    communicators: IndexMap<Stage, BlockCommunicator>,
    operator_stages: Vec<Stage>,
    halo_readers: Vec<Stage>,
    state: LatticeState,
    iteration: u64,
    metrics: StepMetrics,
}

impl<D: Descriptor> SuperLattice<D> {
    /// Allocate one block per cuboid this rank owns.
    ///
    /// Fails if the configuration is invalid, the decomposition's
    /// dimension differs from the descriptor's, or `balancer` does not
    /// describe this decomposition on this universe.
    pub fn new(
        context: RunContext,
        decomposition: CuboidDecomposition,
        balancer: LoadBalancer,
        config: LatticeConfig,
    ) -> Result<Self, SetupError> {
        config.validate(decomposition.len())?;
        if decomposition.dim() != D::D {
            return Err(SetupError::DimensionMismatch {
                descriptor: D::NAME,
                expected: D::D,
                got: decomposition.dim(),
            });
        }
        let comm = context.shared_comm();
        if balancer.owners().len() != decomposition.len()
            || balancer.size() != comm.size()
            || balancer.rank() != comm.rank()
        {
            return Err(SetupError::BalancerMismatch {
                covered: balancer.owners().len(),
                ranks: balancer.size(),
                cuboids: decomposition.len(),
                size: comm.size(),
            });
        }

        let mut blocks = Vec::with_capacity(balancer.local_count());
        for &id in balancer.local_ids() {
            let cuboid = decomposition.get(id)?;
            let mut block = BlockLattice::new(cuboid.extent(), config.overlap, config.platforms.platform_for(id))?;
            block.set_statistics_enabled(config.statistics);
            blocks.push(block);
        }
        info!(
            rank = %comm.rank(),
            descriptor = D::NAME,
            cuboids = decomposition.len(),
            local = blocks.len(),
            overlap = config.overlap,
            "super lattice constructed"
        );

        Ok(Self {
            comm,
            context,
            decomposition,
            balancer,
            config,
            blocks,
            requested: IndexMap::new(),
            communicators: IndexMap::new(),
            operator_stages: Vec::new(),
            halo_readers: Vec::new(),
            state: LatticeState::Constructed,
            iteration: 0,
            metrics: StepMetrics::default(),
        })
    }

    /// Build with the greedy load balancer. Collective.
    pub fn with_heuristic(
        context: RunContext,
        decomposition: CuboidDecomposition,
        config: LatticeConfig,
    ) -> Result<Self, SetupError> {
        // Checked here as well as in `new` so a bad configuration fails
        // before the collective balancer call.
        config.validate(decomposition.len())?;
        let balancer = LoadBalancer::heuristic(&decomposition, context.comm(), &config.heuristic)?;
        Self::new(context, decomposition, balancer, config)
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Lifecycle state.
    pub fn state(&self) -> LatticeState {
        self.state
    }

    /// Steps taken.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Local blocks, in local-index order.
    pub fn blocks(&self) -> &[BlockLattice<D>] {
        &self.blocks
    }

    /// Mutable local blocks, for drivers that manage blocks directly.
    pub fn blocks_mut(&mut self) -> &mut [BlockLattice<D>] {
        &mut self.blocks
    }

    /// Local block of a global cuboid id, if this rank owns it.
    pub fn block(&self, id: CuboidId) -> Option<&BlockLattice<D>> {
        self.balancer.loc(id).map(|l| &self.blocks[l])
    }

    /// The decomposition.
    pub fn decomposition(&self) -> &CuboidDecomposition {
        &self.decomposition
    }

    /// The load balancer.
    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    /// The run context.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// The configuration.
    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    /// This rank.
    pub fn rank(&self) -> RankId {
        self.comm.rank()
    }

    /// Timings of the last step.
    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    // ── Setup ───────────────────────────────────────────────────────

    fn configure(&mut self, operation: &'static str) -> Result<(), SetupError> {
        match self.state {
            LatticeState::Constructed | LatticeState::Configuring => {
                self.state = LatticeState::Configuring;
                Ok(())
            }
            state => Err(SetupError::InvalidState { operation, state }),
        }
    }

    /// Apply `f` to every local block with its cuboid's selector.
    fn for_each_selected(
        &mut self,
        domain: &Domain<'_>,
        mut f: impl FnMut(&mut BlockLattice<D>, &dyn Fn(LatticeCoord) -> bool) -> Result<usize, SetupError>,
    ) -> Result<usize, SetupError> {
        let mut total = 0;
        for (local, &id) in self.balancer.local_ids().iter().enumerate() {
            let cuboid = self.decomposition.get(id)?;
            let select = domain.selector(&self.decomposition, cuboid);
            total += f(&mut self.blocks[local], &*select)?;
        }
        Ok(total)
    }

    /// Assign `dynamics` to the selected sites. Returns how many local
    /// sites changed.
    pub fn set_dynamics(&mut self, domain: &Domain<'_>, dynamics: &Arc<dyn Dynamics<D>>) -> Result<usize, SetupError> {
        self.configure("set_dynamics")?;
        let n = self.for_each_selected(domain, |block, select| {
            Ok(block.set_dynamics_where(dynamics, select)?)
        })?;
        debug!(dynamics = dynamics.name(), ?domain, sites = n, "dynamics assigned");
        Ok(n)
    }

    /// Schedule `op` at `stage` on the selected sites. Fields it
    /// communicates are added to that stage's communicator at
    /// [`SuperLattice::initialize`].
    pub fn add_post_processor(
        &mut self,
        stage: Stage,
        domain: &Domain<'_>,
        op: &Arc<dyn PostProcessor<D>>,
    ) -> Result<usize, SetupError> {
        self.configure("add_post_processor")?;
        let fields = op.communicates();
        self.requested.entry(stage).or_default().merge(StageRequest {
            fields,
            width: 1,
            readers: !fields.is_empty(),
        });
        let n = self.for_each_selected(domain, |block, select| {
            Ok(block.add_post_processor(stage, op, select)?)
        })?;
        debug!(%stage, op = op.name(), ?domain, sites = n, "post-processor added");
        Ok(n)
    }

    /// Exchange `fields` over `width` halo layers at `stage`.
    ///
    /// Fails with [`SetupError::OverlapExceedsPadding`] if `width`
    /// exceeds the configured overlap.
    pub fn request_communication(&mut self, stage: Stage, fields: FieldSet, width: i32) -> Result<(), SetupError> {
        self.configure("request_communication")?;
        if width > self.config.overlap {
            return Err(SetupError::OverlapExceedsPadding {
                requested: width,
                allocated: self.config.overlap,
            });
        }
        self.requested
            .entry(stage)
            .or_default()
            .merge(StageRequest {
                fields,
                width,
                readers: false,
            });
        Ok(())
    }

    /// Allocate an auxiliary field on every local block.
    pub fn allocate(&mut self, field: FieldId) -> Result<(), SetupError> {
        self.configure("allocate")?;
        for block in &mut self.blocks {
            block.allocate(field)?;
        }
        Ok(())
    }

    /// Equilibrium populations for `(rho, u)` on the selected sites.
    pub fn define_rho_u(&mut self, domain: &Domain<'_>, rho: f64, u: [f64; 3]) -> Result<usize, SetupError> {
        self.configure("define_rho_u")?;
        self.for_each_selected(domain, |block, select| Ok(block.define_rho_u(select, rho, u)))
    }

    /// Set an auxiliary field on the selected sites.
    pub fn define_field(&mut self, domain: &Domain<'_>, field: FieldId, value: &[f64]) -> Result<usize, SetupError> {
        self.configure("define_field")?;
        self.for_each_selected(domain, |block, select| Ok(block.define_field(select, field, value)?))
    }

    /// Overwrite core populations with `f(global coordinate, pops)`.
    pub fn define_populations_with(
        &mut self,
        mut f: impl FnMut(LatticeCoord, &mut [f64]),
    ) -> Result<(), SetupError> {
        self.configure("define_populations_with")?;
        for (local, &id) in self.balancer.local_ids().iter().enumerate() {
            let offset = self.decomposition.get(id)?.offset();
            self.blocks[local].define_populations_with(|p, pops| f([0, 1, 2].map(|a| offset[a] + p[a]), pops));
        }
        Ok(())
    }

    /// Broadcast a parameter to every dynamics instance declaring it.
    /// Returns how many local instances accepted it.
    pub fn set_parameter(&mut self, id: ParameterId, value: [f64; 3]) -> usize {
        self.blocks.iter_mut().map(|b| b.set_parameter(id, value)).sum()
    }

    /// Scalar form of [`SuperLattice::set_parameter`].
    pub fn set_parameter_scalar(&mut self, id: ParameterId, value: f64) -> usize {
        self.blocks.iter_mut().map(|b| b.set_parameter_scalar(id, value)).sum()
    }

    // ── Initialization ──────────────────────────────────────────────

    /// Finish setup. Collective.
    ///
    /// Re-runs every site's dynamics initialization, agrees with the
    /// other ranks on what each stage exchanges, builds the
    /// communicators and fills the halos once.
    ///
    /// Populations are always exchanged at [`Stage::PostCollide`], for
    /// streaming, and at [`Stage::PostStream`], for operators reading
    /// the halo.
    pub fn initialize(&mut self) -> Result<(), SetupError> {
        if !matches!(self.state, LatticeState::Constructed | LatticeState::Configuring) {
            return Err(SetupError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }
        for block in &mut self.blocks {
            block.initialize();
        }

        let mut local = self.requested.clone();
        for stage in Stage::PIPELINE {
            local.entry(stage).or_default();
        }
        for stage in [Stage::PostCollide, Stage::PostStream] {
            local.entry(stage).or_default().merge(StageRequest {
                fields: FieldSet::populations(),
                width: 1,
                readers: false,
            });
        }
        for block in &self.blocks {
            for stage in block.scheduled_stages() {
                let fields = block.communicated_fields(stage);
                local.entry(stage).or_default().merge(StageRequest {
                    fields,
                    width: 1,
                    readers: !fields.is_empty(),
                });
            }
        }
        let agreed = self.agree_on_requests(&local)?;

        let mut required = FieldSet::empty();
        for r in agreed.values() {
            required = required.union(&r.fields);
        }
        for block in &mut self.blocks {
            block.allocate_all(&required)?;
        }

        let mut communicators = IndexMap::new();
        for (&stage, r) in &agreed {
            let width = if r.fields.is_empty() { 0 } else { r.width.max(1) };
            let c = BlockCommunicator::new(
                stage,
                r.fields,
                width,
                self.config.overlap,
                &self.decomposition,
                &self.balancer,
            )?;
            communicators.insert(stage, c);
        }
        self.communicators = communicators;
        self.halo_readers = agreed
            .iter()
            .filter(|(_, r)| r.readers && !r.fields.is_empty())
            .map(|(&stage, _)| stage)
            .collect();

        let mut stages: Vec<Stage> = self.blocks.iter().flat_map(|b| b.scheduled_stages()).collect();
        stages.sort_unstable();
        stages.dedup();
        self.operator_stages = stages;

        if let Some(c) = self.communicators.get_mut(&Stage::PostStream) {
            c.exchange(&self.comm, &mut self.blocks).map_err(|e| match e {
                ExchangeError::Comm(e) => SetupError::Comm(e),
                ExchangeError::Block(e) => SetupError::Block(e),
            })?;
        }

        self.state = LatticeState::Initialized;
        info!(
            rank = %self.comm.rank(),
            stages = self.communicators.len(),
            fields = required.len(),
            "super lattice initialized"
        );
        Ok(())
    }

    /// Union of every rank's stage requests, identical on all ranks.
    fn agree_on_requests(
        &self,
        local: &IndexMap<Stage, StageRequest>,
    ) -> Result<IndexMap<Stage, StageRequest>, CommError> {
        let gathered = self.comm.gather(RankId::ROOT, encode_requests(local))?;
        let merged = gathered.map(|all| {
            let mut merged = IndexMap::new();
            for bytes in &all {
                decode_requests(bytes, &mut merged);
            }
            merged.sort_keys();
            encode_requests(&merged)
        });
        let bytes = self.comm.broadcast(RankId::ROOT, merged.unwrap_or_default())?;
        let mut agreed = IndexMap::new();
        decode_requests(&bytes, &mut agreed);
        Ok(agreed)
    }

    // ── Stepping ────────────────────────────────────────────────────

    /// Run the post-processors of `stage` on every local block.
    pub fn execute_post_processors(&mut self, stage: Stage) {
        self.blocks.par_iter_mut().for_each(|b| b.post_process(stage));
    }

    /// Communicator of a stage, once initialized.
    pub fn communicator(&self, stage: Stage) -> Option<&BlockCommunicator> {
        self.communicators.get(&stage)
    }

    /// Run the full halo exchange of `stage`. Collective; a stage
    /// without a communicator is a no-op.
    pub fn exchange(&mut self, stage: Stage) -> Result<(), ExchangeError> {
        match self.communicators.get_mut(&stage) {
            Some(c) => c.exchange(&self.comm, &mut self.blocks),
            None => Ok(()),
        }
    }

    fn timed_post_process(&mut self, stage: Stage) {
        if !self.operator_stages.contains(&stage) {
            return;
        }
        let t = Instant::now();
        self.execute_post_processors(stage);
        self.metrics.post_process_us.push((stage, t.elapsed().as_micros() as u64));
    }

    fn timed_exchange(&mut self, stage: Stage) -> Result<(), ExchangeError> {
        if self.communicators.get(&stage).is_none_or(|c| c.fields().is_empty()) {
            return Ok(());
        }
        let t = Instant::now();
        self.exchange(stage)?;
        self.metrics.communication_us.push((stage, t.elapsed().as_micros() as u64));
        Ok(())
    }

    /// Operators first, then the stage's exchange. Halo readers get an
    /// extra exchange before they run.
    fn run_stage_then_exchange(&mut self, stage: Stage) -> Result<(), ExchangeError> {
        if self.halo_readers.contains(&stage) {
            self.timed_exchange(stage)?;
        }
        self.timed_post_process(stage);
        self.timed_exchange(stage)
    }

    /// One time step on every local block. Collective.
    ///
    /// # Panics
    ///
    /// Panics if the lattice was not initialized, or if a halo exchange
    /// fails (a peer rank is gone). Communication failures are not
    /// retried.
    pub fn collide_and_stream(&mut self) {
        if !matches!(self.state, LatticeState::Initialized | LatticeState::Iterating) {
            error!(state = %self.state, "collide_and_stream before initialize");
            panic!("collide_and_stream called on a {} lattice", self.state);
        }
        if let Err(e) = self.step() {
            error!(rank = %self.comm.rank(), iteration = self.iteration, error = %e, "halo exchange failed");
            panic!("halo exchange failed at iteration {}: {e}", self.iteration);
        }
        self.state = LatticeState::Iterating;
        self.iteration += 1;
    }

    fn step(&mut self) -> Result<(), ExchangeError> {
        let start = Instant::now();
        self.metrics = StepMetrics::default();

        let t = Instant::now();
        self.blocks.par_iter_mut().for_each(|b| b.collide());
        self.metrics.collide_us = t.elapsed().as_micros() as u64;

        self.run_stage_then_exchange(Stage::PostCollide)?;

        let t = Instant::now();
        self.blocks.par_iter_mut().for_each(|b| b.stream());
        self.metrics.stream_us = t.elapsed().as_micros() as u64;

        self.timed_exchange(Stage::PostStream)?;
        self.timed_post_process(Stage::PostStream);
        for stage in [Stage::PreCoupling, Stage::Coupling] {
            self.run_stage_then_exchange(stage)?;
        }
        for stage in [Stage::PostCoupling, Stage::PostPostProcess] {
            self.timed_exchange(stage)?;
            self.timed_post_process(stage);
        }

        for block in &mut self.blocks {
            block.reset_statistics();
        }
        self.metrics.device_bytes = self.blocks.iter().map(|b| b.bytes_transferred()).sum();
        self.metrics.total_us = start.elapsed().as_micros() as u64;
        trace!(
            iteration = self.iteration,
            total_us = self.metrics.total_us,
            collide_us = self.metrics.collide_us,
            stream_us = self.metrics.stream_us,
            comm_us = self.metrics.communication_total_us(),
            "step"
        );
        Ok(())
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Switch every block between evaluation and simulation.
    ///
    /// Enter [`ProcessingContext::Evaluation`] before reading fields on
    /// the host, and return to [`ProcessingContext::Simulation`] before
    /// the next step.
    pub fn set_processing_context(&mut self, context: ProcessingContext) {
        for block in &mut self.blocks {
            block.set_processing_context(context);
        }
    }

    /// Statistics of the last step over every rank. Collective.
    pub fn statistics(&self) -> Result<LatticeStatistics, CommError> {
        LatticeStatistics::reduce(&self.comm, self.blocks.iter().map(|b| b.statistics()))
    }

    /// Visit every local core site with its cuboid and global coordinate.
    pub fn for_each_core_cell(&self, mut f: impl FnMut(CuboidId, LatticeCoord, CellRef<'_>)) {
        for (local, &id) in self.balancer.local_ids().iter().enumerate() {
            let Ok(cuboid) = self.decomposition.get(id) else {
                continue;
            };
            let offset = cuboid.offset();
            self.blocks[local].for_each_core_cell(|p, cell| f(id, [0, 1, 2].map(|a| offset[a] + p[a]), cell));
        }
    }
}

impl<D: Descriptor> fmt::Debug for SuperLattice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperLattice")
            .field("descriptor", &D::NAME)
            .field("rank", &self.comm.rank())
            .field("state", &self.state)
            .field("iteration", &self.iteration)
            .field("blocks", &self.blocks.len())
            .field("communicators", &self.communicators.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_codes_decode() {
        for stage in Stage::PIPELINE {
            assert_eq!(stage_from_code(stage.code()), Some(stage));
        }
        assert_eq!(stage_from_code(Stage::Custom(3).code()), Some(Stage::Custom(3)));
        assert_eq!(stage_from_code(9), None);
    }

    #[test]
    fn requests_merge_on_decode() {
        let mut a = IndexMap::new();
        a.insert(
            Stage::Coupling,
            StageRequest {
                fields: FieldSet::empty().with(FieldId::FORCE),
                width: 1,
                readers: false,
            },
        );
        let mut b = IndexMap::new();
        b.insert(
            Stage::Coupling,
            StageRequest {
                fields: FieldSet::empty().with(FieldId::DENSITY),
                width: 2,
                readers: true,
            },
        );
        b.insert(Stage::Custom(1), StageRequest::default());
        let mut merged = IndexMap::new();
        decode_requests(&encode_requests(&a), &mut merged);
        decode_requests(&encode_requests(&b), &mut merged);
        let coupling = merged[&Stage::Coupling];
        assert_eq!(coupling.width, 2);
        assert!(coupling.fields.contains(FieldId::FORCE));
        assert!(coupling.fields.contains(FieldId::DENSITY));
        assert!(coupling.readers);
        assert!(merged.contains_key(&Stage::Custom(1)));
    }

    #[test]
    fn state_names() {
        assert_eq!(LatticeState::Configuring.to_string(), "configuring");
        assert_eq!(LatticeState::Iterating.to_string(), "iterating");
    }
}
