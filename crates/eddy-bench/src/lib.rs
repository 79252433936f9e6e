//! Benchmark profiles for the Eddy lattice engine.
//!
//! Provides pre-built lattices for benchmarking and the demo drivers:
//!
//! - [`channel_profile`]: force-driven 2D channel, periodic along the
//!   flow, bounce-back walls top and bottom.
//! - [`reference_profile`]: 128x64 channel (8K sites) in 4 cuboids.
//! - [`stress_profile`]: 512x256 channel (128K sites) in 16 cuboids.
//! - [`poiseuille_peak`]: analytic centreline speed of the channel.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use eddy_block::{Dynamics, PostProcessor};
use eddy_core::{FieldId, Platform, Stage, D2Q9};
use eddy_dynamics::{BounceBack, ForcedBgk, MomentaWriter};
use eddy_engine::{Domain, LatticeConfig, PlatformPolicy, RunContext, SetupError, SuperLattice};
use eddy_geometry::{Cuboid, CuboidDecomposition, MaterialGeometry};

/// Material tag of fluid sites.
pub const FLUID: i32 = 1;
/// Material tag of wall sites.
pub const WALL: i32 = 2;

/// Parameters of a channel benchmark.
#[derive(Clone, Copy, Debug)]
pub struct ChannelProfile {
    /// Lattice sites along and across the channel (walls included).
    pub extent: [i32; 2],
    /// Cuboids to cut the domain into.
    pub cuboids: usize,
    /// Platform of every block.
    pub platform: Platform,
    /// Relaxation frequency.
    pub omega: f64,
    /// Body force along the channel, per unit volume.
    pub force: f64,
    /// Write `(rho, u)` fields every step.
    pub momenta: bool,
}

impl Default for ChannelProfile {
    fn default() -> Self {
        Self {
            extent: [128, 64],
            cuboids: 4,
            platform: Platform::CpuScalar,
            omega: 1.0,
            force: 1e-6,
            momenta: false,
        }
    }
}

/// Build and initialize a channel lattice.
///
/// Collective when `context` spans several ranks.
pub fn channel_profile(context: RunContext, profile: &ChannelProfile) -> Result<SuperLattice<D2Q9>, SetupError> {
    let [nx, ny] = profile.extent;
    let mut decomposition = CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, [nx, ny, 1]), 2, profile.cuboids)?;
    decomposition.set_periodicity([true, false, false]);

    let mut materials = MaterialGeometry::new(&decomposition, FLUID);
    for x in 0..nx {
        materials.set([x, 0, 0], WALL);
        materials.set([x, ny - 1, 0], WALL);
    }

    let config = LatticeConfig {
        platforms: PlatformPolicy::Uniform(profile.platform),
        ..LatticeConfig::default()
    };
    let mut lattice = SuperLattice::with_heuristic(context, decomposition, config)?;

    let fluid: Arc<dyn Dynamics<D2Q9>> = Arc::new(ForcedBgk::new(profile.omega));
    let wall: Arc<dyn Dynamics<D2Q9>> = Arc::new(BounceBack);
    lattice.set_dynamics(&Domain::Material(&materials, FLUID), &fluid)?;
    lattice.set_dynamics(&Domain::Material(&materials, WALL), &wall)?;
    lattice.define_rho_u(&Domain::Everywhere, 1.0, [0.0; 3])?;
    lattice.define_field(&Domain::Material(&materials, FLUID), FieldId::FORCE, &[profile.force, 0.0])?;
    if profile.momenta {
        let writer: Arc<dyn PostProcessor<D2Q9>> = Arc::new(MomentaWriter::<D2Q9>::new());
        lattice.add_post_processor(Stage::PostPostProcess, &Domain::Material(&materials, FLUID), &writer)?;
    }
    lattice.initialize()?;
    Ok(lattice)
}

/// 128x64 channel in 4 cuboids.
pub fn reference_profile(platform: Platform) -> ChannelProfile {
    ChannelProfile {
        platform,
        ..ChannelProfile::default()
    }
}

/// 512x256 channel in 16 cuboids.
pub fn stress_profile(platform: Platform) -> ChannelProfile {
    ChannelProfile {
        extent: [512, 256],
        cuboids: 16,
        platform,
        ..ChannelProfile::default()
    }
}

/// Steady centreline speed of force-driven Poiseuille flow between
/// half-way bounce-back walls.
///
/// The fluid spans `ny - 2` sites; walls sit half a spacing beyond the
/// outermost fluid sites.
pub fn poiseuille_peak(profile: &ChannelProfile) -> f64 {
    let width = f64::from(profile.extent[1] - 2);
    let nu = (1.0 / profile.omega - 0.5) / 3.0;
    profile.force * width * width / (8.0 * nu)
}
