//! Lattice configuration and its validation.

use eddy_core::{CuboidId, Platform};
use eddy_geometry::HeuristicConfig;
use thiserror::Error;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`LatticeConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Streaming needs at least one halo layer.
    #[error("overlap {overlap} is below the minimum of 1")]
    OverlapTooSmall {
        /// The configured overlap.
        overlap: i32,
    },
    /// A per-cuboid platform list of the wrong length.
    #[error("platform list has {given} entries for {cuboids} cuboids")]
    PlatformCount {
        /// Cuboids in the decomposition.
        cuboids: usize,
        /// Entries supplied.
        given: usize,
    },
    /// The load-balancer weight ratio must be finite and positive.
    #[error("ratio_full_empty must be finite and positive, got {ratio}")]
    InvalidHeuristic {
        /// The invalid value.
        ratio: f64,
    },
}

// ── PlatformPolicy ─────────────────────────────────────────────────

/// Which platform each cuboid's block runs on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformPolicy {
    /// Every block on the same platform.
    Uniform(Platform),
    /// One platform per global cuboid id.
    PerCuboid(Vec<Platform>),
}

impl PlatformPolicy {
    /// Platform of a cuboid. Ids past a per-cuboid list fall back to
    /// [`Platform::default()`]; [`LatticeConfig::validate`] rejects such
    /// lists up front.
    pub fn platform_for(&self, id: CuboidId) -> Platform {
        match self {
            Self::Uniform(p) => *p,
            Self::PerCuboid(list) => list.get(id.index()).copied().unwrap_or_default(),
        }
    }
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self::Uniform(Platform::default())
    }
}

// ── LatticeConfig ──────────────────────────────────────────────────

/// Configuration of a [`SuperLattice`](crate::SuperLattice).
#[derive(Clone, Debug, PartialEq)]
pub struct LatticeConfig {
    /// Halo layers allocated around every block. Default: 1.
    pub overlap: i32,
    /// Platform assignment. Default: every block on the scalar CPU.
    pub platforms: PlatformPolicy,
    /// Fold `(rho, u²)` into the statistics during collision. Default: on.
    pub statistics: bool,
    /// Load-balancer weighting, used by
    /// [`SuperLattice::with_heuristic`](crate::SuperLattice::with_heuristic).
    pub heuristic: HeuristicConfig,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            overlap: 1,
            platforms: PlatformPolicy::default(),
            statistics: true,
            heuristic: HeuristicConfig::default(),
        }
    }
}

impl LatticeConfig {
    /// Validate against a decomposition of `cuboids` cuboids.
    pub fn validate(&self, cuboids: usize) -> Result<(), ConfigError> {
        if self.overlap < 1 {
            return Err(ConfigError::OverlapTooSmall { overlap: self.overlap });
        }
        if let PlatformPolicy::PerCuboid(list) = &self.platforms {
            if list.len() != cuboids {
                return Err(ConfigError::PlatformCount {
                    cuboids,
                    given: list.len(),
                });
            }
        }
        let ratio = self.heuristic.ratio_full_empty;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ConfigError::InvalidHeuristic { ratio });
        }
        Ok(())
    }
}
