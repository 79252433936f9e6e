//! Site selection across the decomposition.

use eddy_core::LatticeCoord;
use eddy_geometry::{Cuboid, CuboidDecomposition, Indicator, MaterialSource};

/// Which sites a setup operation applies to.
///
/// Selectors see local coordinates of one cuboid, halo included, and
/// decide on the global site they stand for after folding periodic
/// axes. A halo site is therefore selected exactly when the core site it
/// mirrors is.
#[derive(Clone, Copy)]
pub enum Domain<'a> {
    /// Every site.
    Everywhere,
    /// Sites whose material tag equals the given value.
    Material(&'a dyn MaterialSource, i32),
    /// Sites whose physical position lies inside the indicator.
    Indicator(&'a dyn Indicator),
    /// The single site nearest to a physical point.
    Point([f64; 3]),
}

/// Per-cuboid site predicate.
pub(crate) type Selector<'s> = Box<dyn Fn(LatticeCoord) -> bool + 's>;

impl<'a> Domain<'a> {
    /// Predicate on local coordinates of `cuboid`.
    pub(crate) fn selector<'s>(&self, decomposition: &'s CuboidDecomposition, cuboid: &Cuboid) -> Selector<'s>
    where
        'a: 's,
    {
        let offset = cuboid.offset();
        let global = move |p: LatticeCoord| decomposition.wrap_global([0, 1, 2].map(|a| offset[a] + p[a]));
        match *self {
            Self::Everywhere => Box::new(|_| true),
            Self::Material(source, tag) => Box::new(move |p| source.material(global(p)) == tag),
            Self::Indicator(indicator) => {
                Box::new(move |p| indicator.contains(decomposition.global_to_phys(global(p))))
            }
            Self::Point(x) => match decomposition
                .phys_to_global(x)
                .filter(|&g| decomposition.cuboid_of(g).is_some())
            {
                Some(target) => Box::new(move |p| global(p) == target),
                None => Box::new(|_| false),
            },
        }
    }
}

impl std::fmt::Debug for Domain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Everywhere => write!(f, "Everywhere"),
            Self::Material(_, tag) => write!(f, "Material({tag})"),
            Self::Indicator(_) => write!(f, "Indicator"),
            Self::Point(p) => write!(f, "Point({p:?})"),
        }
    }
}
