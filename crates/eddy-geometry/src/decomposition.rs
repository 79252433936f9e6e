//! Deterministic partition of a lattice domain into cuboids.
//!
//! A [`CuboidDecomposition`] starts from a "mother" cuboid (the bounding
//! box of the domain at the chosen spacing) and splits it into a grid of
//! near-equal cuboids. The grid shape is the factorisation of the
//! requested count with the smallest total cut area, chosen by a fixed
//! search order, so the same (shape, spacing, count) always gives the
//! same partition and the same weights.
//!
//! Neighbour relations are purely geometric: [`CuboidDecomposition::halo_sources`]
//! enumerates, for one cuboid and a halo width, every source cuboid
//! (periodic images included) whose sites land in that cuboid's halo.

use eddy_core::{CuboidId, LatticeCoord};
use smallvec::SmallVec;

use crate::cuboid::Cuboid;
use crate::error::GeometryError;
use crate::indicator::Indicator;
use crate::lattice_box::LatticeBox;

/// Sub-voxel slack accepted when snapping physical points to sites.
pub const SNAP_TOLERANCE: f64 = 1e-8;

/// One contribution to a cuboid's halo.
///
/// Sites of `source` translated by `shift` cover `region` (given in the
/// destination's global frame). `shift` is non-zero only for periodic
/// images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaloOverlap {
    /// The cuboid providing the data.
    pub source: CuboidId,
    /// Periodic translation applied to the source's global coordinates.
    pub shift: LatticeCoord,
    /// Halo sites covered, in the destination's global frame.
    pub region: LatticeBox,
}

/// An ordered set of cuboids covering a lattice domain.
#[derive(Clone, Debug)]
pub struct CuboidDecomposition {
    mother: Cuboid,
    cuboids: Vec<Cuboid>,
    dim: usize,
    periodic: [bool; 3],
}

impl CuboidDecomposition {
    /// Split `mother` into `count` cuboids. Weights default to volumes.
    pub fn new(mother: Cuboid, dim: usize, count: usize) -> Result<Self, GeometryError> {
        if dim != 2 && dim != 3 {
            return Err(GeometryError::InvalidDimension(dim));
        }
        if !(mother.delta_r() > 0.0 && mother.delta_r().is_finite()) {
            return Err(GeometryError::InvalidSpacing(mother.delta_r()));
        }
        if mother.lattice_volume() == 0 {
            return Err(GeometryError::EmptyDomain);
        }
        let shape = grid_shape(mother.extent(), dim, count).ok_or(GeometryError::TooManyCuboids {
            requested: count,
            voxels: mother.lattice_volume(),
        })?;
        let cuboids = mother.split(shape);
        tracing::info!(
            count = cuboids.len(),
            ?shape,
            extent = ?mother.extent(),
            "built cuboid decomposition"
        );
        Ok(Self {
            mother,
            cuboids,
            dim,
            periodic: [false; 3],
        })
    }

    /// Decompose the bounding box of `indicator` at spacing `delta_r`.
    ///
    /// Each cuboid's weight is its number of sites inside the indicator.
    pub fn from_indicator(
        indicator: &dyn Indicator,
        delta_r: f64,
        dim: usize,
        count: usize,
    ) -> Result<Self, GeometryError> {
        if !(delta_r > 0.0 && delta_r.is_finite()) {
            return Err(GeometryError::InvalidSpacing(delta_r));
        }
        let (min, max) = indicator.bounding_box();
        let mut extent = [1; 3];
        for a in 0..dim.min(3) {
            extent[a] = ((max[a] - min[a]) / delta_r + 0.5).floor() as i32 + 1;
        }
        let origin = if dim == 2 { [min[0], min[1], 0.0] } else { min };
        let mut decomposition = Self::new(Cuboid::new(origin, delta_r, extent), dim, count)?;
        for c in &mut decomposition.cuboids {
            let full = c
                .bounds()
                .iter()
                .map(|g| [0, 1, 2].map(|a| g[a] - c.offset()[a]))
                .filter(|&l| indicator.contains(c.local_to_phys(l)))
                .count() as u64;
            if full == 0 {
                tracing::warn!(offset = ?c.offset(), "cuboid has no site inside the indicator");
            }
            c.set_weight(full);
        }
        Ok(decomposition)
    }

    /// Number of cuboids.
    pub fn len(&self) -> usize {
        self.cuboids.len()
    }

    /// Whether the decomposition has no cuboids.
    pub fn is_empty(&self) -> bool {
        self.cuboids.is_empty()
    }

    /// Spatial dimension (2 or 3).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The bounding cuboid that was split.
    pub fn mother(&self) -> &Cuboid {
        &self.mother
    }

    /// Lattice spacing.
    pub fn delta_r(&self) -> f64 {
        self.mother.delta_r()
    }

    /// Cuboid by id.
    pub fn get(&self, id: CuboidId) -> Result<&Cuboid, GeometryError> {
        self.cuboids.get(id.index()).ok_or(GeometryError::InvalidCuboid {
            id,
            count: self.cuboids.len(),
        })
    }

    /// Mutable cuboid by id.
    pub fn get_mut(&mut self, id: CuboidId) -> Result<&mut Cuboid, GeometryError> {
        let count = self.cuboids.len();
        self.cuboids
            .get_mut(id.index())
            .ok_or(GeometryError::InvalidCuboid { id, count })
    }

    /// All cuboids with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (CuboidId, &Cuboid)> {
        self.cuboids
            .iter()
            .enumerate()
            .map(|(i, c)| (CuboidId(i as u32), c))
    }

    /// Per-cuboid weights, in id order.
    pub fn weights(&self) -> Vec<u64> {
        self.cuboids.iter().map(Cuboid::weight).collect()
    }

    /// Per-axis periodicity.
    pub fn periodicity(&self) -> [bool; 3] {
        self.periodic
    }

    /// Set per-axis periodicity. Axes beyond the dimension are ignored.
    pub fn set_periodicity(&mut self, periodic: [bool; 3]) {
        self.periodic = periodic;
        if self.dim == 2 {
            self.periodic[2] = false;
        }
    }

    /// Cuboid containing a global lattice site.
    pub fn cuboid_of(&self, global: LatticeCoord) -> Option<CuboidId> {
        self.cuboids
            .iter()
            .position(|c| c.contains_global(global))
            .map(|i| CuboidId(i as u32))
    }

    /// Map a physical point to `(cuboid, local coordinate)`.
    ///
    /// The point snaps to the nearest site. Periodic axes wrap; on other
    /// axes a point more than half a spacing (plus [`SNAP_TOLERANCE`])
    /// outside the domain is not found.
    pub fn find(&self, p: [f64; 3]) -> Option<(CuboidId, LatticeCoord)> {
        let global = self.phys_to_global(p)?;
        let id = self.cuboid_of(global)?;
        let offset = self.cuboids[id.index()].offset();
        Some((id, [0, 1, 2].map(|a| global[a] - offset[a])))
    }

    /// Physical point to global lattice site, with periodic wrap.
    pub fn phys_to_global(&self, p: [f64; 3]) -> Option<LatticeCoord> {
        let origin = self.mother.origin();
        let extent = self.mother.extent();
        let dr = self.mother.delta_r();
        let mut g = [0; 3];
        for a in 0..3 {
            if a >= self.dim {
                continue;
            }
            let f = (p[a] - origin[a]) / dr;
            let n = f.round() as i32;
            g[a] = if self.periodic[a] {
                n.rem_euclid(extent[a])
            } else if f < -0.5 - SNAP_TOLERANCE || f > f64::from(extent[a]) - 0.5 + SNAP_TOLERANCE {
                return None;
            } else {
                n.clamp(0, extent[a] - 1)
            };
        }
        Some(g)
    }

    /// Fold a global lattice site into the domain along periodic axes.
    /// Other axes are left as they are, so sites beyond a wall stay
    /// outside.
    pub fn wrap_global(&self, g: LatticeCoord) -> LatticeCoord {
        let extent = self.mother.extent();
        let offset = self.mother.offset();
        [0, 1, 2].map(|a| {
            if self.periodic[a] && a < self.dim {
                offset[a] + (g[a] - offset[a]).rem_euclid(extent[a])
            } else {
                g[a]
            }
        })
    }

    /// Physical position of a global lattice site.
    pub fn global_to_phys(&self, g: LatticeCoord) -> [f64; 3] {
        self.mother.local_to_phys(g)
    }

    /// Periodic translations to consider: `{-L, 0, L}` on periodic axes.
    fn image_shifts(&self) -> SmallVec<[LatticeCoord; 27]> {
        let extent = self.mother.extent();
        let choices = |a: usize| -> SmallVec<[i32; 3]> {
            if self.periodic[a] && a < self.dim {
                smallvec::smallvec![0, -extent[a], extent[a]]
            } else {
                smallvec::smallvec![0]
            }
        };
        let mut out = SmallVec::new();
        for &sz in &choices(2) {
            for &sy in &choices(1) {
                for &sx in &choices(0) {
                    out.push([sx, sy, sz]);
                }
            }
        }
        out
    }

    /// Every source region feeding the halo of `id` at `width` sites.
    ///
    /// Sources are listed in (source id, shift) order. A cuboid may
    /// appear as its own source through a periodic image.
    pub fn halo_sources(&self, id: CuboidId, width: i32) -> Result<Vec<HaloOverlap>, GeometryError> {
        let core = self.get(id)?.bounds();
        let padded = core.grow(width, self.dim);
        let shifts = self.image_shifts();
        let mut out = Vec::new();
        for (src, c) in self.iter() {
            for &shift in &shifts {
                if src == id && shift == [0; 3] {
                    continue;
                }
                if let Some(region) = c.bounds().translate(shift).intersect(&padded) {
                    out.push(HaloOverlap {
                        source: src,
                        shift,
                        region,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Distinct cuboids sharing sites with the halo of `id`.
    pub fn neighbours(&self, id: CuboidId, width: i32) -> Result<Vec<CuboidId>, GeometryError> {
        let mut ids: Vec<CuboidId> = self.halo_sources(id, width)?.iter().map(|h| h.source).collect();
        ids.dedup();
        Ok(ids)
    }
}

/// Grid shape `[nx, ny, nz]` with `nx * ny * nz == count` minimising the
/// total cut area, or `None` if no shape fits the extent.
fn grid_shape(extent: [i32; 3], dim: usize, count: usize) -> Option<[i32; 3]> {
    let count = i32::try_from(count).ok().filter(|&c| c > 0)?;
    let [ex, ey, ez] = extent.map(i64::from);
    let mut best: Option<([i32; 3], i64)> = None;
    for nx in 1..=count {
        if count % nx != 0 {
            continue;
        }
        for ny in 1..=count / nx {
            if (count / nx) % ny != 0 {
                continue;
            }
            let nz = count / nx / ny;
            if dim == 2 && nz != 1 {
                continue;
            }
            if nx > extent[0] || ny > extent[1] || nz > extent[2] {
                continue;
            }
            let cut = i64::from(nx - 1) * ey * ez + i64::from(ny - 1) * ex * ez + i64::from(nz - 1) * ex * ey;
            if best.is_none_or(|(_, c)| cut < c) {
                best = Some(([nx, ny, nz], cut));
            }
        }
    }
    best.map(|(s, _)| s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::IndicatorSphere;

    fn square(n: i32, count: usize) -> CuboidDecomposition {
        CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, [n, n, 1]), 2, count).unwrap()
    }

    #[test]
    fn grid_shape_prefers_short_cuts() {
        assert_eq!(grid_shape([8, 4, 1], 2, 2), Some([2, 1, 1]));
        assert_eq!(grid_shape([4, 8, 1], 2, 2), Some([1, 2, 1]));
        assert_eq!(grid_shape([8, 8, 8], 3, 8), Some([2, 2, 2]));
        assert_eq!(grid_shape([2, 2, 1], 2, 5), None);
    }

    #[test]
    fn wrap_folds_periodic_axes_only() {
        let mut d = square(4, 2);
        d.set_periodicity([true, false, false]);
        assert_eq!(d.wrap_global([-1, -1, 0]), [3, -1, 0]);
        assert_eq!(d.wrap_global([4, 4, 0]), [0, 4, 0]);
        assert_eq!(d.wrap_global([2, 1, 0]), [2, 1, 0]);
    }

    #[test]
    fn get_out_of_range_fails() {
        let d = square(4, 1);
        assert!(d.get(CuboidId(0)).is_ok());
        assert_eq!(
            d.get(CuboidId(1)).unwrap_err(),
            GeometryError::InvalidCuboid {
                id: CuboidId(1),
                count: 1
            }
        );
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let c = Cuboid::new([0.0; 3], 1.0, [4, 4, 1]);
        assert_eq!(
            CuboidDecomposition::new(c.clone(), 4, 1).unwrap_err(),
            GeometryError::InvalidDimension(4)
        );
        assert!(matches!(
            CuboidDecomposition::new(c, 2, 17),
            Err(GeometryError::TooManyCuboids { requested: 17, .. })
        ));
        assert!(matches!(
            CuboidDecomposition::new(Cuboid::new([0.0; 3], 0.0, [4, 4, 1]), 2, 1),
            Err(GeometryError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn find_wraps_on_periodic_axes_only() {
        let mut d = square(8, 4);
        assert_eq!(d.find([-1.0, 0.0, 0.0]), None);
        d.set_periodicity([true, false, false]);
        let (id, local) = d.find([-1.0, 0.0, 0.0]).unwrap();
        assert_eq!(d.get(id).unwrap().offset()[0] + local[0], 7);
        assert_eq!(d.find([0.0, 8.0, 0.0]), None);
    }

    #[test]
    fn find_snaps_to_nearest_site() {
        let d = square(8, 4);
        let (id, local) = d.find([5.4, 1.6, 0.0]).unwrap();
        let c = d.get(id).unwrap();
        assert_eq!([c.offset()[0] + local[0], c.offset()[1] + local[1]], [5, 2]);
        assert!(d.find([7.49, 0.0, 0.0]).is_some());
        assert!(d.find([7.6, 0.0, 0.0]).is_none());
    }

    #[test]
    fn non_periodic_halo_sources_are_direct_neighbours() {
        let d = CuboidDecomposition::new(Cuboid::new([0.0; 3], 1.0, [8, 4, 1]), 2, 2).unwrap();
        let h = d.halo_sources(CuboidId(0), 1).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].source, CuboidId(1));
        assert_eq!(h[0].shift, [0; 3]);
        assert_eq!(h[0].region, LatticeBox::new([4, 0, 0], [5, 4, 1]));
    }

    #[test]
    fn periodic_single_cuboid_is_its_own_neighbour() {
        let mut d = square(4, 1);
        d.set_periodicity([true, true, false]);
        let h = d.halo_sources(CuboidId(0), 1).unwrap();
        // Four edges and four corners.
        assert_eq!(h.len(), 8);
        assert!(h.iter().all(|o| o.source == CuboidId(0)));
        let covered: u64 = h.iter().map(|o| o.region.volume()).sum();
        assert_eq!(covered, 6 * 6 - 16);
    }

    #[test]
    fn indicator_weights_count_full_sites() {
        let disc = IndicatorSphere::circle([0.0, 0.0], 2.0);
        let d = CuboidDecomposition::from_indicator(&disc, 1.0, 2, 1).unwrap();
        assert_eq!(d.get(CuboidId(0)).unwrap().extent(), [5, 5, 1]);
        // Sites with x^2 + y^2 <= 4 on the integer grid.
        assert_eq!(d.weights(), vec![13]);
    }
}
