//! A single axis-aligned block of lattice sites.

use eddy_core::LatticeCoord;

use crate::lattice_box::LatticeBox;

/// An axis-aligned box of lattice sites with a physical placement.
///
/// `offset` is the global lattice position of the cuboid's first site;
/// `origin` is that site's physical position. Cuboids are immutable
/// apart from their workload weight.
#[derive(Clone, Debug, PartialEq)]
pub struct Cuboid {
    origin: [f64; 3],
    offset: LatticeCoord,
    extent: [i32; 3],
    delta_r: f64,
    weight: u64,
}

impl Cuboid {
    /// A cuboid at global offset zero. Its weight defaults to its volume.
    ///
    /// Two-dimensional cuboids use `extent[2] == 1`.
    pub fn new(origin: [f64; 3], delta_r: f64, extent: [i32; 3]) -> Self {
        Self::at_offset(origin, [0; 3], delta_r, extent)
    }

    pub(crate) fn at_offset(origin: [f64; 3], offset: LatticeCoord, delta_r: f64, extent: [i32; 3]) -> Self {
        let weight = extent.iter().map(|&e| e.max(0) as u64).product();
        Self {
            origin,
            offset,
            extent,
            delta_r,
            weight,
        }
    }

    /// Physical position of the first site.
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Global lattice position of the first site.
    pub fn offset(&self) -> LatticeCoord {
        self.offset
    }

    /// Sites per axis.
    pub fn extent(&self) -> [i32; 3] {
        self.extent
    }

    /// Lattice spacing.
    pub fn delta_r(&self) -> f64 {
        self.delta_r
    }

    /// Workload weight used by the load balancer.
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Replace the workload weight.
    pub fn set_weight(&mut self, weight: u64) {
        self.weight = weight;
    }

    /// Number of lattice sites.
    pub fn lattice_volume(&self) -> u64 {
        self.bounds().volume()
    }

    /// The cuboid's sites as a global lattice box.
    pub fn bounds(&self) -> LatticeBox {
        LatticeBox::from_extent(self.offset, self.extent)
    }

    /// Physical position of a local lattice coordinate.
    pub fn local_to_phys(&self, local: LatticeCoord) -> [f64; 3] {
        [0, 1, 2].map(|a| self.origin[a] + local[a] as f64 * self.delta_r)
    }

    /// Whether the global lattice coordinate lies in the cuboid.
    pub fn contains_global(&self, global: LatticeCoord) -> bool {
        self.bounds().contains(global)
    }

    /// Nearest local site to a physical point, if the point lies within
    /// half a spacing (plus `tolerance`, in lattice units) of the
    /// cuboid's sites.
    pub fn phys_to_local(&self, p: [f64; 3], tolerance: f64) -> Option<LatticeCoord> {
        let mut out = [0; 3];
        for a in 0..3 {
            let f = (p[a] - self.origin[a]) / self.delta_r;
            let hi = f64::from(self.extent[a]) - 0.5;
            if f < -0.5 - tolerance || f > hi + tolerance {
                return None;
            }
            out[a] = (f.round() as i32).clamp(0, self.extent[a] - 1);
        }
        Some(out)
    }

    /// Split into `n[a]` slabs along each axis, remainders going to the
    /// leading slabs. Returns the pieces in x-fastest order.
    pub fn split(&self, n: [i32; 3]) -> Vec<Cuboid> {
        let bounds = [0, 1, 2].map(|a| slab_bounds(self.extent[a], n[a]));
        let mut out = Vec::with_capacity((n[0] * n[1] * n[2]) as usize);
        for &(z0, ez) in &bounds[2] {
            for &(y0, ey) in &bounds[1] {
                for &(x0, ex) in &bounds[0] {
                    let local = [x0, y0, z0];
                    out.push(Cuboid::at_offset(
                        self.local_to_phys(local),
                        [0, 1, 2].map(|a| self.offset[a] + local[a]),
                        self.delta_r,
                        [ex, ey, ez],
                    ));
                }
            }
        }
        out
    }
}

/// `(start, length)` of `n` near-equal slabs covering `0..extent`.
fn slab_bounds(extent: i32, n: i32) -> Vec<(i32, i32)> {
    let base = extent / n;
    let rem = extent % n;
    let mut start = 0;
    (0..n)
        .map(|i| {
            let len = base + i32::from(i < rem);
            let s = (start, len);
            start += len;
            s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_defaults_to_volume() {
        let c = Cuboid::new([0.0; 3], 0.1, [4, 3, 1]);
        assert_eq!(c.weight(), 12);
        assert_eq!(c.lattice_volume(), 12);
    }

    #[test]
    fn phys_to_local_snaps_to_nearest() {
        let c = Cuboid::new([1.0, 2.0, 0.0], 0.5, [4, 4, 1]);
        assert_eq!(c.phys_to_local([1.6, 2.9, 0.0], 0.0), Some([1, 2, 0]));
        assert_eq!(c.phys_to_local([1.0 - 0.2, 2.0, 0.0], 0.0), Some([0, 0, 0]));
        assert_eq!(c.phys_to_local([1.0 - 0.3, 2.0, 0.0], 0.0), None);
        assert_eq!(c.phys_to_local([1.0 - 0.3, 2.0, 0.0], 0.2), Some([0, 0, 0]));
    }

    #[test]
    fn split_covers_parent_exactly() {
        let c = Cuboid::new([0.0; 3], 1.0, [7, 5, 1]);
        let parts = c.split([3, 2, 1]);
        assert_eq!(parts.len(), 6);
        let total: u64 = parts.iter().map(Cuboid::lattice_volume).sum();
        assert_eq!(total, 35);
        assert_eq!(parts[0].extent(), [3, 3, 1]);
        assert_eq!(parts[1].offset(), [3, 0, 0]);
        assert_eq!(parts[3].offset(), [0, 3, 0]);
        assert_eq!(parts[5].extent(), [2, 2, 1]);
        assert_eq!(parts[5].origin(), [5.0, 3.0, 0.0]);
    }

    #[test]
    fn slab_bounds_distribute_remainder_first() {
        assert_eq!(slab_bounds(10, 3), vec![(0, 4), (4, 3), (7, 3)]);
    }
}
