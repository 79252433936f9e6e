//! Half-open integer boxes on the global lattice.

use eddy_core::LatticeCoord;

/// A half-open axis-aligned box `[lo, hi)` of lattice coordinates.
///
/// A box is empty when `hi <= lo` on any axis. Two-dimensional boxes
/// span `z` in `[0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LatticeBox {
    /// Inclusive lower corner.
    pub lo: LatticeCoord,
    /// Exclusive upper corner.
    pub hi: LatticeCoord,
}

impl LatticeBox {
    /// Box from its inclusive lower and exclusive upper corners.
    pub const fn new(lo: LatticeCoord, hi: LatticeCoord) -> Self {
        Self { lo, hi }
    }

    /// Box at `lo` with the given per-axis extent.
    pub fn from_extent(lo: LatticeCoord, extent: [i32; 3]) -> Self {
        Self {
            lo,
            hi: [lo[0] + extent[0], lo[1] + extent[1], lo[2] + extent[2]],
        }
    }

    /// Per-axis extent (zero for empty axes).
    pub fn extent(&self) -> [i32; 3] {
        [0, 1, 2].map(|a| (self.hi[a] - self.lo[a]).max(0))
    }

    /// Number of lattice sites.
    pub fn volume(&self) -> u64 {
        self.extent().iter().map(|&e| e as u64).product()
    }

    /// Whether the box has no sites.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|a| self.hi[a] <= self.lo[a])
    }

    /// Whether `p` lies inside.
    pub fn contains(&self, p: LatticeCoord) -> bool {
        (0..3).all(|a| p[a] >= self.lo[a] && p[a] < self.hi[a])
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_box(&self, other: &LatticeBox) -> bool {
        other.is_empty() || (0..3).all(|a| other.lo[a] >= self.lo[a] && other.hi[a] <= self.hi[a])
    }

    /// Intersection, or `None` if empty.
    pub fn intersect(&self, other: &LatticeBox) -> Option<LatticeBox> {
        let b = LatticeBox {
            lo: [0, 1, 2].map(|a| self.lo[a].max(other.lo[a])),
            hi: [0, 1, 2].map(|a| self.hi[a].min(other.hi[a])),
        };
        (!b.is_empty()).then_some(b)
    }

    /// The box shifted by `shift`.
    pub fn translate(&self, shift: LatticeCoord) -> LatticeBox {
        LatticeBox {
            lo: [0, 1, 2].map(|a| self.lo[a] + shift[a]),
            hi: [0, 1, 2].map(|a| self.hi[a] + shift[a]),
        }
    }

    /// The box grown by `width` on both sides of the first `dim` axes.
    pub fn grow(&self, width: i32, dim: usize) -> LatticeBox {
        let mut b = *self;
        for a in 0..dim {
            b.lo[a] -= width;
            b.hi[a] += width;
        }
        b
    }

    /// Iterate sites in x-fastest order.
    pub fn iter(&self) -> impl Iterator<Item = LatticeCoord> {
        let [lx, ly, lz] = self.lo;
        let [hx, hy, hz] = self.hi;
        (lz..hz).flat_map(move |z| (ly..hy).flat_map(move |y| (lx..hx).map(move |x| [x, y, z])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn volume_and_emptiness() {
        let b = LatticeBox::from_extent([0, 0, 0], [4, 3, 1]);
        assert_eq!(b.volume(), 12);
        assert!(!b.is_empty());
        assert!(LatticeBox::new([2, 0, 0], [2, 5, 1]).is_empty());
        assert_eq!(LatticeBox::new([3, 0, 0], [1, 1, 1]).volume(), 0);
    }

    #[test]
    fn grow_respects_dimension() {
        let b = LatticeBox::from_extent([0, 0, 0], [4, 4, 1]).grow(2, 2);
        assert_eq!(b, LatticeBox::new([-2, -2, 0], [6, 6, 1]));
    }

    #[test]
    fn iteration_is_x_fastest() {
        let b = LatticeBox::from_extent([1, 1, 0], [2, 2, 1]);
        let v: Vec<_> = b.iter().collect();
        assert_eq!(v, vec![[1, 1, 0], [2, 1, 0], [1, 2, 0], [2, 2, 0]]);
    }

    fn arb_box() -> impl Strategy<Value = LatticeBox> {
        (prop::array::uniform3(-8i32..8), prop::array::uniform3(1i32..6))
            .prop_map(|(lo, ext)| LatticeBox::from_extent(lo, ext))
    }

    proptest! {
        #[test]
        fn intersection_is_contained_in_both(a in arb_box(), b in arb_box()) {
            if let Some(i) = a.intersect(&b) {
                prop_assert!(a.contains_box(&i));
                prop_assert!(b.contains_box(&i));
                prop_assert_eq!(i.iter().count() as u64, i.volume());
            } else {
                prop_assert!(a.iter().all(|p| !b.contains(p)));
            }
        }
    }
}
