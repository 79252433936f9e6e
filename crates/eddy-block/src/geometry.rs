//! Index arithmetic for a padded block.
//!
//! A block stores its core sites plus `overlap` layers of halo sites on
//! each side of every active axis. Local coordinates of core sites run
//! over `0..extent`; halo sites have coordinates in `-overlap..0` and
//! `extent..extent + overlap`. Flat indices are x-fastest over the
//! padded box.

use eddy_core::LatticeCoord;
use eddy_geometry::LatticeBox;

use crate::error::BlockError;

/// Shape of one padded block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockGeometry {
    extent: [i32; 3],
    overlap: i32,
    dim: usize,
    padded: [i32; 3],
}

impl BlockGeometry {
    /// Geometry of a block with `extent` core sites and `overlap` halo
    /// layers. Two-dimensional blocks must have `extent[2] == 1`.
    pub fn new(extent: [i32; 3], overlap: i32, dim: usize) -> Result<Self, BlockError> {
        if overlap < 1 {
            return Err(BlockError::OverlapTooSmall(overlap));
        }
        if !(2..=3).contains(&dim) || extent[..dim].iter().any(|&e| e < 1) || (dim == 2 && extent[2] != 1) {
            return Err(BlockError::InvalidExtent(extent));
        }
        let mut padded = extent;
        for p in padded.iter_mut().take(dim) {
            *p += 2 * overlap;
        }
        Ok(Self {
            extent,
            overlap,
            dim,
            padded,
        })
    }

    /// Core sites per axis.
    pub fn extent(&self) -> [i32; 3] {
        self.extent
    }

    /// Halo width.
    pub fn overlap(&self) -> i32 {
        self.overlap
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Padded sites per axis.
    pub fn padded_extent(&self) -> [i32; 3] {
        self.padded
    }

    /// Total number of stored sites, halo included.
    pub fn cell_count(&self) -> usize {
        self.padded.iter().map(|&e| e as usize).product()
    }

    /// Number of core sites.
    pub fn core_count(&self) -> usize {
        self.extent.iter().map(|&e| e as usize).product()
    }

    fn pad(&self, axis: usize) -> i32 {
        if axis < self.dim {
            self.overlap
        } else {
            0
        }
    }

    /// Core sites as a box in local coordinates.
    pub fn core_box(&self) -> LatticeBox {
        LatticeBox::from_extent([0; 3], self.extent)
    }

    /// All stored sites as a box in local coordinates.
    pub fn padded_box(&self) -> LatticeBox {
        LatticeBox::new(
            [0, 1, 2].map(|a| -self.pad(a)),
            [0, 1, 2].map(|a| self.extent[a] + self.pad(a)),
        )
    }

    /// Whether `local` lies in the padded block.
    pub fn contains(&self, local: LatticeCoord) -> bool {
        self.padded_box().contains(local)
    }

    /// Flat index of a local coordinate.
    ///
    /// The coordinate must lie in the padded block; this is checked only
    /// in debug builds.
    #[inline]
    pub fn cell_index(&self, local: LatticeCoord) -> usize {
        debug_assert!(self.contains(local), "coordinate {local:?} outside padded block");
        let x = (local[0] + self.pad(0)) as usize;
        let y = (local[1] + self.pad(1)) as usize;
        let z = (local[2] + self.pad(2)) as usize;
        x + self.padded[0] as usize * (y + self.padded[1] as usize * z)
    }

    /// Checked variant of [`BlockGeometry::cell_index`].
    pub fn try_cell_index(&self, local: LatticeCoord) -> Result<usize, BlockError> {
        if self.contains(local) {
            Ok(self.cell_index(local))
        } else {
            Err(BlockError::OutOfBounds(local))
        }
    }

    /// Local coordinate of a flat index.
    pub fn coord(&self, index: usize) -> LatticeCoord {
        let sx = self.padded[0] as usize;
        let sy = self.padded[1] as usize;
        let x = (index % sx) as i32;
        let y = ((index / sx) % sy) as i32;
        let z = (index / (sx * sy)) as i32;
        [x - self.pad(0), y - self.pad(1), z - self.pad(2)]
    }

    /// Flat-index displacement of a lattice vector.
    #[inline]
    pub fn flat_offset(&self, c: [i32; 3]) -> isize {
        let sx = self.padded[0] as isize;
        let sy = self.padded[1] as isize;
        c[0] as isize + sx * (c[1] as isize + sy * c[2] as isize)
    }

    /// Whether a flat index is a core site.
    pub fn is_core(&self, index: usize) -> bool {
        self.core_box().contains(self.coord(index))
    }

    /// Flat indices of the sites in `region` (local frame), clipped to
    /// the padded block, in x-fastest order.
    pub fn indices_in(&self, region: &LatticeBox) -> Vec<usize> {
        match region.intersect(&self.padded_box()) {
            Some(b) => b.iter().map(|p| self.cell_index(p)).collect(),
            None => Vec::new(),
        }
    }

    /// Core rows as `(start, len)` runs of consecutive flat indices.
    pub fn core_rows(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let [_, ny, nz] = self.extent;
        (0..nz).flat_map(move |z| (0..ny).map(move |y| (self.cell_index([0, y, z]), self.extent[0] as usize)))
    }
}
