//! Per-site material tags.

use eddy_core::LatticeCoord;

use crate::decomposition::CuboidDecomposition;
use crate::indicator::Indicator;
use crate::lattice_box::LatticeBox;

/// Source of integer material tags, addressed by global lattice site.
///
/// Material tags are owned by the geometry; the engine only reads them
/// at setup to decide which dynamics and post-processors go where.
pub trait MaterialSource: Send + Sync {
    /// Tag of the site at `global`. Sites outside the domain return 0.
    fn material(&self, global: LatticeCoord) -> i32;
}

/// Dense material map over a decomposition's bounding box.
#[derive(Clone, Debug)]
pub struct MaterialGeometry {
    bounds: LatticeBox,
    origin: [f64; 3],
    delta_r: f64,
    tags: Vec<i32>,
}

impl MaterialGeometry {
    /// Every site tagged `fill`.
    pub fn new(decomposition: &CuboidDecomposition, fill: i32) -> Self {
        let mother = decomposition.mother();
        let bounds = mother.bounds();
        Self {
            bounds,
            origin: mother.origin(),
            delta_r: mother.delta_r(),
            tags: vec![fill; bounds.volume() as usize],
        }
    }

    fn index(&self, g: LatticeCoord) -> Option<usize> {
        if !self.bounds.contains(g) {
            return None;
        }
        let e = self.bounds.extent();
        let l = [0, 1, 2].map(|a| (g[a] - self.bounds.lo[a]) as usize);
        Some(l[0] + e[0] as usize * (l[1] + e[1] as usize * l[2]))
    }

    fn phys(&self, g: LatticeCoord) -> [f64; 3] {
        [0, 1, 2].map(|a| self.origin[a] + f64::from(g[a] - self.bounds.lo[a]) * self.delta_r)
    }

    /// Set the tag of one site. Out-of-domain sites are ignored.
    pub fn set(&mut self, global: LatticeCoord, tag: i32) {
        if let Some(i) = self.index(global) {
            self.tags[i] = tag;
        }
    }

    /// Retag every site inside `indicator` to `tag`.
    pub fn set_inside(&mut self, indicator: &dyn Indicator, tag: i32) -> usize {
        let mut n = 0;
        for g in self.bounds.iter() {
            if indicator.contains(self.phys(g)) {
                self.set(g, tag);
                n += 1;
            }
        }
        n
    }

    /// Retag sites currently tagged `from` to `to`, optionally only
    /// inside `indicator`.
    pub fn rename(&mut self, from: i32, to: i32, indicator: Option<&dyn Indicator>) -> usize {
        let mut n = 0;
        for g in self.bounds.iter() {
            let inside = indicator.is_none_or(|ind| ind.contains(self.phys(g)));
            if inside && self.material(g) == from {
                self.set(g, to);
                n += 1;
            }
        }
        n
    }

    /// Retag the outermost layer of sites tagged `from` to `to`: sites
    /// with at least one face neighbour outside the domain or tagged 0.
    pub fn rename_boundary(&mut self, from: i32, to: i32, dim: usize) -> usize {
        let mut hits = Vec::new();
        for g in self.bounds.iter() {
            if self.material(g) != from {
                continue;
            }
            let exposed = (0..dim).any(|a| {
                [-1, 1].into_iter().any(|d| {
                    let mut n = g;
                    n[a] += d;
                    self.material(n) == 0
                })
            });
            if exposed {
                hits.push(g);
            }
        }
        for g in &hits {
            self.set(*g, to);
        }
        hits.len()
    }

    /// Number of sites tagged `tag`.
    pub fn count(&self, tag: i32) -> usize {
        self.tags.iter().filter(|&&t| t == tag).count()
    }
}

impl MaterialSource for MaterialGeometry {
    fn material(&self, global: LatticeCoord) -> i32 {
        self.index(global).map_or(0, |i| self.tags[i])
    }
}
