//! Membership tests in physical space, consumed at setup.

/// A region of physical space.
///
/// Indicators are queried only while building decompositions, material
/// maps, and setup-time assignments; they never run inside the
/// per-iteration loop.
pub trait Indicator: Send + Sync {
    /// Axis-aligned physical bounds `(min, max)` enclosing the region.
    fn bounding_box(&self) -> ([f64; 3], [f64; 3]);

    /// Whether the physical point `p` lies inside the region.
    fn contains(&self, p: [f64; 3]) -> bool;
}

/// An axis-aligned physical box (closed on both ends).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndicatorCuboid {
    min: [f64; 3],
    max: [f64; 3],
}

impl IndicatorCuboid {
    /// Box spanning `min..=max`. Use equal `z` bounds for 2D domains.
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Box of the given size anchored at `origin`.
    pub fn with_extent(origin: [f64; 3], extent: [f64; 3]) -> Self {
        Self {
            min: origin,
            max: [origin[0] + extent[0], origin[1] + extent[1], origin[2] + extent[2]],
        }
    }
}

impl Indicator for IndicatorCuboid {
    fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        (self.min, self.max)
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        const EPS: f64 = 1e-12;
        (0..3).all(|a| p[a] >= self.min[a] - EPS && p[a] <= self.max[a] + EPS)
    }
}

/// A ball (a disc when `center[2]` and the queried `z` are zero).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndicatorSphere {
    center: [f64; 3],
    radius: f64,
    planar: bool,
}

impl IndicatorSphere {
    /// A 3D ball.
    pub fn new(center: [f64; 3], radius: f64) -> Self {
        Self {
            center,
            radius,
            planar: false,
        }
    }

    /// A 2D disc in the `z = center[2]` plane.
    pub fn circle(center: [f64; 2], radius: f64) -> Self {
        Self {
            center: [center[0], center[1], 0.0],
            radius,
            planar: true,
        }
    }
}

impl Indicator for IndicatorSphere {
    fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        let r = self.radius;
        let c = self.center;
        let rz = if self.planar { 0.0 } else { r };
        ([c[0] - r, c[1] - r, c[2] - rz], [c[0] + r, c[1] + r, c[2] + rz])
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        let dz = if self.planar { 0.0 } else { p[2] - self.center[2] };
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        dx * dx + dy * dy + dz * dz <= self.radius * self.radius
    }
}

/// Points inside `outer` but not inside `inner`.
pub struct IndicatorDifference<A, B> {
    outer: A,
    inner: B,
}

impl<A: Indicator, B: Indicator> IndicatorDifference<A, B> {
    /// `outer` minus `inner`.
    pub fn new(outer: A, inner: B) -> Self {
        Self { outer, inner }
    }
}

impl<A: Indicator, B: Indicator> Indicator for IndicatorDifference<A, B> {
    fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        self.outer.bounding_box()
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        self.outer.contains(p) && !self.inner.contains(p)
    }
}
