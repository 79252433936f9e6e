//! Lattice descriptors: velocity stencils, weights, and auxiliary fields.
//!
//! A [`Descriptor`] fixes, at compile time, everything that is shared by
//! every cell of a block: the spatial dimension `D`, the number of
//! discrete velocities `Q`, the lattice vectors and their quadrature
//! weights, and the table of auxiliary per-cell fields a block may
//! allocate.
//!
//! ```text
//! D2Q9 numbering
//!
//!   6   2   5
//!    \  |  /
//!   3 - 0 - 1
//!    /  |  \
//!   7   4   8
//! ```

use std::fmt;

use crate::field::{FieldDef, FieldId};

/// Largest `Q` of any descriptor in this crate. Kernels size their
/// per-cell scratch buffers with it.
pub const MAX_Q: usize = 27;

/// Compile-time description of a lattice stencil.
///
/// Lattice vectors are always stored with three components; 2D
/// descriptors keep the third component zero.
pub trait Descriptor: Copy + Send + Sync + fmt::Debug + 'static {
    /// Spatial dimension (2 or 3).
    const D: usize;
    /// Number of discrete velocities.
    const Q: usize;
    /// Short name used in logs (e.g. `"D2Q9"`).
    const NAME: &'static str;
    /// Lattice vectors `c_i`.
    const C: &'static [[i32; 3]];
    /// Quadrature weights `w_i`; they sum to one.
    const W: &'static [f64];
    /// `OPPOSITE[i]` is the index of `-c_i`.
    const OPPOSITE: &'static [usize];
    /// Auxiliary per-cell fields this descriptor may allocate.
    const FIELDS: &'static [FieldDef];
    /// Inverse squared lattice speed of sound.
    const INV_CS2: f64 = 3.0;

    /// Position of `field` in [`Descriptor::FIELDS`], if declared.
    fn field_slot(field: FieldId) -> Option<usize> {
        Self::FIELDS.iter().position(|f| f.id == field)
    }

    /// Definition of `field`, if declared.
    fn field_def(field: FieldId) -> Option<&'static FieldDef> {
        Self::FIELDS.iter().find(|f| f.id == field)
    }

    /// Second-order equilibrium population for direction `i`.
    ///
    /// `u_sqr` must equal `u·u`; it is passed in so callers evaluating
    /// all `Q` directions compute it once.
    #[inline]
    fn equilibrium(i: usize, rho: f64, u: [f64; 3], u_sqr: f64) -> f64 {
        let c = Self::C[i];
        let cu = c[0] as f64 * u[0] + c[1] as f64 * u[1] + c[2] as f64 * u[2];
        let k = Self::INV_CS2;
        Self::W[i] * rho * (1.0 + k * cu + 0.5 * k * k * cu * cu - 0.5 * k * u_sqr)
    }

    /// Density and velocity moments of a population vector.
    #[inline]
    fn rho_u(pops: &[f64]) -> (f64, [f64; 3]) {
        debug_assert_eq!(pops.len(), Self::Q);
        let mut rho = 0.0;
        let mut j = [0.0; 3];
        for (i, f) in pops.iter().enumerate() {
            let c = Self::C[i];
            rho += f;
            j[0] += f * c[0] as f64;
            j[1] += f * c[1] as f64;
            j[2] += f * c[2] as f64;
        }
        if rho.abs() < f64::EPSILON {
            return (rho, [0.0; 3]);
        }
        (rho, [j[0] / rho, j[1] / rho, j[2] / rho])
    }
}

const FIELDS_2D: &[FieldDef] = &[
    FieldDef::new(FieldId::FORCE, "force", 2),
    FieldDef::new(FieldId::VELOCITY, "velocity", 2),
    FieldDef::new(FieldId::DENSITY, "density", 1),
    FieldDef::new(FieldId::SCALAR, "scalar", 1),
];

const FIELDS_3D: &[FieldDef] = &[
    FieldDef::new(FieldId::FORCE, "force", 3),
    FieldDef::new(FieldId::VELOCITY, "velocity", 3),
    FieldDef::new(FieldId::DENSITY, "density", 1),
    FieldDef::new(FieldId::SCALAR, "scalar", 1),
];

// ── D2Q9 ───────────────────────────────────────────────────────────

/// Two-dimensional, nine-velocity stencil.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D2Q9;

impl Descriptor for D2Q9 {
    const D: usize = 2;
    const Q: usize = 9;
    const NAME: &'static str = "D2Q9";
    const C: &'static [[i32; 3]] = &[
        [0, 0, 0],
        [1, 0, 0],
        [0, 1, 0],
        [-1, 0, 0],
        [0, -1, 0],
        [1, 1, 0],
        [-1, 1, 0],
        [-1, -1, 0],
        [1, -1, 0],
    ];
    const W: &'static [f64] = &[
        4.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 9.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
    ];
    const OPPOSITE: &'static [usize] = &[0, 3, 4, 1, 2, 7, 8, 5, 6];
    const FIELDS: &'static [FieldDef] = FIELDS_2D;
}

// ── D3Q19 ──────────────────────────────────────────────────────────

/// Three-dimensional, nineteen-velocity stencil.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3Q19;

impl Descriptor for D3Q19 {
    const D: usize = 3;
    const Q: usize = 19;
    const NAME: &'static str = "D3Q19";
    const C: &'static [[i32; 3]] = &[
        [0, 0, 0],
        [-1, 0, 0],
        [0, -1, 0],
        [0, 0, -1],
        [-1, -1, 0],
        [-1, 1, 0],
        [-1, 0, -1],
        [-1, 0, 1],
        [0, -1, -1],
        [0, -1, 1],
        [1, 0, 0],
        [0, 1, 0],
        [0, 0, 1],
        [1, 1, 0],
        [1, -1, 0],
        [1, 0, 1],
        [1, 0, -1],
        [0, 1, 1],
        [0, 1, -1],
    ];
    const W: &'static [f64] = &[
        1.0 / 3.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 18.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
        1.0 / 36.0,
    ];
    const OPPOSITE: &'static [usize] = &[
        0, 10, 11, 12, 13, 14, 15, 16, 17, 18, 1, 2, 3, 4, 5, 6, 7, 8, 9,
    ];
    const FIELDS: &'static [FieldDef] = FIELDS_3D;
}

// ── D3Q27 ──────────────────────────────────────────────────────────

/// Three-dimensional, twenty-seven-velocity stencil.
///
/// Directions are enumerated in `z`-major, then `y`, then `x` order over
/// `{-1, 0, 1}^3`, so the rest population sits at index 13 and the
/// opposite of `i` is `26 - i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct D3Q27;

const fn d3q27_vectors() -> [[i32; 3]; 27] {
    let mut out = [[0; 3]; 27];
    let mut i = 0;
    while i < 27 {
        out[i] = [(i % 3) as i32 - 1, ((i / 3) % 3) as i32 - 1, (i / 9) as i32 - 1];
        i += 1;
    }
    out
}

const fn d3q27_weights() -> [f64; 27] {
    let c = d3q27_vectors();
    let mut out = [0.0; 27];
    let mut i = 0;
    while i < 27 {
        let nonzero = (c[i][0] != 0) as u32 + (c[i][1] != 0) as u32 + (c[i][2] != 0) as u32;
        out[i] = match nonzero {
            0 => 8.0 / 27.0,
            1 => 2.0 / 27.0,
            2 => 1.0 / 54.0,
            _ => 1.0 / 216.0,
        };
        i += 1;
    }
    out
}

const fn d3q27_opposite() -> [usize; 27] {
    let mut out = [0; 27];
    let mut i = 0;
    while i < 27 {
        out[i] = 26 - i;
        i += 1;
    }
    out
}

const D3Q27_C: [[i32; 3]; 27] = d3q27_vectors();
const D3Q27_W: [f64; 27] = d3q27_weights();
const D3Q27_OPPOSITE: [usize; 27] = d3q27_opposite();

impl Descriptor for D3Q27 {
    const D: usize = 3;
    const Q: usize = 27;
    const NAME: &'static str = "D3Q27";
    const C: &'static [[i32; 3]] = &D3Q27_C;
    const W: &'static [f64] = &D3Q27_W;
    const OPPOSITE: &'static [usize] = &D3Q27_OPPOSITE;
    const FIELDS: &'static [FieldDef] = FIELDS_3D;
}
