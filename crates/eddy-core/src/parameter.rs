//! Named dynamics parameters and the per-instance [`ParameterSet`].
//!
//! Parameters are opt-in: a dynamics declares the [`ParameterId`]s it
//! accepts, and a block only stores values for the ids a given dynamics
//! instance declared. The set is a short inline vector scanned linearly,
//! so lookups inside a collision run never hash or allocate.

use std::fmt;

use smallvec::SmallVec;

/// Identifies a named parameter (e.g. the relaxation frequency).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterId(pub u32);

impl ParameterId {
    /// Relaxation frequency `omega = 1 / tau`.
    pub const OMEGA: ParameterId = ParameterId(0);
    /// Uniform body force applied by forced collision models.
    pub const BODY_FORCE: ParameterId = ParameterId(1);
    /// Prescribed density for density-type boundaries.
    pub const RHO: ParameterId = ParameterId(2);
    /// Prescribed velocity for velocity-type boundaries.
    pub const VELOCITY: ParameterId = ParameterId(3);
    /// First id available to user-defined parameters.
    pub const FIRST_CUSTOM: u32 = 64;

    /// A user-defined parameter id, offset past the built-in ones.
    pub const fn custom(n: u32) -> ParameterId {
        ParameterId(Self::FIRST_CUSTOM + n)
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OMEGA => write!(f, "OMEGA"),
            Self::BODY_FORCE => write!(f, "BODY_FORCE"),
            Self::RHO => write!(f, "RHO"),
            Self::VELOCITY => write!(f, "VELOCITY"),
            ParameterId(n) => write!(f, "param#{n}"),
        }
    }
}

/// Parameter values held by one dynamics instance within one block.
///
/// Values are stored as three-component vectors; scalar parameters use
/// the first component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    entries: SmallVec<[(ParameterId, [f64; 3]); 4]>,
}

impl ParameterSet {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar parameter, replacing any previous value.
    pub fn set_scalar(&mut self, id: ParameterId, value: f64) {
        self.set(id, [value, 0.0, 0.0]);
    }

    /// Set a vector parameter, replacing any previous value.
    pub fn set(&mut self, id: ParameterId, value: [f64; 3]) {
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some((_, v)) => *v = value,
            None => self.entries.push((id, value)),
        }
    }

    /// Scalar value of a parameter, if set.
    #[inline]
    pub fn scalar(&self, id: ParameterId) -> Option<f64> {
        self.vector(id).map(|v| v[0])
    }

    /// Vector value of a parameter, if set.
    #[inline]
    pub fn vector(&self, id: ParameterId) -> Option<[f64; 3]> {
        self.entries
            .iter()
            .find(|(k, _)| *k == id)
            .map(|(_, v)| *v)
    }

    /// Whether a value is stored for `id`.
    pub fn contains(&self, id: ParameterId) -> bool {
        self.entries.iter().any(|(k, _)| *k == id)
    }

    /// Number of stored parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameter is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
