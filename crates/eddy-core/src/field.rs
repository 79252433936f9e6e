//! Field identifiers, auxiliary field definitions, and the [`FieldSet`] bitset.
//!
//! Every lattice cell holds the `Q` populations of its descriptor plus a
//! descriptor-declared set of auxiliary per-cell fields (external force,
//! prescribed velocity, passive scalars). Fields are addressed by
//! [`FieldId`]; the populations themselves use the reserved
//! [`FieldId::POPULATION`] so that communicators can request them through
//! the same [`FieldSet`] as any other field.

use std::fmt;

/// Identifies a per-cell field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

impl FieldId {
    /// The distribution functions (`Q` components per cell).
    pub const POPULATION: FieldId = FieldId(0);
    /// External body force per cell (`D` components).
    pub const FORCE: FieldId = FieldId(1);
    /// Cell velocity, written by momenta post-processors (`D` components).
    pub const VELOCITY: FieldId = FieldId(2);
    /// Cell density, written by momenta post-processors (1 component).
    pub const DENSITY: FieldId = FieldId(3);
    /// A passive scalar for user coupling (1 component).
    pub const SCALAR: FieldId = FieldId(4);
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::POPULATION => write!(f, "population"),
            Self::FORCE => write!(f, "force"),
            Self::VELOCITY => write!(f, "velocity"),
            Self::DENSITY => write!(f, "density"),
            Self::SCALAR => write!(f, "scalar"),
            FieldId(n) => write!(f, "field#{n}"),
        }
    }
}

impl From<u32> for FieldId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Static definition of an auxiliary field declared by a descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDef {
    /// Field identifier.
    pub id: FieldId,
    /// Human-readable name for logging.
    pub name: &'static str,
    /// Number of `f64` components per cell.
    pub components: usize,
}

impl FieldDef {
    /// Create a field definition.
    pub const fn new(id: FieldId, name: &'static str, components: usize) -> Self {
        Self {
            id,
            name,
            components,
        }
    }
}

/// A set of field ids, stored as a 128-bit mask.
///
/// Used by communicators to declare which fields a stage exchanges, and
/// by post-processors to declare the fields they require communicated
/// after their stage. Field ids must be below [`FieldSet::CAPACITY`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldSet {
    mask: u128,
}

impl FieldSet {
    /// Largest representable field id plus one.
    pub const CAPACITY: u32 = 128;

    /// Create an empty field set.
    pub const fn empty() -> Self {
        Self { mask: 0 }
    }

    /// A set holding only the populations.
    pub const fn populations() -> Self {
        Self { mask: 1 }
    }

    /// Raw membership mask, bit `n` set for `FieldId(n)`.
    pub const fn bits(&self) -> u128 {
        self.mask
    }

    /// Set from a raw mask produced by [`FieldSet::bits`].
    pub const fn from_bits(mask: u128) -> Self {
        Self { mask }
    }

    /// Insert a field id into the set.
    ///
    /// # Panics
    ///
    /// Panics if `field.0 >= FieldSet::CAPACITY`.
    pub fn insert(&mut self, field: FieldId) {
        assert!(
            field.0 < Self::CAPACITY,
            "field id {} exceeds FieldSet capacity {}",
            field.0,
            Self::CAPACITY
        );
        self.mask |= 1u128 << field.0;
    }

    /// Builder-style insert.
    pub fn with(mut self, field: FieldId) -> Self {
        self.insert(field);
        self
    }

    /// Check whether the set contains a field id.
    pub fn contains(&self, field: FieldId) -> bool {
        field.0 < Self::CAPACITY && self.mask & (1u128 << field.0) != 0
    }

    /// Return the union of two sets (`self | other`).
    pub fn union(&self, other: &Self) -> Self {
        Self {
            mask: self.mask | other.mask,
        }
    }

    /// Check whether `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.mask & !other.mask == 0
    }

    /// Returns `true` if the set contains no fields.
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Returns the number of fields in the set.
    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Iterate over the field ids in the set, in ascending order.
    pub fn iter(&self) -> FieldSetIter {
        FieldSetIter { rest: self.mask }
    }
}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl IntoIterator for &FieldSet {
    type Item = FieldId;
    type IntoIter = FieldSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over field ids in a [`FieldSet`], yielding ids in ascending order.
pub struct FieldSetIter {
    rest: u128,
}

impl Iterator for FieldSetIter {
    type Item = FieldId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest == 0 {
            return None;
        }
        let bit = self.rest.trailing_zeros();
        self.rest &= self.rest - 1;
        Some(FieldId(bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_field_set() -> impl Strategy<Value = FieldSet> {
        prop::collection::vec(0u32..128, 0..32)
            .prop_map(|ids| ids.into_iter().map(FieldId).collect::<FieldSet>())
    }

    #[test]
    fn population_and_force_are_distinct_members() {
        let set: FieldSet = [FieldId::POPULATION, FieldId::FORCE].into_iter().collect();
        assert!(set.contains(FieldId::POPULATION));
        assert!(set.contains(FieldId::FORCE));
        assert!(!set.contains(FieldId::VELOCITY));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn iteration_is_ascending() {
        let set: FieldSet = [FieldId(70), FieldId::SCALAR, FieldId::POPULATION]
            .into_iter()
            .collect();
        let ids: Vec<FieldId> = set.iter().collect();
        assert_eq!(ids, vec![FieldId::POPULATION, FieldId::SCALAR, FieldId(70)]);
    }

    #[test]
    fn display_names_well_known_fields() {
        assert_eq!(FieldId::POPULATION.to_string(), "population");
        assert_eq!(FieldId(42).to_string(), "field#42");
    }

    proptest! {
        #[test]
        fn union_commutative(a in arb_field_set(), b in arb_field_set()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn union_contains_both_operands(a in arb_field_set(), b in arb_field_set()) {
            let u = a.union(&b);
            prop_assert!(a.is_subset(&u));
            prop_assert!(b.is_subset(&u));
        }

        #[test]
        fn len_matches_iter_count(a in arb_field_set()) {
            prop_assert_eq!(a.len(), a.iter().count());
        }
    }
}
