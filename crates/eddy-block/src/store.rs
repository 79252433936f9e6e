//! Population and auxiliary-field storage.
//!
//! Populations are stored population-major: column `i` holds `f_i` for
//! every padded site, so streaming is a rotation of each column and a
//! run of consecutive sites is a contiguous slice of every column.
//! Auxiliary fields use the same layout per component.

use eddy_core::{FieldId, FieldSet};
use indexmap::IndexMap;

use crate::error::BlockError;

/// One auxiliary field over all padded sites, component-major.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldArray {
    components: usize,
    len: usize,
    data: Vec<f64>,
}

impl FieldArray {
    pub(crate) fn zeros(components: usize, len: usize) -> Self {
        Self {
            components,
            len,
            data: vec![0.0; components * len],
        }
    }

    /// Components per site.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array covers no site.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value at a site, unused trailing components zero.
    #[inline]
    pub fn get(&self, index: usize) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (c, o) in out.iter_mut().enumerate().take(self.components) {
            *o = self.data[c * self.len + index];
        }
        out
    }

    /// Overwrite the first `value.len()` components at a site.
    #[inline]
    pub fn set(&mut self, index: usize, value: &[f64]) {
        debug_assert!(value.len() <= self.components);
        for (c, v) in value.iter().enumerate() {
            self.data[c * self.len + index] = *v;
        }
    }

    /// One component across all sites.
    pub fn component(&self, c: usize) -> &[f64] {
        &self.data[c * self.len..(c + 1) * self.len]
    }

    /// Mutable view of one component across all sites.
    pub fn component_mut(&mut self, c: usize) -> &mut [f64] {
        &mut self.data[c * self.len..(c + 1) * self.len]
    }
}

/// Auxiliary fields by id, in allocation order.
pub type AuxFields = IndexMap<FieldId, FieldArray>;

/// Populations plus auxiliary fields of one block in one memory space.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldStore {
    q: usize,
    len: usize,
    pub(crate) pops: Vec<f64>,
    pub(crate) aux: AuxFields,
}

impl FieldStore {
    pub(crate) fn new(q: usize, len: usize, weights: &[f64]) -> Self {
        let mut pops = Vec::with_capacity(q * len);
        for w in weights.iter().take(q) {
            pops.extend(std::iter::repeat_n(*w, len));
        }
        Self {
            q,
            len,
            pops,
            aux: AuxFields::new(),
        }
    }

    /// Populations per site.
    pub fn q(&self) -> usize {
        self.q
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store covers no site.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Population `i` at a site.
    #[inline]
    pub fn population(&self, index: usize, i: usize) -> f64 {
        self.pops[i * self.len + index]
    }

    /// Set population `i` at a site.
    #[inline]
    pub fn set_population(&mut self, index: usize, i: usize, value: f64) {
        self.pops[i * self.len + index] = value;
    }

    /// Column of population `i` over all sites.
    pub fn column(&self, i: usize) -> &[f64] {
        &self.pops[i * self.len..(i + 1) * self.len]
    }

    /// Copy the populations of one site into `out[..q]`.
    #[inline]
    pub fn gather(&self, index: usize, out: &mut [f64]) {
        for (i, o) in out.iter_mut().enumerate().take(self.q) {
            *o = self.pops[i * self.len + index];
        }
    }

    /// Write `values[..q]` to the populations of one site.
    #[inline]
    pub fn scatter(&mut self, index: usize, values: &[f64]) {
        for (i, v) in values.iter().enumerate().take(self.q) {
            self.pops[i * self.len + index] = *v;
        }
    }

    /// Auxiliary field by id.
    pub fn field(&self, id: FieldId) -> Result<&FieldArray, BlockError> {
        self.aux.get(&id).ok_or(BlockError::FieldNotAllocated(id))
    }

    /// Mutable auxiliary field by id.
    pub fn field_mut(&mut self, id: FieldId) -> Result<&mut FieldArray, BlockError> {
        self.aux.get_mut(&id).ok_or(BlockError::FieldNotAllocated(id))
    }

    /// Whether an auxiliary field is allocated.
    pub fn has_field(&self, id: FieldId) -> bool {
        self.aux.contains_key(&id)
    }

    pub(crate) fn allocate(&mut self, id: FieldId, components: usize) {
        let len = self.len;
        self.aux
            .entry(id)
            .or_insert_with(|| FieldArray::zeros(components, len));
    }

    /// Values per site carried for `fields`.
    pub fn values_per_site(&self, fields: &FieldSet) -> Result<usize, BlockError> {
        fields.iter().try_fold(0, |acc, f| {
            if f == FieldId::POPULATION {
                Ok(acc + self.q)
            } else {
                Ok(acc + self.field(f)?.components())
            }
        })
    }

    /// Append the values of `fields` at `cells` to `out`, field by
    /// field, component-major within a field.
    pub fn pack(&self, fields: &FieldSet, cells: &[usize], out: &mut Vec<f64>) -> Result<(), BlockError> {
        for f in fields {
            if f == FieldId::POPULATION {
                for i in 0..self.q {
                    let col = self.column(i);
                    out.extend(cells.iter().map(|&c| col[c]));
                }
            } else {
                let arr = self.field(f)?;
                for k in 0..arr.components() {
                    let comp = arr.component(k);
                    out.extend(cells.iter().map(|&c| comp[c]));
                }
            }
        }
        Ok(())
    }

    /// Inverse of [`FieldStore::pack`]. Returns the number of values
    /// consumed from `data`.
    pub fn unpack(&mut self, fields: &FieldSet, cells: &[usize], data: &[f64]) -> Result<usize, BlockError> {
        let expected = self.values_per_site(fields)? * cells.len();
        if data.len() < expected {
            return Err(BlockError::PayloadSize {
                expected,
                got: data.len(),
            });
        }
        let mut values = data.iter();
        for f in fields {
            if f == FieldId::POPULATION {
                for i in 0..self.q {
                    let base = i * self.len;
                    for (&c, v) in cells.iter().zip(&mut values) {
                        self.pops[base + c] = *v;
                    }
                }
            } else {
                let arr = self.field_mut(f)?;
                for k in 0..arr.components() {
                    let comp = arr.component_mut(k);
                    for (&c, v) in cells.iter().zip(&mut values) {
                        comp[c] = *v;
                    }
                }
            }
        }
        Ok(expected)
    }

    /// Copy `fields` from `src_cells` of `src` to `dst_cells` of `self`
    /// without an intermediate buffer.
    pub fn copy_from(
        &mut self,
        src: &FieldStore,
        fields: &FieldSet,
        src_cells: &[usize],
        dst_cells: &[usize],
    ) -> Result<(), BlockError> {
        debug_assert_eq!(src_cells.len(), dst_cells.len());
        for f in fields {
            if f == FieldId::POPULATION {
                for i in 0..self.q {
                    let (sb, db) = (i * src.len, i * self.len);
                    for (&s, &d) in src_cells.iter().zip(dst_cells) {
                        self.pops[db + d] = src.pops[sb + s];
                    }
                }
            } else {
                let from = src.field(f)?;
                let to = self.field_mut(f)?;
                for k in 0..from.components().min(to.components()) {
                    let (fc, tc) = (from.component(k), to.component_mut(k));
                    for (&s, &d) in src_cells.iter().zip(dst_cells) {
                        tc[d] = fc[s];
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy `fields` between disjoint cell lists of the same store.
    pub fn copy_within(&mut self, fields: &FieldSet, src_cells: &[usize], dst_cells: &[usize]) -> Result<(), BlockError> {
        debug_assert_eq!(src_cells.len(), dst_cells.len());
        for f in fields {
            if f == FieldId::POPULATION {
                for i in 0..self.q {
                    let base = i * self.len;
                    for (&s, &d) in src_cells.iter().zip(dst_cells) {
                        self.pops[base + d] = self.pops[base + s];
                    }
                }
            } else {
                let arr = self.field_mut(f)?;
                for k in 0..arr.components() {
                    let comp = arr.component_mut(k);
                    for (&s, &d) in src_cells.iter().zip(dst_cells) {
                        comp[d] = comp[s];
                    }
                }
            }
        }
        Ok(())
    }
}
