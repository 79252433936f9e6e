//! Per-cell and lane-chunked views handed to dynamics.

use eddy_core::{FieldId, MAX_Q};

use crate::statistics::BlockStatistics;
use crate::store::AuxFields;

/// One site, as seen by a per-cell collision.
///
/// Populations are a gathered copy; the block scatters them back after
/// the call. Auxiliary fields are read and written in place.
pub struct Cell<'a> {
    pops: &'a mut [f64],
    aux: &'a mut AuxFields,
    index: usize,
}

impl<'a> Cell<'a> {
    pub(crate) fn new(pops: &'a mut [f64], aux: &'a mut AuxFields, index: usize) -> Self {
        Self { pops, aux, index }
    }

    /// Populations `f_0..f_Q`.
    #[inline]
    pub fn populations(&self) -> &[f64] {
        self.pops
    }

    /// Mutable populations.
    #[inline]
    pub fn populations_mut(&mut self) -> &mut [f64] {
        self.pops
    }

    /// Flat index of the site in its block.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Read-only view of this site.
    pub fn view(&self) -> CellRef<'_> {
        CellRef::new(self.pops, self.aux, self.index)
    }

    /// Value of an auxiliary field at this site, if allocated.
    #[inline]
    pub fn field(&self, id: FieldId) -> Option<[f64; 3]> {
        self.aux.get(&id).map(|a| a.get(self.index))
    }

    /// Write an auxiliary field at this site. Returns `false` if the
    /// field is not allocated.
    #[inline]
    pub fn set_field(&mut self, id: FieldId, value: &[f64]) -> bool {
        match self.aux.get_mut(&id) {
            Some(a) => {
                a.set(self.index, value);
                true
            }
            None => false,
        }
    }
}

/// Read-only view of one site.
#[derive(Clone, Copy)]
pub struct CellRef<'a> {
    pops: &'a [f64],
    aux: &'a AuxFields,
    index: usize,
}

impl<'a> CellRef<'a> {
    pub(crate) fn new(pops: &'a [f64], aux: &'a AuxFields, index: usize) -> Self {
        Self { pops, aux, index }
    }

    /// Populations `f_0..f_Q`.
    #[inline]
    pub fn populations(&self) -> &[f64] {
        self.pops
    }

    /// Flat index of the site in its block.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of an auxiliary field at this site, if allocated.
    #[inline]
    pub fn field(&self, id: FieldId) -> Option<[f64; 3]> {
        self.aux.get(&id).map(|a| a.get(self.index))
    }
}

/// Sites processed together by a batched kernel.
pub const LANES: usize = 8;

/// A chunk of up to [`LANES`] consecutive sites, transposed so that
/// `f[i][l]` is population `i` of lane `l`.
pub struct LaneChunk<'a> {
    /// Populations, direction-major.
    pub f: [[f64; LANES]; MAX_Q],
    len: usize,
    start: usize,
    aux: &'a AuxFields,
    stats: Option<&'a mut BlockStatistics>,
}

impl LaneChunk<'_> {
    /// Active lanes (the last chunk of a run may be partial).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no lane is active.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flat index of a lane's site.
    #[inline]
    pub fn index(&self, lane: usize) -> usize {
        self.start + lane
    }

    /// Auxiliary field value at a lane's site, if allocated.
    #[inline]
    pub fn field(&self, id: FieldId, lane: usize) -> Option<[f64; 3]> {
        self.aux.get(&id).map(|a| a.get(self.start + lane))
    }

    /// Fold one lane into the block statistics, if enabled.
    #[inline]
    pub fn record(&mut self, rho: f64, u_sqr: f64) {
        if let Some(s) = self.stats.as_deref_mut() {
            s.increment(rho, u_sqr);
        }
    }
}

/// A contiguous run of sites sharing one dynamics instance.
pub struct Batch<'a> {
    pops: &'a mut [f64],
    aux: &'a AuxFields,
    stride: usize,
    q: usize,
    start: usize,
    len: usize,
    stats: Option<&'a mut BlockStatistics>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(
        pops: &'a mut [f64],
        aux: &'a AuxFields,
        q: usize,
        start: usize,
        len: usize,
        stats: Option<&'a mut BlockStatistics>,
    ) -> Self {
        let stride = pops.len() / q;
        Self {
            pops,
            aux,
            stride,
            q,
            start,
            len,
            stats,
        }
    }

    /// Number of sites in the run.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the run is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run `kernel` over the run in chunks of [`LANES`] sites.
    pub fn for_each_chunk(&mut self, mut kernel: impl FnMut(&mut LaneChunk<'_>)) {
        let mut offset = 0;
        while offset < self.len {
            let len = LANES.min(self.len - offset);
            let start = self.start + offset;
            let mut chunk = LaneChunk {
                f: [[0.0; LANES]; MAX_Q],
                len,
                start,
                aux: self.aux,
                stats: self.stats.as_deref_mut(),
            };
            for i in 0..self.q {
                let col = &self.pops[i * self.stride + start..i * self.stride + start + len];
                chunk.f[i][..len].copy_from_slice(col);
            }
            kernel(&mut chunk);
            let f = chunk.f;
            for i in 0..self.q {
                let col = &mut self.pops[i * self.stride + start..i * self.stride + start + len];
                col.copy_from_slice(&f[i][..len]);
            }
            offset += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_field_access() {
        let mut aux = AuxFields::new();
        aux.insert(FieldId::FORCE, crate::store::FieldArray::zeros(2, 4));
        let mut pops = [0.0; 3];
        let mut cell = Cell::new(&mut pops, &mut aux, 2);
        assert!(cell.set_field(FieldId::FORCE, &[1.0, -1.0]));
        assert_eq!(cell.field(FieldId::FORCE), Some([1.0, -1.0, 0.0]));
        assert!(!cell.set_field(FieldId::DENSITY, &[1.0]));
        assert_eq!(cell.field(FieldId::DENSITY), None);
    }

    #[test]
    fn chunks_cover_run_and_write_back() {
        // q = 2, 20 sites, run over sites 3..20.
        let mut pops: Vec<f64> = (0..40).map(f64::from).collect();
        let aux = AuxFields::new();
        let mut stats = BlockStatistics::default();
        let mut batch = Batch::new(&mut pops, &aux, 2, 3, 17, Some(&mut stats));
        let mut lanes = Vec::new();
        batch.for_each_chunk(|c| {
            lanes.push(c.len());
            for l in 0..c.len() {
                c.f[0][l] = -c.f[0][l];
                c.record(1.0, 0.0);
            }
        });
        assert_eq!(lanes, vec![8, 8, 1]);
        assert_eq!(pops[2], 2.0);
        assert_eq!(pops[3], -3.0);
        assert_eq!(pops[19], -19.0);
        assert_eq!(pops[23], 23.0);
        assert_eq!(stats.count, 17);
    }
}
