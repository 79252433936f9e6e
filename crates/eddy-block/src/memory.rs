//! Host and device memory spaces of a block.
//!
//! Host platforms keep one [`FieldStore`] that kernels and readers share.
//! The GPU platform keeps an execution-side store (the device buffer,
//! driven by host work-groups) and a host mirror. The mirror is only
//! refreshed by an explicit download when the block enters
//! [`ProcessingContext::Evaluation`], and host writes made while
//! evaluating are uploaded when the block returns to
//! [`ProcessingContext::Simulation`].

use std::sync::atomic::{AtomicU64, Ordering};

use eddy_core::{FieldId, FieldSet, Platform, ProcessingContext};

use crate::error::BlockError;
use crate::store::FieldStore;

/// Device-resident storage with transfer accounting.
#[derive(Debug)]
pub struct DeviceBuffer {
    store: FieldStore,
    transferred: AtomicU64,
}

impl DeviceBuffer {
    fn new(store: FieldStore) -> Self {
        Self {
            store,
            transferred: AtomicU64::new(0),
        }
    }

    fn account(&self, values: usize) {
        self.transferred
            .fetch_add((values * std::mem::size_of::<f64>()) as u64, Ordering::Relaxed);
    }

    /// Total bytes moved between host and device so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Copy the whole device store into `host`.
    fn download_all(&self, host: &mut FieldStore) {
        host.clone_from(&self.store);
        self.account(self.store.pops.len() + self.store.aux.values().map(|a| a.components() * a.len()).sum::<usize>());
    }

    /// Replace the whole device store with `host`.
    fn upload_all(&mut self, host: &FieldStore) {
        self.store.clone_from(host);
        self.account(host.pops.len() + host.aux.values().map(|a| a.components() * a.len()).sum::<usize>());
    }

    /// Download `fields` at `cells` into a host staging buffer.
    pub fn download(&self, fields: &FieldSet, cells: &[usize], out: &mut Vec<f64>) -> Result<(), BlockError> {
        let before = out.len();
        self.store.pack(fields, cells, out)?;
        self.account(out.len() - before);
        Ok(())
    }

    /// Upload a host staging buffer to `fields` at `cells`.
    pub fn upload(&mut self, fields: &FieldSet, cells: &[usize], data: &[f64]) -> Result<usize, BlockError> {
        let n = self.store.unpack(fields, cells, data)?;
        self.account(n);
        Ok(n)
    }
}

/// Storage of one block, tagged by platform.
#[derive(Debug)]
pub(crate) enum Memory {
    Host(FieldStore),
    Device {
        device: DeviceBuffer,
        mirror: FieldStore,
        host_dirty: bool,
    },
}

impl Memory {
    pub(crate) fn new(platform: Platform, store: FieldStore) -> Self {
        match platform {
            Platform::CpuScalar | Platform::CpuSimd => Memory::Host(store),
            Platform::Gpu => Memory::Device {
                mirror: store.clone(),
                device: DeviceBuffer::new(store),
                host_dirty: false,
            },
        }
    }

    /// Store the kernels run on.
    pub(crate) fn exec(&self) -> &FieldStore {
        match self {
            Memory::Host(s) => s,
            Memory::Device { device, .. } => &device.store,
        }
    }

    pub(crate) fn exec_mut(&mut self) -> &mut FieldStore {
        match self {
            Memory::Host(s) => s,
            Memory::Device { device, .. } => &mut device.store,
        }
    }

    /// Store host readers see.
    pub(crate) fn host(&self) -> &FieldStore {
        match self {
            Memory::Host(s) => s,
            Memory::Device { mirror, .. } => mirror,
        }
    }

    /// Store host writers target: the mirror while evaluating, the
    /// execution store otherwise.
    pub(crate) fn host_mut(&mut self, ctx: ProcessingContext) -> &mut FieldStore {
        match self {
            Memory::Host(s) => s,
            Memory::Device {
                mirror, host_dirty, ..
            } if ctx == ProcessingContext::Evaluation => {
                *host_dirty = true;
                mirror
            }
            Memory::Device { device, .. } => &mut device.store,
        }
    }

    pub(crate) fn device(&self) -> Option<&DeviceBuffer> {
        match self {
            Memory::Host(_) => None,
            Memory::Device { device, .. } => Some(device),
        }
    }

    pub(crate) fn device_mut(&mut self) -> Option<&mut DeviceBuffer> {
        match self {
            Memory::Host(_) => None,
            Memory::Device { device, .. } => Some(device),
        }
    }

    pub(crate) fn allocate(&mut self, id: FieldId, components: usize) {
        match self {
            Memory::Host(s) => s.allocate(id, components),
            Memory::Device { device, mirror, .. } => {
                device.store.allocate(id, components);
                mirror.allocate(id, components);
            }
        }
    }

    /// Apply a processing-context transition.
    pub(crate) fn transition(&mut self, from: ProcessingContext, to: ProcessingContext) {
        let Memory::Device {
            device,
            mirror,
            host_dirty,
        } = self
        else {
            return;
        };
        match (from, to) {
            (ProcessingContext::Simulation, ProcessingContext::Evaluation) => {
                device.download_all(mirror);
                *host_dirty = false;
            }
            (ProcessingContext::Evaluation, ProcessingContext::Simulation) if *host_dirty => {
                device.upload_all(mirror);
                *host_dirty = false;
            }
            _ => {}
        }
    }
}
