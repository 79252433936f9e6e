//! Reusable post-processor fixtures.
//!
//! - [`ConstFieldWriter`]: writes a constant into a field.
//! - [`CountingPostProcessor`]: counts applications and sites visited.
//! - [`StageRecorder`]: appends its label to a shared log, for checking
//!   execution order across stages and priorities.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use eddy_block::{BlockAccess, PostProcessor};
use eddy_core::{Descriptor, FieldId, FieldSet};

/// Writes `value` into `field` on every site it runs on.
pub struct ConstFieldWriter<D: Descriptor> {
    pub field: FieldId,
    pub value: Vec<f64>,
    pub communicate: bool,
    _descriptor: PhantomData<D>,
}

impl<D: Descriptor> ConstFieldWriter<D> {
    pub fn new(field: FieldId, value: &[f64]) -> Self {
        Self {
            field,
            value: value.to_vec(),
            communicate: false,
            _descriptor: PhantomData,
        }
    }

    /// Also request that `field` be exchanged at this operator's stage.
    pub fn communicated(mut self) -> Self {
        self.communicate = true;
        self
    }
}

impl<D: Descriptor> PostProcessor<D> for ConstFieldWriter<D> {
    fn name(&self) -> &str {
        "const_field_writer"
    }

    fn fields(&self) -> FieldSet {
        FieldSet::empty().with(self.field)
    }

    fn communicates(&self) -> FieldSet {
        if self.communicate {
            FieldSet::empty().with(self.field)
        } else {
            FieldSet::empty()
        }
    }

    fn apply(&self, block: &mut BlockAccess<'_, D>, cells: &[usize]) {
        if let Ok(array) = block.field_mut(self.field) {
            for &c in cells {
                array.set(c, &self.value);
            }
        }
    }
}

/// Counts how often it runs and on how many sites.
#[derive(Default)]
pub struct CountingPostProcessor {
    calls: AtomicUsize,
    sites: AtomicUsize,
}

impl CountingPostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applications so far, summed over blocks.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Sites visited so far.
    pub fn sites(&self) -> usize {
        self.sites.load(Ordering::Relaxed)
    }
}

impl<D: Descriptor> PostProcessor<D> for CountingPostProcessor {
    fn name(&self) -> &str {
        "counting"
    }

    fn apply(&self, _block: &mut BlockAccess<'_, D>, cells: &[usize]) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.sites.fetch_add(cells.len(), Ordering::Relaxed);
    }
}

/// Shared, ordered record of which operators ran.
pub type ExecutionLog = Arc<Mutex<Vec<&'static str>>>;

/// Appends `label` to a shared log each time it runs.
pub struct StageRecorder {
    pub label: &'static str,
    pub priority: i32,
    log: ExecutionLog,
}

impl StageRecorder {
    pub fn new(label: &'static str, priority: i32, log: &ExecutionLog) -> Self {
        Self {
            label,
            priority,
            log: Arc::clone(log),
        }
    }

    /// A fresh empty log.
    pub fn log() -> ExecutionLog {
        Arc::new(Mutex::new(Vec::new()))
    }
}

impl<D: Descriptor> PostProcessor<D> for StageRecorder {
    fn name(&self) -> &str {
        self.label
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn apply(&self, _block: &mut BlockAccess<'_, D>, _cells: &[usize]) {
        if let Ok(mut log) = self.log.lock() {
            log.push(self.label);
        }
    }
}
