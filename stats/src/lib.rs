pub mod characterization;
pub mod entropy;

pub use characterization::{Characterization, SimdWidths, Spread};
pub use entropy::BranchEntropy;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics aggregated over a single kernel invocation.
///
/// Workers accumulate into their own private copy and fold it into the
/// invocation-wide instance at work-group completion, so every container
/// here exists in two roles: thread-local scratch and locked aggregate.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    /// Dynamic execution count per opcode mnemonic.
    pub compute_ops: HashMap<String, u64>,
    /// Addresses of global, local and constant accesses. Order is preserved
    /// per worker; workers may interleave arbitrarily.
    pub memory_ops: Vec<u64>,
    /// Taken/not-taken history per conditional-branch source line.
    pub branch_ops: HashMap<u32, Vec<bool>>,
    pub instructions_to_barrier: Vec<u64>,
    pub instructions_per_workitem: Vec<u64>,
    pub instructions_between_load_store: Vec<u64>,
    /// Occurrences per SIMD element count of instruction results.
    pub instruction_width: HashMap<u32, u64>,
    /// References per pointer-operand label of load instructions.
    pub load_labels: HashMap<String, u64>,
    /// References per pointer-operand label of store instructions.
    pub store_labels: HashMap<String, u64>,
    pub threads_invoked: u64,
    pub barriers_hit: u64,
    pub global_accesses: u64,
    pub local_accesses: u64,
    pub constant_accesses: u64,
}

impl Kernel {
    #[must_use]
    pub fn total_instruction_count(&self) -> u64 {
        self.compute_ops.values().sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compute_ops.is_empty()
            && self.memory_ops.is_empty()
            && self.branch_ops.is_empty()
            && self.instructions_to_barrier.is_empty()
            && self.instructions_per_workitem.is_empty()
            && self.instructions_between_load_store.is_empty()
            && self.instruction_width.is_empty()
            && self.load_labels.is_empty()
            && self.store_labels.is_empty()
            && self.threads_invoked == 0
            && self.barriers_hit == 0
            && self.global_accesses == 0
            && self.local_accesses == 0
            && self.constant_accesses == 0
    }

    /// Fold a worker's statistics into this aggregate, draining the worker
    /// so its containers can be reused for the next work-group.
    pub fn merge(&mut self, worker: &mut Kernel) {
        for (op, count) in worker.compute_ops.drain() {
            *self.compute_ops.entry(op).or_insert(0) += count;
        }
        self.memory_ops.append(&mut worker.memory_ops);
        for (line, mut history) in worker.branch_ops.drain() {
            self.branch_ops.entry(line).or_default().append(&mut history);
        }
        self.instructions_to_barrier
            .append(&mut worker.instructions_to_barrier);
        self.instructions_per_workitem
            .append(&mut worker.instructions_per_workitem);
        self.instructions_between_load_store
            .append(&mut worker.instructions_between_load_store);
        for (width, count) in worker.instruction_width.drain() {
            *self.instruction_width.entry(width).or_insert(0) += count;
        }
        for (label, count) in worker.load_labels.drain() {
            *self.load_labels.entry(label).or_insert(0) += count;
        }
        for (label, count) in worker.store_labels.drain() {
            *self.store_labels.entry(label).or_insert(0) += count;
        }
        self.threads_invoked += std::mem::take(&mut worker.threads_invoked);
        self.barriers_hit += std::mem::take(&mut worker.barriers_hit);
        self.global_accesses += std::mem::take(&mut worker.global_accesses);
        self.local_accesses += std::mem::take(&mut worker.local_accesses);
        self.constant_accesses += std::mem::take(&mut worker.constant_accesses);
    }

    /// Empty all containers and zero all counters, keeping allocations.
    pub fn clear(&mut self) {
        self.compute_ops.clear();
        self.memory_ops.clear();
        self.branch_ops.clear();
        self.instructions_to_barrier.clear();
        self.instructions_per_workitem.clear();
        self.instructions_between_load_store.clear();
        self.instruction_width.clear();
        self.load_labels.clear();
        self.store_labels.clear();
        self.threads_invoked = 0;
        self.barriers_hit = 0;
        self.global_accesses = 0;
        self.local_accesses = 0;
        self.constant_accesses = 0;
    }
}
