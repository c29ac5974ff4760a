use crate::model::{Address, AddressSpace, Instruction, InstructionKind};
use std::cell::RefCell;

thread_local! {
    /// One accumulator per OS thread, lazily allocated on first use and
    /// reused across the work-groups the thread executes.
    pub(crate) static WORKER: RefCell<WorkerState> = RefCell::new(WorkerState::default());
}

/// A conditional branch awaiting classification by the next retired
/// instruction's parent block.
#[derive(Debug)]
struct PendingBranch {
    target1: String,
    target2: String,
    line: u32,
}

/// Per-thread event accumulator.
///
/// Absorbs events without synchronization while its thread executes one
/// work-group; drained into the invocation aggregate at group completion.
#[derive(Debug, Default)]
pub struct WorkerState {
    pub stats: stats::Kernel,
    ops_between_load_store: u64,
    instruction_count: u64,
    workitem_instruction_count: u64,
    pending_branch: Option<PendingBranch>,
}

impl WorkerState {
    /// Reset for a fresh work-group, keeping container allocations.
    pub fn reset(&mut self) {
        self.stats.clear();
        self.ops_between_load_store = 0;
        self.instruction_count = 0;
        self.workitem_instruction_count = 0;
        self.pending_branch = None;
    }

    pub fn work_item_begin(&mut self) {
        self.stats.threads_invoked += 1;
        self.instruction_count = 0;
        self.workitem_instruction_count = 0;
        self.ops_between_load_store = 0;
    }

    pub fn work_item_barrier(&mut self) {
        self.stats.barriers_hit += 1;
        self.stats.instructions_to_barrier.push(self.instruction_count);
        self.instruction_count = 0;
    }

    pub fn work_item_clear_barrier(&mut self) {
        self.instruction_count = 0;
    }

    pub fn work_item_complete(&mut self) {
        self.stats.instructions_to_barrier.push(self.instruction_count);
        self.stats
            .instructions_per_workitem
            .push(self.workitem_instruction_count);
    }

    /// Absorb one retired instruction.
    ///
    /// # Panics
    ///
    /// Panics when the instruction follows a conditional branch but belongs
    /// to neither recorded target block; the interpreter has violated its
    /// sequencing contract and no valid report can be produced.
    pub fn instruction_executed(&mut self, instruction: &Instruction) {
        *self
            .stats
            .compute_ops
            .entry(instruction.mnemonic.clone())
            .or_insert(0) += 1;

        // private accesses are silently dropped from the class counters
        if let InstructionKind::Load { space, .. } | InstructionKind::Store { space, .. } =
            &instruction.kind
        {
            match space {
                AddressSpace::Local => self.stats.local_accesses += 1,
                AddressSpace::Global => self.stats.global_accesses += 1,
                AddressSpace::Constant => self.stats.constant_accesses += 1,
                AddressSpace::Private => {}
            }
        }

        // the reorder distance includes the load/store that ends it
        self.ops_between_load_store += 1;
        match &instruction.kind {
            InstructionKind::Load { pointer, .. } => {
                *self.stats.load_labels.entry(pointer.clone()).or_insert(0) += 1;
                self.stats
                    .instructions_between_load_store
                    .push(self.ops_between_load_store);
                self.ops_between_load_store = 0;
            }
            InstructionKind::Store { pointer, .. } => {
                *self.stats.store_labels.entry(pointer.clone()).or_insert(0) += 1;
                self.stats
                    .instructions_between_load_store
                    .push(self.ops_between_load_store);
                self.ops_between_load_store = 0;
            }
            _ => {}
        }

        if let Some(branch) = self.pending_branch.take() {
            let taken = if instruction.block == branch.target1 {
                true
            } else if instruction.block == branch.target2 {
                false
            } else {
                panic!(
                    "branch classification failure: block {:?} matches neither target {:?} nor {:?}",
                    instruction.block, branch.target1, branch.target2
                );
            };
            self.stats
                .branch_ops
                .entry(branch.line)
                .or_default()
                .push(taken);
        }

        if let InstructionKind::CondBranch { target1, target2 } = &instruction.kind {
            self.pending_branch = Some(PendingBranch {
                target1: target1.clone(),
                target2: target2.clone(),
                line: instruction.line,
            });
        }

        self.instruction_count += 1;
        self.workitem_instruction_count += 1;

        *self
            .stats
            .instruction_width
            .entry(instruction.result_elements)
            .or_insert(0) += 1;
    }

    /// Record a non-atomic access; private regions are excluded.
    pub fn memory_access(&mut self, space: AddressSpace, address: Address) {
        if space != AddressSpace::Private {
            self.stats.memory_ops.push(address);
        }
    }

    /// Record an atomic access, keeping the host's literal code filter.
    pub fn atomic_memory_access(&mut self, space: AddressSpace, address: Address) {
        if space.code() != 0 {
            self.stats.memory_ops.push(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerState;
    use crate::model::{AddressSpace, Instruction, InstructionKind};
    use similar_asserts as diff;

    fn add() -> Instruction {
        Instruction::new("add", InstructionKind::Other)
    }

    fn load(space: AddressSpace, pointer: &str) -> Instruction {
        Instruction::new(
            "load",
            InstructionKind::Load {
                space,
                pointer: pointer.to_string(),
            },
        )
    }

    #[test]
    fn reorder_distance_includes_the_memory_instruction() {
        let mut worker = WorkerState::default();
        worker.work_item_begin();
        worker.instruction_executed(&add());
        worker.instruction_executed(&add());
        worker.instruction_executed(&load(AddressSpace::Global, "in"));
        worker.instruction_executed(&load(AddressSpace::Global, "in"));
        worker.work_item_complete();

        diff::assert_eq!(
            have: worker.stats.instructions_between_load_store,
            want: vec![3, 1]
        );
        diff::assert_eq!(have: worker.stats.load_labels["in"], want: 2);
        diff::assert_eq!(have: worker.stats.global_accesses, want: 2);
    }

    #[test]
    fn private_loads_are_not_classified() {
        let mut worker = WorkerState::default();
        worker.work_item_begin();
        worker.instruction_executed(&load(AddressSpace::Private, "tmp"));
        diff::assert_eq!(have: worker.stats.global_accesses, want: 0);
        diff::assert_eq!(have: worker.stats.local_accesses, want: 0);
        diff::assert_eq!(have: worker.stats.constant_accesses, want: 0);
        // the label and distance are still recorded
        diff::assert_eq!(have: worker.stats.load_labels["tmp"], want: 1);
    }

    #[test]
    fn private_memory_ops_are_dropped() {
        let mut worker = WorkerState::default();
        worker.memory_access(AddressSpace::Private, 0x10);
        worker.memory_access(AddressSpace::Global, 0x20);
        worker.atomic_memory_access(AddressSpace::Private, 0x30);
        worker.atomic_memory_access(AddressSpace::Local, 0x40);
        diff::assert_eq!(have: worker.stats.memory_ops, want: vec![0x20, 0x40]);
    }

    #[test]
    fn branches_are_classified_by_the_following_block() {
        let mut worker = WorkerState::default();
        worker.work_item_begin();
        let branch = Instruction::new(
            "br",
            InstructionKind::CondBranch {
                target1: "%then".to_string(),
                target2: "%else".to_string(),
            },
        )
        .at_line(17);
        worker.instruction_executed(&branch);
        worker.instruction_executed(&add().in_block("%then"));
        worker.instruction_executed(&branch);
        worker.instruction_executed(&add().in_block("%else"));

        diff::assert_eq!(have: worker.stats.branch_ops[&17], want: vec![true, false]);
    }

    #[test]
    #[should_panic(expected = "branch classification failure")]
    fn a_foreign_block_after_a_branch_is_fatal() {
        let mut worker = WorkerState::default();
        worker.work_item_begin();
        worker.instruction_executed(&Instruction::new(
            "br",
            InstructionKind::CondBranch {
                target1: "%then".to_string(),
                target2: "%else".to_string(),
            },
        ));
        worker.instruction_executed(&add().in_block("%elsewhere"));
    }

    #[test]
    fn barriers_split_the_instruction_counts() {
        let mut worker = WorkerState::default();
        worker.work_item_begin();
        for _ in 0..4 {
            worker.instruction_executed(&add());
        }
        worker.work_item_barrier();
        worker.work_item_clear_barrier();
        for _ in 0..2 {
            worker.instruction_executed(&add());
        }
        worker.work_item_complete();

        diff::assert_eq!(have: worker.stats.instructions_to_barrier, want: vec![4, 2]);
        diff::assert_eq!(have: worker.stats.instructions_per_workitem, want: vec![6]);
        diff::assert_eq!(have: worker.stats.barriers_hit, want: 1);
        diff::assert_eq!(have: worker.stats.total_instruction_count(), want: 6);
    }
}
