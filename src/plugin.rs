use crate::model::{Address, AddressSpace, AtomicOp, Dim, Instruction, KernelLaunch};
use crate::report;
use crate::sync::Mutex;
use crate::transfers::{TransferLog, TransferSummary};
use crate::worker::WORKER;
use std::path::PathBuf;

/// Execution events delivered by the interpreter.
///
/// Hooks default to no-ops so a sink only implements what it observes.
/// The per-instruction and per-memory hooks fire in the interpreter's hot
/// loop and must not block; the lifecycle and host-transfer hooks may.
#[allow(unused_variables)]
pub trait EventSink: Send + Sync {
    /// An enqueued kernel is about to run its first work-item.
    fn kernel_begin(&self, kernel: &KernelLaunch) {}
    /// All work-items of the kernel have completed.
    fn kernel_end(&self, kernel: &KernelLaunch) {}

    /// The first work-item of a group starts on the calling thread.
    fn work_group_begin(&self, group: &Dim) {}
    /// The last work-item of a group finished on the calling thread.
    fn work_group_complete(&self, group: &Dim) {}

    fn work_item_begin(&self, item: &Dim) {}
    fn work_item_complete(&self, item: &Dim) {}
    /// A work-item reached a barrier.
    fn work_item_barrier(&self, item: &Dim) {}
    /// A work-item resumed past a barrier.
    fn work_item_clear_barrier(&self, item: &Dim) {}

    /// An IR instruction retired.
    fn instruction_executed(&self, instruction: &Instruction) {}

    fn memory_load(&self, space: AddressSpace, address: Address, size: u32) {}
    fn memory_store(&self, space: AddressSpace, address: Address, size: u32) {}
    fn memory_atomic_load(&self, space: AddressSpace, op: AtomicOp, address: Address, size: u32) {}
    fn memory_atomic_store(&self, space: AddressSpace, op: AtomicOp, address: Address, size: u32) {}

    /// Host-side read of a device buffer, outside any kernel.
    fn host_memory_load(&self, space: AddressSpace, address: Address, size: u32) {}
    /// Host-side write of a device buffer, outside any kernel.
    fn host_memory_store(&self, space: AddressSpace, address: Address, size: u32) {}
}

#[derive(Debug, Default)]
struct State {
    aggregate: stats::Kernel,
    transfers: TransferLog,
}

/// The architecture-independent workload characterization plugin.
///
/// Workers absorb events into thread-local state; completing a work-group
/// folds that state into the invocation aggregate under the plugin mutex.
/// Kernel end reduces the aggregate to a [`stats::Characterization`], prints
/// the report and writes the per-kernel CSV. Dropping the plugin emits the
/// host-transfer statistics collected across all invocations.
#[derive(Debug)]
pub struct WorkloadCharacterization {
    state: Mutex<State>,
    output_dir: PathBuf,
}

impl Default for WorkloadCharacterization {
    fn default() -> Self {
        Self::new(".")
    }
}

impl WorkloadCharacterization {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            output_dir: output_dir.into(),
        }
    }

    /// Per-kernel host-transfer counts observed so far.
    #[must_use]
    pub fn transfer_summary(&self) -> TransferSummary {
        self.state.lock().transfers.summary()
    }
}

impl EventSink for WorkloadCharacterization {
    fn kernel_begin(&self, kernel: &KernelLaunch) {
        log::debug!("kernel {} (launch {}) begins", kernel.name, kernel.launch_id);
        let mut state = self.state.lock();
        state.transfers.kernel_enqueued(&kernel.name);
        state.aggregate.clear();
    }

    fn kernel_end(&self, kernel: &KernelLaunch) {
        let mut state = self.state.lock();
        let characterization = stats::Characterization::from_kernel(&kernel.name, &state.aggregate);
        println!("\n{characterization}");
        let path = report::write_kernel_csv(&self.output_dir, &characterization)
            .expect("failed to write the characterization CSV");
        println!(
            "\nThe Architecture-Independent Workload Characterisation was written to file: {}",
            path.display()
        );
        state.aggregate.clear();
    }

    fn work_group_begin(&self, group: &Dim) {
        log::trace!("work-group {group} begins");
        WORKER.with(|worker| worker.borrow_mut().reset());
    }

    fn work_group_complete(&self, group: &Dim) {
        log::trace!("work-group {group} completes");
        WORKER.with(|worker| {
            let mut worker = worker.borrow_mut();
            self.state.lock().aggregate.merge(&mut worker.stats);
        });
    }

    fn work_item_begin(&self, _item: &Dim) {
        WORKER.with(|worker| worker.borrow_mut().work_item_begin());
    }

    fn work_item_complete(&self, _item: &Dim) {
        WORKER.with(|worker| worker.borrow_mut().work_item_complete());
    }

    fn work_item_barrier(&self, _item: &Dim) {
        WORKER.with(|worker| worker.borrow_mut().work_item_barrier());
    }

    fn work_item_clear_barrier(&self, _item: &Dim) {
        WORKER.with(|worker| worker.borrow_mut().work_item_clear_barrier());
    }

    fn instruction_executed(&self, instruction: &Instruction) {
        WORKER.with(|worker| worker.borrow_mut().instruction_executed(instruction));
    }

    fn memory_load(&self, space: AddressSpace, address: Address, _size: u32) {
        WORKER.with(|worker| worker.borrow_mut().memory_access(space, address));
    }

    fn memory_store(&self, space: AddressSpace, address: Address, _size: u32) {
        WORKER.with(|worker| worker.borrow_mut().memory_access(space, address));
    }

    fn memory_atomic_load(&self, space: AddressSpace, _op: AtomicOp, address: Address, _size: u32) {
        WORKER.with(|worker| worker.borrow_mut().atomic_memory_access(space, address));
    }

    fn memory_atomic_store(
        &self,
        space: AddressSpace,
        _op: AtomicOp,
        address: Address,
        _size: u32,
    ) {
        WORKER.with(|worker| worker.borrow_mut().atomic_memory_access(space, address));
    }

    fn host_memory_load(&self, _space: AddressSpace, _address: Address, _size: u32) {
        self.state.lock().transfers.host_read();
    }

    fn host_memory_store(&self, _space: AddressSpace, _address: Address, _size: u32) {
        self.state.lock().transfers.host_write();
    }
}

impl Drop for WorkloadCharacterization {
    fn drop(&mut self) {
        let summary = self.state.lock().transfers.summary();
        print!("{summary}");
        let path = report::write_transfers_csv(&self.output_dir, &summary)
            .expect("failed to write the memory-transfer CSV");
        log::debug!("memory transfer statistics written to {}", path.display());
    }
}
