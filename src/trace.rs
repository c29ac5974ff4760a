use crate::model::{Address, AddressSpace, AtomicOp, Dim, Instruction, KernelLaunch};
use crate::plugin::EventSink;
use serde::{Deserialize, Serialize};

/// One recorded interpreter event.
///
/// A serialized sequence of these replays a full run through any
/// [`EventSink`], reproducing its reports without the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    KernelBegin {
        kernel: KernelLaunch,
    },
    KernelEnd {
        kernel: KernelLaunch,
    },
    WorkGroupBegin {
        group: Dim,
    },
    WorkGroupComplete {
        group: Dim,
    },
    WorkItemBegin {
        item: Dim,
    },
    WorkItemComplete {
        item: Dim,
    },
    WorkItemBarrier {
        item: Dim,
    },
    WorkItemClearBarrier {
        item: Dim,
    },
    InstructionExecuted {
        instruction: Instruction,
    },
    MemoryLoad {
        space: AddressSpace,
        address: Address,
        size: u32,
    },
    MemoryStore {
        space: AddressSpace,
        address: Address,
        size: u32,
    },
    MemoryAtomicLoad {
        space: AddressSpace,
        op: AtomicOp,
        address: Address,
        size: u32,
    },
    MemoryAtomicStore {
        space: AddressSpace,
        op: AtomicOp,
        address: Address,
        size: u32,
    },
    HostMemoryLoad {
        space: AddressSpace,
        address: Address,
        size: u32,
    },
    HostMemoryStore {
        space: AddressSpace,
        address: Address,
        size: u32,
    },
}

/// Drive a recorded event stream through a sink, in order.
pub fn replay(sink: &impl EventSink, events: impl IntoIterator<Item = Event>) {
    for event in events {
        match &event {
            Event::KernelBegin { kernel } => sink.kernel_begin(kernel),
            Event::KernelEnd { kernel } => sink.kernel_end(kernel),
            Event::WorkGroupBegin { group } => sink.work_group_begin(group),
            Event::WorkGroupComplete { group } => sink.work_group_complete(group),
            Event::WorkItemBegin { item } => sink.work_item_begin(item),
            Event::WorkItemComplete { item } => sink.work_item_complete(item),
            Event::WorkItemBarrier { item } => sink.work_item_barrier(item),
            Event::WorkItemClearBarrier { item } => sink.work_item_clear_barrier(item),
            Event::InstructionExecuted { instruction } => sink.instruction_executed(instruction),
            Event::MemoryLoad {
                space,
                address,
                size,
            } => sink.memory_load(*space, *address, *size),
            Event::MemoryStore {
                space,
                address,
                size,
            } => sink.memory_store(*space, *address, *size),
            Event::MemoryAtomicLoad {
                space,
                op,
                address,
                size,
            } => sink.memory_atomic_load(*space, *op, *address, *size),
            Event::MemoryAtomicStore {
                space,
                op,
                address,
                size,
            } => sink.memory_atomic_store(*space, *op, *address, *size),
            Event::HostMemoryLoad {
                space,
                address,
                size,
            } => sink.host_memory_load(*space, *address, *size),
            Event::HostMemoryStore {
                space,
                address,
                size,
            } => sink.host_memory_store(*space, *address, *size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{replay, Event};
    use crate::model::{Dim, Instruction, InstructionKind, KernelLaunch};
    use crate::plugin::WorkloadCharacterization;
    use similar_asserts as diff;

    fn vecadd_events() -> Vec<Event> {
        let kernel = KernelLaunch::new("vecadd", 0);
        let group = Dim::default();
        let mut events = vec![
            Event::KernelBegin {
                kernel: kernel.clone(),
            },
            Event::WorkGroupBegin { group },
            Event::WorkItemBegin { item: group },
        ];
        for _ in 0..3 {
            events.push(Event::InstructionExecuted {
                instruction: Instruction::new("add", InstructionKind::Other),
            });
        }
        events.extend([
            Event::WorkItemComplete { item: group },
            Event::WorkGroupComplete { group },
            Event::KernelEnd { kernel },
        ]);
        events
    }

    #[test]
    fn events_round_trip_through_json() {
        let events = vecadd_events();
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<Event> = serde_json::from_str(&json).unwrap();
        diff::assert_eq!(have: back, want: events);
    }

    #[test]
    fn replaying_a_trace_drives_the_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = WorkloadCharacterization::new(dir.path());
        replay(&plugin, vecadd_events());
        let report = std::fs::read_to_string(dir.path().join("aiwc_vecadd_0.csv")).unwrap();
        assert!(report.contains("total instruction count,3"));
    }
}
