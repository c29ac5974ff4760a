pub mod fs;
pub mod model;
pub mod plugin;
pub mod report;
pub mod sync;
pub mod trace;
pub mod transfers;
pub mod worker;

pub use model::{
    Address, AddressSpace, AtomicOp, Dim, Instruction, InstructionKind, KernelLaunch,
};
pub use plugin::{EventSink, WorkloadCharacterization};
