//! High-level emulation of the IOP kernel.
//!
//! [`Bios`] owns the guest CPU and RAM and implements the kernel services
//! (threads, semaphores, event flags, interrupts, modules) on top of them.

pub mod bios;
pub mod clock;
pub mod config;
pub mod context;
pub mod control_block;
pub mod error;
pub mod event_flag;
pub mod exception;
pub mod hle;
pub mod intr;
pub mod loader;
pub mod module;
pub mod os_struct;
pub mod queue;
pub mod sched;
pub mod semaphore;
pub mod state;
pub mod sysmem;
pub mod thread;

pub use bios::Bios;
pub use config::BiosConfig;
pub use control_block::ControlBlock;
pub use error::{InvalidState, KernelError, KernelResult, LoadError, ObjectKind, StateError};
pub use event_flag::{EventFlagStatus, EA_MULTI, WEF_AND, WEF_CLEAR, WEF_OR};
pub use exception::TrapKind;
pub use loader::{module_name_from_path, LoadedImage};
pub use module::{DynamicModule, Module, ModulePtr};
pub use queue::ThreadQueue;
pub use sched::{MAX_PRIORITY, MIN_PRIORITY};
pub use semaphore::{SemaphoreParams, SemaphoreStatus};
pub use state::BiosState;
pub use sysmem::{BlockAllocator, MemoryBlock, Sysmem};
pub use thread::ThreadParams;
pub use types::{ModuleInfo, ThreadInfo, ThreadStatus};
