//! Layout of the kernel's reserved window at the bottom of guest RAM.
//!
//! Everything the kernel keeps between calls lives here: the scalar block,
//! the trampolines threads return through, the object tables and the
//! interrupt handler stack. Guest code sees it as ordinary memory.

use core::mem::size_of;

use bytemuck::{Pod, Zeroable};

use crate::event_flag::EventFlag;
use crate::intr::InterruptHandler;
use crate::os_struct::ObjectTable;
use crate::semaphore::Semaphore;
use crate::thread::Thread;

pub const CONTROL_BLOCK_START: u32 = 0x10;
pub const CONTROL_BLOCK_END: u32 = 0x10000;
pub const CONTROL_BLOCK_SIZE: usize = (CONTROL_BLOCK_END - CONTROL_BLOCK_START) as usize;

/// Allocations handed out to threads and modules start here.
pub const USER_MEMORY_START: u32 = CONTROL_BLOCK_END;

/// `beq $zero, $zero, self` parked on when nothing is runnable.
pub const IDLE_LOOP_ADDR: u32 = 0x100;
/// Return address of every thread entry point; exits the thread.
pub const THREAD_FINISH_ADDR: u32 = 0x110;
/// Return address of interrupt handlers.
pub const RETURN_FROM_EXCEPTION_ADDR: u32 = 0x120;

/// `v0` marker for the thread-finish `syscall`.
pub const SYSCALL_THREAD_FINISH: u32 = 0x666;
/// `v0` marker for the return-from-exception `syscall`.
pub const SYSCALL_RETURN_FROM_EXCEPTION: u32 = 0x667;

pub const MAX_THREAD: u32 = 64;
pub const MAX_SEMAPHORE: u32 = 64;
pub const MAX_EVENT_FLAG: u32 = 64;
pub const MAX_INTERRUPT_HANDLER: u32 = 32;

const TABLES_START: u32 = 0x200;

pub const THREADS: ObjectTable<Thread> = ObjectTable::new(TABLES_START, MAX_THREAD);
pub const SEMAPHORES: ObjectTable<Semaphore> = ObjectTable::new(THREADS.end(), MAX_SEMAPHORE);
pub const EVENT_FLAGS: ObjectTable<EventFlag> = ObjectTable::new(SEMAPHORES.end(), MAX_EVENT_FLAG);
pub const INTERRUPT_HANDLERS: ObjectTable<InterruptHandler> =
    ObjectTable::new(EVENT_FLAGS.end(), MAX_INTERRUPT_HANDLER);

pub const EXCEPTION_STACK_BASE: u32 = 0xE000;
pub const EXCEPTION_STACK_TOP: u32 = CONTROL_BLOCK_END - 0x10;

const _: () = assert!(CONTROL_BLOCK_START as usize + size_of::<ControlBlock>() <= IDLE_LOOP_ADDR as usize);
const _: () = assert!(RETURN_FROM_EXCEPTION_ADDR + 8 <= TABLES_START);
const _: () = assert!(INTERRUPT_HANDLERS.end() <= EXCEPTION_STACK_BASE);

/// Kernel scalars at [`CONTROL_BLOCK_START`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ControlBlock {
    pub ready_head: u32,
    pub current_thread_id: u32,
    pub time_lo: u32,
    pub time_hi: u32,
    pub sleep_head: u32,
    pub vblank_start_head: u32,
    pub vblank_end_head: u32,
    pub reschedule_needed: u32,
    pub in_interrupt: u32,
}

impl ControlBlock {
    pub fn time(&self) -> u64 {
        ((self.time_hi as u64) << 32) | self.time_lo as u64
    }

    pub fn set_time(&mut self, time: u64) {
        self.time_lo = time as u32;
        self.time_hi = (time >> 32) as u32;
    }
}
