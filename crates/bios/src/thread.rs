use bytemuck::{Pod, Zeroable};
use types::ThreadStatus;

use crate::error::ObjectKind;
use crate::os_struct::kernel_object;

/// Register state of a switched-out thread.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ThreadContext {
    pub gpr: [u32; 32],
    pub pc: u32,
    pub delayed_jump_addr: u32,
}

/// Thread control block, stored in guest memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Thread {
    pub is_valid: u32,
    pub id: u32,
    pub priority: u32,
    pub init_priority: u32,
    pub status: u32,
    pub attributes: u32,
    pub option: u32,
    pub entry: u32,
    pub stack_base: u32,
    pub stack_size: u32,
    pub gp: u32,
    pub wakeup_count: u32,
    pub wait_semaphore: u32,
    pub wait_event_flag: u32,
    pub event_mode: u32,
    pub event_mask: u32,
    pub event_result_ptr: u32,
    /// Next thread in whichever queue this one is linked into; 0 ends it.
    pub next_thread_id: u32,
    pub wake_time_lo: u32,
    pub wake_time_hi: u32,
    pub context: ThreadContext,
}

kernel_object!(Thread, ObjectKind::Thread);

impl Thread {
    pub fn status(&self) -> ThreadStatus {
        ThreadStatus::from_raw(self.status)
            .unwrap_or_else(|| panic!("thread {} has corrupt status {}", self.id, self.status))
    }

    pub fn set_status(&mut self, status: ThreadStatus) {
        self.status = status.raw();
    }

    pub fn wake_time(&self) -> Option<u64> {
        let time = ((self.wake_time_hi as u64) << 32) | self.wake_time_lo as u64;
        (time != u64::MAX).then_some(time)
    }

    pub fn set_wake_time(&mut self, time: Option<u64>) {
        let time = time.unwrap_or(u64::MAX);
        self.wake_time_lo = time as u32;
        self.wake_time_hi = (time >> 32) as u32;
    }

    /// One past the highest stack address.
    pub fn stack_top(&self) -> u32 {
        self.stack_base + self.stack_size
    }

    /// Semaphore or event flag this thread is parked on.
    pub fn wait_object(&self) -> Option<u32> {
        match self.status() {
            ThreadStatus::WaitingSemaphore => Some(self.wait_semaphore),
            ThreadStatus::WaitingEventFlag => Some(self.wait_event_flag),
            _ => None,
        }
    }
}

/// Arguments of `create_thread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadParams {
    pub attributes: u32,
    pub option: u32,
    pub entry: u32,
    /// 0 selects the configured default.
    pub stack_size: u32,
    pub priority: u32,
}

impl ThreadParams {
    pub fn new(priority: u32, entry: u32) -> Self {
        Self {
            attributes: 0,
            option: 0,
            entry,
            stack_size: 0,
            priority,
        }
    }

    pub fn with_stack_size(mut self, stack_size: u32) -> Self {
        self.stack_size = stack_size;
        self
    }
}
