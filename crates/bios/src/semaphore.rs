use bytemuck::{Pod, Zeroable};
use log::{debug, trace};
use mips::Register;
use types::{ThreadStatus, KE_OK, KE_WAIT_DELETE, to_guest};

use crate::bios::Bios;
use crate::control_block::SEMAPHORES;
use crate::error::{InvalidState, KernelResult, ObjectKind};
use crate::os_struct::kernel_object;
use crate::queue::ThreadQueue;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Semaphore {
    pub is_valid: u32,
    pub id: u32,
    pub attributes: u32,
    pub option: u32,
    pub initial_count: u32,
    pub count: u32,
    pub max_count: u32,
    pub wait_count: u32,
    /// First thread of the FIFO wait queue.
    pub wait_head: u32,
}

kernel_object!(Semaphore, ObjectKind::Semaphore);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreParams {
    pub attributes: u32,
    pub option: u32,
    pub initial_count: u32,
    pub max_count: u32,
}

impl SemaphoreParams {
    pub fn new(initial_count: u32, max_count: u32) -> Self {
        Self {
            attributes: 0,
            option: 0,
            initial_count,
            max_count,
        }
    }
}

/// Result of `refer_semaphore_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreStatus {
    pub attributes: u32,
    pub option: u32,
    pub initial_count: u32,
    pub count: u32,
    pub max_count: u32,
    pub wait_count: u32,
}

impl Bios {
    pub fn create_semaphore(&mut self, params: SemaphoreParams) -> KernelResult<u32> {
        let id = SEMAPHORES.allocate(&mut self.memory)?;
        let sema = SEMAPHORES.lookup_mut(&mut self.memory, id)?;
        sema.attributes = params.attributes;
        sema.option = params.option;
        sema.initial_count = params.initial_count;
        sema.count = params.initial_count;
        sema.max_count = params.max_count;
        debug!(
            "semaphore {} created: count {}, max {}",
            id, params.initial_count, params.max_count
        );
        Ok(id)
    }

    /// Deletes a semaphore; its waiters resume with `KE_WAIT_DELETE`.
    pub fn delete_semaphore(&mut self, id: u32) -> KernelResult<()> {
        SEMAPHORES.lookup(&self.memory, id)?;
        while let Some(thread_id) = self.pop_front(ThreadQueue::Semaphore(id)) {
            self.release_semaphore_waiter(thread_id, KE_WAIT_DELETE, false);
        }
        SEMAPHORES.release(&mut self.memory, id)?;
        debug!("semaphore {} deleted", id);
        Ok(())
    }

    /// Hands the semaphore to its oldest waiter, or raises the count
    /// (never past the maximum).
    pub fn signal_semaphore(&mut self, id: u32, requeue_at_front: bool) -> KernelResult<()> {
        SEMAPHORES.lookup(&self.memory, id)?;
        match self.pop_front(ThreadQueue::Semaphore(id)) {
            Some(thread_id) => {
                self.semaphore_mut(id).wait_count -= 1;
                trace!("semaphore {} handed to thread {}", id, thread_id);
                self.release_semaphore_waiter(thread_id, KE_OK, requeue_at_front);
            }
            None => {
                let sema = self.semaphore_mut(id);
                sema.count = (sema.count + 1).min(sema.max_count);
            }
        }
        Ok(())
    }

    /// Takes one count, blocking the calling thread while there is none.
    pub fn wait_semaphore(&mut self, id: u32) -> KernelResult<()> {
        SEMAPHORES.lookup(&self.memory, id)?;
        let thread_id = self.current_waiter()?;
        let sema = self.semaphore_mut(id);
        if sema.count > 0 {
            sema.count -= 1;
            return Ok(());
        }
        sema.wait_count += 1;
        self.thread_mut(thread_id).wait_semaphore = id;
        self.block_current(thread_id, ThreadStatus::WaitingSemaphore, ThreadQueue::Semaphore(id));
        Ok(())
    }

    /// Takes one count without blocking.
    pub fn poll_semaphore(&mut self, id: u32) -> KernelResult<()> {
        let sema = SEMAPHORES.lookup_mut(&mut self.memory, id)?;
        if sema.count == 0 {
            return Err(InvalidState::SemaphoreZero.into());
        }
        sema.count -= 1;
        Ok(())
    }

    pub fn refer_semaphore_status(&self, id: u32) -> KernelResult<SemaphoreStatus> {
        let sema = SEMAPHORES.lookup(&self.memory, id)?;
        Ok(SemaphoreStatus {
            attributes: sema.attributes,
            option: sema.option,
            initial_count: sema.initial_count,
            count: sema.count,
            max_count: sema.max_count,
            wait_count: sema.wait_count,
        })
    }

    fn semaphore_mut(&mut self, id: u32) -> &mut Semaphore {
        SEMAPHORES
            .get_mut(&mut self.memory, id)
            .unwrap_or_else(|| panic!("semaphore {} vanished", id))
    }

    /// Resumes a thread already unlinked from the wait queue with `result`
    /// in its saved `v0`.
    fn release_semaphore_waiter(&mut self, thread_id: u32, result: i32, at_front: bool) {
        let thread = self.thread_mut(thread_id);
        thread.wait_semaphore = 0;
        thread.context.gpr[Register::V0.index()] = to_guest(result);
        self.make_ready(thread_id, at_front);
    }
}
