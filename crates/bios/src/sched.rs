//! Priority scheduler.
//!
//! Kernel calls never switch threads directly: they mark the control block
//! dirty and the driver entry point that handed control to the kernel
//! resolves it once on the way out. The running thread stays linked in the
//! ready queue and is moved behind its priority peers at every reschedule.

use bytemuck::Zeroable;
use log::{debug, trace, warn};
use mips::cpu::INVALID_PC;
use mips::Register;
use types::{ThreadInfo, ThreadStatus};

use crate::bios::Bios;
use crate::control_block::{EVENT_FLAGS, SEMAPHORES, THREADS, THREAD_FINISH_ADDR};
use crate::error::{InvalidState, KernelError, KernelResult, ObjectKind};
use crate::queue::ThreadQueue;
use crate::thread::{ThreadContext, ThreadParams};

pub const MIN_PRIORITY: u32 = 1;
pub const MAX_PRIORITY: u32 = 126;

/// Space left above the initial stack pointer of a new thread.
const STACK_FRAME_RESERVE: u32 = 0x10;

fn check_priority(priority: u32) -> KernelResult<()> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(InvalidState::IllegalPriority.into())
    }
}

impl Bios {
    pub fn current_thread_id(&self) -> u32 {
        self.cb().current_thread_id
    }

    pub fn in_interrupt(&self) -> bool {
        self.cb().in_interrupt != 0
    }

    pub fn reschedule_pending(&self) -> bool {
        self.cb().reschedule_needed != 0
    }

    pub(crate) fn request_reschedule(&mut self) {
        self.cb_mut().reschedule_needed = 1;
    }

    /// Runs a pending reschedule unless an interrupt handler is active.
    pub fn resolve_reschedule(&mut self) -> bool {
        if !self.reschedule_pending() || self.in_interrupt() {
            return false;
        }
        self.reschedule();
        true
    }

    /// Saves the running thread and switches to the best ready one.
    pub fn reschedule(&mut self) {
        if self.in_interrupt() {
            self.request_reschedule();
            return;
        }
        let current = self.current_thread_id();
        if current != 0 {
            self.save_context(current);
        }
        self.switch_to_next_thread();
    }

    /// Picks and restores the next thread without saving the CPU state.
    pub(crate) fn switch_to_next_thread(&mut self) {
        self.collect_zombies();
        self.wake_expired_sleepers();

        let current = self.current_thread_id();
        if current != 0 && self.thread(current).status() == ThreadStatus::Running {
            self.unlink(ThreadQueue::Ready, current);
            self.link_by_priority(ThreadQueue::Ready, current, false);
        }
        self.cb_mut().reschedule_needed = 0;

        match self.next_ready_thread() {
            Some(next) => {
                if next != current {
                    trace!("switch thread {} -> {}", current, next);
                }
                self.cb_mut().current_thread_id = next;
                self.restore_context(next);
            }
            None => {
                if current != 0 {
                    trace!("thread {} switched out, idling", current);
                }
                self.cb_mut().current_thread_id = 0;
                self.enter_idle();
            }
        }
    }

    /// Head of the ready queue.
    pub fn next_ready_thread(&self) -> Option<u32> {
        self.queue_ids(ThreadQueue::Ready).first().copied()
    }

    /// True when no thread is runnable.
    pub fn is_idle(&self) -> bool {
        self.cb().ready_head == 0
    }

    fn collect_zombies(&mut self) {
        let zombies: Vec<u32> = THREADS
            .iter(&self.memory)
            .filter(|thread| thread.status() == ThreadStatus::Zombie)
            .map(|thread| thread.id)
            .collect();
        for id in zombies {
            debug!("thread {} collected", id);
            self.reclaim_thread(id);
        }
    }

    /// Moves every timed sleeper whose wake time has passed to the ready queue.
    pub(crate) fn wake_expired_sleepers(&mut self) -> usize {
        let now = self.current_time();
        let mut woken = 0;
        for id in self.queue_ids(ThreadQueue::Sleep) {
            let expired = self.thread(id).wake_time().is_some_and(|wake| wake <= now);
            if expired {
                self.unlink(ThreadQueue::Sleep, id);
                self.thread_mut(id).set_wake_time(None);
                trace!("thread {} delay expired", id);
                self.make_ready(id, false);
                woken += 1;
            }
        }
        woken
    }

    /// Releases the slot and stack of a thread already unlinked from every queue.
    fn reclaim_thread(&mut self, id: u32) {
        let stack_base = self.thread(id).stack_base;
        if stack_base != 0 && !self.sysmem.free(stack_base) {
            warn!("thread {} stack at 0x{:08x} was not allocated", id, stack_base);
        }
        if let Err(err) = THREADS.release(&mut self.memory, id) {
            panic!("releasing thread {}: {}", id, err);
        }
        if self.current_thread_id() == id {
            self.cb_mut().current_thread_id = 0;
        }
    }

    /// Marks a thread runnable and links it into the ready queue.
    pub(crate) fn make_ready(&mut self, id: u32, at_front: bool) {
        self.thread_mut(id).set_status(ThreadStatus::Running);
        self.link_by_priority(ThreadQueue::Ready, id, at_front);
        self.request_reschedule();
    }

    /// The calling thread, if it is allowed to block.
    pub(crate) fn current_waiter(&self) -> KernelResult<u32> {
        let id = self.current_thread_id();
        if self.in_interrupt() || id == 0 {
            return Err(InvalidState::IllegalContext.into());
        }
        Ok(id)
    }

    /// Parks the running thread on `queue` in state `status`.
    pub(crate) fn block_current(&mut self, id: u32, status: ThreadStatus, queue: ThreadQueue) {
        self.unlink(ThreadQueue::Ready, id);
        self.thread_mut(id).set_status(status);
        self.link_back(queue, id);
        trace!("thread {} blocked: {}", id, status);
        self.request_reschedule();
    }

    fn resolve_thread_id(&self, id: u32) -> KernelResult<u32> {
        let id = if id == 0 { self.current_thread_id() } else { id };
        if id == 0 {
            return Err(InvalidState::IllegalThreadId.into());
        }
        THREADS.lookup(&self.memory, id)?;
        Ok(id)
    }

    pub fn create_thread(&mut self, params: ThreadParams) -> KernelResult<u32> {
        check_priority(params.priority)?;
        if params.entry == 0 || params.entry & 3 != 0 {
            return Err(InvalidState::IllegalEntry.into());
        }
        let stack_size = match params.stack_size {
            0 => self.config.default_stack_size,
            size => (size + 0xF) & !0xF,
        };
        let stack_base = self
            .sysmem
            .allocate(stack_size)
            .ok_or(KernelError::ResourceExhausted(ObjectKind::Memory))?;
        let id = match THREADS.allocate(&mut self.memory) {
            Ok(id) => id,
            Err(err) => {
                self.sysmem.free(stack_base);
                return Err(err);
            }
        };

        let gp = self.cpu.reg(Register::Gp);
        let thread = self.thread_mut(id);
        thread.set_status(ThreadStatus::Created);
        thread.priority = params.priority;
        thread.init_priority = params.priority;
        thread.attributes = params.attributes;
        thread.option = params.option;
        thread.entry = params.entry;
        thread.stack_base = stack_base;
        thread.stack_size = stack_size;
        thread.gp = gp;
        thread.set_wake_time(None);

        debug!(
            "thread {} created: entry 0x{:08x}, priority {}, stack 0x{:08x}+0x{:x}",
            id, params.entry, params.priority, stack_base, stack_size
        );
        Ok(id)
    }

    /// Seeds a dormant thread's context and makes it runnable.
    pub fn start_thread(&mut self, id: u32, arg: Option<u32>) -> KernelResult<()> {
        if id == 0 {
            return Err(InvalidState::IllegalThreadId.into());
        }
        let thread = THREADS.lookup_mut(&mut self.memory, id)?;
        if thread.status() != ThreadStatus::Created {
            return Err(InvalidState::NotDormant.into());
        }

        let mut context = ThreadContext::zeroed();
        context.pc = thread.entry;
        context.delayed_jump_addr = INVALID_PC;
        context.gpr[Register::Sp.index()] = thread.stack_top() - STACK_FRAME_RESERVE;
        context.gpr[Register::Ra.index()] = THREAD_FINISH_ADDR;
        context.gpr[Register::Gp.index()] = thread.gp;
        if let Some(arg) = arg {
            context.gpr[Register::A0.index()] = arg;
        }
        thread.context = context;
        thread.priority = thread.init_priority;
        thread.wakeup_count = 0;

        debug!("thread {} started", id);
        self.make_ready(id, false);
        Ok(())
    }

    /// Starts a thread with a copy of `args` on its stack: `a0` holds the
    /// length and `a1` the copy.
    pub fn start_thread_args(&mut self, id: u32, args: &[u8]) -> KernelResult<()> {
        self.start_thread(id, Some(args.len() as u32))?;
        let copy = self.push_to_thread_stack(id, args)?;
        let context = &mut self.thread_mut(id).context;
        context.gpr[Register::A1.index()] = copy;
        self.align_thread_stack(id);
        Ok(())
    }

    /// Copies `data` below the saved stack pointer of `id`, moving it down.
    pub(crate) fn push_to_thread_stack(&mut self, id: u32, data: &[u8]) -> KernelResult<u32> {
        let thread = self.thread(id);
        let sp = thread.context.gpr[Register::Sp.index()];
        let size = (data.len() as u32 + 3) & !3;
        let address = sp
            .checked_sub(size)
            .filter(|&addr| addr >= thread.stack_base)
            .ok_or(InvalidState::BadAddress(sp))?;
        if !self.memory.write_bytes(address, data) {
            return Err(InvalidState::BadAddress(address).into());
        }
        self.thread_mut(id).context.gpr[Register::Sp.index()] = address;
        Ok(address)
    }

    /// Leaves a 16-byte aligned frame below whatever was pushed.
    pub(crate) fn align_thread_stack(&mut self, id: u32) {
        let sp = &mut self.thread_mut(id).context.gpr[Register::Sp.index()];
        *sp = (*sp & !0xF) - STACK_FRAME_RESERVE;
    }

    /// Deletes a thread in any state. `0` names the calling thread.
    pub fn delete_thread(&mut self, id: u32) -> KernelResult<()> {
        let id = self.resolve_thread_id(id)?;
        let thread = *self.thread(id);
        if let Some(queue) = ThreadQueue::for_thread(&thread) {
            self.unlink(queue, id);
        }
        match thread.status() {
            ThreadStatus::WaitingSemaphore => {
                if let Some(sema) = SEMAPHORES.get_mut(&mut self.memory, thread.wait_semaphore) {
                    sema.wait_count -= 1;
                }
            }
            ThreadStatus::WaitingEventFlag => {
                if let Some(flag) = EVENT_FLAGS.get_mut(&mut self.memory, thread.wait_event_flag) {
                    flag.wait_count -= 1;
                }
            }
            _ => {}
        }
        self.reclaim_thread(id);
        debug!("thread {} deleted", id);
        self.request_reschedule();
        Ok(())
    }

    /// Ends the calling thread; its slot is reclaimed at the next reschedule.
    pub fn exit_current_thread(&mut self) {
        let id = self.current_thread_id();
        if id == 0 {
            warn!("thread exit with no current thread");
            return;
        }
        if let Some(queue) = ThreadQueue::for_thread(self.thread(id)) {
            self.unlink(queue, id);
        }
        self.thread_mut(id).set_status(ThreadStatus::Zombie);
        debug!("thread {} exited", id);
        self.request_reschedule();
    }

    /// Sleeps the calling thread until `microseconds` have elapsed on the
    /// kernel clock.
    pub fn delay_thread(&mut self, microseconds: u32) -> KernelResult<()> {
        let id = self.current_waiter()?;
        let wake = self
            .current_time()
            .saturating_add(self.micro_sec_to_clock(microseconds as u64));
        self.thread_mut(id).set_wake_time(Some(wake));
        self.block_current(id, ThreadStatus::Sleeping, ThreadQueue::Sleep);
        Ok(())
    }

    /// `0` changes the calling thread.
    pub fn change_thread_priority(&mut self, id: u32, priority: u32) -> KernelResult<()> {
        check_priority(priority)?;
        let id = self.resolve_thread_id(id)?;
        let status = self.thread(id).status();
        if status == ThreadStatus::Zombie {
            return Err(InvalidState::Dormant.into());
        }
        self.thread_mut(id).priority = priority;
        if status == ThreadStatus::Running {
            self.unlink(ThreadQueue::Ready, id);
            self.link_by_priority(ThreadQueue::Ready, id, false);
            self.request_reschedule();
        }
        Ok(())
    }

    /// Moves the first ready thread of `priority` behind its peers. `0`
    /// selects the calling thread's priority.
    pub fn rotate_thread_ready_queue(&mut self, priority: u32) -> KernelResult<()> {
        let priority = match priority {
            0 => {
                let current = self.current_thread_id();
                if current == 0 {
                    return Err(InvalidState::IllegalContext.into());
                }
                self.thread(current).priority
            }
            priority => {
                check_priority(priority)?;
                priority
            }
        };
        let first = self
            .queue_ids(ThreadQueue::Ready)
            .into_iter()
            .find(|&id| self.thread(id).priority == priority);
        if let Some(id) = first {
            self.unlink(ThreadQueue::Ready, id);
            self.link_by_priority(ThreadQueue::Ready, id, false);
            self.request_reschedule();
        }
        Ok(())
    }

    /// Sleeps the calling thread unless a wakeup is already pending.
    pub fn sleep_thread(&mut self) -> KernelResult<()> {
        let id = self.current_waiter()?;
        let thread = self.thread_mut(id);
        if thread.wakeup_count > 0 {
            thread.wakeup_count -= 1;
            trace!("thread {} consumed a pending wakeup", id);
            return Ok(());
        }
        thread.set_wake_time(None);
        self.block_current(id, ThreadStatus::Sleeping, ThreadQueue::Sleep);
        Ok(())
    }

    /// Ends an untimed sleep, or banks the wakeup for the next sleep.
    ///
    /// `clear_wakeup_count` zeroes the count of the thread it wakes. A
    /// thread only enters an untimed sleep with no wakeups pending
    /// ([`Bios::sleep_thread`] consumes one instead of blocking), so the
    /// flag changes nothing for state reached through kernel calls; it
    /// matters only for a restored or hand-edited control block.
    pub fn wakeup_thread(&mut self, id: u32, clear_wakeup_count: bool) -> KernelResult<()> {
        if id == 0 {
            return Err(InvalidState::IllegalThreadId.into());
        }
        let thread = THREADS.lookup_mut(&mut self.memory, id)?;
        match thread.status() {
            ThreadStatus::Created | ThreadStatus::Zombie => Err(InvalidState::Dormant.into()),
            ThreadStatus::Sleeping if thread.wake_time().is_none() => {
                if clear_wakeup_count {
                    thread.wakeup_count = 0;
                }
                self.unlink(ThreadQueue::Sleep, id);
                trace!("thread {} woken", id);
                self.make_ready(id, false);
                Ok(())
            }
            _ => {
                thread.wakeup_count += 1;
                Ok(())
            }
        }
    }

    /// Discards pending wakeups, returning how many there were.
    pub fn cancel_wakeup_thread(&mut self, id: u32) -> KernelResult<u32> {
        let id = self.resolve_thread_id(id)?;
        let thread = self.thread_mut(id);
        let count = thread.wakeup_count;
        thread.wakeup_count = 0;
        Ok(count)
    }

    pub fn sleep_thread_till_vblank_start(&mut self) -> KernelResult<()> {
        let id = self.current_waiter()?;
        self.block_current(id, ThreadStatus::WaitingVBlankStart, ThreadQueue::VBlankStart);
        Ok(())
    }

    pub fn sleep_thread_till_vblank_end(&mut self) -> KernelResult<()> {
        let id = self.current_waiter()?;
        self.block_current(id, ThreadStatus::WaitingVBlankEnd, ThreadQueue::VBlankEnd);
        Ok(())
    }

    /// Readies every thread waiting for the start of vertical blank.
    pub fn notify_vblank_start(&mut self) {
        self.release_vblank_waiters(ThreadQueue::VBlankStart);
        self.resolve_reschedule();
    }

    /// Readies every thread waiting for the end of vertical blank.
    pub fn notify_vblank_end(&mut self) {
        self.release_vblank_waiters(ThreadQueue::VBlankEnd);
        self.resolve_reschedule();
    }

    fn release_vblank_waiters(&mut self, queue: ThreadQueue) {
        while let Some(id) = self.pop_front(queue) {
            trace!("thread {} released by {:?}", id, queue);
            self.make_ready(id, false);
        }
    }

    /// Status snapshot of one thread. `0` names the calling thread.
    pub fn refer_thread_status(&self, id: u32) -> KernelResult<ThreadInfo> {
        let id = self.resolve_thread_id(id)?;
        Ok(self.thread_info(id))
    }

    pub fn get_thread_infos(&self) -> Vec<ThreadInfo> {
        THREADS
            .ids(&self.memory)
            .into_iter()
            .map(|id| self.thread_info(id))
            .collect()
    }

    fn thread_info(&self, id: u32) -> ThreadInfo {
        let thread = self.thread(id);
        let live = id == self.current_thread_id() && !self.in_interrupt();
        let reg = |reg: Register| {
            if live {
                self.cpu.reg(reg)
            } else {
                thread.context.gpr[reg.index()]
            }
        };
        ThreadInfo {
            id,
            priority: thread.priority,
            status: thread.status(),
            pc: if live { self.cpu.pc } else { thread.context.pc },
            ra: reg(Register::Ra),
            sp: reg(Register::Sp),
            wait_object: thread.wait_object(),
            wake_time: thread.wake_time(),
            wakeup_count: thread.wakeup_count,
        }
    }
}
