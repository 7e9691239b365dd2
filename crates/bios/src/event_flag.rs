use bytemuck::{Pod, Zeroable};
use log::{debug, trace, warn};
use mips::Register;
use types::{ThreadStatus, KE_OK, KE_WAIT_DELETE, to_guest};

use crate::bios::Bios;
use crate::control_block::EVENT_FLAGS;
use crate::error::{InvalidState, KernelResult, ObjectKind};
use crate::os_struct::kernel_object;
use crate::queue::ThreadQueue;

/// Wait until all bits of the mask are set.
pub const WEF_AND: u32 = 0x00;
/// Wait until any bit of the mask is set.
pub const WEF_OR: u32 = 0x01;
/// Clear the matched bits once the wait is satisfied.
pub const WEF_CLEAR: u32 = 0x10;
/// Attribute allowing several threads to wait at once.
pub const EA_MULTI: u32 = 0x200;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct EventFlag {
    pub is_valid: u32,
    pub id: u32,
    pub attributes: u32,
    pub option: u32,
    pub initial_value: u32,
    pub value: u32,
    pub wait_count: u32,
    pub wait_head: u32,
}

kernel_object!(EventFlag, ObjectKind::EventFlag);

/// Result of `refer_event_flag_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFlagStatus {
    pub attributes: u32,
    pub option: u32,
    pub initial_bits: u32,
    pub current_bits: u32,
    pub wait_count: u32,
}

fn condition_met(value: u32, mask: u32, mode: u32) -> bool {
    if mode & WEF_OR != 0 {
        value & mask != 0
    } else {
        value & mask == mask
    }
}

fn check_wait(flag: &EventFlag, mask: u32, mode: u32) -> KernelResult<()> {
    if mask == 0 {
        return Err(InvalidState::IllegalPattern.into());
    }
    if mode & !(WEF_OR | WEF_CLEAR) != 0 {
        return Err(InvalidState::IllegalMode.into());
    }
    if flag.wait_count > 0 && flag.attributes & EA_MULTI == 0 {
        return Err(InvalidState::MultipleWaiters.into());
    }
    Ok(())
}

impl Bios {
    pub fn create_event_flag(
        &mut self,
        attributes: u32,
        option: u32,
        initial_bits: u32,
    ) -> KernelResult<u32> {
        let id = EVENT_FLAGS.allocate(&mut self.memory)?;
        let flag = EVENT_FLAGS.lookup_mut(&mut self.memory, id)?;
        flag.attributes = attributes;
        flag.option = option;
        flag.initial_value = initial_bits;
        flag.value = initial_bits;
        debug!("event flag {} created: bits 0x{:08x}", id, initial_bits);
        Ok(id)
    }

    /// Deletes an event flag; its waiters resume with `KE_WAIT_DELETE`.
    pub fn delete_event_flag(&mut self, id: u32) -> KernelResult<()> {
        EVENT_FLAGS.lookup(&self.memory, id)?;
        while let Some(thread_id) = self.pop_front(ThreadQueue::EventFlag(id)) {
            self.release_event_flag_waiter(thread_id, KE_WAIT_DELETE);
        }
        EVENT_FLAGS.release(&mut self.memory, id)?;
        debug!("event flag {} deleted", id);
        Ok(())
    }

    /// ORs `bits` into the flag. With `wake_threads`, waiters are checked in
    /// arrival order against the value as it evolves (earlier waiters may
    /// clear bits before later ones are checked).
    pub fn set_event_flag(&mut self, id: u32, bits: u32, wake_threads: bool) -> KernelResult<()> {
        EVENT_FLAGS.lookup_mut(&mut self.memory, id)?.value |= bits;
        if !wake_threads {
            return Ok(());
        }

        for thread_id in self.queue_ids(ThreadQueue::EventFlag(id)) {
            let (mask, mode, result_ptr) = {
                let thread = self.thread(thread_id);
                (thread.event_mask, thread.event_mode, thread.event_result_ptr)
            };
            let flag = self.event_flag_mut(id);
            let value = flag.value;
            if !condition_met(value, mask, mode) {
                continue;
            }
            if mode & WEF_CLEAR != 0 {
                flag.value &= !mask;
            }
            flag.wait_count -= 1;
            if result_ptr != 0 && self.write_word(result_ptr, value).is_err() {
                warn!(
                    "event flag {}: bad result pointer 0x{:08x} for thread {}",
                    id, result_ptr, thread_id
                );
            }
            self.unlink(ThreadQueue::EventFlag(id), thread_id);
            trace!("event flag {} released thread {}", id, thread_id);
            self.release_event_flag_waiter(thread_id, KE_OK);
        }
        Ok(())
    }

    /// Keeps only the bits set in `pattern`.
    pub fn clear_event_flag(&mut self, id: u32, pattern: u32) -> KernelResult<()> {
        EVENT_FLAGS.lookup_mut(&mut self.memory, id)?.value &= pattern;
        Ok(())
    }

    /// Waits for `mask` under `mode` (`WEF_AND`/`WEF_OR`, optionally
    /// `WEF_CLEAR`). The value seen on success is stored at `result_ptr`
    /// unless it is 0.
    pub fn wait_event_flag(
        &mut self,
        id: u32,
        mask: u32,
        mode: u32,
        result_ptr: u32,
    ) -> KernelResult<()> {
        let flag = EVENT_FLAGS.lookup(&self.memory, id)?;
        check_wait(flag, mask, mode)?;
        let thread_id = self.current_waiter()?;

        if self.try_take_event_flag(id, mask, mode, result_ptr)? {
            return Ok(());
        }

        self.event_flag_mut(id).wait_count += 1;
        let thread = self.thread_mut(thread_id);
        thread.wait_event_flag = id;
        thread.event_mask = mask;
        thread.event_mode = mode;
        thread.event_result_ptr = result_ptr;
        self.block_current(thread_id, ThreadStatus::WaitingEventFlag, ThreadQueue::EventFlag(id));
        Ok(())
    }

    /// Non-blocking [`Bios::wait_event_flag`].
    pub fn poll_event_flag(
        &mut self,
        id: u32,
        mask: u32,
        mode: u32,
        result_ptr: u32,
    ) -> KernelResult<()> {
        let flag = EVENT_FLAGS.lookup(&self.memory, id)?;
        check_wait(flag, mask, mode)?;
        if self.try_take_event_flag(id, mask, mode, result_ptr)? {
            Ok(())
        } else {
            Err(InvalidState::ConditionNotMet.into())
        }
    }

    pub fn refer_event_flag_status(&self, id: u32) -> KernelResult<EventFlagStatus> {
        let flag = EVENT_FLAGS.lookup(&self.memory, id)?;
        Ok(EventFlagStatus {
            attributes: flag.attributes,
            option: flag.option,
            initial_bits: flag.initial_value,
            current_bits: flag.value,
            wait_count: flag.wait_count,
        })
    }

    fn try_take_event_flag(
        &mut self,
        id: u32,
        mask: u32,
        mode: u32,
        result_ptr: u32,
    ) -> KernelResult<bool> {
        let value = self.event_flag_mut(id).value;
        if !condition_met(value, mask, mode) {
            return Ok(false);
        }
        if result_ptr != 0 {
            self.write_word(result_ptr, value)?;
        }
        if mode & WEF_CLEAR != 0 {
            self.event_flag_mut(id).value &= !mask;
        }
        Ok(true)
    }

    fn event_flag_mut(&mut self, id: u32) -> &mut EventFlag {
        EVENT_FLAGS
            .get_mut(&mut self.memory, id)
            .unwrap_or_else(|| panic!("event flag {} vanished", id))
    }

    fn release_event_flag_waiter(&mut self, thread_id: u32, result: i32) {
        let thread = self.thread_mut(thread_id);
        thread.wait_event_flag = 0;
        thread.context.gpr[Register::V0.index()] = to_guest(result);
        self.make_ready(thread_id, false);
    }
}
