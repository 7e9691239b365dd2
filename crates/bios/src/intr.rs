use bytemuck::{Pod, Zeroable};
use log::{debug, trace};
use mips::cpu::INVALID_PC;
use mips::Register;

use crate::bios::Bios;
use crate::control_block::{EXCEPTION_STACK_TOP, INTERRUPT_HANDLERS, RETURN_FROM_EXCEPTION_ADDR};
use crate::error::{InvalidState, KernelResult, ObjectKind};
use crate::os_struct::kernel_object;

/// Number of interrupt lines the dispatcher scans.
pub const INTERRUPT_LINES: u32 = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InterruptHandler {
    pub is_valid: u32,
    pub id: u32,
    pub line: u32,
    pub mode: u32,
    pub handler: u32,
    pub arg: u32,
}

kernel_object!(InterruptHandler, ObjectKind::InterruptHandler);

impl Bios {
    /// Installs `handler` for `line`. A line holds at most one handler.
    pub fn register_interrupt_handler(
        &mut self,
        line: u32,
        mode: u32,
        handler: u32,
        arg: u32,
    ) -> KernelResult<u32> {
        if line >= INTERRUPT_LINES {
            return Err(InvalidState::IllegalInterruptLine.into());
        }
        if self.find_interrupt_handler(line).is_some() {
            return Err(InvalidState::HandlerInUse.into());
        }
        let id = INTERRUPT_HANDLERS.allocate(&mut self.memory)?;
        let slot = INTERRUPT_HANDLERS.lookup_mut(&mut self.memory, id)?;
        slot.line = line;
        slot.mode = mode;
        slot.handler = handler;
        slot.arg = arg;
        debug!(
            "interrupt handler {} registered: line {}, handler 0x{:08x}, arg 0x{:08x}",
            id, line, handler, arg
        );
        Ok(id)
    }

    pub fn release_interrupt_handler(&mut self, id: u32) -> KernelResult<()> {
        INTERRUPT_HANDLERS.release(&mut self.memory, id)?;
        debug!("interrupt handler {} released", id);
        Ok(())
    }

    /// Slot of the handler installed on `line`.
    pub fn find_interrupt_handler(&self, line: u32) -> Option<u32> {
        INTERRUPT_HANDLERS
            .iter(&self.memory)
            .find(|slot| slot.line == line)
            .map(|slot| slot.id)
    }

    /// Enters the handler of the lowest pending line in `cause`.
    ///
    /// Returns false when nothing was dispatched: no handler for any pending
    /// line, or a handler is already running.
    pub fn handle_interrupt(&mut self, cause: u64) -> bool {
        if self.in_interrupt() {
            return false;
        }
        let Some(slot) = (0..INTERRUPT_LINES)
            .filter(|line| cause & (1u64 << line) != 0)
            .find_map(|line| {
                INTERRUPT_HANDLERS
                    .iter(&self.memory)
                    .find(|slot| slot.line == line)
                    .copied()
            })
        else {
            return false;
        };

        let current = self.current_thread_id();
        if current != 0 {
            self.save_context(current);
        }
        self.cb_mut().in_interrupt = 1;
        self.cpu.enter_exception();

        self.cpu.pc = slot.handler;
        self.cpu.delayed_jump_addr = INVALID_PC;
        self.cpu.set_reg(Register::A0, slot.arg);
        self.cpu.set_reg(Register::Sp, EXCEPTION_STACK_TOP);
        self.cpu.set_reg(Register::Ra, RETURN_FROM_EXCEPTION_ADDR);
        trace!("interrupt line {} -> handler 0x{:08x}", slot.line, slot.handler);
        true
    }

    /// Leaves the running handler and resumes thread scheduling. The CPU
    /// holds handler state, so nothing is saved.
    pub fn return_from_exception(&mut self) {
        self.cb_mut().in_interrupt = 0;
        self.cpu.leave_exception();
        self.switch_to_next_thread();
    }
}
