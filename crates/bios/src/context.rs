use mips::Register;

use crate::bios::Bios;

impl Bios {
    /// Copies the live CPU registers into thread `id`'s saved context.
    pub fn save_context(&mut self, id: u32) {
        let gpr = self.cpu.gpr;
        let pc = self.cpu.pc;
        let delayed_jump_addr = self.cpu.delayed_jump_addr;
        let context = &mut self.thread_mut(id).context;
        context.gpr = gpr;
        context.pc = pc;
        context.delayed_jump_addr = delayed_jump_addr;
    }

    /// Loads thread `id`'s saved context into the CPU.
    pub fn restore_context(&mut self, id: u32) {
        let context = self.thread(id).context;
        self.cpu.gpr = context.gpr;
        self.cpu.gpr[Register::Zero.index()] = 0;
        self.cpu.pc = context.pc;
        self.cpu.delayed_jump_addr = context.delayed_jump_addr;
    }
}
