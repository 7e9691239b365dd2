use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use bytemuck::Zeroable;
use log::{debug, info};
use mips::cpu::INVALID_PC;
use mips::{Assembler, Cpu, GuestMemory, Register};
use types::ModuleInfo;

use crate::config::BiosConfig;
use crate::control_block::*;
use crate::error::{InvalidState, KernelResult};
use crate::hle;
use crate::module::{DynamicModule, ModulePtr};
use crate::sysmem::{BlockAllocator, Sysmem};
use crate::thread::Thread;

/// The emulated IOP kernel.
///
/// Owns the guest CPU state and RAM; every kernel object lives in the
/// control block window of that RAM. The interpreter runs guest code
/// against [`Bios::cpu_mut`] / [`Bios::memory_mut`] and hands control back
/// through the driver entry points (`handle_exception`, `handle_interrupt`,
/// `count_ticks`, `notify_vblank_start`, `notify_vblank_end`).
pub struct Bios {
    pub(crate) config: BiosConfig,
    pub(crate) cpu: Cpu,
    pub(crate) memory: GuestMemory,
    pub(crate) sysmem: Box<dyn Sysmem>,
    pub(crate) modules: HashMap<String, ModulePtr>,
    pub(crate) dynamic_modules: Vec<DynamicModule>,
    pub(crate) loaded_modules: Vec<ModuleInfo>,
}

impl fmt::Debug for Bios {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bios")
            .field("config", &self.config)
            .field("cpu", &self.cpu)
            .field("modules", &self.modules.len())
            .field("dynamic_modules", &self.dynamic_modules.len())
            .field("loaded_modules", &self.loaded_modules.len())
            .finish()
    }
}

impl Bios {
    pub fn new(config: BiosConfig) -> Self {
        let sysmem = Box::new(BlockAllocator::new(USER_MEMORY_START, config.ram_size as u32));
        Self::with_sysmem(config, sysmem)
    }

    /// Kernel using an external memory allocator for stacks and modules.
    pub fn with_sysmem(config: BiosConfig, sysmem: Box<dyn Sysmem>) -> Self {
        assert!(
            config.ram_size > USER_MEMORY_START as usize,
            "guest RAM of 0x{:x} bytes cannot hold the kernel control block",
            config.ram_size
        );
        assert!(config.clock_frequency != 0, "clock frequency must be > 0");

        let mut bios = Self {
            config,
            cpu: Cpu::new(),
            memory: GuestMemory::new(config.ram_size),
            sysmem,
            modules: HashMap::new(),
            dynamic_modules: Vec::new(),
            loaded_modules: Vec::new(),
        };
        bios.reset();
        bios
    }

    /// Returns the kernel to its boot state: empty tables, no modules
    /// loaded, CPU parked on the idle loop.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.cpu = Cpu::new();
        self.sysmem.reset();
        *self.cb_mut() = ControlBlock::zeroed();
        self.assemble_routines();

        self.modules.clear();
        hle::register_kernel_libraries(self);
        self.clear_dynamic_modules();
        self.loaded_modules.clear();

        self.enter_idle();
        info!(
            "bios reset: {} KiB RAM, {} Hz clock",
            self.config.ram_size / 1024,
            self.config.clock_frequency
        );
    }

    fn assemble_routines(&mut self) {
        let mut idle = Assembler::new();
        let top = idle.label();
        idle.beq(Register::Zero, Register::Zero, top).nop();

        let mut thread_finish = Assembler::new();
        thread_finish
            .addiu(Register::V0, Register::Zero, SYSCALL_THREAD_FINISH as i16)
            .syscall();

        let mut return_from_exception = Assembler::new();
        return_from_exception
            .addiu(Register::V0, Register::Zero, SYSCALL_RETURN_FROM_EXCEPTION as i16)
            .syscall();

        for (addr, code) in [
            (IDLE_LOOP_ADDR, idle),
            (THREAD_FINISH_ADDR, thread_finish),
            (RETURN_FROM_EXCEPTION_ADDR, return_from_exception),
        ] {
            let written = self.memory.write_words(addr, code.words());
            debug_assert!(written, "routine at 0x{:08x} outside RAM", addr);
        }
        debug!("kernel routines assembled");
    }

    pub(crate) fn enter_idle(&mut self) {
        self.cpu.pc = IDLE_LOOP_ADDR;
        self.cpu.delayed_jump_addr = INVALID_PC;
    }

    pub fn config(&self) -> &BiosConfig {
        &self.config
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut GuestMemory {
        &mut self.memory
    }

    pub fn sysmem(&self) -> &dyn Sysmem {
        self.sysmem.as_ref()
    }

    pub fn sysmem_mut(&mut self) -> &mut dyn Sysmem {
        self.sysmem.as_mut()
    }

    pub fn control_block(&self) -> &ControlBlock {
        self.cb()
    }

    pub(crate) fn cb(&self) -> &ControlBlock {
        self.memory
            .view(CONTROL_BLOCK_START)
            .unwrap_or_else(|| panic!("control block outside guest RAM"))
    }

    pub(crate) fn cb_mut(&mut self) -> &mut ControlBlock {
        self.memory
            .view_mut(CONTROL_BLOCK_START)
            .unwrap_or_else(|| panic!("control block outside guest RAM"))
    }

    /// A thread the kernel's own bookkeeping refers to. A dangling id here
    /// means the queues are corrupt, which is unrecoverable.
    pub(crate) fn thread(&self, id: u32) -> &Thread {
        THREADS
            .get(&self.memory, id)
            .unwrap_or_else(|| panic!("kernel references invalid thread {}", id))
    }

    pub(crate) fn thread_mut(&mut self, id: u32) -> &mut Thread {
        THREADS
            .get_mut(&mut self.memory, id)
            .unwrap_or_else(|| panic!("kernel references invalid thread {}", id))
    }

    pub(crate) fn read_word(&self, addr: u32) -> KernelResult<u32> {
        self.memory
            .read_u32(addr)
            .ok_or(InvalidState::BadAddress(addr).into())
    }

    pub(crate) fn write_word(&mut self, addr: u32, value: u32) -> KernelResult<()> {
        if self.memory.write_u32(addr, value) {
            Ok(())
        } else {
            Err(InvalidState::BadAddress(addr).into())
        }
    }

    /// Writes a guest-visible return value.
    pub fn set_return_value(&mut self, value: u32) {
        self.cpu.set_reg(Register::V0, value);
    }

    pub(crate) fn module_handle(module: impl crate::module::Module + 'static) -> ModulePtr {
        Rc::new(RefCell::new(module))
    }
}
