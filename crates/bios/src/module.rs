use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use mips::cpu::INVALID_PC;
use mips::GuestMemory;
use serde::{Deserialize, Serialize};

use crate::bios::Bios;

/// Magic word opening an import table in guest code.
pub const IMPORT_TABLE_MAGIC: u32 = 0x41E0_0000;
/// Magic word opening an export table.
pub const EXPORT_TABLE_MAGIC: u32 = 0x41C0_0000;
/// Offset of the 8-byte library name in both table kinds.
pub const LIBRARY_NAME_OFFSET: u32 = 12;
pub const LIBRARY_NAME_LEN: usize = 8;
/// Offset of the first function pointer of an export table.
const EXPORT_FUNCTIONS_OFFSET: u32 = 20;
/// Upper bound on export table length; guards against unterminated tables.
const MAX_EXPORTS: u32 = 0x400;

/// A library guest code can import: `invoke` runs function `function_id`
/// with the caller's arguments in `a0`..`a3` and leaves the result in `v0`.
pub trait Module {
    fn id(&self) -> &str;

    fn function_name(&self, _function_id: u32) -> Option<&'static str> {
        None
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32);
}

pub type ModulePtr = Rc<RefCell<dyn Module>>;

/// Reads an 8-byte, NUL-padded library name.
pub fn read_library_name(memory: &GuestMemory, address: u32) -> Option<String> {
    let raw = memory.read_bytes(address, LIBRARY_NAME_LEN)?;
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Some(String::from_utf8_lossy(&raw[..len]).into_owned())
}

/// A library exported by guest code through an export table; calling
/// function N jumps to the table's Nth pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicModule {
    name: String,
    export_table: u32,
    function_count: u32,
}

impl DynamicModule {
    pub fn from_export_table(memory: &GuestMemory, export_table: u32) -> Option<Self> {
        if memory.read_u32(export_table)? != EXPORT_TABLE_MAGIC {
            return None;
        }
        let name = read_library_name(memory, export_table + LIBRARY_NAME_OFFSET)?;
        let function_count = (0..MAX_EXPORTS)
            .take_while(|&index| {
                memory
                    .read_u32(export_table + EXPORT_FUNCTIONS_OFFSET + index * 4)
                    .is_some_and(|ptr| ptr != 0)
            })
            .count() as u32;
        Some(Self {
            name,
            export_table,
            function_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export_table(&self) -> u32 {
        self.export_table
    }

    pub fn function_count(&self) -> u32 {
        self.function_count
    }

    pub fn function_address(&self, memory: &GuestMemory, function_id: u32) -> Option<u32> {
        if function_id >= self.function_count {
            return None;
        }
        memory.read_u32(self.export_table + EXPORT_FUNCTIONS_OFFSET + function_id * 4)
    }
}

impl Module for DynamicModule {
    fn id(&self) -> &str {
        &self.name
    }

    fn invoke(&mut self, bios: &mut Bios, function_id: u32) {
        match self.function_address(&bios.memory, function_id) {
            Some(address) => {
                bios.cpu.pc = address;
                bios.cpu.delayed_jump_addr = INVALID_PC;
            }
            None => warn!("{}: no export #{}", self.name, function_id),
        }
    }
}

impl Bios {
    /// Makes a native library importable by name, replacing any library of
    /// the same name.
    pub fn register_module(&mut self, module: ModulePtr) {
        let name = module.borrow().id().to_string();
        debug!("module '{}' registered", name);
        self.modules.insert(name, module);
    }

    pub fn find_module(&self, name: &str) -> Option<ModulePtr> {
        self.modules.get(name).cloned()
    }

    /// Registers a guest library. A later registration of the same name
    /// replaces the earlier one in place.
    pub fn register_dynamic_module(&mut self, module: DynamicModule) {
        debug!(
            "dynamic module '{}' registered: {} exports at 0x{:08x}",
            module.name, module.function_count, module.export_table
        );
        match self
            .dynamic_modules
            .iter_mut()
            .find(|existing| existing.name == module.name)
        {
            Some(existing) => *existing = module,
            None => self.dynamic_modules.push(module),
        }
    }

    pub fn clear_dynamic_modules(&mut self) {
        self.dynamic_modules.clear();
    }

    pub fn dynamic_modules(&self) -> &[DynamicModule] {
        &self.dynamic_modules
    }

    /// Calls function `function_id` of library `name`: native libraries
    /// first, then guest ones. False when no library has that name.
    pub fn invoke_module(&mut self, name: &str, function_id: u32) -> bool {
        if let Some(module) = self.find_module(name) {
            if self.config.verbose {
                let label = module.borrow().function_name(function_id);
                debug!("{}::{}", name, label.unwrap_or("unknown"));
            }
            module.borrow_mut().invoke(self, function_id);
            return true;
        }
        let dynamic = self
            .dynamic_modules
            .iter()
            .find(|module| module.name == name)
            .cloned();
        match dynamic {
            Some(mut module) => {
                module.invoke(self, function_id);
                true
            }
            None => false,
        }
    }
}
