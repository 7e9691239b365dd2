use log::info;
use serde::{Deserialize, Serialize};
use types::ModuleInfo;

use crate::bios::Bios;
use crate::control_block::{CONTROL_BLOCK_SIZE, CONTROL_BLOCK_START};
use crate::error::StateError;
use crate::module::DynamicModule;
use crate::sysmem::MemoryBlock;

/// Everything the kernel needs to resume, apart from guest RAM outside the
/// control block and the CPU registers, which the host saves itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiosState {
    #[serde(with = "hex")]
    pub control_block: Vec<u8>,
    pub modules: Vec<ModuleInfo>,
    pub dynamic_modules: Vec<DynamicModule>,
    pub memory_blocks: Vec<MemoryBlock>,
}

impl Bios {
    pub fn save_state(&self) -> BiosState {
        let control_block = self
            .memory
            .read_bytes(CONTROL_BLOCK_START, CONTROL_BLOCK_SIZE)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        BiosState {
            control_block,
            modules: self.loaded_modules.clone(),
            dynamic_modules: self.dynamic_modules.clone(),
            memory_blocks: self.sysmem.blocks(),
        }
    }

    pub fn load_state(&mut self, state: &BiosState) -> Result<(), StateError> {
        if state.control_block.len() != CONTROL_BLOCK_SIZE {
            return Err(StateError::ControlBlockSize {
                expected: CONTROL_BLOCK_SIZE,
                found: state.control_block.len(),
            });
        }
        if let Err(block) = self.sysmem.restore(&state.memory_blocks) {
            return Err(StateError::MemoryBlock {
                address: block.address,
                size: block.size,
            });
        }
        self.memory
            .write_bytes(CONTROL_BLOCK_START, &state.control_block);
        self.loaded_modules = state.modules.clone();
        self.dynamic_modules = state.dynamic_modules.clone();
        info!(
            "bios state restored: {} modules, {} dynamic modules",
            self.loaded_modules.len(),
            self.dynamic_modules.len()
        );
        Ok(())
    }
}
