use bios::{Bios, DynamicModule};
use serde::{Deserialize, Serialize};
use types::{ModuleInfo, ThreadInfo};

use crate::image_info::ImageInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicModuleEntry {
    pub name: String,
    pub export_table: u32,
    pub function_count: u32,
}

impl From<&DynamicModule> for DynamicModuleEntry {
    fn from(module: &DynamicModule) -> Self {
        Self {
            name: module.name().to_string(),
            export_table: module.export_table(),
            function_count: module.function_count(),
        }
    }
}

/// Everything printed after the modules have been loaded and started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub images: Vec<ImageInfo>,
    pub modules: Vec<ModuleInfo>,
    pub threads: Vec<ThreadInfo>,
    pub dynamic_modules: Vec<DynamicModuleEntry>,
    pub current_thread: u32,
    pub time: u64,
    pub free_memory: u32,
}

impl Report {
    pub fn collect(bios: &Bios, images: Vec<ImageInfo>) -> Self {
        Self {
            images,
            modules: bios.get_module_infos(),
            threads: bios.get_thread_infos(),
            dynamic_modules: bios.dynamic_modules().iter().map(Into::into).collect(),
            current_thread: bios.current_thread_id(),
            time: bios.current_time(),
            free_memory: bios.sysmem().free_memory(),
        }
    }
}
