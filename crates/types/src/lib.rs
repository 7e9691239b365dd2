#![no_std]

extern crate alloc;

pub mod result;
pub use result::*;

pub mod debug;
pub use debug::{ModuleInfo, ThreadInfo, ThreadStatus};
