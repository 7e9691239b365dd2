//! Read-only snapshots handed to debuggers and other introspection tools.

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Thread states as stored in the guest-visible thread control block.
///
/// The discriminants are the raw values kept in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ThreadStatus {
    Created = 1,
    Running = 2,
    Sleeping = 3,
    Zombie = 4,
    WaitingSemaphore = 5,
    WaitingEventFlag = 6,
    WaitingVBlankStart = 7,
    WaitingVBlankEnd = 8,
}

impl ThreadStatus {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Created),
            2 => Some(Self::Running),
            3 => Some(Self::Sleeping),
            4 => Some(Self::Zombie),
            5 => Some(Self::WaitingSemaphore),
            6 => Some(Self::WaitingEventFlag),
            7 => Some(Self::WaitingVBlankStart),
            8 => Some(Self::WaitingVBlankEnd),
            _ => None,
        }
    }

    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// True for every state that parks the thread until something wakes it.
    pub const fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::Sleeping
                | Self::WaitingSemaphore
                | Self::WaitingEventFlag
                | Self::WaitingVBlankStart
                | Self::WaitingVBlankEnd
        )
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Sleeping => "Sleeping",
            Self::Zombie => "Zombie",
            Self::WaitingSemaphore => "Waiting (semaphore)",
            Self::WaitingEventFlag => "Waiting (event flag)",
            Self::WaitingVBlankStart => "Waiting (vblank start)",
            Self::WaitingVBlankEnd => "Waiting (vblank end)",
        };
        f.write_str(name)
    }
}

/// Snapshot of one live thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: u32,
    pub priority: u32,
    pub status: ThreadStatus,
    /// Live PC for the current thread, saved resume PC otherwise.
    pub pc: u32,
    pub ra: u32,
    pub sp: u32,
    /// Semaphore or event flag the thread is blocked on, if any.
    pub wait_object: Option<u32>,
    /// Absolute clock tick of a timed sleep.
    pub wake_time: Option<u64>,
    pub wakeup_count: u32,
}

/// Descriptor of a module placed in guest memory by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub begin: u32,
    pub end: u32,
    pub entry: u32,
    pub gp: u32,
    pub text_size: u32,
    pub data_size: u32,
    pub bss_size: u32,
}

impl ModuleInfo {
    pub fn contains(&self, address: u32) -> bool {
        address >= self.begin && address < self.end
    }
}
