use core::fmt;

use irx::{ImageError, RelocationError};
use types::*;

/// Kind of kernel object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Thread,
    Semaphore,
    EventFlag,
    InterruptHandler,
    Memory,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Thread => "thread",
            Self::Semaphore => "semaphore",
            Self::EventFlag => "event flag",
            Self::InterruptHandler => "interrupt handler",
            Self::Memory => "memory",
        })
    }
}

/// Why an otherwise valid object refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidState {
    Dormant,
    NotDormant,
    IllegalContext,
    IllegalThreadId,
    IllegalPriority,
    IllegalEntry,
    IllegalMode,
    IllegalPattern,
    IllegalInterruptLine,
    HandlerInUse,
    HandlerNotFound,
    MultipleWaiters,
    SemaphoreZero,
    ConditionNotMet,
    BadAddress(u32),
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dormant => f.write_str("thread is dormant"),
            Self::NotDormant => f.write_str("thread is not dormant"),
            Self::IllegalContext => f.write_str("not allowed in this context"),
            Self::IllegalThreadId => f.write_str("illegal thread id"),
            Self::IllegalPriority => f.write_str("illegal priority"),
            Self::IllegalEntry => f.write_str("illegal entry point"),
            Self::IllegalMode => f.write_str("illegal wait mode"),
            Self::IllegalPattern => f.write_str("illegal bit pattern"),
            Self::IllegalInterruptLine => f.write_str("illegal interrupt line"),
            Self::HandlerInUse => f.write_str("interrupt line already has a handler"),
            Self::HandlerNotFound => f.write_str("no handler registered"),
            Self::MultipleWaiters => f.write_str("event flag does not allow multiple waiters"),
            Self::SemaphoreZero => f.write_str("semaphore count is zero"),
            Self::ConditionNotMet => f.write_str("event flag condition not met"),
            Self::BadAddress(addr) => write!(f, "bad guest address 0x{:08x}", addr),
        }
    }
}

/// Failure of a kernel service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    ResourceExhausted(ObjectKind),
    InvalidHandle(ObjectKind, u32),
    InvalidState(InvalidState),
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Firmware result code reported to guest code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ResourceExhausted(_) => KE_NO_MEMORY,
            Self::InvalidHandle(kind, _) => match kind {
                ObjectKind::Thread => KE_UNKNOWN_THID,
                ObjectKind::Semaphore => KE_UNKNOWN_SEMID,
                ObjectKind::EventFlag => KE_UNKNOWN_EVFID,
                ObjectKind::InterruptHandler => KE_NOTFOUND_HANDLER,
                ObjectKind::Memory => KE_ERROR,
            },
            Self::InvalidState(state) => match state {
                InvalidState::Dormant => KE_DORMANT,
                InvalidState::NotDormant => KE_NOT_DORMANT,
                InvalidState::IllegalContext => KE_ILLEGAL_CONTEXT,
                InvalidState::IllegalThreadId => KE_ILLEGAL_THID,
                InvalidState::IllegalPriority => KE_ILLEGAL_PRIORITY,
                InvalidState::IllegalEntry => KE_ILLEGAL_ENTRY,
                InvalidState::IllegalMode => KE_ILLEGAL_MODE,
                InvalidState::IllegalPattern => KE_EVF_ILPAT,
                InvalidState::IllegalInterruptLine => KE_ILLEGAL_INTRCODE,
                InvalidState::HandlerInUse => KE_FOUND_HANDLER,
                InvalidState::HandlerNotFound => KE_NOTFOUND_HANDLER,
                InvalidState::MultipleWaiters => KE_EVF_MULTI,
                InvalidState::SemaphoreZero => KE_SEMA_ZERO,
                InvalidState::ConditionNotMet => KE_EVF_COND,
                InvalidState::BadAddress(_) => KE_ERROR,
            },
        }
    }
}

impl From<InvalidState> for KernelError {
    fn from(state: InvalidState) -> Self {
        Self::InvalidState(state)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted(kind) => write!(f, "out of {} slots", kind),
            Self::InvalidHandle(kind, id) => write!(f, "invalid {} id {}", kind, id),
            Self::InvalidState(state) => write!(f, "{}", state),
        }
    }
}

impl std::error::Error for KernelError {}

/// Failure while loading an executable or module.
#[derive(Debug)]
pub enum LoadError {
    ImageFormat(ImageError),
    Relocation(RelocationError),
    Kernel(KernelError),
    OutOfMemory { size: u32 },
    DoesNotFit { base: u32, size: u32 },
    /// The range overlaps the kernel control block.
    KernelRegion { base: u32, size: u32 },
    BadGuestAddress(u32),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageFormat(err) => write!(f, "invalid image: {}", err),
            Self::Relocation(err) => write!(f, "relocation failed: {}", err),
            Self::Kernel(err) => write!(f, "kernel error: {}", err),
            Self::OutOfMemory { size } => write!(f, "cannot allocate 0x{:x} bytes", size),
            Self::DoesNotFit { base, size } => write!(
                f,
                "image of 0x{:x} bytes does not fit at 0x{:08x}",
                size, base
            ),
            Self::KernelRegion { base, size } => write!(
                f,
                "0x{:08x}+0x{:x} overlaps the kernel control block",
                base, size
            ),
            Self::BadGuestAddress(addr) => write!(f, "bad guest address 0x{:08x}", addr),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageFormat(err) => Some(err),
            Self::Relocation(err) => Some(err),
            Self::Kernel(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImageError> for LoadError {
    fn from(err: ImageError) -> Self {
        Self::ImageFormat(err)
    }
}

impl From<RelocationError> for LoadError {
    fn from(err: RelocationError) -> Self {
        Self::Relocation(err)
    }
}

impl From<KernelError> for LoadError {
    fn from(err: KernelError) -> Self {
        Self::Kernel(err)
    }
}

/// A saved state that does not fit this kernel instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    ControlBlockSize { expected: usize, found: usize },
    MemoryBlock { address: u32, size: u32 },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlBlockSize { expected, found } => write!(
                f,
                "control block is {} bytes, expected {}",
                found, expected
            ),
            Self::MemoryBlock { address, size } => write!(
                f,
                "memory block 0x{:08x}+0x{:x} is outside user memory",
                address, size
            ),
        }
    }
}

impl std::error::Error for StateError {}
