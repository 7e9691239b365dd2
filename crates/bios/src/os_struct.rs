use core::marker::PhantomData;
use core::mem::size_of;

use bytemuck::Pod;
use mips::GuestMemory;

use crate::error::{KernelError, ObjectKind};

/// A kernel object stored in a fixed slot of guest memory.
///
/// Every object starts with a validity word followed by its id.
pub trait KernelObject: Pod {
    const KIND: ObjectKind;

    fn is_valid(&self) -> bool;
    fn id(&self) -> u32;
    fn set_header(&mut self, valid: bool, id: u32);
}

macro_rules! kernel_object {
    ($ty:ty, $kind:expr) => {
        impl $crate::os_struct::KernelObject for $ty {
            const KIND: $crate::error::ObjectKind = $kind;

            fn is_valid(&self) -> bool {
                self.is_valid != 0
            }

            fn id(&self) -> u32 {
                self.id
            }

            fn set_header(&mut self, valid: bool, id: u32) {
                self.is_valid = valid as u32;
                self.id = id;
            }
        }
    };
}
pub(crate) use kernel_object;

/// Fixed-capacity table of kernel objects laid out contiguously in guest memory.
///
/// The table is only a descriptor (base address and slot count); slots are
/// read and written through the guest memory they live in. Ids are slot
/// numbers starting at 1, so 0 never names an object.
pub struct ObjectTable<T> {
    base: u32,
    capacity: u32,
    _marker: PhantomData<T>,
}

impl<T> Clone for ObjectTable<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectTable<T> {}

impl<T> core::fmt::Debug for ObjectTable<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectTable")
            .field("base", &format_args!("0x{:08x}", self.base))
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> ObjectTable<T> {
    pub const fn new(base: u32, capacity: u32) -> Self {
        Self {
            base,
            capacity,
            _marker: PhantomData,
        }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// First byte past the last slot.
    pub const fn end(&self) -> u32 {
        self.base + self.capacity * size_of::<T>() as u32
    }

    /// Guest address of slot `id`.
    pub fn address_of(&self, id: u32) -> Option<u32> {
        if id == 0 || id > self.capacity {
            return None;
        }
        Some(self.base + (id - 1) * size_of::<T>() as u32)
    }

    /// Slot id whose object starts at `addr`.
    pub fn id_from_address(&self, addr: u32) -> Option<u32> {
        let offset = addr.checked_sub(self.base)?;
        let size = size_of::<T>() as u32;
        if offset % size != 0 || offset / size >= self.capacity {
            return None;
        }
        Some(offset / size + 1)
    }
}

impl<T: KernelObject> ObjectTable<T> {
    fn slot<'m>(&self, memory: &'m GuestMemory, id: u32) -> Option<&'m T> {
        memory.view::<T>(self.address_of(id)?)
    }

    fn slot_mut<'m>(&self, memory: &'m mut GuestMemory, id: u32) -> Option<&'m mut T> {
        memory.view_mut::<T>(self.address_of(id)?)
    }

    /// Claims the lowest free slot, zeroed, and returns its id.
    pub fn allocate(&self, memory: &mut GuestMemory) -> Result<u32, KernelError> {
        let id = (1..=self.capacity)
            .find(|&id| self.slot(memory, id).is_some_and(|obj| !obj.is_valid()))
            .ok_or(KernelError::ResourceExhausted(T::KIND))?;
        let slot = self
            .slot_mut(memory, id)
            .ok_or(KernelError::ResourceExhausted(T::KIND))?;
        *slot = T::zeroed();
        slot.set_header(true, id);
        Ok(id)
    }

    pub fn release(&self, memory: &mut GuestMemory, id: u32) -> Result<(), KernelError> {
        match self.slot_mut(memory, id) {
            Some(slot) if slot.is_valid() => {
                *slot = T::zeroed();
                Ok(())
            }
            _ => Err(KernelError::InvalidHandle(T::KIND, id)),
        }
    }

    /// The live object with `id`.
    pub fn get<'m>(&self, memory: &'m GuestMemory, id: u32) -> Option<&'m T> {
        self.slot(memory, id).filter(|obj| obj.is_valid())
    }

    pub fn get_mut<'m>(&self, memory: &'m mut GuestMemory, id: u32) -> Option<&'m mut T> {
        self.slot_mut(memory, id).filter(|obj| obj.is_valid())
    }

    /// Like [`ObjectTable::get`], failing with an invalid-handle error.
    pub fn lookup<'m>(&self, memory: &'m GuestMemory, id: u32) -> Result<&'m T, KernelError> {
        self.get(memory, id)
            .ok_or(KernelError::InvalidHandle(T::KIND, id))
    }

    pub fn lookup_mut<'m>(
        &self,
        memory: &'m mut GuestMemory,
        id: u32,
    ) -> Result<&'m mut T, KernelError> {
        self.get_mut(memory, id)
            .ok_or(KernelError::InvalidHandle(T::KIND, id))
    }

    /// Ids of every live object, ascending.
    pub fn ids(&self, memory: &GuestMemory) -> Vec<u32> {
        (1..=self.capacity)
            .filter(|&id| self.get(memory, id).is_some())
            .collect()
    }

    pub fn iter<'m>(self, memory: &'m GuestMemory) -> impl Iterator<Item = &'m T> + 'm {
        (1..=self.capacity).filter_map(move |id| self.get(memory, id))
    }

    pub fn count(&self, memory: &GuestMemory) -> usize {
        self.iter(memory).count()
    }

    /// Frees every slot.
    pub fn clear(&self, memory: &mut GuestMemory) {
        for id in 1..=self.capacity {
            if let Some(slot) = self.slot_mut(memory, id) {
                *slot = T::zeroed();
            }
        }
    }
}
