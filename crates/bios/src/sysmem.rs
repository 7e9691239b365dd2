use std::collections::BTreeMap;

use log::trace;
use serde::{Deserialize, Serialize};

/// Granularity of every allocation.
pub const BLOCK_ALIGN: u32 = 0x100;

/// An allocated range of guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub address: u32,
    pub size: u32,
}

/// Guest memory allocator used for thread stacks and module images.
pub trait Sysmem {
    /// Reserves `size` bytes anywhere, returning the block address.
    fn allocate(&mut self, size: u32) -> Option<u32>;

    /// Reserves exactly `[address, address + size)`.
    fn allocate_at(&mut self, address: u32, size: u32) -> Option<u32>;

    /// Frees the block starting at `address`.
    fn free(&mut self, address: u32) -> bool;

    /// Bytes not covered by any block.
    fn free_memory(&self) -> u32;

    fn blocks(&self) -> Vec<MemoryBlock>;

    /// Replaces every block with `blocks`, failing with the first block
    /// that cannot be reserved.
    fn restore(&mut self, blocks: &[MemoryBlock]) -> Result<(), MemoryBlock>;

    fn reset(&mut self);
}

/// First-fit allocator over `[start, end)`.
#[derive(Debug, Clone)]
pub struct BlockAllocator {
    start: u32,
    end: u32,
    blocks: BTreeMap<u32, u32>,
}

fn align_up(value: u32) -> Option<u32> {
    value
        .checked_add(BLOCK_ALIGN - 1)
        .map(|v| v & !(BLOCK_ALIGN - 1))
}

impl BlockAllocator {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            blocks: BTreeMap::new(),
        }
    }

    fn is_free(&self, address: u32, size: u32) -> bool {
        let Some(end) = address.checked_add(size) else {
            return false;
        };
        if address < self.start || end > self.end {
            return false;
        }
        self.blocks
            .iter()
            .all(|(&block, &block_size)| end <= block || address >= block + block_size)
    }
}

impl Sysmem for BlockAllocator {
    fn allocate(&mut self, size: u32) -> Option<u32> {
        let size = align_up(size.max(1))?;
        let mut candidate = align_up(self.start)?;
        for (&block, &block_size) in &self.blocks {
            if candidate.checked_add(size)? <= block {
                break;
            }
            candidate = candidate.max(align_up(block + block_size)?);
        }
        if candidate.checked_add(size)? > self.end {
            return None;
        }
        self.blocks.insert(candidate, size);
        trace!("sysmem: allocated 0x{:08x}+0x{:x}", candidate, size);
        Some(candidate)
    }

    fn allocate_at(&mut self, address: u32, size: u32) -> Option<u32> {
        let size = size.max(1);
        if !self.is_free(address, size) {
            return None;
        }
        self.blocks.insert(address, size);
        trace!("sysmem: reserved 0x{:08x}+0x{:x}", address, size);
        Some(address)
    }

    fn free(&mut self, address: u32) -> bool {
        self.blocks.remove(&address).is_some()
    }

    fn free_memory(&self) -> u32 {
        let used: u32 = self.blocks.values().sum();
        (self.end - self.start).saturating_sub(used)
    }

    fn blocks(&self) -> Vec<MemoryBlock> {
        self.blocks
            .iter()
            .map(|(&address, &size)| MemoryBlock { address, size })
            .collect()
    }

    fn restore(&mut self, blocks: &[MemoryBlock]) -> Result<(), MemoryBlock> {
        self.blocks.clear();
        for block in blocks {
            if self.allocate_at(block.address, block.size).is_none() {
                self.blocks.clear();
                return Err(*block);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.blocks.clear();
    }
}
