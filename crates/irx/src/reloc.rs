use log::trace;
use mips::instruction::{imm16, target26, with_imm16, with_target26};

use crate::error::RelocationError;

const R_MIPS_NONE: u32 = 0;
const R_MIPS_32: u32 = 2;
const R_MIPS_26: u32 = 4;
const R_MIPS_HI16: u32 = 5;
const R_MIPS_LO16: u32 = 6;
const R_MIPS_GPREL16: u32 = 7;
const R_MIPS_PC16: u32 = 10;

/// The relocation kinds IOP modules use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    None,
    /// Full word holding an address.
    Absolute32,
    /// `j`/`jal` target field.
    Jump26,
    /// Upper half of a `lui`/`addiu` address pair.
    Hi16,
    /// Lower half; completes every pending [`RelocationKind::Hi16`].
    Lo16,
    GpRelative16,
    PcRelative16,
}

impl RelocationKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            R_MIPS_NONE => Self::None,
            R_MIPS_32 => Self::Absolute32,
            R_MIPS_26 => Self::Jump26,
            R_MIPS_HI16 => Self::Hi16,
            R_MIPS_LO16 => Self::Lo16,
            R_MIPS_GPREL16 => Self::GpRelative16,
            R_MIPS_PC16 => Self::PcRelative16,
            _ => return None,
        })
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::None => R_MIPS_NONE,
            Self::Absolute32 => R_MIPS_32,
            Self::Jump26 => R_MIPS_26,
            Self::Hi16 => R_MIPS_HI16,
            Self::Lo16 => R_MIPS_LO16,
            Self::GpRelative16 => R_MIPS_GPREL16,
            Self::PcRelative16 => R_MIPS_PC16,
        }
    }
}

/// One entry: which word (link-space address) and how to patch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub offset: u32,
    pub kind: RelocationKind,
}

pub fn relocate_absolute(word: u32, delta: u32) -> u32 {
    word.wrapping_add(delta)
}

pub fn relocate_jump(word: u32, delta: u32) -> u32 {
    with_target26(word, target26(word).wrapping_add(delta >> 2))
}

/// New `lui` immediate for a pair whose full address moves by `delta`.
///
/// The low half is sign extended by the CPU, so the high half absorbs a
/// carry whenever bit 15 of the final low half is set.
pub fn relocate_hi16(hi: u32, lo: u32, delta: u32) -> u32 {
    let address = mips::instruction::hi_lo_address(hi, lo).wrapping_add(delta);
    with_imm16(hi, address.wrapping_add(0x8000) >> 16)
}

pub fn relocate_lo16(lo: u32, delta: u32) -> u32 {
    with_imm16(lo, imm16(lo).wrapping_add(delta))
}

/// Word-granular access to placed image bytes, addressed in link space.
pub trait WordAccess {
    fn read_word(&self, address: u32) -> Option<u32>;
    fn write_word(&mut self, address: u32, value: u32) -> bool;
}

/// Host buffer holding an image linked at `base`.
pub struct LinkedBuffer<'b> {
    pub base: u32,
    pub bytes: &'b mut [u8],
}

impl LinkedBuffer<'_> {
    fn range(&self, address: u32) -> Option<core::ops::Range<usize>> {
        let start = address.checked_sub(self.base)? as usize;
        let end = start.checked_add(4)?;
        (end <= self.bytes.len()).then_some(start..end)
    }
}

impl WordAccess for LinkedBuffer<'_> {
    fn read_word(&self, address: u32) -> Option<u32> {
        let range = self.range(address)?;
        Some(u32::from_le_bytes(self.bytes[range].try_into().ok()?))
    }

    fn write_word(&mut self, address: u32, value: u32) -> bool {
        match self.range(address) {
            Some(range) => {
                self.bytes[range].copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }
}

/// Applies `relocations` in order, moving every address by `delta`.
///
/// Hi16 entries are queued until the next Lo16, which completes all of them
/// with its own low half. Returns the number of patched words.
pub fn apply_relocations<W: WordAccess + ?Sized>(
    target: &mut W,
    relocations: &[Relocation],
    delta: u32,
) -> Result<usize, RelocationError> {
    let mut pending_hi: Vec<(u32, u32)> = Vec::new();
    let mut patched = 0;

    for reloc in relocations {
        if reloc.kind == RelocationKind::None {
            continue;
        }
        let offset = reloc.offset;
        let word = target
            .read_word(offset)
            .ok_or(RelocationError::OutOfRange { offset })?;

        let patched_word = match reloc.kind {
            RelocationKind::None | RelocationKind::GpRelative16 | RelocationKind::PcRelative16 => {
                continue;
            }
            RelocationKind::Absolute32 => relocate_absolute(word, delta),
            RelocationKind::Jump26 => relocate_jump(word, delta),
            RelocationKind::Hi16 => {
                pending_hi.push((offset, word));
                continue;
            }
            RelocationKind::Lo16 => {
                for (hi_offset, hi_word) in pending_hi.drain(..) {
                    let value = relocate_hi16(hi_word, word, delta);
                    if !target.write_word(hi_offset, value) {
                        return Err(RelocationError::OutOfRange { offset: hi_offset });
                    }
                    patched += 1;
                }
                relocate_lo16(word, delta)
            }
        };

        trace!(
            "reloc {:?} at 0x{:08x}: 0x{:08x} -> 0x{:08x}",
            reloc.kind,
            offset,
            word,
            patched_word
        );
        if !target.write_word(offset, patched_word) {
            return Err(RelocationError::OutOfRange { offset });
        }
        patched += 1;
    }

    if let Some(&(offset, _)) = pending_hi.first() {
        return Err(RelocationError::UnpairedHi16 { offset });
    }
    Ok(patched)
}
