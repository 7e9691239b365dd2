use goblin::elf::header::{EM_MIPS, ET_EXEC};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::{SHF_ALLOC, SHT_NOBITS};
use goblin::elf::Elf;
use log::debug;

use crate::error::{ImageError, RelocationError};
use crate::reloc::{Relocation, RelocationKind};

/// ELF type of IOP relocatable modules (`.irx`).
pub const ET_SCE_IOPRELEXEC: u16 = 0xFF80;
/// Second relocatable variant emitted by later toolchains.
pub const ET_SCE_IOPRELEXEC2: u16 = 0xFF81;
/// Section carrying the IOPMOD module descriptor.
pub const SHT_IOPMOD: u32 = 0x7000_0080;

/// Fixed part of the IOPMOD record preceding the module name.
const IOPMOD_HEADER_SIZE: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Linked at a fixed address, loaded there.
    Executable,
    /// Linked at 0 and placed wherever the allocator finds room.
    Relocatable,
}

/// The single loadable program segment of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub offset: u32,
    pub vaddr: u32,
    pub file_size: u32,
    pub mem_size: u32,
}

impl Segment {
    pub fn contains(&self, vaddr: u32, len: u32) -> bool {
        let Some(end) = vaddr.checked_add(len) else {
            return false;
        };
        vaddr >= self.vaddr && end <= self.vaddr.wrapping_add(self.mem_size)
    }
}

/// Module descriptor from the IOPMOD section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IopMod {
    pub module_info: u32,
    pub start_address: u32,
    pub gp: u32,
    pub text_size: u32,
    pub data_size: u32,
    pub bss_size: u32,
    pub attributes: u16,
    pub name: String,
}

pub struct Section<'a> {
    pub index: usize,
    pub name: String,
    pub kind: u32,
    pub flags: u64,
    pub addr: u32,
    pub size: u32,
    pub data: &'a [u8],
}

/// A validated IOP executable image borrowing its bytes.
pub struct IopImage<'a> {
    bytes: &'a [u8],
    elf: Elf<'a>,
    segment: Segment,
}

impl<'a> IopImage<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ImageError> {
        let elf = Elf::parse(bytes)?;

        if elf.is_64 {
            return Err(ImageError::NotElf32);
        }
        if !elf.little_endian {
            return Err(ImageError::BigEndian);
        }
        if elf.header.e_machine != EM_MIPS {
            return Err(ImageError::UnsupportedMachine(elf.header.e_machine));
        }
        match elf.header.e_type {
            ET_EXEC | ET_SCE_IOPRELEXEC | ET_SCE_IOPRELEXEC2 => {}
            other => return Err(ImageError::UnsupportedType(other)),
        }

        let mut loadable = elf.program_headers.iter().filter(|ph| ph.p_type == PT_LOAD);
        let header = loadable.next().ok_or(ImageError::NoLoadableSegment)?;
        if loadable.next().is_some() {
            return Err(ImageError::MultipleLoadableSegments);
        }

        let in_file = header
            .p_offset
            .checked_add(header.p_filesz)
            .is_some_and(|end| end <= bytes.len() as u64);
        if !in_file || header.p_filesz > header.p_memsz || header.p_memsz > u32::MAX as u64 {
            return Err(ImageError::SegmentOutOfBounds {
                offset: header.p_offset,
                size: header.p_filesz,
            });
        }

        let segment = Segment {
            offset: header.p_offset as u32,
            vaddr: header.p_vaddr as u32,
            file_size: header.p_filesz as u32,
            mem_size: header.p_memsz as u32,
        };
        debug!(
            "image: type 0x{:04x}, entry 0x{:08x}, segment {:?}",
            elf.header.e_type, elf.entry, segment
        );

        Ok(Self { bytes, elf, segment })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn elf(&self) -> &Elf<'a> {
        &self.elf
    }

    pub fn kind(&self) -> ImageKind {
        if self.elf.header.e_type == ET_EXEC {
            ImageKind::Executable
        } else {
            ImageKind::Relocatable
        }
    }

    pub fn is_relocatable(&self) -> bool {
        self.kind() == ImageKind::Relocatable
    }

    /// Entry point in link space.
    pub fn entry(&self) -> u32 {
        self.elf.entry as u32
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// File-backed bytes of the loadable segment.
    pub fn segment_data(&self) -> &'a [u8] {
        let start = self.segment.offset as usize;
        &self.bytes[start..start + self.segment.file_size as usize]
    }

    /// Section headers with their names and file contents.
    pub fn sections(&self) -> Result<Vec<Section<'a>>, ImageError> {
        let mut sections = Vec::with_capacity(self.elf.section_headers.len());
        for (index, header) in self.elf.section_headers.iter().enumerate() {
            let name = self
                .elf
                .shdr_strtab
                .get_at(header.sh_name)
                .unwrap_or_default()
                .to_string();
            let data = if header.sh_type == SHT_NOBITS {
                &self.bytes[0..0]
            } else {
                let start = header.sh_offset as usize;
                let end = start
                    .checked_add(header.sh_size as usize)
                    .filter(|&end| end <= self.bytes.len())
                    .ok_or(ImageError::MalformedSection {
                        index,
                        reason: "contents outside the file",
                    })?;
                &self.bytes[start..end]
            };
            sections.push(Section {
                index,
                name,
                kind: header.sh_type,
                flags: header.sh_flags,
                addr: header.sh_addr as u32,
                size: header.sh_size as u32,
                data,
            });
        }
        Ok(sections)
    }

    /// Reads the IOPMOD descriptor, if the image carries one.
    pub fn iopmod(&self) -> Result<Option<IopMod>, ImageError> {
        let Some(index) = self
            .elf
            .section_headers
            .iter()
            .position(|header| header.sh_type == SHT_IOPMOD)
        else {
            return Ok(None);
        };
        let header = &self.elf.section_headers[index];
        let start = header.sh_offset as usize;
        let data = start
            .checked_add(header.sh_size as usize)
            .and_then(|end| self.bytes.get(start..end))
            .filter(|data| data.len() >= IOPMOD_HEADER_SIZE)
            .ok_or(ImageError::MalformedSection {
                index,
                reason: "IOPMOD section truncated",
            })?;

        let word = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let raw_name = &data[IOPMOD_HEADER_SIZE..];
        let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());

        Ok(Some(IopMod {
            module_info: word(0),
            start_address: word(4),
            gp: word(8),
            text_size: word(12),
            data_size: word(16),
            bss_size: word(20),
            attributes: u16::from_le_bytes([data[24], data[25]]),
            name: String::from_utf8_lossy(&raw_name[..name_len]).into_owned(),
        }))
    }

    /// Every REL entry that patches an allocated section, in file order.
    ///
    /// Entries against non-allocated sections (debug info) are skipped since
    /// those bytes never reach guest memory.
    pub fn relocations(&self) -> Result<Vec<Relocation>, RelocationError> {
        let headers = &self.elf.section_headers;
        let mut relocations = Vec::new();
        for (section, rel_section) in &self.elf.shdr_relocs {
            let target = headers[*section].sh_info as usize;
            let target_header = headers.get(target).ok_or(RelocationError::BadTargetSection {
                section: *section,
                target,
            })?;
            if target_header.sh_flags & SHF_ALLOC as u64 == 0 {
                continue;
            }
            let section_start = target_header.sh_addr as u32;
            let section_end = section_start.wrapping_add(target_header.sh_size as u32);

            for entry in rel_section.iter() {
                let offset = entry.r_offset as u32;
                let kind = RelocationKind::from_raw(entry.r_type).ok_or(
                    RelocationError::UnsupportedType {
                        offset,
                        raw_type: entry.r_type,
                    },
                )?;
                if kind != RelocationKind::None
                    && (offset < section_start || offset.checked_add(4).map_or(true, |end| end > section_end))
                {
                    return Err(RelocationError::OutOfRange { offset });
                }
                relocations.push(Relocation { offset, kind });
            }
        }
        debug!("image: {} relocation entries", relocations.len());
        Ok(relocations)
    }
}
