//! ELF32 little-endian MIPS images for loader tests.

pub const ET_EXEC: u16 = 2;
pub const ET_IRX: u16 = 0xFF80;
pub const EM_MIPS: u16 = 8;

pub const R_MIPS_32: u32 = 2;
pub const R_MIPS_26: u32 = 4;
pub const R_MIPS_HI16: u32 = 5;
pub const R_MIPS_LO16: u32 = 6;
pub const R_MIPS_GOT16: u32 = 9;
pub const R_MIPS_PC16: u32 = 10;

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHT_REL: u32 = 9;
const SHT_IOPMOD: u32 = 0x7000_0080;
const SHF_ALLOC: u32 = 0x2;
const SHF_EXECINSTR: u32 = 0x4;

pub struct IopModFields {
    pub name: String,
    pub gp: u32,
    pub attributes: u16,
}

pub struct ElfBuilder {
    pub e_type: u16,
    pub machine: u16,
    pub entry: u32,
    pub vaddr: u32,
    pub text: Vec<u32>,
    pub bss_size: u32,
    pub relocs: Vec<(u32, u32)>,
    pub iopmod: Option<IopModFields>,
    pub load_segments: usize,
}

impl ElfBuilder {
    pub fn irx(text: Vec<u32>) -> Self {
        Self {
            e_type: ET_IRX,
            machine: EM_MIPS,
            entry: 0,
            vaddr: 0,
            text,
            bss_size: 0,
            relocs: Vec::new(),
            iopmod: None,
            load_segments: 1,
        }
    }

    pub fn exec(vaddr: u32, text: Vec<u32>) -> Self {
        Self {
            e_type: ET_EXEC,
            entry: vaddr,
            vaddr,
            ..Self::irx(text)
        }
    }

    pub fn reloc(mut self, offset: u32, kind: u32) -> Self {
        self.relocs.push((offset, kind));
        self
    }

    pub fn with_iopmod(mut self, name: &str, gp: u32) -> Self {
        self.iopmod = Some(IopModFields {
            name: name.to_string(),
            gp,
            attributes: 0x0101,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let text: Vec<u8> = self.text.iter().flat_map(|w| w.to_le_bytes()).collect();
        let text_size = text.len() as u32;

        let iopmod: Vec<u8> = match &self.iopmod {
            Some(fields) => {
                let mut out = Vec::new();
                for word in [0xFFFF_FFFFu32, self.entry, fields.gp, text_size, 0, self.bss_size] {
                    out.extend_from_slice(&word.to_le_bytes());
                }
                out.extend_from_slice(&fields.attributes.to_le_bytes());
                out.extend_from_slice(fields.name.as_bytes());
                out.push(0);
                out
            }
            None => Vec::new(),
        };

        let rel: Vec<u8> = self
            .relocs
            .iter()
            .flat_map(|&(offset, kind)| {
                let mut entry = offset.to_le_bytes().to_vec();
                entry.extend_from_slice(&kind.to_le_bytes());
                entry
            })
            .collect();

        let mut shstrtab = vec![0u8];
        let mut name = |s: &str| {
            let at = shstrtab.len() as u32;
            shstrtab.extend_from_slice(s.as_bytes());
            shstrtab.push(0);
            at
        };
        let text_name = name(".text");
        let iopmod_name = name(".iopmod");
        let rel_name = name(".rel.text");
        let shstrtab_name = name(".shstrtab");

        let phnum = self.load_segments as u32;
        let align = |v: u32| (v + 15) & !15;
        let text_off = align(52 + 32 * phnum);
        let iopmod_off = align(text_off + text_size);
        let rel_off = align(iopmod_off + iopmod.len() as u32);
        let shstrtab_off = align(rel_off + rel.len() as u32);
        let shoff = align(shstrtab_off + shstrtab.len() as u32);

        // null, .text, .iopmod, .rel.text, .shstrtab
        let shnum: u16 = 5;
        let mut out = Vec::new();
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&self.e_type.to_le_bytes());
        out.extend_from_slice(&self.machine.to_le_bytes());
        for word in [1u32, self.entry, 52, shoff, 0] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for half in [52u16, 32, phnum as u16, 40, shnum, shnum - 1] {
            out.extend_from_slice(&half.to_le_bytes());
        }

        for _ in 0..self.load_segments {
            for word in [
                1u32,
                text_off,
                self.vaddr,
                self.vaddr,
                text_size,
                text_size + self.bss_size,
                7,
                16,
            ] {
                out.extend_from_slice(&word.to_le_bytes());
            }
        }

        let pad = |out: &mut Vec<u8>, to: u32| out.resize(to as usize, 0);
        pad(&mut out, text_off);
        out.extend_from_slice(&text);
        pad(&mut out, iopmod_off);
        out.extend_from_slice(&iopmod);
        pad(&mut out, rel_off);
        out.extend_from_slice(&rel);
        pad(&mut out, shstrtab_off);
        out.extend_from_slice(&shstrtab);
        pad(&mut out, shoff);

        let iopmod_type = if self.iopmod.is_some() { SHT_IOPMOD } else { SHT_PROGBITS };
        let sections: [[u32; 10]; 5] = [
            [0; 10],
            [text_name, SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, self.vaddr, text_off, text_size, 0, 0, 16, 0],
            [iopmod_name, iopmod_type, 0, 0, iopmod_off, iopmod.len() as u32, 0, 0, 4, 0],
            [rel_name, SHT_REL, 0, 0, rel_off, rel.len() as u32, 0, 1, 4, 8],
            [shstrtab_name, SHT_STRTAB, 0, 0, shstrtab_off, shstrtab.len() as u32, 0, 0, 1, 0],
        ];
        for section in sections {
            for word in section {
                out.extend_from_slice(&word.to_le_bytes());
            }
        }
        out
    }
}

/// `lui a0, 0x0001; addiu a0, a0, 0x8010; jal 0x40; nop; .word 0x20`
///
/// Linked at 0: the pair loads 0x8010 (low half sign extended, so the
/// high half carries), the call targets 0x40 and the data word holds 0x20.
pub fn sample_text() -> Vec<u32> {
    vec![0x3C04_0001, 0x2484_8010, 0x0C00_0010, 0x0000_0000, 0x0000_0020]
}

pub fn sample_irx() -> ElfBuilder {
    ElfBuilder::irx(sample_text())
        .reloc(0, R_MIPS_HI16)
        .reloc(4, R_MIPS_LO16)
        .reloc(8, R_MIPS_26)
        .reloc(16, R_MIPS_32)
}
