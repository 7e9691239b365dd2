/// Static description of an IRX or executable, read without loading it.
///
/// Uses `irx::IopImage` the same way the kernel's loader does, so what is
/// reported here is what `Bios::load_and_start_module` will see.
use anyhow::{Context, Result};
use irx::{ImageKind, IopImage, RelocationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub path: String,
    pub kind: String,
    pub entry: u32,
    pub link_address: u32,
    pub file_size: u32,
    pub mem_size: u32,
    pub module_name: Option<String>,
    pub gp: Option<u32>,
    /// Relocation count per kind.
    pub relocations: BTreeMap<String, usize>,
    /// First bytes of the loadable segment.
    pub head: String,
}

const HEAD_BYTES: usize = 16;

pub fn describe(path: &Path, bytes: &[u8]) -> Result<ImageInfo> {
    let image = IopImage::parse(bytes)
        .with_context(|| format!("Failed to parse image: {:?}", path))?;
    let segment = image.segment();
    let iopmod = image
        .iopmod()
        .with_context(|| format!("Malformed .iopmod section in {:?}", path))?;

    let mut relocations = BTreeMap::new();
    for reloc in image
        .relocations()
        .with_context(|| format!("Bad relocation table in {:?}", path))?
    {
        *relocations.entry(kind_name(reloc.kind).to_string()).or_insert(0) += 1;
    }

    let data = image.segment_data();
    Ok(ImageInfo {
        path: path.display().to_string(),
        kind: match image.kind() {
            ImageKind::Relocatable => "relocatable".to_string(),
            ImageKind::Executable => "executable".to_string(),
        },
        entry: image.entry(),
        link_address: segment.vaddr,
        file_size: segment.file_size,
        mem_size: segment.mem_size,
        module_name: iopmod.as_ref().map(|m| m.name.clone()),
        gp: iopmod.as_ref().map(|m| m.gp),
        relocations,
        head: hex::encode(&data[..data.len().min(HEAD_BYTES)]),
    })
}

fn kind_name(kind: RelocationKind) -> &'static str {
    match kind {
        RelocationKind::None => "none",
        RelocationKind::Absolute32 => "R_MIPS_32",
        RelocationKind::Jump26 => "R_MIPS_26",
        RelocationKind::Hi16 => "R_MIPS_HI16",
        RelocationKind::Lo16 => "R_MIPS_LO16",
        RelocationKind::GpRelative16 => "R_MIPS_GPREL16",
        RelocationKind::PcRelative16 => "R_MIPS_PC16",
    }
}
