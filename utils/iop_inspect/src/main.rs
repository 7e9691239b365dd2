use anyhow::{Context, Result};
use bios::control_block::{CONTROL_BLOCK_START, IDLE_LOOP_ADDR};
use bios::{Bios, BiosConfig};
use clap::{Parser, ValueEnum};
use colored::*;
use log::info;
use std::fs;
use std::path::PathBuf;

mod image_info;
mod report;

use report::Report;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Loads IOP modules into the kernel core and reports the resulting
/// module, thread and library state
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IRX modules or IOP executables, loaded in order
    #[arg(required = true)]
    modules: Vec<PathBuf>,

    /// Arguments passed to every module (repeatable)
    #[arg(short, long = "arg")]
    args: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Microseconds of kernel time to advance after loading
    #[arg(short, long, default_value_t = 0)]
    time: u64,

    /// Number of vertical blank periods to signal after loading
    #[arg(long, default_value_t = 0)]
    vblanks: u32,

    /// Guest RAM size in bytes
    #[arg(long, default_value_t = BiosConfig::default().ram_size)]
    ram_size: usize,

    /// Log every kernel call
    #[arg(short, long)]
    verbose: bool,

    /// Also print the CPU registers and the kernel scalar block
    #[arg(long)]
    dump: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if args.ram_size <= bios::control_block::USER_MEMORY_START as usize {
        anyhow::bail!("RAM size 0x{:x} leaves no user memory", args.ram_size);
    }
    let config = BiosConfig {
        ram_size: args.ram_size,
        verbose: args.verbose,
        ..BiosConfig::default()
    };
    let mut bios = Bios::new(config);

    let module_args: Vec<u8> = args
        .args
        .iter()
        .flat_map(|arg| arg.bytes().chain(std::iter::once(0)))
        .collect();

    let mut images = Vec::new();
    for path in &args.modules {
        let bytes = fs::read(path).with_context(|| format!("Failed to read module: {:?}", path))?;
        images.push(image_info::describe(path, &bytes)?);

        let guest_path = path.display().to_string();
        let thread = bios
            .load_and_start_module(&guest_path, &bytes, &module_args)
            .with_context(|| format!("Failed to load {:?}", path))?;
        info!("{} started as thread {}", guest_path, thread);
    }

    if args.time > 0 {
        let mut remaining = bios.micro_sec_to_clock(args.time);
        while remaining > 0 {
            let step = remaining.min(u32::MAX as u64);
            bios.count_ticks(step as u32);
            remaining -= step;
        }
    }
    for _ in 0..args.vblanks {
        bios.notify_vblank_start();
        bios.notify_vblank_end();
    }

    let report = Report::collect(&bios, images);
    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print_report(&report),
    }
    if args.dump {
        let dump = format!(
            "{}\n{}{}\n{}",
            "CPU".bold().green(),
            bios.cpu().dump_registers(),
            "Control block".bold().green(),
            bios.memory().dump(CONTROL_BLOCK_START, IDLE_LOOP_ADDR)
        );
        // Keep stdout parseable in JSON mode.
        match args.format {
            Format::Json => eprint!("{}", dump),
            Format::Text => print!("\n{}", dump),
        }
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("{}", "IOP Inspect v0.1.0".bold().blue());
    println!("{}", "=====================================".blue());

    for image in &report.images {
        println!();
        println!("{} {}", "Image:".bold(), image.path.yellow());
        println!("  Kind:       {}", image.kind);
        println!("  Linked at:  0x{:08x}, entry 0x{:08x}", image.link_address, image.entry);
        println!("  Size:       0x{:x} file, 0x{:x} memory", image.file_size, image.mem_size);
        if let Some(name) = &image.module_name {
            println!("  Module:     {} (gp 0x{:08x})", name.green(), image.gp.unwrap_or(0));
        }
        for (kind, count) in &image.relocations {
            println!("  {:<14} {}", kind, count);
        }
        println!("  Head:       {}", image.head);
    }

    println!();
    println!("{}", "Modules".bold().green());
    for module in &report.modules {
        println!(
            "  {:<16} 0x{:08x}-0x{:08x} entry 0x{:08x} gp 0x{:08x}",
            module.name, module.begin, module.end, module.entry, module.gp
        );
    }

    println!();
    println!("{}", "Threads".bold().green());
    for thread in &report.threads {
        let marker = if thread.id == report.current_thread { "*" } else { " " };
        let status = thread.status.to_string();
        let status = if thread.status.is_waiting() {
            status.yellow()
        } else {
            status.normal()
        };
        println!(
            " {}{:>3} prio {:>3} pc 0x{:08x} sp 0x{:08x} {}",
            marker, thread.id, thread.priority, thread.pc, thread.sp, status
        );
    }

    if !report.dynamic_modules.is_empty() {
        println!();
        println!("{}", "Registered libraries".bold().green());
        for module in &report.dynamic_modules {
            println!(
                "  {:<8} {} exports at 0x{:08x}",
                module.name, module.function_count, module.export_table
            );
        }
    }

    println!();
    println!("  Kernel time: {} ticks", report.time);
    println!("  Free memory: 0x{:x} bytes", report.free_memory);
}
