use std::env;
use std::io::{self, Write};
use std::process;

use fat12dump::{Diagnostic, DirEntry, FileSystem, Geometry, Visitor, WalkOptions};

const INDENT: usize = 3;

fn print_boot_block(out: &mut impl Write, geometry: &Geometry) -> io::Result<()> {
    writeln!(out, "Boot Block:")?;
    writeln!(out, "bytes per block: {}", geometry.bytes_per_block)?;
    writeln!(out, "blocks per cluster: {}", geometry.blocks_per_cluster)?;
    writeln!(out, "reserved blocks: {}", geometry.reserved_blocks)?;
    writeln!(out, "FAT count: {}", geometry.fat_count)?;
    writeln!(out, "root entries: {}", geometry.root_entry_count)?;
    writeln!(out, "logical blocks: {}", geometry.total_logical_blocks)?;
    writeln!(out, "media descriptor: {:#04x}", geometry.media_descriptor)?;
    writeln!(out, "blocks per FAT: {}", geometry.blocks_per_fat)?;
    writeln!(out, "sectors per track: {}", geometry.sectors_per_track)?;
    writeln!(out, "heads: {}", geometry.head_count)?;
    writeln!(out, "hidden blocks: {}", geometry.hidden_blocks)
}

fn is_printable(content: &[u8]) -> bool {
    content.iter().all(|&c| c.is_ascii_graphic() || c.is_ascii_whitespace())
}

/// Prints the tree in the indented block layout, one block per entry.
struct Printer<W: Write> {
    out: W,
    // First write error; later output is dropped
    err: Option<io::Error>,
}

impl<W: Write> Printer<W> {
    fn new(out: W) -> Self {
        Printer { out, err: None }
    }

    fn emit(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        if self.err.is_none() {
            if let Err(err) = f(&mut self.out) {
                self.err = Some(err);
            }
        }
    }

    fn finish(mut self) -> io::Result<()> {
        match self.err.take() {
            Some(err) => Err(err),
            None => self.out.flush(),
        }
    }
}

impl<W: Write> Visitor for Printer<W> {
    fn visit_entry(&mut self, entry: &DirEntry) {
        let pad = " ".repeat(entry.depth() * INDENT);
        self.emit(|out| {
            let deleted = if entry.is_deleted() { " (deleted)" } else { "" };
            if entry.is_dir() {
                writeln!(out, "{}Directory: {}{}", pad, entry.name(), deleted)?;
            } else {
                writeln!(out, "{}File: {}{}", pad, entry.file_name(), deleted)?;
            }
            let (date, time) = (entry.date(), entry.time());
            writeln!(out, "{}Date: {:02}\\{:02}\\{:04}", pad, date.month, date.day, date.year)?;
            writeln!(out, "{}Time: {:02}:{:02}:{:02}", pad, time.hour, time.min, time.sec)?;
            writeln!(out, "{}Size: {}", pad, entry.len())?;
            writeln!(out, "{}Cluster Number: {}", pad, entry.first_cluster())?;
            writeln!(out, "{}Attribute: {}", pad, entry.attributes().bits())?;
            writeln!(out)
        });
    }

    fn visit_content(&mut self, entry: &DirEntry, content: &[u8]) {
        self.emit(|out| {
            writeln!(out, "PRINTING: {}", entry.file_name())?;
            if is_printable(content) {
                out.write_all(content)?;
                writeln!(out)?;
            } else {
                writeln!(out, "<binary content, {} bytes>", content.len())?;
            }
            writeln!(out)
        });
    }

    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.emit(|out| writeln!(out, "{}", diagnostic));
    }
}

fn run(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let options = WalkOptions::new().deleted_entries(env::var_os("FAT12DUMP_SHOW_DELETED").is_some());
    let fs = FileSystem::open(path, options)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_boot_block(&mut out, fs.geometry())?;
    writeln!(out, "\n\nPrinting Directories:")?;
    let mut printer = Printer::new(out);
    fs.walk(&mut printer)?;
    printer.finish()?;
    Ok(())
}

fn main() {
    env_logger::init();
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("USAGE: fat12dump <DISK_IMAGE>");
            process::exit(2);
        }
    };
    if let Err(err) = run(&path) {
        eprintln!("ERROR: {}", err);
        process::exit(1);
    }
}
