use core::fmt;
use std::collections::HashSet;

use crate::boot_sector::{DIR_ENTRY_SIZE, FIRST_DATA_CLUSTER};
use crate::dir_entry::{DirEntry, DirEntryData};
use crate::error::Error;
use crate::fs::FileSystem;
use crate::io::{read_fill_at, ReadSeek};
use crate::table::ClusterIterator;

/// Condition recovered from during a walk.
///
/// Each one ends a single directory level or a single extraction; the walk itself continues.
#[derive(Debug)]
#[non_exhaustive]
pub enum Diagnostic {
    /// A directory slot could not be read completely.
    TruncatedDirectory { name: String, depth: usize },
    /// A cluster of extracted text could not be read completely.
    TruncatedContent { name: String },
    /// The cluster chain of a directory or a file is cyclic or leaves the allocation table.
    BrokenChain { name: String, error: Error },
    /// A subdirectory was not entered because it lies deeper than `WalkOptions::max_depth`.
    DepthLimitReached { name: String, depth: usize },
    /// A subdirectory was not entered because its first cluster was already walked as a directory.
    DirectoryLoop { name: String, cluster: u16 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::TruncatedDirectory { name, depth } => {
                write!(f, "Error reading directory entry in {} (depth {})", name, depth)
            }
            Diagnostic::TruncatedContent { name } => write!(f, "Error reading contents of {}", name),
            Diagnostic::BrokenChain { name, error } => write!(f, "Broken cluster chain in {}: {}", name, error),
            Diagnostic::DepthLimitReached { name, depth } => {
                write!(f, "Not entering {}: depth {} exceeds the limit", name, depth)
            }
            Diagnostic::DirectoryLoop { name, cluster } => {
                write!(f, "Not entering {}: cluster {} was already walked", name, cluster)
            }
        }
    }
}

/// Receives everything a walk produces, in on-disk depth-first order.
pub trait Visitor {
    /// Called for every directory and file entry, before a directory's children.
    fn visit_entry(&mut self, entry: &DirEntry);

    /// Called after `visit_entry` with the text extracted from a `README` file.
    fn visit_content(&mut self, entry: &DirEntry, content: &[u8]);

    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        let _ = diagnostic;
    }
}

/// A `Visitor` that keeps everything it receives.
#[derive(Debug, Default)]
pub struct Listing {
    entries: Vec<DirEntry>,
    contents: Vec<(DirEntry, Vec<u8>)>,
    diagnostics: Vec<Diagnostic>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Extracted `README` contents paired with their entries.
    pub fn contents(&self) -> &[(DirEntry, Vec<u8>)] {
        &self.contents
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl Visitor for Listing {
    fn visit_entry(&mut self, entry: &DirEntry) {
        self.entries.push(entry.clone());
    }

    fn visit_content(&mut self, entry: &DirEntry, content: &[u8]) {
        self.contents.push((entry.clone(), content.to_vec()));
    }

    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

enum Slot {
    Entry(DirEntryData),
    Exhausted,
    Truncated,
    Broken(Error),
}

enum DirSource<'a> {
    // Fixed region between the allocation tables and the data region
    Root { offset: u64, next: u64, count: u64 },
    Chain { clusters: ClusterIterator<'a>, buf: Vec<u8>, pos: usize, len: usize },
}

/// One directory level on the walk's work list.
struct DirFrame<'a> {
    source: DirSource<'a>,
    name: String,
    depth: usize,
}

impl<'a> DirFrame<'a> {
    fn root<IO: ReadSeek>(fs: &'a FileSystem<IO>) -> Self {
        let geometry = fs.geometry();
        DirFrame {
            source: DirSource::Root { offset: geometry.root_dir_offset(), next: 0, count: geometry.root_dir_slots() },
            name: String::from("/"),
            depth: 0,
        }
    }

    fn subdir<IO: ReadSeek>(fs: &'a FileSystem<IO>, entry: &DirEntry) -> Result<Self, Error> {
        Ok(DirFrame {
            source: DirSource::Chain {
                clusters: fs.cluster_chain(entry.first_cluster()),
                buf: fs.cluster_buffer()?,
                pos: 0,
                len: 0,
            },
            name: entry.file_name(),
            depth: entry.depth() + 1,
        })
    }

    fn is_root(&self) -> bool {
        matches!(self.source, DirSource::Root { .. })
    }

    fn next_slot<IO: ReadSeek>(&mut self, fs: &FileSystem<IO>) -> Result<Slot, Error> {
        match &mut self.source {
            DirSource::Root { offset, next, count } => {
                if *next >= *count {
                    return Ok(Slot::Exhausted);
                }
                let mut raw = [0u8; DIR_ENTRY_SIZE as usize];
                let pos = *offset + *next * DIR_ENTRY_SIZE;
                let read = read_fill_at(&mut *fs.disk.borrow_mut(), pos, &mut raw)?;
                *next += 1;
                if read < raw.len() {
                    warn!("root directory slot at offset {} truncated: got {} bytes", pos, read);
                    return Ok(Slot::Truncated);
                }
                Ok(Slot::Entry(DirEntryData::decode(&raw)))
            }
            DirSource::Chain { clusters, buf, pos, len } => loop {
                let slot_size = DIR_ENTRY_SIZE as usize;
                if *pos + slot_size <= *len {
                    let data = DirEntryData::decode(&buf[*pos..*pos + slot_size]);
                    *pos += slot_size;
                    return Ok(Slot::Entry(data));
                }
                let cluster = match clusters.next() {
                    None => return Ok(Slot::Exhausted),
                    Some(Err(err)) => return Ok(Slot::Broken(err)),
                    Some(Ok(n)) => n,
                };
                trace!("reading directory cluster {}", cluster);
                match fs.read_cluster(cluster, buf) {
                    Ok(()) => {}
                    Err(Error::UnexpectedEof) => return Ok(Slot::Truncated),
                    Err(err) => return Err(err),
                }
                *pos = 0;
                *len = buf.len();
            },
        }
    }
}

impl<IO: ReadSeek> FileSystem<IO> {
    /// Walks the whole directory tree, root directory first.
    ///
    /// Entries are reported in on-disk order; a subdirectory's entries follow the subdirectory's
    /// own entry before its next sibling. Long name fragments and slots with size `0xFFFFFFFF` are
    /// skipped. `.`-prefixed subdirectories below the root are reported but not entered.
    ///
    /// Only I/O failures, allocation failures and invalid input end the walk with an error.
    /// Truncated reads and broken chains are passed to `Visitor::diagnostic`. Every directory
    /// cluster is entered at most once, so directories linking back to an ancestor or sharing
    /// clusters are reported instead of walked again.
    pub fn walk<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<(), Error> {
        let mut stack = vec![DirFrame::root(self)];
        let mut entered = HashSet::new();
        while let Some(frame) = stack.last_mut() {
            let data = match frame.next_slot(self)? {
                Slot::Entry(data) => data,
                Slot::Exhausted => {
                    stack.pop();
                    continue;
                }
                Slot::Truncated => {
                    visitor.diagnostic(Diagnostic::TruncatedDirectory { name: frame.name.clone(), depth: frame.depth });
                    stack.pop();
                    continue;
                }
                Slot::Broken(error) => {
                    visitor.diagnostic(Diagnostic::BrokenChain { name: frame.name.clone(), error });
                    stack.pop();
                    continue;
                }
            };
            if data.is_end() {
                stack.pop();
                continue;
            }
            if data.is_lfn() || data.has_invalid_size() {
                continue;
            }

            let is_root = frame.is_root();
            let deleted = self.options.deleted_entries && data.is_deleted();
            let entry = data.to_entry(frame.depth, deleted);
            visitor.visit_entry(&entry);

            if entry.is_dir() {
                if deleted || (!is_root && entry.short_name().starts_with_dot()) {
                    continue;
                }
                if entry.depth() + 1 > self.options.max_depth {
                    warn!("not entering {} at depth {}", entry.file_name(), entry.depth());
                    visitor.diagnostic(Diagnostic::DepthLimitReached {
                        name: entry.file_name(),
                        depth: entry.depth() + 1,
                    });
                    continue;
                }
                let cluster = entry.first_cluster();
                if cluster >= FIRST_DATA_CLUSTER && !entered.insert(cluster) {
                    warn!("directory {} points at already walked cluster {}", entry.file_name(), cluster);
                    visitor.diagnostic(Diagnostic::DirectoryLoop { name: entry.file_name(), cluster });
                    continue;
                }
                debug!("entering directory {} (cluster {})", entry.file_name(), cluster);
                stack.push(DirFrame::subdir(self, &entry)?);
            } else if !deleted && entry.short_name().is_readme() {
                self.visit_text(&entry, visitor)?;
            }
        }
        Ok(())
    }

    fn visit_text<V: Visitor + ?Sized>(&self, entry: &DirEntry, visitor: &mut V) -> Result<(), Error> {
        debug!("extracting {} (cluster {})", entry.file_name(), entry.first_cluster());
        let extracted = self.extract_text(entry.first_cluster())?;
        visitor.visit_content(entry, &extracted.data);
        match extracted.interrupted {
            None => {}
            Some(Error::UnexpectedEof) => visitor.diagnostic(Diagnostic::TruncatedContent { name: entry.file_name() }),
            Some(error) => visitor.diagnostic(Diagnostic::BrokenChain { name: entry.file_name(), error }),
        }
        Ok(())
    }
}
