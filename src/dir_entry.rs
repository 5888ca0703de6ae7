use core::fmt;

use crate::boot_sector::DIR_ENTRY_SIZE;
use crate::io::LeFields;
use crate::time::{Date, DateTime, Time};

bitflags! {
    /// A FAT file attributes.
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FileAttributes: u8 {
        const READ_ONLY  = 0x01;
        const HIDDEN     = 0x02;
        const SYSTEM     = 0x04;
        const VOLUME_ID  = 0x08;
        const DIRECTORY  = 0x10;
        const ARCHIVE    = 0x20;
        const LFN        = Self::READ_ONLY.bits() | Self::HIDDEN.bits()
                         | Self::SYSTEM.bits() | Self::VOLUME_ID.bits();
    }
}

// Directory entry flag available in first byte of the short name
pub(crate) const DIR_ENTRY_DELETED_FLAG: u8 = 0xE5;

// Size value used by some tools for slots that must not be interpreted
pub(crate) const DIR_ENTRY_INVALID_SIZE: u32 = 0xFFFF_FFFF;

// Short names longer than this prefix can still match, e.g. README1 or READMEXX
const README_PREFIX: &[u8] = b"README";

fn is_space(c: u8) -> bool {
    c == b' ' || (b'\t'..=b'\r').contains(&c)
}

// Short names are read like C strings: they end at a zero byte and lose trailing whitespace
fn trimmed_len(raw: &[u8]) -> usize {
    let end = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());
    raw[..end].iter().rposition(|&c| !is_space(c)).map(|p| p + 1).unwrap_or(0)
}

fn decode_oem(raw: &[u8]) -> String {
    raw.iter().map(|&c| if c.is_ascii() { char::from(c) } else { '\u{FFFD}' }).collect()
}

/// Decoded 8.3 short name with trailing padding removed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ShortName {
    name: [u8; 8],
    name_len: u8,
    ext: [u8; 3],
    ext_len: u8,
}

impl ShortName {
    pub(crate) fn new(raw_name: &[u8; 11]) -> Self {
        let mut name = [0u8; 8];
        let mut ext = [0u8; 3];
        name.copy_from_slice(&raw_name[..8]);
        ext.copy_from_slice(&raw_name[8..]);
        ShortName { name, name_len: trimmed_len(&name) as u8, ext, ext_len: trimmed_len(&ext) as u8 }
    }

    /// Base name bytes, encoded in the OEM codepage.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..usize::from(self.name_len)]
    }

    /// Extension bytes, empty when the entry has none.
    pub fn ext_bytes(&self) -> &[u8] {
        &self.ext[..usize::from(self.ext_len)]
    }

    /// Base name. Non-ASCII characters are replaced by the replacement character (U+FFFD).
    pub fn name(&self) -> String {
        decode_oem(self.name_bytes())
    }

    pub fn extension(&self) -> String {
        decode_oem(self.ext_bytes())
    }

    pub fn starts_with_dot(&self) -> bool {
        self.name_bytes().first() == Some(&b'.')
    }

    pub(crate) fn is_readme(&self) -> bool {
        self.name_bytes().starts_with(README_PREFIX)
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ext_len > 0 {
            write!(f, "{}.{}", self.name(), self.extension())
        } else {
            write!(f, "{}", self.name())
        }
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

/// Raw content of a single 32-byte directory slot.
#[derive(Clone, Debug, Default)]
pub(crate) struct DirEntryData {
    name: [u8; 11],
    attrs: u8,
    time: u16,
    date: u16,
    first_cluster: u16,
    size: u32,
}

impl DirEntryData {
    /// Decodes a slot. Bytes missing from a short slice read as zero.
    pub(crate) fn decode(slot: &[u8]) -> Self {
        debug_assert!(slot.len() as u64 <= DIR_ENTRY_SIZE);
        let mut name = [0u8; 11];
        for (i, c) in name.iter_mut().enumerate() {
            *c = slot.u8_at(i);
        }
        DirEntryData {
            name,
            attrs: slot.u8_at(11),
            time: slot.u16_le_at(22),
            date: slot.u16_le_at(24),
            first_cluster: slot.u16_le_at(26),
            size: slot.u32_le_at(28),
        }
    }

    pub(crate) fn is_end(&self) -> bool {
        self.name[0] == 0
    }

    pub(crate) fn is_lfn(&self) -> bool {
        self.attrs == FileAttributes::LFN.bits()
    }

    pub(crate) fn has_invalid_size(&self) -> bool {
        self.size == DIR_ENTRY_INVALID_SIZE
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.name[0] == DIR_ENTRY_DELETED_FLAG
    }

    pub(crate) fn is_dir(&self) -> bool {
        self.attrs & FileAttributes::DIRECTORY.bits() != 0
    }

    /// Builds the record handed to visitors.
    pub(crate) fn to_entry(&self, depth: usize, deleted: bool) -> DirEntry {
        DirEntry {
            kind: if self.is_dir() { EntryKind::Directory } else { EntryKind::File },
            short_name: ShortName::new(&self.name),
            attributes: FileAttributes::from_bits_retain(self.attrs),
            time: Time::decode(self.time),
            date: Date::decode(self.date),
            raw_time: self.time,
            raw_date: self.date,
            size: self.size,
            first_cluster: self.first_cluster,
            depth,
            deleted,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// A visited directory entry.
///
/// `DirEntry` values are produced by [`FileSystem::walk`](crate::FileSystem::walk) and handed to
/// a [`Visitor`](crate::Visitor); they are not retained by the walker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    kind: EntryKind,
    short_name: ShortName,
    attributes: FileAttributes,
    time: Time,
    date: Date,
    raw_time: u16,
    raw_date: u16,
    size: u32,
    first_cluster: u16,
    depth: usize,
    deleted: bool,
}

impl DirEntry {
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Checks if entry belongs to directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Checks if entry belongs to regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn short_name(&self) -> &ShortName {
        &self.short_name
    }

    /// Base name without padding.
    pub fn name(&self) -> String {
        self.short_name.name()
    }

    pub fn extension(&self) -> String {
        self.short_name.extension()
    }

    /// `NAME.EXT`, or `NAME` when there is no extension.
    pub fn file_name(&self) -> String {
        self.short_name.to_string()
    }

    /// Returns file attributes, including bits without a named flag.
    pub fn attributes(&self) -> FileAttributes {
        self.attributes
    }

    /// Last modification time. Resolution of the time field is 2s.
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn modified(&self) -> DateTime {
        DateTime { date: self.date, time: self.time }
    }

    /// Packed DOS time and date as stored in the slot.
    pub fn raw_time_date(&self) -> (u16, u16) {
        (self.raw_time, self.raw_date)
    }

    /// Size field of the slot. Directories normally store 0.
    pub fn len(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn first_cluster(&self) -> u16 {
        self.first_cluster
    }

    /// Nesting level, 0 for entries of the root directory.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Set only when the walk treats the 0xE5 name marker as a deleted entry.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}
