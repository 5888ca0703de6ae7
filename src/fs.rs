use core::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::boot_sector::{Geometry, BOOT_PREFIX_SIZE, FIRST_DATA_CLUSTER};
use crate::error::Error;
use crate::io::{read_fill_at, ReadSeek};
use crate::table::{ClusterIterator, FatTable};

// FAT12 layout based on:
//   http://wiki.osdev.org/FAT
//   https://www.win.tue.nl/~aeb/linux/fs/fat/fat-1.html

const DEFAULT_MAX_DEPTH: usize = 64;

/// Traversal options.
///
/// Options are specified as an argument for `FileSystem::new` method.
#[derive(Copy, Clone, Debug)]
pub struct WalkOptions {
    pub(crate) max_depth: usize,
    pub(crate) deleted_entries: bool,
}

impl WalkOptions {
    /// Creates a `WalkOptions` struct with default options.
    pub fn new() -> Self {
        WalkOptions { max_depth: DEFAULT_MAX_DEPTH, deleted_entries: false }
    }

    /// Deepest directory level that is entered. Root directory entries have depth 0.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// If enabled, entries whose name starts with 0xE5 are reported as deleted and are neither
    /// entered nor extracted. Otherwise 0xE5 is an ordinary name character.
    pub fn deleted_entries(mut self, enabled: bool) -> Self {
        self.deleted_entries = enabled;
        self
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Text extracted from a cluster chain.
pub(crate) struct Extracted {
    pub(crate) data: Vec<u8>,
    // Recoverable condition that ended the extraction early
    pub(crate) interrupted: Option<Error>,
}

/// A FAT12 volume opened for reading.
///
/// The disk image is only read, never written. Geometry and allocation table are loaded once in
/// `FileSystem::new` and shared by every traversal.
pub struct FileSystem<IO: ReadSeek> {
    pub(crate) disk: RefCell<IO>,
    pub(crate) options: WalkOptions,
    geometry: Geometry,
    fat: FatTable,
}

impl<IO: ReadSeek> FileSystem<IO> {
    /// Creates a new filesystem object instance.
    ///
    /// Reads the boot sector and the first allocation table. Fails with
    /// `Error::CorruptedFileSystem` if the geometry cannot describe a volume and with
    /// `Error::AllocationFailed` if the table does not fit in memory.
    pub fn new(mut disk: IO, options: WalkOptions) -> Result<Self, Error> {
        trace!("FileSystem::new");
        let mut boot = [0u8; BOOT_PREFIX_SIZE];
        let read = read_fill_at(&mut disk, 0, &mut boot)?;
        if read < BOOT_PREFIX_SIZE {
            warn!("boot sector truncated: got {} of {} bytes", read, BOOT_PREFIX_SIZE);
        }
        let geometry = Geometry::decode(&boot);
        debug!("geometry {:?}", geometry);
        geometry.validate()?;
        let fat = FatTable::read(&mut disk, &geometry)?;
        Ok(FileSystem { disk: RefCell::new(disk), options, geometry, fat })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn fat(&self) -> &FatTable {
        &self.fat
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Returns the cluster chain starting at `cluster`.
    pub fn cluster_chain(&self, cluster: u16) -> ClusterIterator<'_> {
        self.fat.cluster_chain(cluster)
    }

    /// Allocates a buffer that holds exactly one cluster.
    pub fn cluster_buffer(&self) -> Result<Vec<u8>, Error> {
        let size = usize::try_from(self.geometry.cluster_size()).map_err(|_| Error::AllocationFailed)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| Error::AllocationFailed)?;
        buf.resize(size, 0);
        Ok(buf)
    }

    /// Reads one cluster into `buf`, which must be exactly one cluster long.
    ///
    /// Returns `Error::UnexpectedEof` if the image ends inside the cluster.
    pub fn read_cluster(&self, cluster: u16, buf: &mut [u8]) -> Result<(), Error> {
        if cluster < FIRST_DATA_CLUSTER || buf.len() as u64 != self.geometry.cluster_size() {
            return Err(Error::InvalidInput);
        }
        let offset = self.geometry.cluster_offset(cluster);
        let mut disk = self.disk.borrow_mut();
        let read = read_fill_at(&mut *disk, offset, buf)?;
        if read < buf.len() {
            warn!("cluster {} truncated: got {} of {} bytes at offset {}", cluster, read, buf.len(), offset);
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }

    /// Reads the text stored in the chain starting at `first_cluster`.
    ///
    /// Text ends at the first zero byte or at the end of the chain. Truncated images and broken
    /// chains are reported as errors; use `walk` to receive partial content instead.
    pub fn read_text(&self, first_cluster: u16) -> Result<Vec<u8>, Error> {
        let extracted = self.extract_text(first_cluster)?;
        match extracted.interrupted {
            Some(err) => Err(err),
            None => Ok(extracted.data),
        }
    }

    pub(crate) fn extract_text(&self, first_cluster: u16) -> Result<Extracted, Error> {
        let mut buf = self.cluster_buffer()?;
        let mut data = Vec::new();
        for cluster in self.cluster_chain(first_cluster) {
            let cluster = match cluster {
                Ok(n) => n,
                Err(err) => return Ok(Extracted { data, interrupted: Some(err) }),
            };
            match self.read_cluster(cluster, &mut buf) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => return Ok(Extracted { data, interrupted: Some(err) }),
                Err(err) => return Err(err),
            }
            match buf.iter().position(|&c| c == 0) {
                Some(end) => {
                    data.extend_from_slice(&buf[..end]);
                    break;
                }
                None => data.extend_from_slice(&buf),
            }
        }
        Ok(Extracted { data, interrupted: None })
    }
}

impl FileSystem<BufReader<File>> {
    /// Opens the disk image stored at `path`.
    pub fn open<P: AsRef<Path>>(path: P, options: WalkOptions) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).map_err(Error::Io)?;
        Self::new(BufReader::new(file), options)
    }
}
