use std::collections::HashSet;
use std::io::{Seek, SeekFrom};

use crate::boot_sector::{Geometry, FIRST_DATA_CLUSTER};
use crate::error::Error;
use crate::io::{read_fill_at, ReadSeek};

// Smallest FAT12 value marking the last cluster of a chain
pub(crate) const END_OF_CHAIN: u16 = 0xFF8;

/// The FAT12 allocation table unpacked into one `u16` per cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatTable {
    table: Box<[u16]>,
    // Entries the region declares; those past `table` were never on disk and read as free
    entries: usize,
}

impl FatTable {
    pub fn new(data: Box<[u16]>) -> Self {
        let entries = data.len();
        FatTable { table: data, entries }
    }

    /// Unpacks raw FAT12 bytes.
    ///
    /// Each group of three bytes `b0 b1 b2` holds two entries: `b0` plus the low nibble of `b1`,
    /// then the high nibble of `b1` plus `b2`. The result has `len * 2 / 3` entries.
    pub fn unpack(raw: &[u8]) -> Result<Self, Error> {
        let count = raw.len() * 2 / 3;
        let mut table = Vec::new();
        table.try_reserve_exact(count).map_err(|_| Error::AllocationFailed)?;
        for group in raw.chunks(3) {
            let b0 = u16::from(group[0]);
            let b1 = u16::from(group.get(1).copied().unwrap_or(0));
            table.push(((b1 & 0x0F) << 8) | b0);
            if let Some(&b2) = group.get(2) {
                table.push((u16::from(b2) << 4) | ((b1 & 0xF0) >> 4));
            }
        }
        table.truncate(count);
        Ok(FatTable::new(table.into_boxed_slice()))
    }

    /// Reads and unpacks the first allocation table of the image.
    ///
    /// Bytes the image cannot supply are treated as free clusters. Only the part of the region
    /// that lies inside the image is buffered.
    pub fn read<T: ReadSeek + ?Sized>(disk: &mut T, geometry: &Geometry) -> Result<Self, Error> {
        let offset = geometry.fat_offset();
        let declared = geometry.fat_size();
        let image_len = disk.seek(SeekFrom::End(0))?;
        // Round up to whole 3-byte groups so a partial group decodes as if zero-filled
        let available = image_len.saturating_sub(offset).saturating_add(2) / 3 * 3;
        let size = usize::try_from(declared.min(available)).map_err(|_| Error::AllocationFailed)?;
        let mut raw = Vec::new();
        raw.try_reserve_exact(size).map_err(|_| Error::AllocationFailed)?;
        raw.resize(size, 0);
        let read = read_fill_at(disk, offset, &mut raw)?;
        if (read as u64) < declared {
            warn!("FAT region truncated: expected {} bytes at offset {} but got {}", declared, offset, read);
        }
        let mut table = Self::unpack(&raw)?;
        table.entries = usize::try_from(declared.saturating_mul(2) / 3).unwrap_or(usize::MAX);
        trace!("unpacked {} FAT entries from {} bytes", table.table.len(), size);
        Ok(table)
    }

    /// Number of entries the allocation table declares.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Raw table value for `cluster`, if the table covers it.
    pub fn get(&self, cluster: u16) -> Option<u16> {
        let index = usize::from(cluster);
        if index >= self.entries {
            return None;
        }
        Some(self.table.get(index).copied().unwrap_or(0))
    }

    /// Follows one link of a chain.
    ///
    /// Returns `None` for end-of-chain markers (`0xFF8..=0xFFF`), free entries and the reserved
    /// values 0 and 1, and for clusters the table does not cover.
    pub fn get_next_cluster(&self, cluster: u16) -> Option<u16> {
        match self.get(cluster)? {
            val if val < FIRST_DATA_CLUSTER || val >= END_OF_CHAIN => None,
            val => Some(val),
        }
    }

    /// Iterates over the cluster chain starting at `cluster`.
    pub fn cluster_chain(&self, cluster: u16) -> ClusterIterator<'_> {
        ClusterIterator::new(self, cluster)
    }
}

/// Lazy walk along a FAT cluster chain.
///
/// The chain ends at the first end-of-chain marker. A chain that loops back to a visited cluster
/// or points outside the table yields one error and then ends, so iteration always terminates.
pub struct ClusterIterator<'a> {
    fat: &'a FatTable,
    cluster: Option<u16>,
    visited: HashSet<u16>,
    err: bool,
}

impl<'a> ClusterIterator<'a> {
    pub(crate) fn new(fat: &'a FatTable, cluster: u16) -> Self {
        let cluster = if cluster >= FIRST_DATA_CLUSTER { Some(cluster) } else { None };
        ClusterIterator { fat, cluster, visited: HashSet::new(), err: false }
    }
}

impl Iterator for ClusterIterator<'_> {
    type Item = Result<u16, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.err {
            return None;
        }
        let cluster = self.cluster.take()?;
        if !self.visited.insert(cluster) {
            warn!("cluster chain loops back to cluster {}", cluster);
            self.err = true;
            return Some(Err(Error::CyclicClusterChain(cluster)));
        }
        if self.fat.get(cluster).is_none() {
            warn!("cluster {} is outside of the allocation table ({} entries)", cluster, self.fat.len());
            self.err = true;
            return Some(Err(Error::ClusterOutOfRange(cluster)));
        }
        self.cluster = self.fat.get_next_cluster(cluster);
        Some(Ok(cluster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(v1: u16, v2: u16) -> [u8; 3] {
        [(v1 & 0xFF) as u8, (((v2 & 0x0F) << 4) | (v1 >> 8)) as u8, (v2 >> 4) as u8]
    }

    fn table_of(values: &[u16]) -> FatTable {
        FatTable::new(values.to_vec().into_boxed_slice())
    }

    #[test]
    fn unpack_nibble_layout() {
        let fat = FatTable::unpack(&[0xF0, 0xFF, 0xFF, 0x03, 0x40, 0x00]).unwrap();
        assert_eq!(fat.len(), 4);
        assert_eq!(fat.get(0), Some(0xFF0));
        assert_eq!(fat.get(1), Some(0xFFF));
        assert_eq!(fat.get(2), Some(0x003));
        assert_eq!(fat.get(3), Some(0x004));
    }

    #[test]
    fn unpack_asymmetric_split() {
        let fat = FatTable::unpack(&[0xAB, 0xCD, 0xEF]).unwrap();
        assert_eq!(fat.get(0), Some(0xDAB));
        assert_eq!(fat.get(1), Some(0xEFC));
    }

    #[test]
    fn unpack_reproduces_packed_values() {
        let edges = [0x000, 0x001, 0x002, 0x0FF, 0x100, 0x7FF, 0x800, 0xFF6, 0xFF7, 0xFF8, 0xFFF];
        let samples = (0..=0xFFFu16).step_by(37).chain(edges.iter().copied()).collect::<Vec<_>>();
        for &v1 in &samples {
            for &v2 in &samples {
                let fat = FatTable::unpack(&pack(v1, v2)).unwrap();
                assert_eq!((fat.get(0), fat.get(1)), (Some(v1), Some(v2)), "v1={:#x} v2={:#x}", v1, v2);
            }
        }
    }

    #[test]
    fn unpack_length_for_partial_group() {
        assert_eq!(FatTable::unpack(&[]).unwrap().len(), 0);
        assert_eq!(FatTable::unpack(&[0x12]).unwrap().len(), 0);
        let fat = FatTable::unpack(&[0x12, 0x34]).unwrap();
        assert_eq!(fat.len(), 1);
        assert_eq!(fat.get(0), Some(0x412));
        assert_eq!(FatTable::unpack(&[0u8; 512]).unwrap().len(), 341);
    }

    #[test]
    fn end_of_chain_boundary() {
        for val in 0xFF8..=0xFFF {
            assert_eq!(table_of(&[0, 0, val]).get_next_cluster(2), None, "val={:#x}", val);
        }
        for val in [0x002, 0x003, 0x800, 0xFF6, 0xFF7] {
            assert_eq!(table_of(&[0, 0, val]).get_next_cluster(2), Some(val), "val={:#x}", val);
        }
        assert_eq!(table_of(&[0, 0, 0x000]).get_next_cluster(2), None);
        assert_eq!(table_of(&[0, 0, 0x001]).get_next_cluster(2), None);
    }

    #[test]
    fn chain_follows_links() {
        let fat = table_of(&[0xFF0, 0xFFF, 4, 0xFFF, 5, 0xFF8]);
        let chain = fat.cluster_chain(2).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(chain, [2, 4, 5]);
    }

    #[test]
    fn chain_from_reserved_cluster_is_empty() {
        let fat = table_of(&[0xFF0, 0xFFF, 0xFFF]);
        assert_eq!(fat.cluster_chain(0).count(), 0);
        assert_eq!(fat.cluster_chain(1).count(), 0);
    }

    #[test]
    fn single_cluster_chain() {
        let fat = table_of(&[0xFF0, 0xFFF, 0xFFF]);
        let chain = fat.cluster_chain(2).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(chain, [2]);
    }

    #[test]
    fn cyclic_chain_is_reported_not_followed() {
        // 2 -> 3 -> 3: without the visited set this chain never ends
        let fat = table_of(&[0xFF0, 0xFFF, 3, 3]);
        let items = fat.cluster_chain(2).collect::<Vec<_>>();
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Ok(2)));
        assert!(matches!(items[1], Ok(3)));
        assert!(matches!(items[2], Err(Error::CyclicClusterChain(3))));
    }

    #[test]
    fn long_cycle_is_reported() {
        let fat = table_of(&[0xFF0, 0xFFF, 3, 4, 5, 2]);
        let items = fat.cluster_chain(2).collect::<Vec<_>>();
        assert_eq!(items.len(), 5);
        assert!(matches!(items[4], Err(Error::CyclicClusterChain(2))));
    }

    #[test]
    fn link_past_table_end_is_reported() {
        let fat = table_of(&[0xFF0, 0xFFF, 0x300]);
        let items = fat.cluster_chain(2).collect::<Vec<_>>();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(Error::ClusterOutOfRange(0x300))));
    }

    #[test]
    fn read_from_image_region() {
        let mut image = vec![0u8; 1024];
        image[512..515].copy_from_slice(&[0xF0, 0xFF, 0xFF]);
        image[515..518].copy_from_slice(&pack(0xFFF, 0));
        let geometry = Geometry { bytes_per_block: 512, reserved_blocks: 1, blocks_per_fat: 1, ..Default::default() };
        let fat = FatTable::read(&mut std::io::Cursor::new(image), &geometry).unwrap();
        assert_eq!(fat.len(), 341);
        assert_eq!(fat.get_next_cluster(2), None);
        assert_eq!(fat.get(2), Some(0xFFF));
    }

    #[test]
    fn read_truncated_region_zero_fills() {
        let mut image = vec![0u8; 515];
        image[512..515].copy_from_slice(&pack(0xFF0, 0xFFF));
        let geometry = Geometry { bytes_per_block: 512, reserved_blocks: 1, blocks_per_fat: 1, ..Default::default() };
        let fat = FatTable::read(&mut std::io::Cursor::new(image), &geometry).unwrap();
        assert_eq!(fat.len(), 341);
        assert_eq!(fat.get(1), Some(0xFFF));
        assert_eq!(fat.get(2), Some(0));
    }

    #[test]
    fn read_oversized_region_buffers_only_image_bytes() {
        let mut image = vec![0u8; 64];
        image[..3].copy_from_slice(&pack(0xFF0, 0xFFF));
        image[3..6].copy_from_slice(&pack(0xFFF, 0));
        let geometry = Geometry { bytes_per_block: 0xFFFF, blocks_per_fat: 0xFFFF, ..Default::default() };
        let fat = FatTable::read(&mut std::io::Cursor::new(image), &geometry).unwrap();
        assert_eq!(fat.table.len(), 44);
        assert_eq!(fat.len() as u64, 0xFFFFu64 * 0xFFFF * 2 / 3);
        assert_eq!(fat.get(2), Some(0xFFF));
        assert_eq!(fat.get(0xFFF), Some(0));
        assert_eq!(fat.get_next_cluster(0xFFF), None);
    }

    #[test]
    fn read_region_past_image_end_is_free() {
        let geometry = Geometry { bytes_per_block: 512, reserved_blocks: 4, blocks_per_fat: 9, ..Default::default() };
        let fat = FatTable::read(&mut std::io::Cursor::new(vec![0xFFu8; 512]), &geometry).unwrap();
        assert_eq!(fat.len(), 3072);
        assert_eq!(fat.get(5), Some(0));
        assert_eq!(fat.get(3072), None);
        assert_eq!(fat.cluster_chain(5).collect::<Result<Vec<_>, _>>().unwrap(), [5]);
    }
}
