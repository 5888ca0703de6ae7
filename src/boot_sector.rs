use crate::error::Error;
use crate::io::LeFields;

// Number of leading boot sector bytes holding the BIOS parameter block fields used here
pub(crate) const BOOT_PREFIX_SIZE: usize = 32;

// Size of single directory entry in bytes
pub(crate) const DIR_ENTRY_SIZE: u64 = 32;

// Cluster numbers 0 and 1 are reserved, the data region starts at cluster 2
pub(crate) const FIRST_DATA_CLUSTER: u16 = 2;

/// Disk geometry decoded from the boot sector.
///
/// Fields are taken verbatim from the image. Use [`Geometry::validate`] before relying on them
/// for traversal; the layout helpers never panic even for zeroed geometry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_block: u16,
    pub blocks_per_cluster: u8,
    pub reserved_blocks: u16,
    pub fat_count: u8,
    pub root_entry_count: u16,
    pub total_logical_blocks: u16,
    pub media_descriptor: u8,
    pub blocks_per_fat: u16,
    pub sectors_per_track: u16,
    pub head_count: u16,
    pub hidden_blocks: u16,
}

impl Geometry {
    /// Decodes geometry from the first bytes of an image.
    ///
    /// Missing bytes of a short input read as zero.
    pub fn decode(raw: &[u8]) -> Self {
        Geometry {
            bytes_per_block: raw.u16_le_at(0x0B),
            blocks_per_cluster: raw.u8_at(0x0D),
            reserved_blocks: raw.u16_le_at(0x0E),
            fat_count: raw.u8_at(0x10),
            root_entry_count: raw.u16_le_at(0x11),
            total_logical_blocks: raw.u16_le_at(0x13),
            media_descriptor: raw.u8_at(0x15),
            blocks_per_fat: raw.u16_le_at(0x16),
            sectors_per_track: raw.u16_le_at(0x18),
            head_count: raw.u16_le_at(0x1A),
            hidden_blocks: raw.u16_le_at(0x1C),
        }
    }

    /// Rejects geometry that cannot describe a traversable volume.
    pub fn validate(&self) -> Result<(), Error> {
        if self.bytes_per_block == 0 {
            error!("invalid bytes_per_block value in BPB: expected non-zero value but got 0");
            return Err(Error::CorruptedFileSystem);
        }
        if self.blocks_per_cluster == 0 {
            error!("invalid blocks_per_cluster value in BPB: expected non-zero value but got 0");
            return Err(Error::CorruptedFileSystem);
        }
        if self.fat_count == 0 {
            error!("invalid fat_count value in BPB: expected non-zero value but got 0");
            return Err(Error::CorruptedFileSystem);
        }
        Ok(())
    }

    fn block_size(&self) -> u64 {
        u64::from(self.bytes_per_block)
    }

    pub fn cluster_size(&self) -> u64 {
        u64::from(self.blocks_per_cluster) * self.block_size()
    }

    pub fn fat_offset(&self) -> u64 {
        (u64::from(self.hidden_blocks) + u64::from(self.reserved_blocks)) * self.block_size()
    }

    pub fn fat_size(&self) -> u64 {
        self.block_size() * u64::from(self.blocks_per_fat)
    }

    fn fats_blocks(&self) -> u64 {
        u64::from(self.fat_count) * u64::from(self.blocks_per_fat)
    }

    pub fn root_dir_offset(&self) -> u64 {
        (u64::from(self.hidden_blocks) + u64::from(self.reserved_blocks) + self.fats_blocks()) * self.block_size()
    }

    pub fn root_dir_blocks(&self) -> u64 {
        let root_bytes = u64::from(self.root_entry_count) * DIR_ENTRY_SIZE;
        let block_size = self.block_size();
        if block_size == 0 {
            0
        } else {
            (root_bytes + block_size - 1) / block_size
        }
    }

    /// Number of 32-byte slots scanned in the root directory region.
    pub fn root_dir_slots(&self) -> u64 {
        self.root_dir_blocks() * self.block_size() / DIR_ENTRY_SIZE
    }

    /// Start of the data region.
    ///
    /// Hidden blocks are not part of this sum and the root directory size is rounded down.
    pub fn data_region_offset(&self) -> u64 {
        let root_blocks = (u64::from(self.root_entry_count) * DIR_ENTRY_SIZE)
            .checked_div(self.block_size())
            .unwrap_or(0);
        (u64::from(self.reserved_blocks) + self.fats_blocks() + root_blocks) * self.block_size()
    }

    /// Byte offset of a data cluster. Cluster numbers below 2 do not address the data region.
    pub fn cluster_offset(&self, cluster: u16) -> u64 {
        debug_assert!(cluster >= FIRST_DATA_CLUSTER);
        let index = u64::from(cluster.saturating_sub(FIRST_DATA_CLUSTER));
        self.data_region_offset() + index * self.cluster_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floppy_prefix() -> [u8; BOOT_PREFIX_SIZE] {
        let mut raw = [0u8; BOOT_PREFIX_SIZE];
        raw[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        raw[0x0D] = 1;
        raw[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes());
        raw[0x10] = 2;
        raw[0x11..0x13].copy_from_slice(&224u16.to_le_bytes());
        raw[0x13..0x15].copy_from_slice(&2880u16.to_le_bytes());
        raw[0x15] = 0xF0;
        raw[0x16..0x18].copy_from_slice(&9u16.to_le_bytes());
        raw[0x18..0x1A].copy_from_slice(&18u16.to_le_bytes());
        raw[0x1A..0x1C].copy_from_slice(&2u16.to_le_bytes());
        raw
    }

    #[test]
    fn decode_floppy_geometry() {
        let geometry = Geometry::decode(&floppy_prefix());
        assert_eq!(geometry.bytes_per_block, 512);
        assert_eq!(geometry.blocks_per_cluster, 1);
        assert_eq!(geometry.reserved_blocks, 1);
        assert_eq!(geometry.fat_count, 2);
        assert_eq!(geometry.root_entry_count, 224);
        assert_eq!(geometry.total_logical_blocks, 2880);
        assert_eq!(geometry.media_descriptor, 0xF0);
        assert_eq!(geometry.blocks_per_fat, 9);
        assert_eq!(geometry.sectors_per_track, 18);
        assert_eq!(geometry.head_count, 2);
        assert_eq!(geometry.hidden_blocks, 0);
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn floppy_layout() {
        let geometry = Geometry::decode(&floppy_prefix());
        assert_eq!(geometry.fat_offset(), 512);
        assert_eq!(geometry.fat_size(), 9 * 512);
        assert_eq!(geometry.root_dir_offset(), 19 * 512);
        assert_eq!(geometry.root_dir_blocks(), 14);
        assert_eq!(geometry.root_dir_slots(), 224);
        assert_eq!(geometry.data_region_offset(), 33 * 512);
        assert_eq!(geometry.cluster_offset(2), 33 * 512);
        assert_eq!(geometry.cluster_offset(10), 41 * 512);
    }

    #[test]
    fn root_dir_blocks_round_up_but_data_region_rounds_down() {
        let mut geometry = Geometry::decode(&floppy_prefix());
        geometry.root_entry_count = 17;
        assert_eq!(geometry.root_dir_blocks(), 2);
        assert_eq!(geometry.data_region_offset(), (1 + 18 + 1) * 512);
    }

    #[test]
    fn hidden_blocks_shift_fat_and_root_only() {
        let mut geometry = Geometry::decode(&floppy_prefix());
        geometry.hidden_blocks = 4;
        assert_eq!(geometry.fat_offset(), 5 * 512);
        assert_eq!(geometry.root_dir_offset(), 23 * 512);
        assert_eq!(geometry.data_region_offset(), 33 * 512);
    }

    #[test]
    fn short_input_decodes_as_zero() {
        let geometry = Geometry::decode(&[0xEB, 0x3C, 0x90]);
        assert_eq!(geometry, Geometry::default());
        assert!(geometry.validate().is_err());
        assert_eq!(geometry.root_dir_blocks(), 0);
        assert_eq!(geometry.data_region_offset(), 0);
        assert_eq!(geometry.cluster_size(), 0);
    }

    #[test]
    fn zero_cluster_size_is_rejected() {
        let mut raw = floppy_prefix();
        raw[0x0D] = 0;
        assert!(matches!(Geometry::decode(&raw).validate(), Err(Error::CorruptedFileSystem)));
    }
}
