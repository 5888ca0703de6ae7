use std::io::{self, Read, Seek, SeekFrom};

pub trait ReadSeek: Read + Seek {}
impl<T> ReadSeek for T where T: Read + Seek {}

/// Reads into `buf` until it is full or the stream is exhausted.
///
/// Unlike `Read::read_exact` a short stream is not an error: the number of bytes actually
/// stored is returned so the caller can decide how to treat a truncated region.
pub(crate) fn read_fill<R: Read + ?Sized>(rdr: &mut R, mut buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while !buf.is_empty() {
        match rdr.read(buf) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                let tmp = buf;
                buf = &mut tmp[n..];
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Positional variant of `read_fill`.
pub(crate) fn read_fill_at<R: ReadSeek + ?Sized>(rdr: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    rdr.seek(SeekFrom::Start(offset))?;
    read_fill(rdr, buf)
}

/// Little-endian field access on fixed-layout records.
///
/// Bytes past the end of the slice read as zero, so decoding a truncated record never panics.
pub(crate) trait LeFields {
    fn u8_at(&self, offset: usize) -> u8;
    fn u16_le_at(&self, offset: usize) -> u16;
    fn u32_le_at(&self, offset: usize) -> u32;
}

impl LeFields for [u8] {
    fn u8_at(&self, offset: usize) -> u8 {
        self.get(offset).copied().unwrap_or(0)
    }

    fn u16_le_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.u8_at(offset), self.u8_at(offset + 1)])
    }

    fn u32_le_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.u8_at(offset),
            self.u8_at(offset + 1),
            self.u8_at(offset + 2),
            self.u8_at(offset + 3),
        ])
    }
}
