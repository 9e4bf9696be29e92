use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("truncated read at offset {offset:#x}: wanted {expected} bytes")]
    TruncatedRead { offset: u64, expected: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Forward byte cursor over a hive stream.  All multi-byte reads are
/// little-endian; the big-endian value types are reinterpreted later, from
/// already-fetched data bytes, never at the cursor.
pub struct HiveCursor<R: Read + Seek> {
    inner: R,
    pos:   u64,
}

impl<R: Read + Seek> HiveCursor<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<(), ReadError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ReadError> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(ReadError::TruncatedRead {
                    offset:   self.pos,
                    expected: buf.len(),
                })
            }
            Err(e) => Err(ReadError::Io(e)),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_bytes_at(&mut self, offset: u64, n: usize) -> Result<Vec<u8>, ReadError> {
        self.seek_to(offset)?;
        self.read_bytes(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let mut b = [0u8; 2];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_u16(&b))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_u32(&b))
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_i32(&b))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(LittleEndian::read_u64(&b))
    }
}
