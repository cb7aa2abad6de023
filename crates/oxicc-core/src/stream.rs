//! Byte streams a profile can be read from and written to
//!
//! The container only needs seek/read/write/flush on absolute positions, so
//! the same code path serves files, memory buffers and the MD5 hashing sink.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use crate::checksum::Md5;
use crate::error::{Error, IoOp, Result};

/// Stream shared between several containers used one after another
pub type SharedStream = Rc<RefCell<dyn IccStream>>;

/// Random-access byte stream
pub trait IccStream {
    /// Total length in bytes
    fn size(&mut self) -> Result<u64>;

    /// Move to an absolute position
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Read up to `buf.len()` bytes, returning the number read
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buf: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Fill `buf` entirely or fail
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut done = 0;
        while done < buf.len() {
            let n = self.read(&mut buf[done..])?;
            if n == 0 {
                return Err(Error::io(
                    IoOp::Read,
                    format!("unexpected end of stream after {done} of {} bytes", buf.len()),
                ));
            }
            done += n;
        }
        Ok(())
    }
}

/// File-backed stream
#[derive(Debug)]
pub struct FileStream {
    file: File,
}

impl FileStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(IoOp::Open, e))?;
        Ok(Self { file })
    }

    /// Create (or truncate) a file for writing
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(IoOp::Open, e))?;
        Ok(Self { file })
    }

    pub fn from_file(file: File) -> Self {
        Self { file }
    }

    pub fn shared(self) -> SharedStream {
        Rc::new(RefCell::new(self))
    }
}

impl IccStream for FileStream {
    fn size(&mut self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| Error::io(IoOp::Seek, e))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(pos))
            .map(|_| ())
            .map_err(|e| Error::io(IoOp::Seek, e))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file.read(buf).map_err(|e| Error::io(IoOp::Read, e))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf).map_err(|e| Error::io(IoOp::Write, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| Error::io(IoOp::Write, e))
    }
}

/// Growable in-memory stream
#[derive(Debug, Clone, Default)]
pub struct MemStream {
    buf: Vec<u8>,
    pos: usize,
}

impl MemStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn shared(self) -> SharedStream {
        Rc::new(RefCell::new(self))
    }
}

impl IccStream for MemStream {
    fn size(&mut self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = usize::try_from(pos).map_err(|e| Error::io(IoOp::Seek, e))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.buf.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.buf.len() - self.pos);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let end = self
            .pos
            .checked_add(buf.len())
            .ok_or_else(|| Error::io(IoOp::Write, "position overflow"))?;
        if end > self.buf.len() {
            // Bytes between the old end and the write position read back as zero
            self.buf
                .try_reserve(end - self.buf.len())
                .map_err(|_| Error::Alloc { bytes: end })?;
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Write-only stream that feeds everything into an MD5 digest.
///
/// Forward seeks hash zero bytes for the skipped gap; seeking backwards is
/// an error because hashed data cannot be rewritten.
#[derive(Debug, Default)]
pub struct Md5Stream {
    md5: Md5,
    pos: u64,
}

impl Md5Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digest(&mut self) -> [u8; 16] {
        self.md5.get()
    }
}

impl IccStream for Md5Stream {
    fn size(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos < self.pos {
            return Err(Error::io(IoOp::Seek, "checksum stream cannot seek backwards"));
        }
        let zeros = [0u8; 256];
        let mut gap = pos - self.pos;
        while gap > 0 {
            let n = gap.min(zeros.len() as u64) as usize;
            self.md5.add(&zeros[..n]);
            gap -= n as u64;
        }
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::io(IoOp::Read, "checksum stream is write-only"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.md5.add(buf);
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
