//! Raw block-storage I/O, deliberately kept narrow: positional page-sized
//! reads and writes over a fixed-size region, plus `sync`. The
//! engine above this module is the only thing that understands page
//! contents; `BlockStorage` just moves bytes at page-aligned offsets.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::FileExt as _;
#[cfg(windows)]
use std::os::windows::fs::FileExt as _;

use crate::error::Result;

/// Positional page I/O over a region addressed in bytes. Implementations
/// need not be `Sync`; the engine drives this from a single thread.
pub trait BlockStorage {
    fn read_page(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_page(&mut self, offset: u64, buf: &[u8]) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}

/// A [`BlockStorage`] backed by a single on-disk file, grown on demand to
/// fit whatever offset is written.
#[derive(Debug)]
pub struct FileBlockStorage {
    path: PathBuf,
    file: File,
}

impl FileBlockStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_len(&mut self, required_bytes: u64) -> Result<()> {
        let current_len = self.file.metadata()?.len();
        if current_len < required_bytes {
            self.file.set_len(required_bytes)?;
        }
        Ok(())
    }
}

impl BlockStorage for FileBlockStorage {
    fn read_page(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        read_exact_at(&self.file, offset, buf)?;
        Ok(())
    }

    fn write_page(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.ensure_len(offset + buf.len() as u64)?;
        write_all_at(&self.file, offset, buf)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

fn read_exact_at(file: &File, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = read_at(file, offset, buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read_at returned 0 bytes",
            ));
        }
        offset = offset.saturating_add(n as u64);
        buf = &mut buf[n..];
    }
    Ok(())
}

fn write_all_at(file: &File, mut offset: u64, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = write_at(file, offset, buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "write_at returned 0 bytes"));
        }
        offset = offset.saturating_add(n as u64);
        buf = &buf[n..];
    }
    Ok(())
}

#[cfg(unix)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, offset: u64, buf: &[u8]) -> io::Result<usize> {
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, offset: u64, buf: &[u8]) -> io::Result<usize> {
    file.seek_write(buf, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_then_reads_back_a_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileBlockStorage::open(dir.path().join("data.bin")).unwrap();
        let page = vec![0xABu8; 64];
        storage.write_page(3 * 64, &page).unwrap();
        storage.sync().unwrap();

        let mut out = vec![0u8; 64];
        storage.read_page(3 * 64, &mut out).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn grows_file_to_fit_a_later_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileBlockStorage::open(dir.path().join("data.bin")).unwrap();
        storage.write_page(100 * 64, &vec![1u8; 64]).unwrap();
        let len = std::fs::metadata(storage.path()).unwrap().len();
        assert!(len >= 101 * 64);
    }
}
