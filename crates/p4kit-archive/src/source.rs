//! Random-access byte sources.
//!
//! Archives are read through [`ByteView`], a cheaply clonable window over
//! shared, immutable bytes. The root archive is memory-mapped; a nested
//! container stored without compression is a window into its parent's
//! mapping, so no bytes are copied. Reads are positional, so any number of
//! threads can read the same view without coordinating.

use std::fs::File;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::FormatError;
use crate::Result;

/// Storage behind a [`ByteView`].
pub enum Backing {
    /// A memory-mapped file.
    Mapped(Mmap),
    /// Bytes owned in memory (decoded nested containers, tests).
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(bytes) => bytes,
        }
    }
}

/// A window `[start, start + len)` over shared backing bytes.
#[derive(Clone)]
pub struct ByteView {
    backing: Arc<Backing>,
    start: usize,
    len: usize,
}

impl ByteView {
    /// Memory-map a file.
    pub fn map_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        // The archive is treated as read-only for the lifetime of the map.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::from_backing(Backing::Mapped(mmap)))
    }

    /// Wrap owned bytes.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::from_backing(Backing::Owned(bytes))
    }

    fn from_backing(backing: Backing) -> Self {
        let len = backing.len();
        Self {
            backing: Arc::new(backing),
            start: 0,
            len,
        }
    }

    /// Length of the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The window as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.backing[self.start..self.start + self.len]
    }

    /// Bounded read of `len` bytes at `offset` within the window.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let (start, end) = self.bounds("read", offset, len as u64)?;
        Ok(&self.as_slice()[start..end])
    }

    /// Sub-window sharing the same backing bytes.
    pub fn slice(&self, offset: u64, len: u64) -> Result<ByteView> {
        let (start, end) = self.bounds("slice", offset, len)?;
        Ok(Self {
            backing: Arc::clone(&self.backing),
            start: self.start + start,
            len: end - start,
        })
    }

    /// Whether both views read from the same backing storage.
    pub fn shares_backing(&self, other: &ByteView) -> bool {
        Arc::ptr_eq(&self.backing, &other.backing)
    }

    /// An owning reader positioned at the start of the window.
    pub fn cursor(&self) -> ViewCursor {
        ViewCursor {
            view: self.clone(),
            position: 0,
        }
    }

    fn bounds(&self, what: &'static str, offset: u64, len: u64) -> Result<(usize, usize)> {
        let out_of_bounds = || FormatError::OutOfBounds {
            what,
            offset,
            len,
            available: self.len as u64,
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.len as u64 {
            return Err(out_of_bounds().into());
        }
        Ok((offset as usize, end as usize))
    }
}

impl std::fmt::Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteView")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

/// Owning `Read + BufRead + Seek` cursor over a [`ByteView`].
#[derive(Debug, Clone)]
pub struct ViewCursor {
    view: ByteView,
    position: usize,
}

impl ViewCursor {
    /// Bytes not yet consumed.
    #[inline]
    fn rest(&self) -> &[u8] {
        &self.view.as_slice()[self.position.min(self.view.len)..]
    }
}

impl Read for ViewCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = self.rest();
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.position += n;
        Ok(n)
    }
}

impl BufRead for ViewCursor {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.rest())
    }

    fn consume(&mut self, amt: usize) {
        self.position = (self.position + amt).min(self.view.len);
    }
}

impl Seek for ViewCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => (self.view.len as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => (self.position as u64).checked_add_signed(delta),
        };
        match target {
            Some(target) => {
                self.position = target.min(usize::MAX as u64) as usize;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_shares_backing() {
        let view = ByteView::from_vec((0u8..32).collect());
        let window = view.slice(8, 8).unwrap();

        assert_eq!(window.as_slice(), &(8u8..16).collect::<Vec<_>>()[..]);
        assert!(window.shares_backing(&view));

        let nested = window.slice(2, 4).unwrap();
        assert_eq!(nested.as_slice(), &[10, 11, 12, 13]);
    }

    #[test]
    fn test_read_at_is_bounded() {
        let view = ByteView::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(view.read_at(1, 2).unwrap(), &[2, 3]);
        assert!(view.read_at(3, 2).is_err());
        assert!(view.slice(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_cursor_read_and_seek() {
        let view = ByteView::from_vec(b"hello world".to_vec());
        let mut cursor = view.slice(6, 5).unwrap().cursor();

        let mut text = String::new();
        cursor.read_to_string(&mut text).unwrap();
        assert_eq!(text, "world");

        cursor.seek(SeekFrom::Start(1)).unwrap();
        let mut two = [0u8; 2];
        cursor.read_exact(&mut two).unwrap();
        assert_eq!(&two, b"or");

        assert!(cursor.seek(SeekFrom::Current(-10)).is_err());
    }

    #[test]
    fn test_view_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ByteView>();
        assert_send_sync::<ViewCursor>();
    }
}
