//! Streaming, self-verifying entry reader.

use std::io::{self, Read};

use p4kit_common::crc::Hasher;

use crate::{Error, P4kEntry};

/// Decoded contents of one entry.
///
/// Wraps the decoder chosen for the entry and checks the decoded length and
/// CRC-32 against the central directory. Once the stream ends (or produces
/// more bytes than recorded) a mismatch is returned as an
/// `io::ErrorKind::InvalidData` error wrapping [`Error::CorruptEntry`] or
/// [`Error::Checksum`]; [`Error::from_stream`] recovers the typed error.
pub struct EntryReader {
    name: String,
    inner: Box<dyn Read + Send>,
    hasher: Hasher,
    expected_size: u64,
    expected_crc: u32,
    consumed: u64,
    verified: bool,
}

impl EntryReader {
    pub(crate) fn new(entry: &P4kEntry, inner: Box<dyn Read + Send>) -> Self {
        Self {
            name: entry.name().to_string(),
            inner,
            hasher: Hasher::new(),
            expected_size: entry.uncompressed_size(),
            expected_crc: entry.crc32(),
            consumed: 0,
            verified: false,
        }
    }

    /// Name of the entry being read.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size recorded in the central directory.
    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Read the remaining contents, returning typed errors.
    pub fn read_all(mut self) -> crate::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.expected_size.min(1 << 30) as usize);
        self.read_to_end(&mut out).map_err(Error::from_stream)?;
        Ok(out)
    }

    fn verify(&mut self) -> io::Result<()> {
        self.verified = true;
        if self.consumed != self.expected_size {
            return Err(Error::CorruptEntry {
                name: self.name.clone(),
                expected: self.expected_size,
                actual: self.consumed,
            }
            .into_io());
        }
        let actual = self.hasher.clone().finalize();
        if actual != self.expected_crc {
            return Err(Error::Checksum {
                name: self.name.clone(),
                expected: self.expected_crc,
                actual,
            }
            .into_io());
        }
        Ok(())
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.verified || buf.is_empty() {
            return Ok(0);
        }

        let n = self.inner.read(buf).map_err(|e| {
            if e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
                e
            } else {
                Error::Decompression(format!("{}: {e}", self.name)).into_io()
            }
        })?;

        self.consumed += n as u64;
        if self.consumed > self.expected_size {
            self.verified = true;
            return Err(Error::CorruptEntry {
                name: self.name.clone(),
                expected: self.expected_size,
                actual: self.consumed,
            }
            .into_io());
        }

        self.hasher.update(&buf[..n]);
        if n == 0 {
            self.verify()?;
        }
        Ok(n)
    }
}

impl std::fmt::Debug for EntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryReader")
            .field("name", &self.name)
            .field("expected_size", &self.expected_size)
            .field("consumed", &self.consumed)
            .finish()
    }
}
