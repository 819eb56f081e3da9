//! Cloneable file reader backed by positioned reads.
//!
//! Zip entries are unpacked on several threads at once. Each thread needs
//! its own cursor into the same archive, but the archive should be opened
//! and its central directory parsed only once. `SharedFile` shares a single
//! OS handle and keeps a private offset per clone; reads go through
//! `pread`-style calls, so clones never disturb each other.

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

/// A `Read + Seek` view of a file that can be cloned across threads.
///
/// # Examples
///
/// ```no_run
/// use std::io::Read;
/// use unspool_core::io::SharedFile;
///
/// let file = SharedFile::open("archive.zip")?;
/// let mut a = file.clone();
/// let mut b = file;
///
/// let mut first = [0u8; 4];
/// a.read_exact(&mut first)?;
/// // `b` still starts at offset 0.
/// let mut again = [0u8; 4];
/// b.read_exact(&mut again)?;
/// assert_eq!(first, again);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SharedFile {
    file: Arc<File>,
    len: u64,
    pos: u64,
}

impl SharedFile {
    /// Opens `path` for shared positioned reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(File::open(path)?)
    }

    /// Wraps an already open file.
    pub fn new(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            len,
            pos: 0,
        })
    }

    /// Length of the underlying file at open time.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the underlying file was empty at open time.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

impl Read for SharedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let remaining = self.len - self.pos;
        let want = buf
            .len()
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.read_at(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SharedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;
        self.pos = target;
        Ok(target)
    }
}
