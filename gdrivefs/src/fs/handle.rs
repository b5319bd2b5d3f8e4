use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::str::FromStr;

use tracing::warn;

use super::engine::DriveFs;
use super::error::FsError;

/// Parsed form of a conventional `open()` mode string (`r`, `wb`, `a+`...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    read: bool,
    write: bool,
    append: bool,
    update: bool,
}

impl OpenMode {
    pub fn readable(&self) -> bool {
        self.read || self.update
    }

    pub fn writable(&self) -> bool {
        self.write || self.append || self.update
    }

    /// `w` modes start from an empty body.
    pub fn truncates(&self) -> bool {
        self.write
    }

    /// Plain `w` deletes an existing file at open time; `w+` keeps the
    /// object and overwrites its body on flush.
    pub fn recreates(&self) -> bool {
        self.write && !self.update
    }

    pub fn appends(&self) -> bool {
        self.append
    }

    /// `r` modes require the file to exist already.
    pub fn requires_existing(&self) -> bool {
        self.read
    }

    /// Whether the current remote body is loaded into the buffer on open.
    pub fn loads_existing(&self) -> bool {
        self.read || self.append
    }
}

impl FromStr for OpenMode {
    type Err = FsError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        let invalid = || FsError::InvalidArgument(format!("unsupported open mode {mode:?}"));
        let mut parsed = OpenMode {
            read: false,
            write: false,
            append: false,
            update: false,
        };
        let mut primaries = 0;
        for ch in mode.chars() {
            match ch {
                'r' => {
                    parsed.read = true;
                    primaries += 1;
                }
                'w' => {
                    parsed.write = true;
                    primaries += 1;
                }
                'a' => {
                    parsed.append = true;
                    primaries += 1;
                }
                '+' if !parsed.update => parsed.update = true,
                'b' | 't' => {}
                _ => return Err(invalid()),
            }
        }
        if primaries != 1 {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

/// Buffered handle returned by [`DriveFs::open`].
///
/// The whole body lives in memory: read modes fetch it up front and
/// writable modes upload it in one piece on [`DriveFile::flush`] or
/// [`DriveFile::close`]. Dropping a handle with unsaved writes loses them.
pub struct DriveFile<'a> {
    fs: &'a DriveFs,
    path: String,
    mode: OpenMode,
    buffer: Cursor<Vec<u8>>,
    dirty: bool,
}

impl<'a> DriveFile<'a> {
    pub(crate) fn new(
        fs: &'a DriveFs,
        path: String,
        mode: OpenMode,
        contents: Vec<u8>,
        existed: bool,
    ) -> Self {
        let mut buffer = Cursor::new(contents);
        if mode.appends() {
            buffer.set_position(buffer.get_ref().len() as u64);
        }
        Self {
            fs,
            path,
            mode,
            buffer,
            // A new or truncated file must reach the store even if nothing
            // is written to it.
            dirty: mode.writable() && (mode.truncates() || !existed),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn contents(&self) -> &[u8] {
        self.buffer.get_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Uploads the buffer if it has changed since the last flush.
    pub async fn flush(&mut self) -> Result<(), FsError> {
        if !self.dirty {
            return Ok(());
        }
        self.fs
            .setcontents(&self.path, self.buffer.get_ref())
            .await?;
        self.dirty = false;
        Ok(())
    }

    pub async fn close(mut self) -> Result<(), FsError> {
        self.flush().await
    }
}

impl Read for DriveFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.mode.readable() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "file not opened for reading",
            ));
        }
        self.buffer.read(buf)
    }
}

impl Write for DriveFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.writable() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "file not opened for writing",
            ));
        }
        if self.mode.appends() {
            self.buffer.seek(SeekFrom::End(0))?;
        }
        let written = self.buffer.write(buf)?;
        self.dirty |= written > 0;
        Ok(written)
    }

    /// Local no-op; the remote upload happens in the async
    /// [`DriveFile::flush`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for DriveFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl Drop for DriveFile<'_> {
    fn drop(&mut self) {
        if self.dirty {
            warn!(path = %self.path, "file handle dropped with unsaved writes");
        }
    }
}
