use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;
pub const GROUP_FLUSH_COUNT: usize = 100;

/// Buffered sink for statement groups.
///
/// Each group is handed over with a single write call; groups are flushed to the
/// underlying writer every [`GROUP_FLUSH_COUNT`] groups and on [`SqlWriter::finish`].
pub struct SqlWriter<W: Write> {
    writer: BufWriter<W>,
    write_count: usize,
    max_group_buffer: usize,
    groups_written: usize,
    bytes_written: u64,
}

impl<W: Write> SqlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(WRITER_BUFFER_SIZE, inner),
            write_count: 0,
            max_group_buffer: GROUP_FLUSH_COUNT,
            groups_written: 0,
            bytes_written: 0,
        }
    }

    /// Write a block of newline-terminated statements. Empty groups are skipped.
    pub fn write_group(&mut self, group: &str) -> io::Result<()> {
        if group.is_empty() {
            return Ok(());
        }
        self.writer.write_all(group.as_bytes())?;
        self.bytes_written += group.len() as u64;
        self.groups_written += 1;

        self.write_count += 1;
        if self.write_count >= self.max_group_buffer {
            self.write_count = 0;
            self.writer.flush()?;
        }

        Ok(())
    }

    pub fn groups_written(&self) -> usize {
        self.groups_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.write_count = 0;
        self.writer.flush()
    }

    /// Flush and return the underlying writer
    pub fn finish(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

/// Output file that only appears at its target path once complete.
///
/// Statements go to a temporary file in the target's directory, which
/// [`OutputFile::persist`] renames over the target. Dropping an unpersisted
/// `OutputFile` removes the temporary file and leaves the target untouched.
pub struct OutputFile {
    target: PathBuf,
    writer: SqlWriter<NamedTempFile>,
}

impl OutputFile {
    pub fn create(target: &Path) -> io::Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        Ok(Self {
            target: target.to_path_buf(),
            writer: SqlWriter::new(temp),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn writer(&mut self) -> &mut SqlWriter<NamedTempFile> {
        &mut self.writer
    }

    /// Flush, sync and atomically move the file into place
    pub fn persist(self) -> io::Result<PathBuf> {
        let temp = self.writer.finish()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.target).map_err(|e| e.error)?;
        Ok(self.target)
    }
}
