//! Module archive assembly from an exploded directory.
//!
//! The archive always starts with the manifest entry, followed by the
//! directory tree in sorted traversal order. Each directory entry precedes
//! its children, and a `META-INF/MANIFEST.MF` file found in the tree is
//! skipped so the manifest is never written twice.

use crate::archive_error::ArchiveError;
use crate::manifest::{MANIFEST_PATH, ModuleManifest};
use log::debug;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entries at or above this size need zip64 extensions.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Compression applied to archive entries.
///
/// This is a size/speed policy knob; it never changes which entries are
/// written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Entries are stored uncompressed.
    #[default]
    Stored,
    /// Entries are deflated.
    Deflated,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Self::Stored => CompressionMethod::Stored,
            Self::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Serialises a directory tree into a module archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBuilder {
    compression: Compression,
}

impl ArchiveBuilder {
    /// Creates a builder using the given compression.
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Writes the archive for `root` into `output` and returns it.
    ///
    /// `manifest` is written as the first entry; the rest of the tree
    /// follows.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on any listing, read, or write failure. The
    /// output is incomplete in that case and must be discarded.
    pub fn write<W: Write + Seek>(
        &self,
        root: &Path,
        manifest: &ModuleManifest,
        output: W,
    ) -> Result<W, ArchiveError> {
        let mut writer = ZipWriter::new(output);
        writer.start_file(MANIFEST_PATH, self.entry_options(0))?;
        manifest.write_to(&mut writer)?;
        self.append_dir(&mut writer, root, "")?;
        Ok(writer.finish()?)
    }

    /// Builds the archive for `root` into a temporary file.
    ///
    /// The returned [`TempArchive`] is positioned at its start and deletes
    /// the file when dropped. On failure the temporary file is removed
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if the temporary file cannot be created or
    /// the build fails.
    pub fn build_temp(
        &self,
        root: &Path,
        manifest: &ModuleManifest,
    ) -> Result<TempArchive, ArchiveError> {
        let prefix = root
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("module");
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".module.jar")
            .tempfile()?;
        self.write(root, manifest, file.as_file_mut())?;
        file.as_file_mut().rewind()?;
        debug!("assembled {}", root.display());
        Ok(TempArchive { file })
    }

    fn append_dir<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        dir: &Path,
        prefix: &str,
    ) -> Result<(), ArchiveError> {
        for child in sorted_children(dir)? {
            let name = entry_name(&child)?;
            let metadata = fs::metadata(&child)?;
            if metadata.is_dir() {
                let nested = format!("{prefix}{name}/");
                writer.add_directory(nested.as_str(), self.entry_options(0))?;
                self.append_dir(writer, &child, &nested)?;
                continue;
            }
            let entry = format!("{prefix}{name}");
            if entry == MANIFEST_PATH {
                continue;
            }
            let mut source = File::open(&child)?;
            writer.start_file(entry.as_str(), self.entry_options(metadata.len()))?;
            io::copy(&mut source, writer)?;
        }
        Ok(())
    }

    fn entry_options(&self, len: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(self.compression.method())
            .large_file(len >= ZIP64_THRESHOLD)
    }
}

/// A module archive in a temporary file, removed on drop.
#[derive(Debug)]
pub struct TempArchive {
    file: NamedTempFile,
}

impl TempArchive {
    /// Returns the on-disk location of the archive.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Read for TempArchive {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.file.read(out)
    }
}

fn sorted_children(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();
    Ok(children)
}

fn entry_name(path: &Path) -> Result<&str, ArchiveError> {
    path.file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| ArchiveError::NonUtf8Path(path.to_path_buf()))
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
