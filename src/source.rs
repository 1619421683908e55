//! Where a module comes from: an uploaded archive or an exploded directory.

use crate::manifest::MANIFEST_PATH;
use crate::peek::{BoundedPeek, DEFAULT_PEEK_LIMIT};
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// The content of one install request.
///
/// Exactly one source is active per request; the two install paths are
/// handled independently by the coordinator.
#[derive(Debug)]
pub enum ModuleSource<'a> {
    /// A pre-built module archive streamed from the client.
    Upload(UploadStream<'a>),
    /// An exploded module laid out on the local filesystem.
    Directory(DirectoryTree),
}

/// An uploaded archive, wrapped so its head can be inspected and replayed.
pub struct UploadStream<'a> {
    reader: BoundedPeek<Box<dyn Read + 'a>>,
}

impl<'a> UploadStream<'a> {
    /// Wraps `reader` with the default 2 MiB peek limit.
    pub fn new(reader: impl Read + 'a) -> Self {
        Self::with_limit(reader, DEFAULT_PEEK_LIMIT)
    }

    /// Wraps `reader`, buffering at most `limit` bytes for validation.
    pub fn with_limit(reader: impl Read + 'a, limit: usize) -> Self {
        Self {
            reader: BoundedPeek::new(Box::new(reader), limit),
        }
    }

    /// Returns the bounded prefix used for manifest inspection.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the underlying stream.
    pub fn peek(&mut self) -> io::Result<&[u8]> {
        self.reader.peek()
    }

    /// Repositions the stream at its first byte.
    ///
    /// # Errors
    ///
    /// Fails if bytes beyond the peeked prefix were already consumed.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.rewind()
    }
}

impl Read for UploadStream<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.reader.read(out)
    }
}

impl fmt::Debug for UploadStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadStream")
            .field("limit", &self.reader.limit())
            .finish_non_exhaustive()
    }
}

/// The root of an exploded module.
///
/// A directory is a valid module source iff it holds a manifest at
/// `META-INF/MANIFEST.MF` directly under its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    root: PathBuf,
}

impl DirectoryTree {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the expected location of the manifest file.
    #[must_use]
    pub fn manifest_file(&self) -> PathBuf {
        MANIFEST_PATH
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}
