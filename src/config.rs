//! Deployment tuning knobs.

use crate::archive::Compression;
use crate::peek::DEFAULT_PEEK_LIMIT;

/// Tunables for the deployment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployConfig {
    /// Bytes of an upload buffered to locate its manifest.
    pub peek_limit: usize,
    /// Compression for archives assembled from directories.
    pub compression: Compression,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            peek_limit: DEFAULT_PEEK_LIMIT,
            compression: Compression::Stored,
        }
    }
}
