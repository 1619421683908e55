//! Manifest extraction and identity validation.
//!
//! Uploads are inspected through their bounded prefix only and rewound
//! afterwards, so installation still sees every byte. Directories must
//! carry `META-INF/MANIFEST.MF` directly under their root; there is no
//! fallback when it is missing.

use crate::error::{DeployError, Result};
use crate::manifest::{
    MANIFEST_DIR, MANIFEST_PATH, ManifestError, ModuleIdentity, ModuleManifest,
};
use crate::source::{DirectoryTree, ModuleSource, UploadStream};
use crate::local_header::read_local_header;
use log::{debug, info};
use std::fs;

const UPLOAD_ORIGIN: &str = "uploaded archive";

/// A manifest whose identity has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedModule {
    /// The identity extracted from the manifest.
    pub identity: ModuleIdentity,
    /// The full parsed manifest.
    pub manifest: ModuleManifest,
}

/// Validates either kind of source.
///
/// # Errors
///
/// See [`validate_upload`] and [`validate_directory`].
pub fn validate(source: &mut ModuleSource<'_>) -> Result<ValidatedModule> {
    match source {
        ModuleSource::Upload(upload) => validate_upload(upload),
        ModuleSource::Directory(tree) => validate_directory(tree),
    }
}

/// Reads the manifest from the head of an uploaded archive.
///
/// On success the stream is rewound to its first byte.
///
/// # Errors
///
/// Returns [`DeployError::MissingManifest`] when no manifest is found in
/// the bounded prefix, [`DeployError::InvalidManifest`] when it cannot be
/// parsed, [`DeployError::MissingIdentity`] when it has no symbolic name,
/// and [`DeployError::Io`] if the stream cannot be read or rewound.
pub fn validate_upload(upload: &mut UploadStream<'_>) -> Result<ValidatedModule> {
    let manifest = read_archive_manifest(upload.peek()?);
    upload.rewind()?;
    let manifest = manifest
        .ok_or_else(|| DeployError::MissingManifest {
            origin: UPLOAD_ORIGIN.to_owned(),
        })?
        .map_err(|source| DeployError::InvalidManifest {
            origin: UPLOAD_ORIGIN.to_owned(),
            source,
        })?;
    identify(manifest, UPLOAD_ORIGIN)
}

/// Reads the manifest file of an exploded module.
///
/// # Errors
///
/// Returns [`DeployError::SourceNotFound`] when the root is not a
/// directory, [`DeployError::MissingManifest`] when the manifest file is
/// absent, [`DeployError::InvalidManifest`] or
/// [`DeployError::MissingIdentity`] for a bad manifest, and
/// [`DeployError::Io`] if the file cannot be read.
pub fn validate_directory(tree: &DirectoryTree) -> Result<ValidatedModule> {
    let root = tree.root();
    if !root.is_dir() {
        return Err(DeployError::SourceNotFound {
            path: root.to_path_buf(),
        });
    }
    info!("checking dir {} for module install", root.display());

    let origin = root.display().to_string();
    let manifest_file = tree.manifest_file();
    if !manifest_file.is_file() {
        return Err(DeployError::MissingManifest { origin });
    }
    let bytes = fs::read(&manifest_file)?;
    let manifest =
        ModuleManifest::parse(&bytes).map_err(|source| DeployError::InvalidManifest {
            origin: origin.clone(),
            source,
        })?;
    identify(manifest, &origin)
}

/// Locates and parses the manifest at the head of archive bytes.
///
/// The manifest is accepted only as the first entry or directly after a
/// leading `META-INF/` directory entry, matched without regard to ASCII
/// case. Entries are walked through their local headers, so streamed
/// archives whose sizes trail the data are read the same way. Returns
/// `None` when no leading manifest entry is found or the bytes are not an
/// archive.
#[must_use]
pub fn read_archive_manifest(
    bytes: &[u8],
) -> Option<std::result::Result<ModuleManifest, ManifestError>> {
    let raw = leading_manifest(bytes)?;
    Some(ModuleManifest::parse(&raw))
}

fn leading_manifest(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut offset = 0;
    for _ in 0..2 {
        let entry = match read_local_header(bytes, offset) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(error) => {
                debug!("stopped scanning upload for a manifest: {error}");
                return None;
            }
        };
        let is_dir = entry.name().eq_ignore_ascii_case(MANIFEST_DIR);
        if !is_dir && !entry.name().eq_ignore_ascii_case(MANIFEST_PATH) {
            return None;
        }
        let contents = match entry.contents() {
            Ok(contents) => contents,
            Err(error) => {
                debug!("stopped scanning upload for a manifest: {error}");
                return None;
            }
        };
        if !is_dir {
            return Some(contents.data);
        }
        offset = contents.next_offset;
    }
    None
}

fn identify(manifest: ModuleManifest, origin: &str) -> Result<ValidatedModule> {
    let identity = manifest
        .identity()
        .ok_or_else(|| DeployError::MissingIdentity {
            origin: origin.to_owned(),
        })?;
    debug!("validated module {identity} from {origin}");
    Ok(ValidatedModule { identity, manifest })
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
