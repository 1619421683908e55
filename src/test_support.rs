//! Test doubles for exercising deployment without a live host.
//!
//! Available under `cfg(test)` and the `test-support` feature.

use crate::host::{HostError, ModuleHandle, ModuleHost, ModuleId};
use crate::manifest::{MANIFEST_DIR, MANIFEST_PATH};
use crate::validator::read_archive_manifest;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{Cursor, Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// One primitive invocation observed by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// `install` with the given location.
    Install {
        /// Location string passed by the caller.
        location: String,
    },
    /// `update` of the given module.
    Update {
        /// Target module.
        id: ModuleId,
    },
    /// `start` of the given module.
    Start {
        /// Target module.
        id: ModuleId,
    },
    /// `refresh_transitive` over the given modules.
    Refresh {
        /// Modules named in the refresh set.
        ids: Vec<ModuleId>,
    },
}

#[derive(Debug, Default)]
struct Recorded {
    modules: Vec<ModuleHandle>,
    calls: Vec<HostCall>,
    payloads: Vec<Vec<u8>>,
    next_id: u64,
    rejection: Option<String>,
}

/// An in-memory host that records every call and the bytes streamed to it.
///
/// Installs parse the archive's manifest so the returned handle carries
/// the module's symbolic name; a stream without one is rejected, as a
/// real host would.
#[derive(Debug, Default)]
pub struct RecordingHost {
    state: Mutex<Recorded>,
}

impl RecordingHost {
    /// Creates a host with no modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host that already knows `modules`.
    #[must_use]
    pub fn with_modules(modules: Vec<ModuleHandle>) -> Self {
        let next_id = modules
            .iter()
            .map(|m| m.id().get() + 1)
            .max()
            .unwrap_or(1);
        Self {
            state: Mutex::new(Recorded {
                modules,
                next_id,
                ..Recorded::default()
            }),
        }
    }

    /// Makes every install, update, and start fail with `reason`.
    #[must_use]
    pub fn rejecting(self, reason: impl Into<String>) -> Self {
        self.lock().rejection = Some(reason.into());
        self
    }

    /// Returns the calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Returns every payload streamed to install or update, in order.
    #[must_use]
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.lock().payloads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModuleHost for RecordingHost {
    fn modules(&self) -> Vec<ModuleHandle> {
        self.lock().modules.clone()
    }

    fn install(&self, location: &str, content: &mut dyn Read) -> Result<ModuleHandle, HostError> {
        let mut payload = Vec::new();
        content.read_to_end(&mut payload)?;
        let mut state = self.lock();
        state.calls.push(HostCall::Install {
            location: location.to_owned(),
        });
        if let Some(reason) = &state.rejection {
            return Err(HostError::rejected(reason.clone()));
        }
        let name = read_archive_manifest(&payload)
            .and_then(Result::ok)
            .and_then(|manifest| manifest.identity())
            .ok_or_else(|| HostError::rejected("not a well-formed module package"))?;
        state.payloads.push(payload);
        let id = ModuleId::new(state.next_id.max(1));
        state.next_id = id.get() + 1;
        let module = ModuleHandle::new(id, Some(name.symbolic_name().to_owned()), location);
        state.modules.push(module.clone());
        Ok(module)
    }

    fn update(&self, module: &ModuleHandle, content: &mut dyn Read) -> Result<(), HostError> {
        let mut payload = Vec::new();
        content.read_to_end(&mut payload)?;
        let mut state = self.lock();
        state.calls.push(HostCall::Update { id: module.id() });
        if let Some(reason) = &state.rejection {
            return Err(HostError::rejected(reason.clone()));
        }
        if !state.modules.iter().any(|m| m.id() == module.id()) {
            return Err(HostError::UnknownModule { id: module.id() });
        }
        state.payloads.push(payload);
        Ok(())
    }

    fn start(&self, module: &ModuleHandle) -> Result<(), HostError> {
        let mut state = self.lock();
        state.calls.push(HostCall::Start { id: module.id() });
        match &state.rejection {
            Some(reason) => Err(HostError::rejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn refresh_transitive(&self, modules: &[ModuleHandle]) -> Result<(), HostError> {
        self.lock().calls.push(HostCall::Refresh {
            ids: modules.iter().map(ModuleHandle::id).collect(),
        });
        Ok(())
    }
}

/// Builds an in-memory module archive with `manifest` first, then `files`.
///
/// # Panics
///
/// Panics if the zip writer fails, which cannot happen for an in-memory
/// buffer.
#[must_use]
#[allow(
    clippy::expect_used,
    reason = "writes into an in-memory buffer cannot fail"
)]
pub fn archive_bytes(manifest: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(MANIFEST_PATH, SimpleFileOptions::default())
        .expect("start manifest entry");
    writer
        .write_all(manifest.as_bytes())
        .expect("write manifest");
    for (name, content) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(content.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish archive").into_inner()
}

/// Builds an archive the way streaming jar writers do.
///
/// `META-INF/` and the manifest are deflated with flag bit 3 set, so their
/// local headers carry no sizes and a data descriptor follows each one.
/// `files` are stored with known sizes. A central directory closes the
/// archive.
///
/// # Panics
///
/// Panics if compression fails, which cannot happen for an in-memory
/// buffer.
#[must_use]
#[allow(
    clippy::expect_used,
    reason = "writes into an in-memory buffer cannot fail"
)]
pub fn streamed_archive_bytes(manifest: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = StreamedArchive::default();
    for (name, content) in [(MANIFEST_DIR, &b""[..]), (MANIFEST_PATH, manifest.as_bytes())] {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).expect("deflate entry");
        let deflated = encoder.finish().expect("finish deflate");
        out.entry(name, content, &deflated, METHOD_DEFLATED);
    }
    for (name, content) in files {
        out.entry(name, content, content, METHOD_STORED);
    }
    out.finish()
}

const METHOD_STORED: u16 = 0;
/// Deflated entries are always written streamed.
const METHOD_DEFLATED: u16 = 8;

#[derive(Default)]
struct StreamedArchive {
    bytes: Vec<u8>,
    central: Vec<u8>,
    entries: u16,
}

impl StreamedArchive {
    fn entry(&mut self, name: &str, content: &[u8], data: &[u8], method: u16) {
        let streamed = method == METHOD_DEFLATED;
        let flags: u16 = if streamed { 1 << 3 } else { 0 };
        let mut crc = flate2::Crc::new();
        crc.update(content);
        let crc = crc.sum();
        let csize = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let size = u32::try_from(content.len()).unwrap_or(u32::MAX);
        let name_len = u16::try_from(name.len()).unwrap_or(u16::MAX);
        let offset = u32::try_from(self.bytes.len()).unwrap_or(u32::MAX);

        let header_sizes = if streamed { [0, 0, 0] } else { [crc, csize, size] };
        push32(&mut self.bytes, 0x0403_4b50);
        push16(&mut self.bytes, 20);
        push16(&mut self.bytes, flags);
        push16(&mut self.bytes, method);
        push16(&mut self.bytes, 0);
        push16(&mut self.bytes, 0x21);
        header_sizes
            .iter()
            .for_each(|value| push32(&mut self.bytes, *value));
        push16(&mut self.bytes, name_len);
        push16(&mut self.bytes, 0);
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(data);
        if streamed {
            push32(&mut self.bytes, 0x0807_4b50);
            push32(&mut self.bytes, crc);
            push32(&mut self.bytes, csize);
            push32(&mut self.bytes, size);
        }

        push32(&mut self.central, 0x0201_4b50);
        push16(&mut self.central, 20);
        push16(&mut self.central, 20);
        push16(&mut self.central, flags);
        push16(&mut self.central, method);
        push16(&mut self.central, 0);
        push16(&mut self.central, 0x21);
        push32(&mut self.central, crc);
        push32(&mut self.central, csize);
        push32(&mut self.central, size);
        push16(&mut self.central, name_len);
        push16(&mut self.central, 0);
        push16(&mut self.central, 0);
        push16(&mut self.central, 0);
        push16(&mut self.central, 0);
        push32(&mut self.central, if name.ends_with('/') { 0x10 } else { 0 });
        push32(&mut self.central, offset);
        self.central.extend_from_slice(name.as_bytes());
        self.entries += 1;
    }

    fn finish(mut self) -> Vec<u8> {
        let central_offset = u32::try_from(self.bytes.len()).unwrap_or(u32::MAX);
        let central_len = u32::try_from(self.central.len()).unwrap_or(u32::MAX);
        self.bytes.append(&mut self.central);
        push32(&mut self.bytes, 0x0605_4b50);
        push16(&mut self.bytes, 0);
        push16(&mut self.bytes, 0);
        push16(&mut self.bytes, self.entries);
        push16(&mut self.bytes, self.entries);
        push32(&mut self.bytes, central_len);
        push32(&mut self.bytes, central_offset);
        push16(&mut self.bytes, 0);
        self.bytes
    }
}

fn push16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
