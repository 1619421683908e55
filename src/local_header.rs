//! Forward-only reading of zip local file headers.
//!
//! Jar writers that stream their output set general-purpose flag bit 3 and
//! record entry sizes only in a data descriptor after the data. A deflated
//! entry still ends itself, so its extent is found by inflating it rather
//! than trusting the header.

use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
const LOCAL_HEADER_LEN: usize = 30;

const FLAG_ENCRYPTED: u16 = 1;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Output growth step while inflating.
const INFLATE_CHUNK: usize = 8 * 1024;
/// Inflated entries larger than this are refused.
const MAX_INFLATED_LEN: usize = 8 * 1024 * 1024;

/// Errors raised while reading an entry from its local header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocalHeaderError {
    /// The bytes end inside the header or the entry data.
    #[error("entry is truncated")]
    Truncated,

    /// The entry is encrypted.
    #[error("entry `{name}` is encrypted")]
    Encrypted {
        /// Entry name.
        name: String,
    },

    /// The entry uses a compression method other than stored or deflated.
    #[error("entry `{name}` uses unsupported compression method {method}")]
    UnsupportedMethod {
        /// Entry name.
        name: String,
        /// Raw method identifier.
        method: u16,
    },

    /// A stored entry was streamed, so its length cannot be known.
    #[error("stored entry `{name}` has no length in its local header")]
    UnknownLength {
        /// Entry name.
        name: String,
    },

    /// The deflate stream is corrupt or inflates past the size cap.
    #[error("entry `{name}` cannot be inflated: {reason}")]
    Inflate {
        /// Entry name.
        name: String,
        /// Decoder message.
        reason: String,
    },
}

/// One entry located by its local header.
#[derive(Debug)]
pub struct LocalEntry<'a> {
    name: String,
    flags: u16,
    method: u16,
    compressed_size: usize,
    bytes: &'a [u8],
    data_start: usize,
}

/// The decoded data of an entry and where the next header starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryContents {
    /// Uncompressed entry data.
    pub data: Vec<u8>,
    /// Offset of the following local header (or central directory).
    pub next_offset: usize,
}

/// Reads the local header at `offset`.
///
/// Returns `Ok(None)` when no local header starts there, which is how the
/// entry list of a well-formed archive ends.
///
/// # Errors
///
/// Returns [`LocalHeaderError::Truncated`] when the header is cut short.
pub fn read_local_header(
    bytes: &[u8],
    offset: usize,
) -> Result<Option<LocalEntry<'_>>, LocalHeaderError> {
    if u32_at(bytes, offset) != Some(LOCAL_HEADER_SIGNATURE) {
        return Ok(None);
    }
    let field16 = |at: usize| u16_at(bytes, offset + at).ok_or(LocalHeaderError::Truncated);
    let flags = field16(6)?;
    let method = field16(8)?;
    let compressed_size = u32_at(bytes, offset + 18).ok_or(LocalHeaderError::Truncated)?;
    let name_len = usize::from(field16(26)?);
    let extra_len = usize::from(field16(28)?);

    let name_start = offset + LOCAL_HEADER_LEN;
    let name = bytes
        .get(name_start..name_start + name_len)
        .ok_or(LocalHeaderError::Truncated)?;
    Ok(Some(LocalEntry {
        name: String::from_utf8_lossy(name).into_owned(),
        flags,
        method,
        compressed_size: usize::try_from(compressed_size).unwrap_or(usize::MAX),
        bytes,
        data_start: name_start + name_len + extra_len,
    }))
}

impl LocalEntry<'_> {
    /// Returns the entry name as recorded in the header.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when sizes live in a trailing data descriptor.
    #[must_use]
    pub fn is_streamed(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Decodes the entry data.
    ///
    /// # Errors
    ///
    /// Returns [`LocalHeaderError`] when the entry is encrypted, uses an
    /// unsupported method, is a streamed stored entry, or is truncated.
    pub fn contents(&self) -> Result<EntryContents, LocalHeaderError> {
        if self.flags & FLAG_ENCRYPTED != 0 {
            return Err(LocalHeaderError::Encrypted {
                name: self.name.clone(),
            });
        }
        let (data, data_end) = match (self.method, self.is_streamed()) {
            (METHOD_STORED, true) => {
                return Err(LocalHeaderError::UnknownLength {
                    name: self.name.clone(),
                });
            }
            (METHOD_STORED, false) => {
                let end = self.sized_end()?;
                (self.bytes[self.data_start..end].to_vec(), end)
            }
            (METHOD_DEFLATED, true) => {
                let input = self
                    .bytes
                    .get(self.data_start..)
                    .ok_or(LocalHeaderError::Truncated)?;
                let (data, consumed) = self.inflate(input)?;
                (data, self.data_start + consumed)
            }
            (METHOD_DEFLATED, false) => {
                let end = self.sized_end()?;
                let (data, _) = self.inflate(&self.bytes[self.data_start..end])?;
                (data, end)
            }
            (method, _) => {
                return Err(LocalHeaderError::UnsupportedMethod {
                    name: self.name.clone(),
                    method,
                });
            }
        };
        let next_offset = if self.is_streamed() {
            skip_data_descriptor(self.bytes, data_end)
        } else {
            data_end
        };
        Ok(EntryContents { data, next_offset })
    }

    fn sized_end(&self) -> Result<usize, LocalHeaderError> {
        let end = self
            .data_start
            .checked_add(self.compressed_size)
            .ok_or(LocalHeaderError::Truncated)?;
        if end > self.bytes.len() {
            return Err(LocalHeaderError::Truncated);
        }
        Ok(end)
    }

    /// Inflates a raw deflate stream, returning the data and the number of
    /// input bytes the stream occupied.
    fn inflate(&self, input: &[u8]) -> Result<(Vec<u8>, usize), LocalHeaderError> {
        let mut inflater = Decompress::new(false);
        let mut out = Vec::with_capacity(INFLATE_CHUNK);
        loop {
            let consumed = to_usize(inflater.total_in());
            let produced = out.len();
            let status = inflater
                .decompress_vec(
                    input.get(consumed..).unwrap_or_default(),
                    &mut out,
                    FlushDecompress::None,
                )
                .map_err(|err| self.inflate_error(err.to_string()))?;
            if status == Status::StreamEnd {
                return Ok((out, to_usize(inflater.total_in())));
            }
            if out.len() > MAX_INFLATED_LEN {
                return Err(self.inflate_error(format!(
                    "more than {MAX_INFLATED_LEN} bytes"
                )));
            }
            if out.len() == out.capacity() {
                out.reserve(INFLATE_CHUNK);
                continue;
            }
            if to_usize(inflater.total_in()) == consumed && out.len() == produced {
                return Err(LocalHeaderError::Truncated);
            }
        }
    }

    fn inflate_error(&self, reason: String) -> LocalHeaderError {
        LocalHeaderError::Inflate {
            name: self.name.clone(),
            reason,
        }
    }
}

/// Returns the offset just past the data descriptor starting at `offset`.
///
/// The descriptor signature is optional and the sizes are 4 or 8 bytes
/// wide, so the variant that lands on the next header wins.
fn skip_data_descriptor(bytes: &[u8], offset: usize) -> usize {
    let start = if u32_at(bytes, offset) == Some(DATA_DESCRIPTOR_SIGNATURE) {
        offset + 4
    } else {
        offset
    };
    [12, 20]
        .into_iter()
        .map(|len| start + len)
        .find(|next| {
            matches!(
                u32_at(bytes, *next),
                Some(LOCAL_HEADER_SIGNATURE | CENTRAL_HEADER_SIGNATURE)
            )
        })
        .unwrap_or(start + 12)
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

#[cfg(test)]
#[path = "local_header_tests.rs"]
mod tests;
