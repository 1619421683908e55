//! Module manifest model.
//!
//! A module carries its identity in a JAR-style `META-INF/MANIFEST.MF`: a
//! main section of `Name: value` headers followed by optional per-entry
//! sections, each terminated by a blank line. Long values wrap onto
//! continuation lines that begin with a single space.

use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Archive path of the manifest entry.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Archive path of the directory holding the manifest.
pub const MANIFEST_DIR: &str = "META-INF/";

/// Header carrying the module's unique symbolic name.
pub const SYMBOLIC_NAME_HEADER: &str = "Bundle-SymbolicName";

/// Header carrying the module version.
pub const VERSION_HEADER: &str = "Bundle-Version";

/// Header carrying the manifest format version; always written first.
pub const MANIFEST_VERSION_HEADER: &str = "Manifest-Version";

/// Maximum number of bytes on one physical manifest line, excluding the
/// line terminator.
const MAX_LINE_BYTES: usize = 72;

/// Maximum length of a header name.
const MAX_NAME_BYTES: usize = 70;

/// Errors raised while parsing manifest text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// The manifest is not valid UTF-8.
    #[error("manifest is not valid UTF-8")]
    NotUtf8,

    /// A continuation line appeared before any header.
    #[error("line {line}: continuation line without a preceding header")]
    OrphanContinuation {
        /// One-based line number.
        line: usize,
    },

    /// A line is neither a header, a continuation, nor blank.
    #[error("line {line}: expected `Name: value`")]
    MalformedHeader {
        /// One-based line number.
        line: usize,
    },

    /// A header name is empty, too long, or contains invalid characters.
    #[error("line {line}: invalid header name `{name}`")]
    InvalidHeaderName {
        /// One-based line number.
        line: usize,
        /// The rejected name.
        name: String,
    },
}

/// An ordered list of manifest headers.
///
/// Lookups are ASCII case-insensitive; when a name repeats, the last
/// occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Returns the value of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Appends or replaces a header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Iterates over headers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns `true` when no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, header: (String, String)) {
        self.0.push(header);
    }
}

/// The identity a module is keyed by inside the host.
///
/// Only the symbolic name participates in lookups; the version is carried
/// for location strings and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    symbolic_name: String,
    version: Option<String>,
}

impl ModuleIdentity {
    /// Builds an identity from raw header values.
    ///
    /// Directives following `;` in the symbolic name are dropped. Returns
    /// `None` when the remaining name is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use hotdeploy::manifest::ModuleIdentity;
    ///
    /// let id = ModuleIdentity::from_headers("org.example.foo;singleton:=true", Some("1.0.0"))
    ///     .expect("name present");
    /// assert_eq!(id.symbolic_name(), "org.example.foo");
    /// assert_eq!(id.version(), Some("1.0.0"));
    /// assert!(ModuleIdentity::from_headers(" ; singleton:=true", None).is_none());
    /// ```
    #[must_use]
    pub fn from_headers(symbolic_name: &str, version: Option<&str>) -> Option<Self> {
        let name = symbolic_name.split(';').next().unwrap_or_default().trim();
        if name.is_empty() {
            return None;
        }
        let version = version
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        Some(Self {
            symbolic_name: name.to_owned(),
            version,
        })
    }

    /// Returns the symbolic name.
    #[must_use]
    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    /// Returns the version, if the manifest declared one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {version}", self.symbolic_name),
            None => f.write_str(&self.symbolic_name),
        }
    }
}

/// A parsed module manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleManifest {
    main: Attributes,
    sections: Vec<Attributes>,
}

impl ModuleManifest {
    /// Creates a manifest from its main section.
    #[must_use]
    pub fn new(main: Attributes) -> Self {
        Self {
            main,
            sections: Vec::new(),
        }
    }

    /// Parses manifest bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the text is not UTF-8 or a line is
    /// malformed.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;
        let mut parser = SectionParser::default();
        for (index, line) in text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            parser.feed(index + 1, line)?;
        }
        Ok(parser.finish())
    }

    /// Returns the main section.
    #[must_use]
    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    /// Returns the per-entry sections.
    #[must_use]
    pub fn sections(&self) -> &[Attributes] {
        &self.sections
    }

    /// Extracts the module identity, or `None` when the symbolic name is
    /// absent or blank.
    #[must_use]
    pub fn identity(&self) -> Option<ModuleIdentity> {
        let name = self.main.get(SYMBOLIC_NAME_HEADER)?;
        ModuleIdentity::from_headers(name, self.main.get(VERSION_HEADER))
    }

    /// Serialises the manifest with CRLF line endings and 72-byte lines.
    ///
    /// `Manifest-Version` is written first when present.
    ///
    /// # Errors
    ///
    /// Propagates failures from `out`.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.render().as_bytes())
    }

    /// Serialises the manifest into a byte vector.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.render().into_bytes()
    }

    fn render(&self) -> String {
        let mut text = String::new();
        if let Some(version) = self.main.get(MANIFEST_VERSION_HEADER) {
            push_header(&mut text, MANIFEST_VERSION_HEADER, version);
        }
        for (name, value) in self.main.iter() {
            if !name.eq_ignore_ascii_case(MANIFEST_VERSION_HEADER) {
                push_header(&mut text, name, value);
            }
        }
        text.push_str("\r\n");
        for section in &self.sections {
            for (name, value) in section.iter() {
                push_header(&mut text, name, value);
            }
            text.push_str("\r\n");
        }
        text
    }
}

#[derive(Default)]
struct SectionParser {
    main: Option<Attributes>,
    sections: Vec<Attributes>,
    current: Attributes,
    pending: Option<(String, String)>,
}

impl SectionParser {
    fn feed(&mut self, line_no: usize, line: &str) -> Result<(), ManifestError> {
        if let Some(rest) = line.strip_prefix(' ') {
            let Some((_, value)) = self.pending.as_mut() else {
                return Err(ManifestError::OrphanContinuation { line: line_no });
            };
            value.push_str(rest);
            return Ok(());
        }
        self.flush_header();
        if line.is_empty() {
            self.close_section();
            return Ok(());
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(ManifestError::MalformedHeader { line: line_no })?;
        let value = value
            .strip_prefix(' ')
            .ok_or(ManifestError::MalformedHeader { line: line_no })?;
        if !is_valid_name(name) {
            return Err(ManifestError::InvalidHeaderName {
                line: line_no,
                name: name.to_owned(),
            });
        }
        self.pending = Some((name.to_owned(), value.to_owned()));
        Ok(())
    }

    fn flush_header(&mut self) {
        if let Some(header) = self.pending.take() {
            self.current.push(header);
        }
    }

    fn close_section(&mut self) {
        let section = std::mem::take(&mut self.current);
        if self.main.is_none() {
            self.main = Some(section);
        } else if !section.is_empty() {
            self.sections.push(section);
        }
    }

    fn finish(mut self) -> ModuleManifest {
        self.flush_header();
        if self.main.is_none() || !self.current.is_empty() {
            self.close_section();
        }
        ModuleManifest {
            main: self.main.unwrap_or_default(),
            sections: self.sections,
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_BYTES
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn push_header(text: &mut String, name: &str, value: &str) {
    let line = format!("{name}: {value}");
    let mut rest = line.as_str();
    let mut limit = MAX_LINE_BYTES;
    loop {
        let (head, tail) = rest.split_at(char_floor(rest, limit));
        text.push_str(head);
        text.push_str("\r\n");
        if tail.is_empty() {
            return;
        }
        text.push(' ');
        rest = tail;
        limit = MAX_LINE_BYTES - 1;
    }
}

/// Largest char boundary in `text` that is at most `max` bytes in.
fn char_floor(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
