//! Unit tests for local header reading.

use super::*;
use crate::manifest::{MANIFEST_DIR, MANIFEST_PATH};
use crate::test_support::{archive_bytes, streamed_archive_bytes};
use rstest::rstest;

const MANIFEST: &str = "Bundle-SymbolicName: org.example.foo\r\n\r\n";

#[rstest]
fn streamed_entries_are_walked_in_order() {
    let bytes = streamed_archive_bytes(MANIFEST, &[("readme.txt", b"hello")]);

    let dir = read_local_header(&bytes, 0)
        .expect("header")
        .expect("first entry");
    assert_eq!(dir.name(), MANIFEST_DIR);
    assert!(dir.is_streamed());
    let dir_contents = dir.contents().expect("directory contents");
    assert!(dir_contents.data.is_empty());

    let manifest = read_local_header(&bytes, dir_contents.next_offset)
        .expect("header")
        .expect("second entry");
    assert_eq!(manifest.name(), MANIFEST_PATH);
    let manifest_contents = manifest.contents().expect("manifest contents");
    assert_eq!(manifest_contents.data, MANIFEST.as_bytes());

    let readme = read_local_header(&bytes, manifest_contents.next_offset)
        .expect("header")
        .expect("third entry");
    assert_eq!(readme.name(), "readme.txt");
    assert!(!readme.is_streamed());
    let readme_contents = readme.contents().expect("stored contents");
    assert_eq!(readme_contents.data, b"hello");

    let end = read_local_header(&bytes, readme_contents.next_offset).expect("no error");
    assert!(end.is_none(), "central directory ends the entry list");
}

#[rstest]
fn sized_deflated_entry_is_inflated() {
    let body = "Bundle-SymbolicName: org.example.foo\r\n".repeat(50);
    let bytes = archive_bytes(&body, &[]);
    let entry = read_local_header(&bytes, 0)
        .expect("header")
        .expect("manifest entry");
    assert_eq!(entry.name(), MANIFEST_PATH);
    assert_eq!(entry.contents().expect("inflate").data, body.as_bytes());
}

#[rstest]
#[case::empty(Vec::new())]
#[case::text(b"not an archive at all".to_vec())]
fn bytes_without_a_signature_have_no_entry(#[case] bytes: Vec<u8>) {
    assert!(read_local_header(&bytes, 0).expect("no error").is_none());
}

#[rstest]
fn header_cut_short_is_truncated() {
    let bytes = streamed_archive_bytes(MANIFEST, &[]);
    let err = read_local_header(&bytes[..20], 0).expect_err("short header");
    assert_eq!(err, LocalHeaderError::Truncated);
}

#[rstest]
fn deflate_stream_cut_short_is_truncated() {
    let bytes = streamed_archive_bytes(MANIFEST, &[]);
    let dir = read_local_header(&bytes, 0)
        .expect("header")
        .expect("entry");
    let offset = dir.contents().expect("directory").next_offset;
    let cut = &bytes[..offset + 30 + MANIFEST_PATH.len() + 4];
    let manifest = read_local_header(cut, offset)
        .expect("header")
        .expect("manifest entry");
    assert!(manifest.contents().is_err());
}

#[rstest]
fn streamed_stored_entry_has_unknown_length() {
    let mut bytes = streamed_archive_bytes(MANIFEST, &[]);
    // Clear the method field of the leading entry, leaving bit 3 set.
    bytes[8] = 0;
    let entry = read_local_header(&bytes, 0)
        .expect("header")
        .expect("entry");
    assert!(matches!(
        entry.contents(),
        Err(LocalHeaderError::UnknownLength { .. })
    ));
}

#[rstest]
fn unsupported_method_is_reported() {
    let mut bytes = streamed_archive_bytes(MANIFEST, &[]);
    bytes[8] = 12;
    let entry = read_local_header(&bytes, 0)
        .expect("header")
        .expect("entry");
    assert!(matches!(
        entry.contents(),
        Err(LocalHeaderError::UnsupportedMethod { method: 12, .. })
    ));
}

#[rstest]
fn encrypted_entry_is_refused() {
    let mut bytes = streamed_archive_bytes(MANIFEST, &[]);
    bytes[6] |= 1;
    let entry = read_local_header(&bytes, 0)
        .expect("header")
        .expect("entry");
    assert!(matches!(
        entry.contents(),
        Err(LocalHeaderError::Encrypted { .. })
    ));
}
