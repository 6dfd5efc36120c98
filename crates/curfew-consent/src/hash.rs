//! Document version hashing

use md5::{Digest, Md5};
use std::borrow::Cow;

/// Hex-encoded MD5 digest of a document's text.
///
/// Line endings are normalised to `\n` first (`\r\n` and lone `\r`), so a
/// document saved with CRLF endings hashes the same as its LF copy. MD5
/// here is a version stamp: it must match hashes already stored in markers
/// and override values.
pub fn document_hash(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(normalize_newlines(text).as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}
