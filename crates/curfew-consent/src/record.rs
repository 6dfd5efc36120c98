//! Per-document consent state

use curfew_api::DocumentKind;
use std::path::PathBuf;

use crate::{ConsentError, ConsentResult, document_hash, read_marker};

/// Where one document and its acceptance live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentDocument {
    pub kind: DocumentKind,
    /// Live document text
    pub source: PathBuf,
    /// Acceptance marker file
    pub marker: PathBuf,
    /// Name of the override variable (for operator instructions)
    pub override_name: Option<String>,
    /// Override value, trusted the same as the marker
    pub override_value: Option<String>,
}

impl ConsentDocument {
    pub fn new(kind: DocumentKind, source: impl Into<PathBuf>, marker: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: source.into(),
            marker: marker.into(),
            override_name: None,
            override_value: None,
        }
    }

    pub fn with_override(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.override_name = Some(name.into());
        self.override_value = value;
        self
    }

    /// Hash the live document and load the stored acceptance.
    ///
    /// Never cached: every call re-reads both files. The document must be
    /// UTF-8 text; anything else surfaces as an IO error.
    pub fn evaluate(&self) -> ConsentResult<ConsentRecord> {
        let content = match std::fs::read_to_string(&self.source) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConsentError::DocumentMissing {
                    kind: self.kind,
                    path: self.source.clone(),
                });
            }
            Err(source) => {
                return Err(ConsentError::Io {
                    path: self.source.clone(),
                    source,
                });
            }
        };

        Ok(ConsentRecord {
            kind: self.kind,
            current_hash: document_hash(&content),
            stored_hash: read_marker(&self.marker)?,
            override_hash: self.override_value.clone(),
        })
    }
}

/// Acceptance state of one document for this process start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRecord {
    pub kind: DocumentKind,
    pub current_hash: String,
    /// Hash from the marker file, if one exists
    pub stored_hash: Option<String>,
    /// Hash from the override, if one is set
    pub override_hash: Option<String>,
}

impl ConsentRecord {
    /// The current version was accepted through the marker or the override
    pub fn accepted(&self) -> bool {
        let matches = |h: &Option<String>| h.as_deref() == Some(self.current_hash.as_str());
        matches(&self.stored_hash) || matches(&self.override_hash)
    }

    /// Needs confirmation: never accepted, or accepted at an older version
    pub fn changed(&self) -> bool {
        !self.accepted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stored: Option<&str>, over: Option<&str>) -> ConsentRecord {
        ConsentRecord {
            kind: DocumentKind::Eula,
            current_hash: "aaa".into(),
            stored_hash: stored.map(String::from),
            override_hash: over.map(String::from),
        }
    }

    #[test]
    fn acceptance_sources() {
        assert!(record(Some("aaa"), None).accepted());
        assert!(record(None, Some("aaa")).accepted());
        assert!(record(Some("old"), Some("aaa")).accepted());
        assert!(record(Some("old"), None).changed());
        assert!(record(None, None).changed());
        assert!(record(None, Some("old")).changed());
    }

    #[test]
    fn evaluate_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("EULA.md");
        let marker = dir.path().join("eula.confirmed");
        std::fs::write(&source, "hello").unwrap();

        let doc = ConsentDocument::new(DocumentKind::Eula, &source, &marker);
        let rec = doc.evaluate().unwrap();
        assert_eq!(rec.current_hash, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(rec.stored_hash, None);
        assert!(rec.changed());

        std::fs::write(&marker, &rec.current_hash).unwrap();
        assert!(doc.evaluate().unwrap().accepted());
    }

    #[test]
    fn crlf_document_matches_lf_marker() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("EULA.md");
        let marker = dir.path().join("eula.confirmed");
        std::fs::write(&source, "# EULA\r\nv1\r\n").unwrap();
        std::fs::write(&marker, "303e74a52ae529f9e067ae7b3d8b92ce\n").unwrap();

        let rec = ConsentDocument::new(DocumentKind::Eula, &source, &marker)
            .evaluate()
            .unwrap();
        assert_eq!(rec.current_hash, "303e74a52ae529f9e067ae7b3d8b92ce");
        assert!(rec.accepted());
    }

    #[test]
    fn evaluate_rejects_non_utf8_document() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("EULA.md");
        std::fs::write(&source, [0xff, 0xfe, 0x00]).unwrap();

        let doc = ConsentDocument::new(DocumentKind::Eula, &source, dir.path().join("m"));
        assert!(matches!(doc.evaluate(), Err(ConsentError::Io { .. })));
    }

    #[test]
    fn evaluate_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ConsentDocument::new(
            DocumentKind::Privacy,
            dir.path().join("PRIVACY.md"),
            dir.path().join("privacy.confirmed"),
        );

        assert!(matches!(
            doc.evaluate(),
            Err(ConsentError::DocumentMissing { kind: DocumentKind::Privacy, .. })
        ));
    }
}
