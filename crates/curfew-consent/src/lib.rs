//! Consent gate for curfew
//!
//! Before the supervisor may start, the operator must have accepted the
//! current version of two documents (EULA and privacy policy). A version
//! is the MD5 hex digest of the document's bytes, recomputed every start:
//! - Acceptance markers (one small file per document) hold the accepted hash
//! - An override value (usually from the environment) counts the same as a marker
//! - Any document not accepted at its current hash blocks on interactive confirmation

mod gate;
mod hash;
mod marker;
mod prompt;
mod record;

pub use gate::*;
pub use hash::*;
pub use marker::*;
pub use prompt::*;
pub use record::*;

use curfew_api::DocumentKind;
use std::path::PathBuf;
use thiserror::Error;

/// Consent errors. Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("{kind} document {path} not found; it is required to run")]
    DocumentMissing { kind: DocumentKind, path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Confirmation input closed before the documents were accepted")]
    InputClosed,

    #[error("Confirmation prompt failed: {0}")]
    Prompt(String),
}

pub type ConsentResult<T> = Result<T, ConsentError>;
