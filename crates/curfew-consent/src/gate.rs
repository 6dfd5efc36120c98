//! The consent gate

use curfew_api::DocumentKind;
use tracing::{info, warn};

use crate::{
    ConfirmationPrompt, ConsentDocument, ConsentError, ConsentRecord, ConsentResult, write_marker,
};

/// Accepted confirmation spellings, compared after trimming and lowercasing
pub const ACCEPT_TOKENS: [&str; 2] = ["confirmed", "同意"];

const TARGET: &str = "curfew::consent";

/// What the gate did before letting startup continue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// Every document was already accepted at its current version
    AlreadyAccepted,
    /// The operator confirmed; markers were written for `updated`
    Accepted { updated: Vec<DocumentKind> },
}

/// Blocks startup until every document is accepted at its current hash
pub struct ConsentGate<P> {
    documents: Vec<ConsentDocument>,
    prompt: P,
}

impl<P: ConfirmationPrompt> ConsentGate<P> {
    pub fn new(documents: Vec<ConsentDocument>, prompt: P) -> Self {
        Self { documents, prompt }
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Hash every document and load its stored acceptance
    pub fn evaluate(&self) -> ConsentResult<Vec<ConsentRecord>> {
        self.documents.iter().map(ConsentDocument::evaluate).collect()
    }

    /// Return immediately when nothing changed, otherwise wait for the
    /// operator to confirm and persist the new hashes of changed documents.
    pub async fn check_and_maybe_block(&self) -> ConsentResult<ConsentOutcome> {
        let records = self.evaluate()?;

        let changed: Vec<(&ConsentDocument, &ConsentRecord)> = self
            .documents
            .iter()
            .zip(&records)
            .filter(|(_, record)| record.changed())
            .collect();

        if changed.is_empty() {
            info!(target: TARGET, "All documents accepted at their current version");
            return Ok(ConsentOutcome::AlreadyAccepted);
        }

        self.log_instructions(&records, &changed);
        self.wait_for_confirmation().await?;

        let mut updated = Vec::with_capacity(changed.len());
        for (doc, record) in changed {
            write_marker(&doc.marker, &record.current_hash)?;
            info!(
                target: TARGET,
                document = %doc.kind,
                hash = %record.current_hash,
                "Acceptance recorded"
            );
            updated.push(doc.kind);
        }

        Ok(ConsentOutcome::Accepted { updated })
    }

    fn log_instructions(&self, records: &[ConsentRecord], changed: &[(&ConsentDocument, &ConsentRecord)]) {
        for (doc, record) in changed {
            let reason = if record.stored_hash.is_some() {
                "has changed since it was last accepted"
            } else {
                "has not been accepted yet"
            };
            warn!(
                target: TARGET,
                document = %doc.kind,
                path = %doc.source.display(),
                "The {} {}", doc.kind.label(), reason
            );
        }

        for (doc, record) in self.documents.iter().zip(records) {
            warn!(
                target: TARGET,
                document = %doc.kind,
                hash = %record.current_hash,
                override_env = doc.override_name.as_deref().unwrap_or("-"),
                "Current {} hash",
                doc.kind.label()
            );
        }

        warn!(
            target: TARGET,
            "Read the documents above, then type '{}' or '{}' to accept. \
             For unattended starts, set each override variable to the hash shown.",
            ACCEPT_TOKENS[0],
            ACCEPT_TOKENS[1]
        );
    }

    async fn wait_for_confirmation(&self) -> ConsentResult<()> {
        loop {
            match self.prompt.read_line().await? {
                None => return Err(ConsentError::InputClosed),
                Some(line) if is_accept_token(&line) => return Ok(()),
                Some(line) => {
                    warn!(
                        target: TARGET,
                        input = line.trim(),
                        "Not a confirmation; type '{}' or '{}'",
                        ACCEPT_TOKENS[0],
                        ACCEPT_TOKENS[1]
                    );
                }
            }
        }
    }
}

/// Whether `input` is one of the accept spellings
pub fn is_accept_token(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    ACCEPT_TOKENS.contains(&input.as_str())
}
