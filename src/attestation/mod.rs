//! Attestation verification pipeline
//!
//! Turns an opaque proof blob plus untrusted metadata into a trusted
//! transcript: resolve the notary key independently of the client data,
//! run the black-box verification, and (separately) extract the proven
//! identity from the transcript.

mod extract;
mod verifier;

pub use extract::{IdentityExtractor, ScreenNameExtractor};
pub use verifier::{ProofVerifier, TlsnVerifier};

#[cfg(test)]
pub use verifier::MockProofVerifier;

use std::sync::Arc;

use crate::domain::{Attestation, Identity, Transcript};
use crate::infra::{Result, ServiceError};
use crate::notary::NotaryKeyResolver;

/// Verifies client-supplied attestations against an independently
/// resolved notary key.
pub struct AttestationVerifier {
    resolver: NotaryKeyResolver,
    proof_verifier: Arc<dyn ProofVerifier>,
    extractor: Arc<dyn IdentityExtractor>,
}

impl AttestationVerifier {
    pub fn new(
        resolver: NotaryKeyResolver,
        proof_verifier: Arc<dyn ProofVerifier>,
        extractor: Arc<dyn IdentityExtractor>,
    ) -> Self {
        Self {
            resolver,
            proof_verifier,
            extractor,
        }
    }

    /// Production wiring: TLSN presentations, screen-name extraction.
    pub fn with_tlsn(resolver: NotaryKeyResolver) -> Self {
        Self::new(
            resolver,
            Arc::new(TlsnVerifier),
            Arc::new(ScreenNameExtractor::new()),
        )
    }

    /// Verify an attestation and return its transcript.
    ///
    /// Key resolution failures propagate as `KeyResolution` — verification
    /// never proceeds without a trusted key. Everything the black-box
    /// verifier rejects surfaces as `Verification`.
    pub async fn verify(&self, attestation: &Attestation) -> Result<Transcript> {
        if attestation.data.trim().is_empty() {
            return Err(ServiceError::Validation(
                "attestation data must not be empty".to_string(),
            ));
        }
        if attestation.meta.notary_url.trim().is_empty() {
            return Err(ServiceError::Validation(
                "attestation notaryUrl must not be empty".to_string(),
            ));
        }

        let notary_key = self.resolver.resolve(&attestation.meta.notary_url).await?;

        let transcript = self
            .proof_verifier
            .verify(&attestation.data, &notary_key)?;

        tracing::info!(
            version = %attestation.version,
            sent_len = transcript.sent.len(),
            recv_len = transcript.recv.len(),
            "attestation verified"
        );

        Ok(transcript)
    }

    /// Extract the proven identity from a verified transcript.
    pub fn extract_identity(&self, transcript: &Transcript) -> Option<Identity> {
        self.extractor.extract(transcript)
    }
}
