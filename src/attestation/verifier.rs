//! Black-box presentation verification
//!
//! The proof blob format belongs to the proving stack; this module only
//! guarantees that whatever happens inside `verify` surfaces as a typed
//! `Verification` failure and never unwinds into the request path.

#[cfg(test)]
use mockall::automock;

use k256::pkcs8::DecodePublicKey;
use tlsn_core::{
    presentation::{Presentation, PresentationOutput},
    signing::VerifyingKey,
    CryptoProvider,
};

use crate::domain::Transcript;
use crate::infra::{Result, ServiceError};

/// Verifies an opaque proof blob against a notary public key.
#[cfg_attr(test, automock)]
pub trait ProofVerifier: Send + Sync {
    /// `data` is the hex-encoded proof blob; `notary_key_pem` the PEM
    /// public key resolved out-of-band.
    fn verify(&self, data: &str, notary_key_pem: &str) -> Result<Transcript>;
}

/// Production verifier over TLSNotary presentations.
pub struct TlsnVerifier;

impl ProofVerifier for TlsnVerifier {
    fn verify(&self, data: &str, notary_key_pem: &str) -> Result<Transcript> {
        let bytes: Vec<u8> = hex::decode(data)
            .map_err(|e| ServiceError::Verification(format!("invalid presentation hex: {}", e)))?;

        let presentation: Presentation = bincode::deserialize(&bytes)
            .map_err(|e| ServiceError::Verification(format!("invalid presentation: {}", e)))?;

        let VerifyingKey {
            alg: _,
            data: key_data,
        } = presentation.verifying_key();

        let notary_key = k256::PublicKey::from_public_key_pem(notary_key_pem)
            .map_err(|e| ServiceError::Verification(format!("invalid notary key: {}", e)))?;
        let verifying_key = k256::PublicKey::from_sec1_bytes(key_data)
            .map_err(|e| ServiceError::Verification(format!("invalid verifying key: {}", e)))?;

        // The presentation carries its own signing key; trusting it
        // unchecked would let any self-notarized blob through.
        if notary_key != verifying_key {
            return Err(ServiceError::Verification(
                "the verifying key does not match the notary key".to_string(),
            ));
        }

        let provider = CryptoProvider::default();
        let PresentationOutput { transcript, .. } = presentation
            .verify(&provider)
            .map_err(|e| ServiceError::Verification(format!("presentation verification failed: {}", e)))?;

        let (sent, recv) = transcript
            .map(|mut partial_transcript| {
                partial_transcript.set_unauthed(b'X');
                let sent = String::from_utf8_lossy(partial_transcript.sent_unsafe()).to_string();
                let recv = String::from_utf8_lossy(partial_transcript.received_unsafe()).to_string();
                (sent, recv)
            })
            .unwrap_or_default();

        Ok(Transcript { sent, recv })
    }
}
