//! Error types shared by every stage of the certify flow.

use thiserror::Error;

use crate::key::{DigestAlgorithm, KeyType};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, PartialCertError>;

/// Represents errors that can occur while building, decoding or assembling certificates.
///
/// Every variant carries enough context (structure, field, algorithm) to tell which
/// input was at fault. None of these are retried internally: every operation is a
/// deterministic transform, so the same input fails the same way.
#[derive(Debug, Error, Clone)]
pub enum PartialCertError {
    /// The (key type, digest) pair has no signature algorithm identifier.
    #[error("Unsupported algorithm combination: {key_type:?} with {digest:?}")]
    UnsupportedAlgorithmCombination {
        key_type: KeyType,
        digest: DigestAlgorithm,
    },

    /// A signature algorithm OID or name outside the supported table.
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedSignatureAlgorithm(String),

    /// Externally supplied bytes did not match the expected ASN.1 layout.
    #[error("Malformed {structure}: {details}")]
    MalformedStructure {
        structure: &'static str,
        details: String,
    },

    /// The partial certificate and the addedTo structure cannot be combined.
    #[error("Assembly precondition violated: {0}")]
    AssemblyPrecondition(String),

    /// A simulated and an assembled certificate differ, or a signature did not verify.
    #[error("Verification mismatch: {0}")]
    VerificationMismatch(String),

    /// Error during DER encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error due to invalid caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation or key conversion.
    #[error("Key error: {0}")]
    KeyError(String),

    /// Error from a signing or verification primitive.
    #[error("Signature error: {0}")]
    SignatureError(String),
}

impl PartialCertError {
    /// Shorthand for a [`PartialCertError::MalformedStructure`] error.
    pub fn malformed(structure: &'static str, details: impl ToString) -> Self {
        PartialCertError::MalformedStructure {
            structure,
            details: details.to_string(),
        }
    }
}

impl From<der::Error> for PartialCertError {
    /// Converts a `der::Error` raised while encoding into a `PartialCertError`.
    ///
    /// Decoders map their errors to [`PartialCertError::MalformedStructure`] explicitly.
    fn from(err: der::Error) -> Self {
        PartialCertError::EncodingError(err.to_string())
    }
}

impl From<rsa::Error> for PartialCertError {
    fn from(err: rsa::Error) -> Self {
        PartialCertError::SignatureError(err.to_string())
    }
}

impl From<ecdsa::Error> for PartialCertError {
    fn from(err: ecdsa::Error) -> Self {
        PartialCertError::SignatureError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for PartialCertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        PartialCertError::KeyError(err.to_string())
    }
}
