//! A conventional single-step signer used to check assembled certificates.
//!
//! [`simulate`] signs the certificate a partial certificate describes the
//! ordinary way and splits the result into the addedTo structure and signature
//! a device would have returned. Assembling those must reproduce the signed
//! certificate byte for byte. [`SimulatedDevice`] wraps the same signer behind
//! the [`Certifier`] trait.

use der::Encode;
use log::debug;

use crate::added_to::AddedToCertificate;
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::device::{CertifyResponse, Certifier};
use crate::error::{PartialCertError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::partial::PartialCertificate;
use crate::tbs_certificate::TbsCertificate;

/// Result of a simulated certification.
///
/// # Fields
/// * `certificate` - The conventionally signed certificate.
/// * `added_to` - The addedTo structure a device would have returned for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedCertification {
    pub certificate: Certificate,
    pub added_to: AddedToCertificate,
}

/// Signs the certificate described by `partial` in one step.
///
/// # Arguments
/// * `partial` - The template. Extensions are copied verbatim.
/// * `subject_key` - The public key being certified.
/// * `signing_key` - The issuer's key.
/// * `algorithm` - Signature algorithm name, e.g. `SHA256withECDSA` or `sha256WithRSAEncryption`.
///
/// # Errors
/// * [`PartialCertError::UnsupportedSignatureAlgorithm`] for an unknown name.
/// * [`PartialCertError::InvalidInput`] if `signing_key` cannot sign with the algorithm.
/// * [`PartialCertError::AssemblyPrecondition`] if `partial` selects a different algorithm.
/// * [`PartialCertError::VerificationMismatch`] if the result does not verify under `signing_key`.
pub fn simulate(
    partial: &PartialCertificate,
    subject_key: &PublicKey,
    signing_key: &KeyPair,
    algorithm: &str,
) -> Result<SimulatedCertification> {
    simulate_with(partial, subject_key, signing_key, algorithm.parse()?)
}

/// [`simulate`] with an already resolved algorithm.
pub fn simulate_with(
    partial: &PartialCertificate,
    subject_key: &PublicKey,
    signing_key: &KeyPair,
    algorithm: SignatureAlgorithm,
) -> Result<SimulatedCertification> {
    if algorithm.key_type() != signing_key.key_type() {
        return Err(PartialCertError::InvalidInput(format!(
            "{algorithm} cannot be used with a {:?} signing key",
            signing_key.key_type()
        )));
    }
    if let Some(selected) = partial.signature_algorithm()? {
        if selected != algorithm {
            return Err(PartialCertError::AssemblyPrecondition(format!(
                "partial certificate selects {selected} but the signer uses {algorithm}"
            )));
        }
    }

    let tbs = TbsCertificate::from_partial(partial, subject_key.clone(), algorithm)?;
    let certificate = tbs.sign(signing_key)?;
    certificate.verify(&signing_key.public_key())?;

    let tbs_certificate = &certificate.inner.tbs_certificate;
    let added_to = AddedToCertificate::new(
        tbs_certificate.serial_number.clone(),
        partial
            .signature
            .is_none()
            .then(|| tbs_certificate.signature.clone()),
        tbs_certificate.subject_public_key_info.clone(),
    );
    debug!(
        "simulated certification with {algorithm}: {} byte certificate",
        certificate.as_der().len()
    );
    Ok(SimulatedCertification {
        certificate,
        added_to,
    })
}

/// Checks that two certificates are byte-identical.
///
/// # Errors
/// [`PartialCertError::VerificationMismatch`] describing the length difference
/// or the first differing offset.
pub fn compare_certificates(expected: &Certificate, actual: &Certificate) -> Result<()> {
    let (expected, actual) = (expected.as_der(), actual.as_der());
    let first_difference = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a);
    match first_difference {
        None if expected.len() == actual.len() => Ok(()),
        None => Err(PartialCertError::VerificationMismatch(format!(
            "certificate lengths differ: expected {} bytes, got {}",
            expected.len(),
            actual.len()
        ))),
        Some(offset) => Err(PartialCertError::VerificationMismatch(format!(
            "certificates differ at offset {offset}: expected {:#04x}, got {:#04x} ({} vs {} bytes)",
            expected[offset],
            actual[offset],
            expected.len(),
            actual.len()
        ))),
    }
}

/// A software device that certifies one subject key with one issuer key.
///
/// Uses the partial certificate's signature algorithm when it carries one and
/// the configured algorithm otherwise.
#[derive(Clone, Debug)]
pub struct SimulatedDevice {
    signing_key: KeyPair,
    subject_key: PublicKey,
    algorithm: SignatureAlgorithm,
}

impl SimulatedDevice {
    /// # Errors
    /// [`PartialCertError::InvalidInput`] if `signing_key` cannot sign with `algorithm`.
    pub fn new(
        signing_key: KeyPair,
        subject_key: PublicKey,
        algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        if algorithm.key_type() != signing_key.key_type() {
            return Err(PartialCertError::InvalidInput(format!(
                "{algorithm} cannot be used with a {:?} signing key",
                signing_key.key_type()
            )));
        }
        Ok(Self {
            signing_key,
            subject_key,
            algorithm,
        })
    }

    pub fn issuer_public_key(&self) -> PublicKey {
        self.signing_key.public_key()
    }
}

impl Certifier for SimulatedDevice {
    fn certify(&self, partial_certificate: &[u8]) -> Result<CertifyResponse> {
        let partial = PartialCertificate::decode(partial_certificate)?;
        let algorithm = partial.signature_algorithm()?.unwrap_or(self.algorithm);
        let simulated = simulate_with(&partial, &self.subject_key, &self.signing_key, algorithm)?;
        Ok(CertifyResponse {
            signature: simulated.certificate.signature_bytes().to_vec(),
            added_to_certificate: simulated.added_to.to_der()?,
        })
    }
}
