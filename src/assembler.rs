//! Combines a partial certificate, the device's addedTo structure and the
//! device's signature into the final certificate.

use der::Encode;
use der::asn1::BitString;
use log::{debug, warn};
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::added_to::AddedToCertificate;
use crate::cert::Certificate;
use crate::error::{PartialCertError, Result};
use crate::partial::PartialCertificate;

/// Assembles the signed certificate.
///
/// The TBS certificate is laid out as version, serial number, signature
/// algorithm, issuer, validity, subject, subject public key info, then the
/// optional unique identifiers and extensions. Absent optional fields are
/// omitted, and so is an empty extension list.
///
/// # Arguments
/// * `partial` - The template that was sent to the device.
/// * `added_to` - The device's completion of the template.
/// * `signature` - The raw signature bytes the device produced over the TBS certificate.
///
/// # Errors
/// [`PartialCertError::AssemblyPrecondition`] if neither input carries the
/// signature algorithm, or if both carry different ones.
pub fn assemble(
    partial: &PartialCertificate,
    added_to: &AddedToCertificate,
    signature: &[u8],
) -> Result<Certificate> {
    let algorithm = effective_signature_algorithm(partial, added_to)?;

    let tbs_certificate = TbsCertificateInner {
        version: added_to.version,
        serial_number: added_to.serial_number.clone(),
        signature: algorithm.clone(),
        issuer: partial.issuer.clone(),
        validity: partial.validity,
        subject: partial.subject.clone(),
        subject_public_key_info: added_to.subject_public_key_info.clone(),
        issuer_unique_id: partial.issuer_unique_id.clone(),
        subject_unique_id: partial.subject_unique_id.clone(),
        extensions: (!partial.extensions.is_empty()).then(|| partial.extensions.clone()),
    };
    let inner = CertificateInner {
        tbs_certificate,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(signature)?,
    };

    let certificate = Certificate::from_der(&inner.to_der()?)?;
    debug!(
        "assembled certificate: {} byte(s), {} byte signature",
        certificate.as_der().len(),
        signature.len()
    );
    Ok(certificate)
}

fn effective_signature_algorithm(
    partial: &PartialCertificate,
    added_to: &AddedToCertificate,
) -> Result<AlgorithmIdentifierOwned> {
    match (&partial.signature, &added_to.signature) {
        (Some(algorithm), None) | (None, Some(algorithm)) => Ok(algorithm.clone()),
        (None, None) => Err(PartialCertError::AssemblyPrecondition(
            "signature algorithm is absent from both the partial certificate and addedTo"
                .to_string(),
        )),
        (Some(in_partial), Some(in_added_to)) if in_partial == in_added_to => {
            warn!(
                "signature algorithm {} present in both the partial certificate and addedTo",
                in_partial.oid
            );
            Ok(in_partial.clone())
        }
        (Some(in_partial), Some(in_added_to)) => {
            Err(PartialCertError::AssemblyPrecondition(format!(
                "partial certificate selects {} but addedTo reports {}",
                in_partial.oid, in_added_to.oid
            )))
        }
    }
}
