//! The device side of the certify flow.

use der::Encode;
use log::debug;

use crate::added_to::AddedToCertificate;
use crate::assembler::assemble;
use crate::cert::Certificate;
use crate::error::Result;
use crate::partial::PartialCertificate;

/// What a device returns for a certify request.
///
/// # Fields
/// * `signature` - Raw signature bytes over the TBS certificate the device built.
/// * `added_to_certificate` - The DER-encoded addedTo structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertifyResponse {
    pub signature: Vec<u8>,
    pub added_to_certificate: Vec<u8>,
}

/// A device that certifies a key against a caller-supplied partial certificate.
pub trait Certifier {
    /// Completes and signs the DER-encoded partial certificate.
    fn certify(&self, partial_certificate: &[u8]) -> Result<CertifyResponse>;
}

/// Runs the whole certify flow against `certifier`.
///
/// Encodes `partial`, sends it to the device, decodes the returned addedTo
/// structure and assembles the signed certificate.
pub fn certify_x509<C: Certifier + ?Sized>(
    certifier: &C,
    partial: &PartialCertificate,
) -> Result<Certificate> {
    let request = partial.to_der()?;
    debug!("certify request: {} byte partial certificate", request.len());
    let response = certifier.certify(&request)?;
    let added_to = AddedToCertificate::decode(&response.added_to_certificate)?;
    assemble(partial, &added_to, &response.signature)
}
