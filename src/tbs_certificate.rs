use der::Encode;
use der::asn1::BitString;
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::time::Validity;

use crate::cert::params::ExtensionParam;
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{PartialCertError, Result};
use crate::key::{PublicKey, SignatureEngine};
use crate::partial::PartialCertificate;

/// Length of the serial numbers generated for conventionally signed certificates.
pub const SERIAL_NUMBER_LEN: usize = 16;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate, as a
/// conventional single-step signer builds it.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `signature` - The encoded identifier of `signature_algorithm`, as placed in the TBS.
/// * `issuer` - The issuer name.
/// * `validity` - The validity window.
/// * `subject` - The subject name.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `issuer_unique_id` - Optional issuer unique identifier.
/// * `subject_unique_id` - Optional subject unique identifier.
/// * `extensions` - X.509 extensions, encoded in this order.
#[derive(Clone, Debug)]
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub signature: AlgorithmIdentifierOwned,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub issuer_unique_id: Option<BitString>,
    pub subject_unique_id: Option<BitString>,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Creates a `TbsCertificate` carrying everything a partial certificate
    /// decides, with a fresh random serial number.
    ///
    /// Extensions are copied verbatim, criticality included. So is the
    /// partial certificate's signature identifier when it carries one.
    ///
    /// # Arguments
    /// * `partial` - The template to copy issuer, validity, subject, unique identifiers and extensions from.
    /// * `subject_public_key` - The public key being certified.
    /// * `signature_algorithm` - The algorithm the certificate will be signed with.
    pub fn from_partial(
        partial: &PartialCertificate,
        subject_public_key: PublicKey,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let signature = match &partial.signature {
            Some(signature) => signature.clone(),
            None => signature_algorithm.algorithm_identifier()?,
        };
        Ok(Self {
            serial_number: random_serial_number().to_vec(),
            signature_algorithm,
            signature,
            issuer: partial.issuer.clone(),
            validity: partial.validity,
            subject: partial.subject.clone(),
            subject_public_key,
            issuer_unique_id: partial.issuer_unique_id.clone(),
            subject_unique_id: partial.subject_unique_id.clone(),
            extensions: partial.extensions.iter().map(ExtensionParam::from).collect(),
        })
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let serial_number = SerialNumber::new(&self.serial_number)
            .map_err(|e| PartialCertError::InvalidInput(format!("serial number: {e}")))?;
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature.clone(),
            issuer: self.issuer.clone(),
            validity: self.validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: self.issuer_unique_id.clone(),
            subject_unique_id: self.subject_unique_id.clone(),
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }

    /// Signs the TBS certificate in one step and returns the complete certificate.
    pub fn sign(&self, signer: &impl SignatureEngine) -> Result<Certificate> {
        let tbs_certificate = self.to_tbs_certificate_inner()?;
        let signature = signer.sign(self.signature_algorithm, &tbs_certificate.to_der()?)?;
        Certificate::from_inner(CertificateInner {
            signature_algorithm: tbs_certificate.signature.clone(),
            tbs_certificate,
            signature: BitString::from_bytes(&signature)?,
        })
    }
}

/// A random positive serial number with a non-zero leading byte, so its DER
/// INTEGER encoding is exactly [`SERIAL_NUMBER_LEN`] bytes.
pub fn random_serial_number() -> [u8; SERIAL_NUMBER_LEN] {
    let mut serial: [u8; SERIAL_NUMBER_LEN] = rand::random();
    serial[0] = (serial[0] & 0x7f) | 0x01;
    serial
}
