//! The partial certificate: the template a caller sends to the device.
//!
//! ```text
//! PartialCertificate ::= SEQUENCE {
//!     signature        AlgorithmIdentifier OPTIONAL,
//!     issuer           Name,
//!     validity         Validity,
//!     subject          Name,
//!     issuerUniqueID   [1] IMPLICIT UniqueIdentifier OPTIONAL,
//!     subjectUniqueID  [2] IMPLICIT UniqueIdentifier OPTIONAL,
//!     extensions       [3] EXPLICIT Extensions }
//! ```

use der::asn1::{BitString, ContextSpecific, ContextSpecificRef};
use der::{
    Any, Decode, DecodeValue, Encode, EncodeValue, Header, Length, Reader, Sequence, TagMode,
    TagNumber, Writer,
};
use log::debug;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::time::Validity;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{KeyUsage, ToAndFromX509Extension};
use crate::cert::params::{ExtensionParam, PartialCertificateParams};
use crate::error::{PartialCertError, Result};

/// A certificate template with everything the caller decides.
///
/// The device fills in version, serial number and subject public key, and
/// the signature algorithm when `signature` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialCertificate {
    pub signature: Option<AlgorithmIdentifierOwned>,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub issuer_unique_id: Option<BitString>,
    pub subject_unique_id: Option<BitString>,
    /// Key usage first, then caller extensions in order.
    pub extensions: Vec<Extension>,
}

impl PartialCertificate {
    /// Builds the partial certificate described by `params`.
    ///
    /// Key usage is always the first extension and always critical.
    ///
    /// # Errors
    /// * [`PartialCertError::UnsupportedAlgorithmCombination`] for a signature
    ///   scheme with no algorithm identifier.
    /// * [`PartialCertError::InvalidInput`] for an unencodable name or validity,
    ///   a caller-supplied keyUsage extension, or a repeated extension OID.
    pub fn build(params: &PartialCertificateParams) -> Result<Self> {
        let signature = match &params.signature_scheme {
            Some(scheme) => Some(scheme.resolve()?.algorithm_identifier()?),
            None => None,
        };

        let key_usage = ExtensionParam::from_extension(params.effective_key_usage(), true)?;
        let mut extensions = vec![key_usage.to_x509()?];
        for param in &params.extensions {
            if param.oid == KeyUsage::OID {
                return Err(PartialCertError::InvalidInput(
                    "key usage is derived from the key capabilities and cannot be supplied"
                        .to_string(),
                ));
            }
            if extensions.iter().any(|ext| ext.extn_id == param.oid) {
                return Err(PartialCertError::InvalidInput(format!(
                    "duplicate extension {}",
                    param.oid
                )));
            }
            extensions.push(param.to_x509()?);
        }

        let partial = Self {
            signature,
            issuer: params.issuer_name()?,
            validity: params.validity_window().to_x509()?,
            subject: params.subject_name()?,
            issuer_unique_id: unique_id(params.issuer_unique_id.as_deref())?,
            subject_unique_id: unique_id(params.subject_unique_id.as_deref())?,
            extensions,
        };
        debug!(
            "built partial certificate: {} extension(s), signature algorithm {}",
            partial.extensions.len(),
            if partial.signature.is_some() {
                "in template"
            } else {
                "left to device"
            }
        );
        Ok(partial)
    }

    /// Parses a DER-encoded partial certificate.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_der(bytes).map_err(|e| PartialCertError::malformed("partialCertificate", e))
    }

    /// The pre-selected signature algorithm, if the template carries one.
    pub fn signature_algorithm(&self) -> Result<Option<SignatureAlgorithm>> {
        self.signature
            .as_ref()
            .map(SignatureAlgorithm::from_algorithm_identifier)
            .transpose()
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.extensions
            .iter()
            .find(|ext| ext.extn_id == KeyUsage::OID)
            .map(|ext| KeyUsage::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    fn unique_id_field(
        tag_number: TagNumber,
        id: &BitString,
    ) -> ContextSpecificRef<'_, BitString> {
        ContextSpecificRef {
            tag_number,
            tag_mode: TagMode::Implicit,
            value: id,
        }
    }

    fn extensions_field(&self) -> Option<ContextSpecificRef<'_, Vec<Extension>>> {
        (!self.extensions.is_empty()).then_some(ContextSpecificRef {
            tag_number: TagNumber::N3,
            tag_mode: TagMode::Explicit,
            value: &self.extensions,
        })
    }
}

fn unique_id(bits: Option<&[u8]>) -> Result<Option<BitString>> {
    bits.map(|bits| {
        BitString::from_bytes(bits)
            .map_err(|e| PartialCertError::InvalidInput(format!("unique identifier: {e}")))
    })
    .transpose()
}

impl EncodeValue for PartialCertificate {
    fn value_len(&self) -> der::Result<Length> {
        let mut len = Length::ZERO;
        if let Some(signature) = &self.signature {
            len = (len + signature.encoded_len()?)?;
        }
        len = (len + self.issuer.encoded_len()?)?;
        len = (len + self.validity.encoded_len()?)?;
        len = (len + self.subject.encoded_len()?)?;
        if let Some(id) = &self.issuer_unique_id {
            len = (len + Self::unique_id_field(TagNumber::N1, id).encoded_len()?)?;
        }
        if let Some(id) = &self.subject_unique_id {
            len = (len + Self::unique_id_field(TagNumber::N2, id).encoded_len()?)?;
        }
        if let Some(extensions) = self.extensions_field() {
            len = (len + extensions.encoded_len()?)?;
        }
        Ok(len)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        if let Some(signature) = &self.signature {
            signature.encode(writer)?;
        }
        self.issuer.encode(writer)?;
        self.validity.encode(writer)?;
        self.subject.encode(writer)?;
        if let Some(id) = &self.issuer_unique_id {
            Self::unique_id_field(TagNumber::N1, id).encode(writer)?;
        }
        if let Some(id) = &self.subject_unique_id {
            Self::unique_id_field(TagNumber::N2, id).encode(writer)?;
        }
        if let Some(extensions) = self.extensions_field() {
            extensions.encode(writer)?;
        }
        Ok(())
    }
}

impl<'a> DecodeValue<'a> for PartialCertificate {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        reader.read_nested(header.length, |reader| {
            // signature and issuer are both SEQUENCEs; only an AlgorithmIdentifier
            // starts with an OBJECT IDENTIFIER
            let first = Any::decode(reader)?.to_der()?;
            let (signature, issuer) = match AlgorithmIdentifierOwned::from_der(&first) {
                Ok(signature) => (Some(signature), Name::decode(reader)?),
                Err(_) => (None, Name::from_der(&first)?),
            };
            let validity = Validity::decode(reader)?;
            let subject = Name::decode(reader)?;
            let issuer_unique_id =
                ContextSpecific::<BitString>::decode_implicit(reader, TagNumber::N1)?
                    .map(|field| field.value);
            let subject_unique_id =
                ContextSpecific::<BitString>::decode_implicit(reader, TagNumber::N2)?
                    .map(|field| field.value);
            let extensions =
                ContextSpecific::<Vec<Extension>>::decode_explicit(reader, TagNumber::N3)?
                    .map(|field| field.value)
                    .unwrap_or_default();
            Ok(Self {
                signature,
                issuer,
                validity,
                subject,
                issuer_unique_id,
                subject_unique_id,
                extensions,
            })
        })
    }
}

impl<'a> Sequence<'a> for PartialCertificate {}
