//! The device's completion of a partial certificate.
//!
//! ```text
//! AddedToCertificate ::= SEQUENCE {
//!     version              [0] EXPLICIT INTEGER (2),
//!     serialNumber         INTEGER,
//!     signature            AlgorithmIdentifier OPTIONAL,
//!     subjectPublicKeyInfo SubjectPublicKeyInfo }
//! ```

use der::asn1::ContextSpecificRef;
use der::{
    Any, Decode, Encode, EncodeValue, FixedTag, Length, Tag, TagMode, TagNumber, Tagged, Writer,
};
use log::debug;
use x509_cert::Version;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::SignatureAlgorithm;
use crate::error::{PartialCertError, Result};

const STRUCTURE: &str = "addedToCertificate";

/// The fields a device adds to a partial certificate.
///
/// # Fields
/// * `version` - Always [`Version::V3`] for well-formed input.
/// * `serial_number` - The serial number the device chose.
/// * `signature` - The signature algorithm, present only when the partial
///   certificate did not carry one.
/// * `subject_public_key_info` - The certified key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedToCertificate {
    pub version: Version,
    pub serial_number: SerialNumber,
    pub signature: Option<AlgorithmIdentifierOwned>,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
}

impl AddedToCertificate {
    pub fn new(
        serial_number: SerialNumber,
        signature: Option<AlgorithmIdentifierOwned>,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
    ) -> Self {
        Self {
            version: Version::V3,
            serial_number,
            signature,
            subject_public_key_info,
        }
    }

    /// Parses the DER bytes returned by a device.
    ///
    /// The input must be the canonical encoding of the structure: decoding and
    /// re-encoding has to reproduce it byte for byte.
    ///
    /// # Errors
    /// [`PartialCertError::MalformedStructure`] naming the offending field for
    /// truncated input, trailing bytes, a wrong element count, a version other
    /// than `[0] INTEGER 2`, or any field that does not parse.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let elements = Vec::<Any>::from_der(bytes)
            .map_err(|e| PartialCertError::malformed(STRUCTURE, e))?;
        if !(3..=4).contains(&elements.len()) {
            return Err(PartialCertError::malformed(
                STRUCTURE,
                format!("expected 3 or 4 elements, found {}", elements.len()),
            ));
        }

        let version = &elements[0];
        let version_tag = Tag::ContextSpecific {
            constructed: true,
            number: TagNumber::N0,
        };
        if version.tag() != version_tag {
            return Err(PartialCertError::malformed(
                STRUCTURE,
                format!("version: expected tag {version_tag}, found {}", version.tag()),
            ));
        }
        let version_number = u8::from_der(version.value())
            .map_err(|e| PartialCertError::malformed(STRUCTURE, format!("version: {e}")))?;
        if version_number != Version::V3 as u8 {
            return Err(PartialCertError::malformed(
                STRUCTURE,
                format!("version: expected 2, found {version_number}"),
            ));
        }

        let serial_number = reparse::<SerialNumber>(&elements[1], "serialNumber")?;
        let signature = match elements.len() {
            4 => Some(reparse::<AlgorithmIdentifierOwned>(&elements[2], "signature")?),
            _ => None,
        };
        let subject_public_key_info = reparse::<SubjectPublicKeyInfoOwned>(
            &elements[elements.len() - 1],
            "subjectPublicKeyInfo",
        )?;

        let added_to = Self::new(serial_number, signature, subject_public_key_info);
        if added_to.to_der()? != bytes {
            return Err(PartialCertError::malformed(
                STRUCTURE,
                "input is not the canonical DER encoding",
            ));
        }
        debug!(
            "decoded addedTo: serial {} byte(s), signature algorithm {}",
            added_to.serial_number.as_bytes().len(),
            if added_to.signature.is_some() {
                "present"
            } else {
                "absent"
            }
        );
        Ok(added_to)
    }

    pub fn signature_algorithm(&self) -> Result<Option<SignatureAlgorithm>> {
        self.signature
            .as_ref()
            .map(SignatureAlgorithm::from_algorithm_identifier)
            .transpose()
    }

    fn version_field(&self) -> ContextSpecificRef<'_, Version> {
        ContextSpecificRef {
            tag_number: TagNumber::N0,
            tag_mode: TagMode::Explicit,
            value: &self.version,
        }
    }
}

fn reparse<T: for<'a> Decode<'a>>(element: &Any, field: &str) -> Result<T> {
    element
        .to_der()
        .and_then(|der| T::from_der(&der))
        .map_err(|e| PartialCertError::malformed(STRUCTURE, format!("{field}: {e}")))
}

impl EncodeValue for AddedToCertificate {
    fn value_len(&self) -> der::Result<Length> {
        let mut len = (self.version_field().encoded_len()? + self.serial_number.encoded_len()?)?;
        if let Some(signature) = &self.signature {
            len = (len + signature.encoded_len()?)?;
        }
        len + self.subject_public_key_info.encoded_len()?
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.version_field().encode(writer)?;
        self.serial_number.encode(writer)?;
        if let Some(signature) = &self.signature {
            signature.encode(writer)?;
        }
        self.subject_public_key_info.encode(writer)
    }
}

impl FixedTag for AddedToCertificate {
    const TAG: Tag = Tag::Sequence;
}
