use const_oid::AssociatedOid;
use der::{Decode, Encode, asn1::Ia5String, flagset::FlagSet, oid::ObjectIdentifier};
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;
use x509_cert::ext::pkix::name::GeneralName;

use crate::error::{PartialCertError, Result};
use crate::key::KeyCapability;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use partial_cert::cert::extensions::{KeyUsage, KeyUsages, ToAndFromX509Extension};
/// let usage = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::NonRepudiation);
/// let encoded = usage.to_x509_extension_value().unwrap();
/// let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(usage, decoded);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    /// Derives key usage from the capabilities of the key being certified.
    ///
    /// The rules are additive:
    /// * `Sign` sets `digitalSignature`;
    /// * `Decrypt` sets `keyEncipherment` on restricted keys and `dataEncipherment` otherwise;
    /// * `FixedTpm` sets `nonRepudiation`.
    ///
    /// Keys with none of these capabilities get an empty usage set.
    pub fn from_capabilities(capabilities: FlagSet<KeyCapability>) -> Self {
        let mut usage = FlagSet::<KeyUsages>::default();
        if capabilities.contains(KeyCapability::Sign) {
            usage |= KeyUsages::DigitalSignature;
        }
        if capabilities.contains(KeyCapability::Decrypt) {
            if capabilities.contains(KeyCapability::Restricted) {
                usage |= KeyUsages::KeyEncipherment;
            } else {
                usage |= KeyUsages::DataEncipherment;
            }
        }
        if capabilities.contains(KeyCapability::FixedTpm) {
            usage |= KeyUsages::NonRepudiation;
        }
        Self(usage)
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)
            .map_err(|e| PartialCertError::malformed("keyUsage", e))?;
        Ok(Self(ku.0))
    }
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `names` - A list of DNS names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<String>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(|name| {
                    Ia5String::try_from(name.clone())
                        .map(GeneralName::DnsName)
                        .map_err(|e| PartialCertError::InvalidInput(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)
            .map_err(|e| PartialCertError::malformed("subjectAltName", e))?;
        let names = san
            .0
            .iter()
            .map(|name| match name {
                GeneralName::DnsName(dns) => Ok(dns.to_string()),
                _ => Err(PartialCertError::InvalidInput(
                    "Unsupported general name type".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage_for(capabilities: FlagSet<KeyCapability>) -> FlagSet<KeyUsages> {
        KeyUsage::from_capabilities(capabilities).0
    }

    #[test]
    fn test_key_usage_from_capabilities() {
        assert_eq!(
            usage_for(KeyCapability::Sign.into()),
            FlagSet::from(KeyUsages::DigitalSignature)
        );
        assert_eq!(
            usage_for(KeyCapability::Decrypt | KeyCapability::Restricted),
            FlagSet::from(KeyUsages::KeyEncipherment)
        );
        assert_eq!(
            usage_for(KeyCapability::Decrypt.into()),
            FlagSet::from(KeyUsages::DataEncipherment)
        );
        assert_eq!(
            usage_for(KeyCapability::Sign | KeyCapability::FixedTpm),
            KeyUsages::DigitalSignature | KeyUsages::NonRepudiation
        );
    }

    #[test]
    fn test_key_usage_ignores_unrelated_capabilities() {
        assert!(usage_for(FlagSet::default()).is_empty());
        assert!(usage_for(KeyCapability::UserWithAuth | KeyCapability::NoDa).is_empty());
        // restricted alone grants nothing
        assert!(usage_for(KeyCapability::Restricted.into()).is_empty());
    }

    #[test]
    fn test_key_usage_der() {
        let usage = KeyUsage(KeyUsages::DigitalSignature.into());
        assert_eq!(usage.to_x509_extension_value().unwrap(), [0x03, 0x02, 0x07, 0x80]);
        let decoded = KeyUsage::from_x509_extension_value(&[0x03, 0x02, 0x07, 0x80]).unwrap();
        assert_eq!(decoded, usage);
    }

    #[test]
    fn test_subject_alt_name_encoding_decoding() {
        let original = SubjectAltName {
            names: vec!["device.example".to_string(), "tpm.example".to_string()],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }
}
