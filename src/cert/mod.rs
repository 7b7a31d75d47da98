pub mod extensions;
pub mod params;

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::Any;
use der::{Decode, Encode, EncodePem, Tag};
use extensions::{KeyUsage, ToAndFromX509Extension};
use params::DistinguishedName;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{PartialCertError, Result};
use crate::key::{DigestAlgorithm, KeyType, PublicKey, SignatureVerifier};

const SHA_1_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA_256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA_384_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA_512_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const ECDSA_WITH_SHA_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const ECDSA_WITH_SHA_256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA_384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ECDSA_WITH_SHA_512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// SHA-1 with RSA encryption (PKCS #1 v1.5).
    Sha1WithRSA,
    /// SHA-256 with RSA encryption (PKCS #1 v1.5).
    Sha256WithRSA,
    /// SHA-384 with RSA encryption (PKCS #1 v1.5).
    Sha384WithRSA,
    /// SHA-512 with RSA encryption (PKCS #1 v1.5).
    Sha512WithRSA,
    /// ECDSA with SHA-1.
    Sha1WithECDSA,
    /// ECDSA with SHA-256.
    Sha256WithECDSA,
    /// ECDSA with SHA-384.
    Sha384WithECDSA,
    /// ECDSA with SHA-512.
    Sha512WithECDSA,
}

/// A key type and digest pair naming a signature algorithm before it is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub key_type: KeyType,
    pub digest: DigestAlgorithm,
}

impl SignatureScheme {
    pub fn new(key_type: KeyType, digest: DigestAlgorithm) -> Self {
        Self { key_type, digest }
    }

    pub fn resolve(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::resolve(self.key_type, self.digest)
    }
}

impl SignatureAlgorithm {
    pub const ALL: [SignatureAlgorithm; 8] = [
        SignatureAlgorithm::Sha1WithRSA,
        SignatureAlgorithm::Sha256WithRSA,
        SignatureAlgorithm::Sha384WithRSA,
        SignatureAlgorithm::Sha512WithRSA,
        SignatureAlgorithm::Sha1WithECDSA,
        SignatureAlgorithm::Sha256WithECDSA,
        SignatureAlgorithm::Sha384WithECDSA,
        SignatureAlgorithm::Sha512WithECDSA,
    ];

    /// Maps a key type and digest to the signature algorithm a signer would report.
    ///
    /// # Errors
    /// [`PartialCertError::UnsupportedAlgorithmCombination`] for any pair outside
    /// RSA/ECC with SHA-1, SHA-256, SHA-384 or SHA-512.
    pub fn resolve(key_type: KeyType, digest: DigestAlgorithm) -> Result<Self> {
        use DigestAlgorithm::*;
        let algorithm = match (key_type, digest) {
            (KeyType::Rsa, Sha1) => SignatureAlgorithm::Sha1WithRSA,
            (KeyType::Rsa, Sha256) => SignatureAlgorithm::Sha256WithRSA,
            (KeyType::Rsa, Sha384) => SignatureAlgorithm::Sha384WithRSA,
            (KeyType::Rsa, Sha512) => SignatureAlgorithm::Sha512WithRSA,
            (KeyType::Ecc, Sha1) => SignatureAlgorithm::Sha1WithECDSA,
            (KeyType::Ecc, Sha256) => SignatureAlgorithm::Sha256WithECDSA,
            (KeyType::Ecc, Sha384) => SignatureAlgorithm::Sha384WithECDSA,
            (KeyType::Ecc, Sha512) => SignatureAlgorithm::Sha512WithECDSA,
            (key_type, digest) => {
                return Err(PartialCertError::UnsupportedAlgorithmCombination {
                    key_type,
                    digest,
                });
            }
        };
        Ok(algorithm)
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha1WithRSA => SHA_1_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithRSA => SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha1WithECDSA => ECDSA_WITH_SHA_1,
            SignatureAlgorithm::Sha256WithECDSA => ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithECDSA => ECDSA_WITH_SHA_512,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            SignatureAlgorithm::Sha1WithRSA
            | SignatureAlgorithm::Sha256WithRSA
            | SignatureAlgorithm::Sha384WithRSA
            | SignatureAlgorithm::Sha512WithRSA => KeyType::Rsa,
            _ => KeyType::Ecc,
        }
    }

    pub fn digest(&self) -> DigestAlgorithm {
        match self {
            SignatureAlgorithm::Sha1WithRSA | SignatureAlgorithm::Sha1WithECDSA => {
                DigestAlgorithm::Sha1
            }
            SignatureAlgorithm::Sha256WithRSA | SignatureAlgorithm::Sha256WithECDSA => {
                DigestAlgorithm::Sha256
            }
            SignatureAlgorithm::Sha384WithRSA | SignatureAlgorithm::Sha384WithECDSA => {
                DigestAlgorithm::Sha384
            }
            SignatureAlgorithm::Sha512WithRSA | SignatureAlgorithm::Sha512WithECDSA => {
                DigestAlgorithm::Sha512
            }
        }
    }

    /// Builds the `AlgorithmIdentifier` for this algorithm.
    ///
    /// RSA identifiers carry explicit NULL parameters (RFC 4055), ECDSA
    /// identifiers carry none (RFC 5758).
    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        let parameters = match self.key_type() {
            KeyType::Rsa => Some(Any::new(Tag::Null, Vec::new())?),
            _ => None,
        };
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters,
        })
    }

    /// Determines the algorithm from an encoded `AlgorithmIdentifier`.
    pub fn from_algorithm_identifier(algorithm: &AlgorithmIdentifierOwned) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.oid() == algorithm.oid)
            .ok_or_else(|| PartialCertError::UnsupportedSignatureAlgorithm(algorithm.oid.to_string()))
    }

    /// The RFC name of the algorithm, e.g. `sha256WithRSAEncryption`.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1WithRSA => "sha1WithRSAEncryption",
            SignatureAlgorithm::Sha256WithRSA => "sha256WithRSAEncryption",
            SignatureAlgorithm::Sha384WithRSA => "sha384WithRSAEncryption",
            SignatureAlgorithm::Sha512WithRSA => "sha512WithRSAEncryption",
            SignatureAlgorithm::Sha1WithECDSA => "ecdsa-with-SHA1",
            SignatureAlgorithm::Sha256WithECDSA => "ecdsa-with-SHA256",
            SignatureAlgorithm::Sha384WithECDSA => "ecdsa-with-SHA384",
            SignatureAlgorithm::Sha512WithECDSA => "ecdsa-with-SHA512",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = PartialCertError;

    /// Accepts RFC names (`ecdsa-with-SHA256`), signer names (`SHA256withECDSA`,
    /// `SHA256WITHRSA`) and dotted OIDs, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| {
                let signer_name = format!(
                    "{}with{}",
                    match candidate.digest() {
                        DigestAlgorithm::Sha1 => "SHA1",
                        DigestAlgorithm::Sha256 => "SHA256",
                        DigestAlgorithm::Sha384 => "SHA384",
                        _ => "SHA512",
                    },
                    match candidate.key_type() {
                        KeyType::Rsa => "RSA",
                        _ => "ECDSA",
                    }
                );
                wanted.eq_ignore_ascii_case(candidate.name())
                    || wanted.eq_ignore_ascii_case(&signer_name)
                    || wanted == candidate.oid().to_string()
            })
            .ok_or_else(|| PartialCertError::UnsupportedSignatureAlgorithm(wanted.to_string()))
    }
}

/// Represents an X.509 certificate.
///
/// Holds the parsed structure together with the exact DER bytes it was read
/// from or encoded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
    der: Vec<u8>,
}

impl Certificate {
    /// Encodes `inner` and keeps both forms.
    pub fn from_inner(inner: CertificateInner) -> Result<Self> {
        let der = inner.to_der()?;
        Ok(Self { inner, der })
    }

    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)
            .map_err(|e| PartialCertError::malformed("certificate", e))?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the DER encoding of the certificate.
    pub fn to_der(&self) -> Vec<u8> {
        self.der.clone()
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(der::pem::LineEnding::LF)
            .map_err(|e| PartialCertError::EncodingError(e.to_string()))
    }

    /// The raw signature bytes carried in the signatureValue BIT STRING.
    pub fn signature_bytes(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_algorithm_identifier(&self.inner.signature_algorithm)
    }

    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Returns the decoded key usage extension, if the certificate has one.
    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == KeyUsage::OID)
            .map(|ext| KeyUsage::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// Checks the certificate's signature against the issuer's public key.
    ///
    /// This is a single-signature check only; no path or validity processing is done.
    pub fn verify(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm = self.signature_algorithm()?;
        if self.inner.tbs_certificate.signature != self.inner.signature_algorithm {
            return Err(PartialCertError::VerificationMismatch(
                "TBS signature algorithm differs from the outer signature algorithm".to_string(),
            ));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer_key
            .verify(algorithm, &tbs, self.signature_bytes())
            .map_err(|e| {
                PartialCertError::VerificationMismatch(format!(
                    "signature does not verify with {algorithm}: {e}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_table() {
        use DigestAlgorithm::*;
        let expected = [
            (KeyType::Rsa, Sha1, "1.2.840.113549.1.1.5"),
            (KeyType::Rsa, Sha256, "1.2.840.113549.1.1.11"),
            (KeyType::Rsa, Sha384, "1.2.840.113549.1.1.12"),
            (KeyType::Rsa, Sha512, "1.2.840.113549.1.1.13"),
            (KeyType::Ecc, Sha1, "1.2.840.10045.4.1"),
            (KeyType::Ecc, Sha256, "1.2.840.10045.4.3.2"),
            (KeyType::Ecc, Sha384, "1.2.840.10045.4.3.3"),
            (KeyType::Ecc, Sha512, "1.2.840.10045.4.3.4"),
        ];
        for (key_type, digest, oid) in expected {
            let algorithm = SignatureAlgorithm::resolve(key_type, digest).unwrap();
            assert_eq!(algorithm.oid().to_string(), oid);
            assert_eq!(algorithm.key_type(), key_type);
            assert_eq!(algorithm.digest(), digest);
        }
    }

    #[test]
    fn test_resolver_rejects_unknown_pairs() {
        for (key_type, digest) in [
            (KeyType::Rsa, DigestAlgorithm::Sm3_256),
            (KeyType::Ecc, DigestAlgorithm::Sm3_256),
            (KeyType::KeyedHash, DigestAlgorithm::Sha256),
            (KeyType::SymCipher, DigestAlgorithm::Sha1),
        ] {
            let err = SignatureAlgorithm::resolve(key_type, digest).unwrap_err();
            assert!(matches!(
                err,
                PartialCertError::UnsupportedAlgorithmCombination { key_type: k, digest: d }
                    if k == key_type && d == digest
            ));
        }
    }

    #[test]
    fn test_algorithm_identifier_parameters() {
        let rsa = SignatureAlgorithm::Sha256WithRSA
            .algorithm_identifier()
            .unwrap();
        assert_eq!(rsa.to_der().unwrap(), [
            0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b, 0x05,
            0x00
        ]);

        let ecdsa = SignatureAlgorithm::Sha256WithECDSA
            .algorithm_identifier()
            .unwrap();
        assert_eq!(ecdsa.to_der().unwrap(), [
            0x30, 0x0a, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02
        ]);
        assert_eq!(
            SignatureAlgorithm::from_algorithm_identifier(&ecdsa).unwrap(),
            SignatureAlgorithm::Sha256WithECDSA
        );
    }

    #[test]
    fn test_parse_algorithm_names() {
        assert_eq!(
            "SHA256WITHRSA".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::Sha256WithRSA
        );
        assert_eq!(
            "SHA384withECDSA".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::Sha384WithECDSA
        );
        assert_eq!(
            "ecdsa-with-SHA1".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::Sha1WithECDSA
        );
        assert_eq!(
            "1.2.840.113549.1.1.13".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::Sha512WithRSA
        );
        assert!("SHA256withDSA".parse::<SignatureAlgorithm>().is_err());
    }
}
