use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1};
use der::Encode;
use der::flagset::{FlagSet, flags};
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use p384::ecdsa::{
    Signature as P384Signature, SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey,
};
use pkcs8::DecodePublicKey;
use rand_core::OsRng;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{PartialCertError, Result};

/// Algorithm family of a key, as a TPM reports it in its public area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ecc,
    KeyedHash,
    SymCipher,
}

/// Digest algorithms a key's signing scheme may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    /// Valid TPM scheme hash without an X.509 signature algorithm.
    Sm3_256,
}

impl DigestAlgorithm {
    /// Hashes `message`.
    ///
    /// SM3-256 is recognized so it can be reported, but it cannot be computed here.
    pub fn digest(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            DigestAlgorithm::Sha1 => Ok(Sha1::digest(message).to_vec()),
            DigestAlgorithm::Sha256 => Ok(Sha256::digest(message).to_vec()),
            DigestAlgorithm::Sha384 => Ok(Sha384::digest(message).to_vec()),
            DigestAlgorithm::Sha512 => Ok(Sha512::digest(message).to_vec()),
            DigestAlgorithm::Sm3_256 => Err(PartialCertError::UnsupportedSignatureAlgorithm(
                "SM3-256 digests are not available".to_string(),
            )),
        }
    }

    fn pkcs1v15(&self) -> Result<Pkcs1v15Sign> {
        match self {
            DigestAlgorithm::Sha1 => Ok(Pkcs1v15Sign::new::<Sha1>()),
            DigestAlgorithm::Sha256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
            DigestAlgorithm::Sha384 => Ok(Pkcs1v15Sign::new::<Sha384>()),
            DigestAlgorithm::Sha512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
            DigestAlgorithm::Sm3_256 => Err(PartialCertError::UnsupportedSignatureAlgorithm(
                "RSASSA-PKCS1-v1_5 with SM3-256".to_string(),
            )),
        }
    }
}

flags! {
    /// Object attribute bits (TPMA_OBJECT) describing what a key may be used for.
    pub enum KeyCapability: u32 {
        FixedTpm = 1 << 1,
        StClear = 1 << 2,
        FixedParent = 1 << 4,
        SensitiveDataOrigin = 1 << 5,
        UserWithAuth = 1 << 6,
        AdminWithPolicy = 1 << 7,
        NoDa = 1 << 10,
        EncryptedDuplication = 1 << 11,
        Restricted = 1 << 16,
        Decrypt = 1 << 17,
        Sign = 1 << 18,
    }
}

impl KeyCapability {
    /// Builds a capability set from a raw attribute word, dropping reserved bits.
    pub fn from_bits(bits: u32) -> FlagSet<KeyCapability> {
        FlagSet::new_truncated(bits)
    }
}

/// What the caller knows about the key being certified.
///
/// # Fields
/// * `key_type` - The key's algorithm family.
/// * `capabilities` - The key's object attributes.
/// * `hash` - The digest named by the key's signing scheme, if the key carries one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Builder)]
pub struct KeyDescriptor {
    pub key_type: KeyType,
    #[builder(default)]
    pub capabilities: FlagSet<KeyCapability>,
    pub hash: Option<DigestAlgorithm>,
}

impl KeyDescriptor {
    /// Returns the digest this key signs with.
    ///
    /// Asymmetric keys without an explicit scheme sign with SHA-256; other key
    /// types only report a digest when their scheme names one.
    pub fn scheme_hash(&self) -> Option<DigestAlgorithm> {
        match self.key_type {
            KeyType::Rsa | KeyType::Ecc => Some(self.hash.unwrap_or(DigestAlgorithm::Sha256)),
            KeyType::KeyedHash | KeyType::SymCipher => self.hash,
        }
    }
}

/// Supported key pairs for signing certificates.
#[derive(Clone, Debug)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| PartialCertError::KeyError(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let signing_key = P256SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let signing_key = P384SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyPair::Rsa { .. } => KeyType::Rsa,
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => KeyType::Ecc,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
        }
    }
}

/// Public half of a supported key.
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Rsa(_) => KeyType::Rsa,
            PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => KeyType::Ecc,
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
        };
        Ok(spki)
    }

    /// Recovers a key from a SubjectPublicKeyInfo.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        match spki.algorithm.oid {
            RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(&der)?)),
            ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| PartialCertError::KeyError("EC key without curve".to_string()))?
                    .decode_as::<ObjectIdentifier>()
                    .map_err(|e| PartialCertError::KeyError(e.to_string()))?;
                match curve {
                    SECP_256_R_1 => Ok(PublicKey::EcdsaP256(
                        P256VerifyingKey::from_public_key_der(&der)?,
                    )),
                    SECP_384_R_1 => Ok(PublicKey::EcdsaP384(
                        P384VerifyingKey::from_public_key_der(&der)?,
                    )),
                    other => Err(PartialCertError::KeyError(format!(
                        "unsupported curve {other}"
                    ))),
                }
            }
            other => Err(PartialCertError::KeyError(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }
}

/// Produces signatures for a given signature algorithm.
pub trait SignatureEngine {
    /// Signs `message`, returning the signature in its X.509 BIT STRING payload form.
    fn sign(&self, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>>;
}

/// Checks signatures for a given signature algorithm.
pub trait SignatureVerifier {
    fn verify(&self, algorithm: SignatureAlgorithm, message: &[u8], signature: &[u8])
    -> Result<()>;
}

fn check_key_type(algorithm: SignatureAlgorithm, key_type: KeyType) -> Result<()> {
    if algorithm.key_type() != key_type {
        return Err(PartialCertError::InvalidInput(format!(
            "{algorithm:?} cannot be used with a {key_type:?} key"
        )));
    }
    Ok(())
}

/// ECDSA signs a prehash no shorter than half the curve's field size.
fn check_prehash_len(
    curve: &str,
    field_len: usize,
    digest: DigestAlgorithm,
    prehash: &[u8],
) -> Result<()> {
    if prehash.len() < field_len / 2 {
        return Err(PartialCertError::InvalidInput(format!(
            "ECDSA on {curve} cannot sign a {digest:?} digest: {} bytes is shorter than half the {field_len}-byte field",
            prehash.len()
        )));
    }
    Ok(())
}

impl SignatureEngine for KeyPair {
    fn sign(&self, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        check_key_type(algorithm, self.key_type())?;
        let prehash = algorithm.digest().digest(message)?;
        match self {
            KeyPair::Rsa { private, .. } => {
                Ok(private.sign(algorithm.digest().pkcs1v15()?, &prehash)?)
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                check_prehash_len("P-256", 32, algorithm.digest(), &prehash)?;
                let signature: P256Signature = signing_key.sign_prehash(&prehash)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                check_prehash_len("P-384", 48, algorithm.digest(), &prehash)?;
                let signature: P384Signature = signing_key.sign_prehash(&prehash)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

impl SignatureVerifier for PublicKey {
    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        check_key_type(algorithm, self.key_type())?;
        let prehash = algorithm.digest().digest(message)?;
        match self {
            PublicKey::Rsa(public) => {
                Ok(public.verify(algorithm.digest().pkcs1v15()?, &prehash, signature)?)
            }
            PublicKey::EcdsaP256(verifying_key) => {
                let signature = P256Signature::from_der(signature)?;
                Ok(verifying_key.verify_prehash(&prehash, &signature)?)
            }
            PublicKey::EcdsaP384(verifying_key) => {
                let signature = P384Signature::from_der(signature)?;
                Ok(verifying_key.verify_prehash(&prehash, &signature)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_from_raw_attributes() {
        // fixedTPM | fixedParent | sensitiveDataOrigin | userWithAuth | sign, plus a reserved bit
        let caps = KeyCapability::from_bits(0x0004_0072 | 1 << 30);
        assert!(caps.contains(KeyCapability::Sign));
        assert!(caps.contains(KeyCapability::FixedTpm));
        assert!(!caps.contains(KeyCapability::Decrypt));
        assert_eq!(caps.bits(), 0x0004_0072);
    }

    #[test]
    fn test_scheme_hash_defaults() {
        let rsa = KeyDescriptor::builder().key_type(KeyType::Rsa).build();
        assert_eq!(rsa.scheme_hash(), Some(DigestAlgorithm::Sha256));

        let ecc = KeyDescriptor::builder()
            .key_type(KeyType::Ecc)
            .hash(DigestAlgorithm::Sha384)
            .build();
        assert_eq!(ecc.scheme_hash(), Some(DigestAlgorithm::Sha384));

        let hmac = KeyDescriptor::builder().key_type(KeyType::KeyedHash).build();
        assert_eq!(hmac.scheme_hash(), None);
    }

    #[test]
    fn test_spki_round_trip_p384() {
        let key = KeyPair::generate_ecdsa_p384().public_key();
        let spki = key.to_spki().unwrap();
        assert_eq!(PublicKey::from_spki(&spki).unwrap(), key);
    }

    #[test]
    fn test_sign_and_verify_ecdsa() {
        let key = KeyPair::generate_ecdsa_p256();
        let message = b"to be signed";
        for algorithm in [
            SignatureAlgorithm::Sha1WithECDSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha512WithECDSA,
        ] {
            let signature = key.sign(algorithm, message).unwrap();
            key.public_key()
                .verify(algorithm, message, &signature)
                .unwrap();
            assert!(
                key.public_key()
                    .verify(algorithm, b"something else", &signature)
                    .is_err()
            );
        }
    }

    #[test]
    fn test_p384_rejects_sha1() {
        let key = KeyPair::generate_ecdsa_p384();
        let err = key
            .sign(SignatureAlgorithm::Sha1WithECDSA, b"to be signed")
            .unwrap_err();
        assert!(
            matches!(&err, PartialCertError::InvalidInput(msg) if msg.contains("P-384") && msg.contains("Sha1")),
            "{err}"
        );

        let signature = key
            .sign(SignatureAlgorithm::Sha256WithECDSA, b"to be signed")
            .unwrap();
        key.public_key()
            .verify(SignatureAlgorithm::Sha256WithECDSA, b"to be signed", &signature)
            .unwrap();
    }

    #[test]
    fn test_sign_rejects_mismatched_key_type() {
        let key = KeyPair::generate_ecdsa_p256();
        let err = key.sign(SignatureAlgorithm::Sha256WithRSA, b"data").unwrap_err();
        assert!(matches!(err, PartialCertError::InvalidInput(_)));
    }
}
