//! # partial-cert - X.509 Certificates from TPM2_CertifyX509
//!
//! `TPM2_CertifyX509` does not return a certificate. The caller sends a
//! *partial certificate* (issuer, validity, subject, extensions and optionally
//! the signature algorithm); the TPM fills in what only it knows (version,
//! serial number, the certified key and, when the caller left it out, the
//! signature algorithm), signs the resulting TBS certificate and returns that
//! *addedTo* structure together with the raw signature. This crate builds the
//! partial certificate, decodes the addedTo structure and reassembles the
//! signed certificate, byte-identical to what a conventional signer would
//! have produced.
//!
//! Built entirely with rustcrypto libraries.
//!
//! ## Supported Algorithms
//!
//! - **RSA** (PKCS #1 v1.5): SHA-1, SHA-256, SHA-384, SHA-512
//! - **ECDSA** (P-256, P-384): SHA-1, SHA-256, SHA-384, SHA-512
//!
//! ## Quick Start
//!
//! ### Certifying a Key
//!
//! ```rust,no_run
//! use partial_cert::{
//!     cert::params::{DistinguishedName, PartialCertificateParams},
//!     cert::SignatureAlgorithm,
//!     device::certify_x509,
//!     key::{KeyCapability, KeyDescriptor, KeyPair, KeyType},
//!     partial::PartialCertificate,
//!     simulator::SimulatedDevice,
//! };
//!
//! # fn main() -> Result<(), partial_cert::error::PartialCertError> {
//! // The key being certified: a restricted signing key bound to the TPM
//! let key = KeyDescriptor::builder()
//!     .key_type(KeyType::Ecc)
//!     .capabilities(KeyCapability::Sign | KeyCapability::Restricted | KeyCapability::FixedTpm)
//!     .build();
//!
//! // Key usage and signature algorithm follow from the key
//! let mut params = PartialCertificateParams::for_key(&key)?;
//! params.subject = Some(
//!     DistinguishedName::builder()
//!         .common_name("attestation key".to_string())
//!         .build(),
//! );
//! let partial = PartialCertificate::build(&params)?;
//!
//! // A software stand-in for the TPM
//! let issuer_key = KeyPair::generate_ecdsa_p256();
//! let subject_key = KeyPair::generate_ecdsa_p256().public_key();
//! let device = SimulatedDevice::new(issuer_key, subject_key, SignatureAlgorithm::Sha256WithECDSA)?;
//!
//! let certificate = certify_x509(&device, &partial)?;
//! certificate.verify(&device.issuer_public_key())?;
//! println!("{}", certificate.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Assembling a Device Response by Hand
//!
//! ```rust,no_run
//! use partial_cert::{added_to::AddedToCertificate, assembler::assemble, partial::PartialCertificate};
//!
//! # fn main() -> Result<(), partial_cert::error::PartialCertError> {
//! # let (partial_der, added_to_der, signature): (Vec<u8>, Vec<u8>, Vec<u8>) = Default::default();
//! let partial = PartialCertificate::decode(&partial_der)?;
//! let added_to = AddedToCertificate::decode(&added_to_der)?;
//! let certificate = assemble(&partial, &added_to, &signature)?;
//! std::fs::write("certified.der", certificate.as_der()).ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::PartialCertError`]:
//!
//! ```rust
//! use partial_cert::{added_to::AddedToCertificate, error::PartialCertError};
//!
//! match AddedToCertificate::decode(&[0x30, 0x03, 0xa0]) {
//!     Ok(_) => println!("decoded"),
//!     Err(PartialCertError::MalformedStructure { structure, details }) => {
//!         println!("bad {structure}: {details}")
//!     }
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: Key capabilities, key generation and signing
//! - [`cert`]: Signature algorithms, certificates, names, validity and extensions
//! - [`partial`]: The partial certificate template and its DER codec
//! - [`added_to`]: The device's addedTo structure and its DER codec
//! - [`assembler`]: Reassembly of the signed certificate
//! - [`device`]: The device abstraction and the end-to-end certify flow
//! - [`simulator`]: A conventional signer for cross-checking assembly (feature `simulator`)
//! - [`tbs_certificate`]: Conventional TBS certificate construction
//! - [`error`]: Error types

pub mod added_to;
pub mod assembler;
pub mod cert;
pub mod device;
pub mod error;
pub mod key;
pub mod partial;
#[cfg(feature = "simulator")]
pub mod simulator;
pub mod tbs_certificate;
