#![cfg(feature = "simulator")]

mod util;

use der::Encode;
use partial_cert::added_to::AddedToCertificate;
use partial_cert::assembler::assemble;
use partial_cert::cert::SignatureAlgorithm;
use partial_cert::cert::extensions::KeyUsages;
use partial_cert::device::{CertifyResponse, Certifier, certify_x509};
use partial_cert::error::PartialCertError;
use partial_cert::key::{KeyPair, PublicKey};
use partial_cert::simulator::{SimulatedDevice, simulate};

#[test]
fn test_ecc_p256_sha256_with_algorithm_from_device() {
    let algorithm = SignatureAlgorithm::Sha256WithECDSA;
    let issuer = util::issuer_key(algorithm);
    let subject = KeyPair::generate_ecdsa_p256().public_key();
    let partial = util::signing_partial(None);

    let certificate = util::simulate_and_assemble(&partial, &subject, &issuer, algorithm);

    assert_eq!(certificate.signature_algorithm().unwrap(), algorithm);
    assert_eq!(certificate.subject().unwrap().common_name, "attestation key");
    assert_eq!(certificate.issuer().unwrap().common_name, "Endorsement CA");
    assert_eq!(
        certificate.key_usage().unwrap().unwrap().0,
        KeyUsages::DigitalSignature | KeyUsages::NonRepudiation
    );
    let key_usage = &certificate.inner.tbs_certificate.extensions.as_ref().unwrap()[0];
    assert!(key_usage.critical);
    assert_eq!(
        PublicKey::from_spki(&certificate.inner.tbs_certificate.subject_public_key_info).unwrap(),
        subject
    );
}

#[test]
fn test_rsa_2048_sha256_with_algorithm_in_partial() {
    let algorithm = SignatureAlgorithm::Sha256WithRSA;
    let issuer = util::issuer_key(algorithm);
    let subject = KeyPair::generate_rsa(2048).unwrap().public_key();
    let partial = util::signing_partial(Some(algorithm));

    let simulated = simulate(&partial, &subject, &issuer, "SHA256WITHRSA").unwrap();
    assert!(simulated.added_to.signature.is_none());

    let certificate = util::simulate_and_assemble(&partial, &subject, &issuer, algorithm);
    assert_eq!(certificate.signature_algorithm().unwrap(), algorithm);
    // RSA identifiers carry NULL parameters
    assert!(certificate.inner.signature_algorithm.parameters.is_some());
}

#[test]
fn test_algorithm_matrix() {
    let rsa_issuer = KeyPair::generate_rsa(2048).unwrap();
    let ecc_issuer = KeyPair::generate_ecdsa_p256();
    let subject = KeyPair::generate_ecdsa_p256().public_key();

    for algorithm in SignatureAlgorithm::ALL {
        let issuer = match algorithm.key_type() {
            partial_cert::key::KeyType::Rsa => &rsa_issuer,
            _ => &ecc_issuer,
        };
        for selected in [None, Some(algorithm)] {
            let partial = util::signing_partial(selected);
            let certificate = util::simulate_and_assemble(&partial, &subject, issuer, algorithm);
            assert_eq!(certificate.signature_algorithm().unwrap(), algorithm);
        }
    }
}

#[test]
fn test_device_flow_in_both_modes() {
    let device = SimulatedDevice::new(
        KeyPair::generate_ecdsa_p256(),
        KeyPair::generate_ecdsa_p256().public_key(),
        SignatureAlgorithm::Sha256WithECDSA,
    )
    .unwrap();

    // algorithm chosen by the device
    let certificate = certify_x509(&device, &util::signing_partial(None)).unwrap();
    certificate.verify(&device.issuer_public_key()).unwrap();
    assert_eq!(
        certificate.signature_algorithm().unwrap(),
        SignatureAlgorithm::Sha256WithECDSA
    );

    // algorithm chosen by the caller
    let partial = util::signing_partial(Some(SignatureAlgorithm::Sha512WithECDSA));
    let certificate = certify_x509(&device, &partial).unwrap();
    certificate.verify(&device.issuer_public_key()).unwrap();
    assert_eq!(
        certificate.signature_algorithm().unwrap(),
        SignatureAlgorithm::Sha512WithECDSA
    );
}

#[test]
fn test_assembly_is_deterministic() {
    let algorithm = SignatureAlgorithm::Sha256WithECDSA;
    let issuer = util::issuer_key(algorithm);
    let subject = KeyPair::generate_ecdsa_p256().public_key();
    let partial = util::signing_partial(None);
    let simulated = simulate(&partial, &subject, &issuer, algorithm.name()).unwrap();

    let signature = simulated.certificate.signature_bytes();
    let first = assemble(&partial, &simulated.added_to, signature).unwrap();
    let second = assemble(&partial, &simulated.added_to, signature).unwrap();
    assert_eq!(first.as_der(), second.as_der());
}

#[test]
fn test_added_to_survives_the_wire() {
    let algorithm = SignatureAlgorithm::Sha384WithECDSA;
    let issuer = util::issuer_key(algorithm);
    let subject = KeyPair::generate_ecdsa_p384().public_key();
    let partial = util::signing_partial(None);
    let simulated = simulate(&partial, &subject, &issuer, algorithm.name()).unwrap();

    let wire = simulated.added_to.to_der().unwrap();
    assert_eq!(AddedToCertificate::decode(&wire).unwrap(), simulated.added_to);
}

struct TruncatingDevice(SimulatedDevice);

impl Certifier for TruncatingDevice {
    fn certify(&self, partial_certificate: &[u8]) -> partial_cert::error::Result<CertifyResponse> {
        let mut response = self.0.certify(partial_certificate)?;
        response.added_to_certificate.truncate(response.added_to_certificate.len() - 1);
        Ok(response)
    }
}

#[test]
fn test_truncated_added_to_is_rejected() {
    let device = TruncatingDevice(
        SimulatedDevice::new(
            KeyPair::generate_ecdsa_p256(),
            KeyPair::generate_ecdsa_p256().public_key(),
            SignatureAlgorithm::Sha256WithECDSA,
        )
        .unwrap(),
    );
    let err = certify_x509(&device, &util::signing_partial(None)).unwrap_err();
    assert!(matches!(
        err,
        PartialCertError::MalformedStructure {
            structure: "addedToCertificate",
            ..
        }
    ));
}

#[test]
fn test_signature_over_different_tbs_fails_verification() {
    let algorithm = SignatureAlgorithm::Sha256WithECDSA;
    let issuer = util::issuer_key(algorithm);
    let subject = KeyPair::generate_ecdsa_p256().public_key();
    let first = simulate(&util::signing_partial(None), &subject, &issuer, algorithm.name()).unwrap();
    let second =
        simulate(&util::signing_partial(None), &subject, &issuer, algorithm.name()).unwrap();

    // second's signature covers a TBS with a different serial
    let mixed = assemble(
        &util::signing_partial(None),
        &first.added_to,
        second.certificate.signature_bytes(),
    )
    .unwrap();
    assert!(matches!(
        mixed.verify(&issuer.public_key()).unwrap_err(),
        PartialCertError::VerificationMismatch(_)
    ));
}
