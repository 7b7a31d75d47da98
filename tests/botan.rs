#![cfg(feature = "simulator")]

mod util;

use botan::Certificate as BotanCertificate;

use partial_cert::cert::SignatureAlgorithm;
use partial_cert::key::KeyPair;

fn check_cert(cert_der: &[u8]) {
    // Use botan crate to parse the DER and assert it succeeds
    BotanCertificate::load(cert_der).expect("Botan failed to parse certificate");
}

fn assembled(algorithm: SignatureAlgorithm, in_partial: bool) -> Vec<u8> {
    let issuer = util::issuer_key(algorithm);
    let subject = KeyPair::generate_ecdsa_p256().public_key();
    let partial = util::signing_partial(in_partial.then_some(algorithm));
    util::simulate_and_assemble(&partial, &subject, &issuer, algorithm).to_der()
}

#[test]
#[ignore]
fn test_botan_ecdsa_sha256() {
    check_cert(&assembled(SignatureAlgorithm::Sha256WithECDSA, false));
}

#[test]
#[ignore]
fn test_botan_ecdsa_sha384_in_partial() {
    check_cert(&assembled(SignatureAlgorithm::Sha384WithECDSA, true));
}

#[test]
#[ignore]
fn test_botan_rsa_sha256() {
    check_cert(&assembled(SignatureAlgorithm::Sha256WithRSA, false));
}

#[test]
#[ignore]
fn test_botan_rsa_sha512_in_partial() {
    check_cert(&assembled(SignatureAlgorithm::Sha512WithRSA, true));
}
