#![allow(dead_code)]

use partial_cert::assembler::assemble;
use partial_cert::cert::params::{DistinguishedName, PartialCertificateParams};
use partial_cert::cert::{Certificate, SignatureAlgorithm, SignatureScheme};
use partial_cert::key::{KeyCapability, KeyPair, KeyType, PublicKey};
use partial_cert::partial::PartialCertificate;
use partial_cert::simulator::{compare_certificates, simulate};

/// Builds a partial certificate for a signing key, optionally pre-selecting
/// the signature algorithm.
pub fn signing_partial(algorithm: Option<SignatureAlgorithm>) -> PartialCertificate {
    let params = PartialCertificateParams::builder()
        .capabilities(KeyCapability::Sign | KeyCapability::FixedTpm | KeyCapability::UserWithAuth)
        .maybe_signature_scheme(
            algorithm.map(|alg| SignatureScheme::new(alg.key_type(), alg.digest())),
        )
        .issuer(
            DistinguishedName::builder()
                .common_name("Endorsement CA".to_string())
                .organization("Example Corp".to_string())
                .country("US".to_string())
                .build(),
        )
        .subject(
            DistinguishedName::builder()
                .common_name("attestation key".to_string())
                .build(),
        )
        .build();
    PartialCertificate::build(&params).unwrap()
}

/// An issuer key able to sign with `algorithm`.
pub fn issuer_key(algorithm: SignatureAlgorithm) -> KeyPair {
    match algorithm.key_type() {
        KeyType::Rsa => KeyPair::generate_rsa(2048).unwrap(),
        _ => KeyPair::generate_ecdsa_p256(),
    }
}

/// Signs conventionally, assembles from the split halves and checks both
/// certificates are byte-identical and verify under the issuer key.
pub fn simulate_and_assemble(
    partial: &PartialCertificate,
    subject_key: &PublicKey,
    issuer: &KeyPair,
    algorithm: SignatureAlgorithm,
) -> Certificate {
    let simulated = simulate(partial, subject_key, issuer, algorithm.name()).unwrap();
    let assembled = assemble(
        partial,
        &simulated.added_to,
        simulated.certificate.signature_bytes(),
    )
    .unwrap();
    compare_certificates(&simulated.certificate, &assembled).unwrap();
    assembled.verify(&issuer.public_key()).unwrap();
    assembled
}
