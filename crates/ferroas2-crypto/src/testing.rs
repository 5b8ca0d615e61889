//! Throwaway identities for tests.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};

use crate::certs::MemoryCertificateStore;

/// Self-signed RSA 2048 certificate with `CN=<common_name>`, valid for a year.
pub fn generate_identity(common_name: &str) -> (X509, PKey<Private>) {
    try_generate_identity(common_name).expect("failed to generate test identity")
}

fn try_generate_identity(
    common_name: &str,
) -> Result<(X509, PKey<Private>), openssl::error::ErrorStack> {
    let key = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("CN", common_name)?;
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(64, MsbOption::MAYBE_ZERO, false)?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial: openssl::asn1::Asn1Integer = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    let not_before: Asn1Time = Asn1Time::days_from_now(0)?;
    let not_after: Asn1Time = Asn1Time::days_from_now(365)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.sign(&key, MessageDigest::sha256())?;

    Ok((builder.build(), key))
}

/// Two stores for a pair of trading partners: each holds its own identity and the
/// other side's certificate.
pub fn paired_stores(first: &str, second: &str) -> (MemoryCertificateStore, MemoryCertificateStore) {
    let (first_cert, first_key) = generate_identity(first);
    let (second_cert, second_key) = generate_identity(second);

    let first_store = MemoryCertificateStore::new()
        .with_identity(first, first_cert.clone(), first_key)
        .with_certificate(second, second_cert.clone());
    let second_store = MemoryCertificateStore::new()
        .with_identity(second, second_cert, second_key)
        .with_certificate(first, first_cert);

    (first_store, second_store)
}
