//! S/MIME envelope operations
//!
//! Every operation maps one [`MimeEntity`] to another:
//!
//! - [`sign`] wraps an entity in `multipart/signed` with a detached PKCS#7 signature
//! - [`encrypt`] turns an entity into `application/pkcs7-mime` enveloped data
//! - [`decrypt`] and [`verify_and_unwrap`] undo those, failing with
//!   [`CryptoError::Security`] when the input is not what it claims to be
//!
//! Signing happens before encryption, so a signed-and-encrypted message is
//! `encrypt(sign(content))`.

use bytes::Bytes;
use ferroas2_core::constants::header;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKeyRef, Private};
use openssl::stack::Stack;
use openssl::x509::{X509Ref, X509};

use crate::algorithm::{CipherAlgorithm, DigestAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::mime::{encode_base64_lines, MimeEntity};
use crate::pkcs7;

const MULTIPART_SIGNED: &str = "multipart/signed";
const PKCS7_MIME_TYPES: [&str; 2] = ["application/pkcs7-mime", "application/x-pkcs7-mime"];
const PKCS7_SIGNATURE_TYPES: [&str; 2] = [
    "application/pkcs7-signature",
    "application/x-pkcs7-signature",
];
const ENVELOPED_DATA: &str = "enveloped-data";

pub fn is_signed(entity: &MimeEntity) -> bool {
    entity.is_mime_type(MULTIPART_SIGNED)
}

pub fn is_encrypted(entity: &MimeEntity) -> bool {
    let mime_type = entity.mime_type();
    if !PKCS7_MIME_TYPES.contains(&mime_type.as_str()) {
        return false;
    }
    entity
        .content_type_param("smime-type")
        .map(|t| t.eq_ignore_ascii_case(ENVELOPED_DATA))
        .unwrap_or(true)
}

fn single_cert_stack(cert: &X509Ref) -> CryptoResult<Stack<X509>> {
    let mut certs = Stack::new()?;
    certs.push(cert.to_owned())?;
    Ok(certs)
}

pub fn sign(
    entity: &MimeEntity,
    cert: &X509Ref,
    key: &PKeyRef<Private>,
    digest: DigestAlgorithm,
) -> CryptoResult<MimeEntity> {
    let content = entity.to_bytes();
    let signed = pkcs7::sign_detached(&[(cert, key)], digest.message_digest(), &content)?;
    Ok(multipart_signed(entity, &signed.to_der()?, digest))
}

fn multipart_signed(
    entity: &MimeEntity,
    signature_der: &[u8],
    digest: DigestAlgorithm,
) -> MimeEntity {
    let signature = MimeEntity::from_content(
        "application/pkcs7-signature; name=smime.p7s",
        encode_base64_lines(signature_der),
    )
    .with_header(header::CONTENT_TRANSFER_ENCODING, "base64")
    .with_header(header::CONTENT_DISPOSITION, "attachment; filename=smime.p7s");

    let content_type = format!(
        "{}; protocol=\"application/pkcs7-signature\"; micalg={}",
        MULTIPART_SIGNED,
        digest.micalg()
    );
    MimeEntity::multipart(&content_type, &[entity.clone(), signature])
}

pub fn encrypt(
    entity: &MimeEntity,
    cert: &X509Ref,
    cipher: CipherAlgorithm,
) -> CryptoResult<MimeEntity> {
    let recipients = single_cert_stack(cert)?;
    let enveloped = Pkcs7::encrypt(
        &recipients,
        &entity.to_bytes(),
        cipher.cipher(),
        Pkcs7Flags::BINARY,
    )?;

    Ok(MimeEntity::from_content(
        "application/pkcs7-mime; smime-type=enveloped-data; name=smime.p7m",
        Bytes::from(enveloped.to_der()?),
    )
    .with_header(header::CONTENT_TRANSFER_ENCODING, "binary")
    .with_header(header::CONTENT_DISPOSITION, "attachment; filename=smime.p7m"))
}

pub fn decrypt(
    entity: &MimeEntity,
    cert: &X509Ref,
    key: &PKeyRef<Private>,
) -> CryptoResult<MimeEntity> {
    if !is_encrypted(entity) {
        return Err(CryptoError::Security(format!(
            "Content-Type '{}' does not declare enveloped data",
            entity.content_type()
        )));
    }

    let der = entity.decoded_body()?;
    let enveloped = Pkcs7::from_der(&der).map_err(|e| {
        CryptoError::Security(format!("Unable to read enveloped data: {}", e))
    })?;
    let plain = enveloped
        .decrypt(key, cert, Pkcs7Flags::BINARY)
        .map_err(|e| {
            CryptoError::Security(format!(
                "No recipient matches the certificate, or the data could not be decrypted: {}",
                e
            ))
        })?;

    MimeEntity::parse(plain)
}

/// Check the detached signature against `cert` and return the signed content.
///
/// At least one signer must be `cert` itself; other signers are ignored, certificates
/// embedded in the signature are not trusted and no chain validation is done.
pub fn verify_and_unwrap(entity: &MimeEntity, cert: &X509Ref) -> CryptoResult<MimeEntity> {
    if !is_signed(entity) {
        return Err(CryptoError::Security(format!(
            "Content-Type '{}' is not {}",
            entity.content_type(),
            MULTIPART_SIGNED
        )));
    }

    let mut parts = entity.parts()?;
    if parts.len() < 2 {
        return Err(CryptoError::Security(format!(
            "{} entity has {} part(s), expected content and signature",
            MULTIPART_SIGNED,
            parts.len()
        )));
    }
    let signature = parts.remove(1);
    let content = parts.remove(0);

    if !PKCS7_SIGNATURE_TYPES.contains(&signature.mime_type().as_str()) {
        return Err(CryptoError::Security(format!(
            "Unexpected signature part type '{}'",
            signature.content_type()
        )));
    }

    let der = signature.decoded_body()?;
    let signed = Pkcs7::from_der(&der)
        .map_err(|e| CryptoError::Security(format!("Unable to read signature: {}", e)))?;
    pkcs7::verify_any_signer(&signed, cert, &content.to_bytes())?;

    tracing::debug!(content_type = %content.content_type(), "Signature verified");
    Ok(content)
}
