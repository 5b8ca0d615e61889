//! Ferroas2 Crypto
//!
//! Byte-exact MIME entities and the S/MIME operations AS2 layers over them:
//! detached signing, enveloping, decryption, signature verification and the
//! message integrity check (MIC) that receipts echo back.

pub mod algorithm;
pub mod certs;
pub mod envelope;
pub mod error;
pub mod mic;
pub mod mime;
mod pkcs7;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use algorithm::{CipherAlgorithm, DigestAlgorithm};
pub use certs::{CertificateStore, MemoryCertificateStore, PemDirectoryStore};
pub use envelope::{decrypt, encrypt, is_encrypted, is_signed, sign, verify_and_unwrap};
pub use error::{CryptoError, CryptoResult};
pub use mic::{compute_mic, mic_input, validate_returned_mic};
pub use mime::MimeEntity;
