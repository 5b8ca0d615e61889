//! AS2 algorithm aliases and their OpenSSL counterparts.

use std::fmt;

use openssl::hash::MessageDigest;
use openssl::symm::Cipher;

/// Digest used for signatures and MICs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    #[default]
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Case-insensitive lookup of an AS2 digest alias (`SHA1`, `sha-256`, `md5`, ...).
    pub fn parse(alias: &str) -> Option<Self> {
        match alias.trim().to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "SHA1" | "SHA-1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" => Some(Self::Sha256),
            "SHA384" | "SHA-384" => Some(Self::Sha384),
            "SHA512" | "SHA-512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Like [`parse`](Self::parse) but falls back to SHA1 for blank or unknown aliases.
    pub fn from_alias(alias: &str) -> Self {
        Self::parse(alias).unwrap_or_default()
    }

    /// Name used in the `micalg` parameter of `multipart/signed`.
    pub fn micalg(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }

    pub fn message_digest(&self) -> MessageDigest {
        match self {
            Self::Md5 => MessageDigest::md5(),
            Self::Sha1 => MessageDigest::sha1(),
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.micalg())
    }
}

/// Content-encryption cipher for enveloped data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CipherAlgorithm {
    #[default]
    TripleDes,
    Rc2,
    Aes128,
    Aes192,
    Aes256,
}

impl CipherAlgorithm {
    pub fn parse(alias: &str) -> Option<Self> {
        match alias.trim().to_ascii_uppercase().as_str() {
            "3DES" | "DES3" | "TRIPLEDES" | "DES-EDE3" => Some(Self::TripleDes),
            "RC2" | "RC2-CBC" => Some(Self::Rc2),
            "AES128" | "AES-128" => Some(Self::Aes128),
            "AES192" | "AES-192" => Some(Self::Aes192),
            "AES256" | "AES-256" => Some(Self::Aes256),
            _ => None,
        }
    }

    /// Unknown aliases fall back to 3DES.
    pub fn from_alias(alias: &str) -> Self {
        match Self::parse(alias) {
            Some(cipher) => cipher,
            None => {
                tracing::debug!(alias = %alias, "Unknown cipher alias, using 3DES");
                Self::default()
            }
        }
    }

    pub fn cipher(&self) -> Cipher {
        match self {
            Self::TripleDes => Cipher::des_ede3_cbc(),
            Self::Rc2 => Cipher::rc2_cbc(),
            Self::Aes128 => Cipher::aes_128_cbc(),
            Self::Aes192 => Cipher::aes_192_cbc(),
            Self::Aes256 => Cipher::aes_256_cbc(),
        }
    }
}
