use std::io;

use ferroas2_core::As2Error;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Security error: {0}")]
    Security(String),

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("Private key not found: {0}")]
    PrivateKeyNotFound(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("MIME error: {0}")]
    Mime(String),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for As2Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Security(msg) => As2Error::Security(msg),
            CryptoError::CertificateNotFound(id) => As2Error::CertificateNotFound(id),
            CryptoError::PrivateKeyNotFound(id) => {
                As2Error::CertificateNotFound(format!("private key for {}", id))
            }
            CryptoError::UnsupportedAlgorithm(alg) => {
                As2Error::Security(format!("Unsupported algorithm: {}", alg))
            }
            CryptoError::Mime(msg) => As2Error::Mime(msg),
            CryptoError::OpenSsl(e) => As2Error::Security(e.to_string()),
            CryptoError::Io(e) => As2Error::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroas2_core::ErrorMetadata;

    #[test]
    fn test_conversion_into_as2_error() {
        let err: As2Error = CryptoError::Security("signature mismatch".into()).into();
        assert_eq!(err.error_code(), "SECURITY_ERROR");
        assert_eq!(err.to_string(), "Security error: signature mismatch");

        let err: As2Error = CryptoError::PrivateKeyNotFound("mycompany".into()).into();
        assert_eq!(err.error_code(), "CERTIFICATE_NOT_FOUND");

        let err: As2Error = CryptoError::Mime("no boundary".into()).into();
        assert_eq!(err.error_code(), "MIME_ERROR");
    }
}
