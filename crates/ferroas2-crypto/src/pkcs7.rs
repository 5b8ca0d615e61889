//! Detached PKCS#7 signing with an explicit digest, and verification that accepts
//! a signature when any one of its signers matches the given certificate.
//!
//! The `openssl` crate only wraps `PKCS7_sign` (default digest) and `PKCS7_verify`
//! (every signer must verify), so these go through libcrypto directly.

use std::ffi::{c_int, c_void};
use std::marker::PhantomData;
use std::ptr;

use foreign_types::{ForeignType, ForeignTypeRef};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags, Pkcs7Ref};
use openssl::pkey::{PKeyRef, Private};
use openssl::x509::X509Ref;
use openssl_sys::{BIO, EVP_MD, EVP_PKEY, PKCS7, X509};

use crate::error::{CryptoError, CryptoResult};

extern "C" {
    fn PKCS7_sign(
        signcert: *mut X509,
        pkey: *mut EVP_PKEY,
        certs: *mut c_void,
        data: *mut BIO,
        flags: c_int,
    ) -> *mut PKCS7;
    fn PKCS7_sign_add_signer(
        p7: *mut PKCS7,
        signcert: *mut X509,
        pkey: *mut EVP_PKEY,
        md: *const EVP_MD,
        flags: c_int,
    ) -> *mut c_void;
    fn PKCS7_final(p7: *mut PKCS7, data: *mut BIO, flags: c_int) -> c_int;
    fn PKCS7_dataInit(p7: *mut PKCS7, bio: *mut BIO) -> *mut BIO;
    fn PKCS7_get_signer_info(p7: *mut PKCS7) -> *mut c_void;
    fn PKCS7_signatureVerify(
        bio: *mut BIO,
        p7: *mut PKCS7,
        si: *mut c_void,
        x509: *mut X509,
    ) -> c_int;
    fn OPENSSL_sk_num(stack: *const c_void) -> c_int;
    fn OPENSSL_sk_value(stack: *const c_void, index: c_int) -> *mut c_void;
    fn BIO_new_mem_buf(buf: *const c_void, len: c_int) -> *mut BIO;
    fn BIO_read(bio: *mut BIO, data: *mut c_void, len: c_int) -> c_int;
    fn BIO_free_all(bio: *mut BIO);
}

/// An owned BIO (or BIO chain) ending in a read-only view of borrowed bytes.
struct Bio<'a> {
    ptr: *mut BIO,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> Bio<'a> {
    fn from_slice(data: &'a [u8]) -> CryptoResult<Self> {
        let len = c_int::try_from(data.len()).map_err(|_| {
            CryptoError::Security(format!("Content of {} bytes is too large", data.len()))
        })?;
        let ptr = unsafe { BIO_new_mem_buf(data.as_ptr() as *const c_void, len) };
        if ptr.is_null() {
            return Err(ErrorStack::get().into());
        }
        Ok(Self {
            ptr,
            _data: PhantomData,
        })
    }

    /// Give up ownership to a chain that now frees this BIO.
    fn release(self) -> PhantomData<&'a [u8]> {
        std::mem::forget(self);
        PhantomData
    }
}

impl Drop for Bio<'_> {
    fn drop(&mut self) {
        unsafe { BIO_free_all(self.ptr) }
    }
}

/// Detached signature over `content` with one SignerInfo per `(cert, key)` pair, all
/// using `digest`. Signer certificates are embedded.
pub(crate) fn sign_detached(
    signers: &[(&X509Ref, &PKeyRef<Private>)],
    digest: MessageDigest,
    content: &[u8],
) -> CryptoResult<Pkcs7> {
    let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY;
    let data = Bio::from_slice(content)?;

    unsafe {
        let p7 = PKCS7_sign(
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            (flags | Pkcs7Flags::PARTIAL).bits(),
        );
        if p7.is_null() {
            return Err(ErrorStack::get().into());
        }
        let p7 = Pkcs7::from_ptr(p7);

        for (cert, key) in signers {
            let info = PKCS7_sign_add_signer(
                p7.as_ptr(),
                cert.as_ptr(),
                key.as_ptr(),
                digest.as_ptr(),
                flags.bits(),
            );
            if info.is_null() {
                return Err(ErrorStack::get().into());
            }
        }

        if PKCS7_final(p7.as_ptr(), data.ptr, flags.bits()) != 1 {
            return Err(ErrorStack::get().into());
        }
        Ok(p7)
    }
}

/// Succeeds when at least one SignerInfo of `p7` is a valid signature by `cert` over
/// the detached `content`. Embedded certificates are ignored.
pub(crate) fn verify_any_signer(
    p7: &Pkcs7Ref,
    cert: &X509Ref,
    content: &[u8],
) -> CryptoResult<()> {
    let data = Bio::from_slice(content)?;

    unsafe {
        let signer_infos = PKCS7_get_signer_info(p7.as_ptr());
        let count = if signer_infos.is_null() {
            0
        } else {
            OPENSSL_sk_num(signer_infos)
        };
        if count <= 0 {
            return Err(CryptoError::Security(
                "Signature verification failed: no signer information".to_string(),
            ));
        }

        let chain = PKCS7_dataInit(p7.as_ptr(), data.ptr);
        if chain.is_null() {
            return Err(CryptoError::Security(format!(
                "Signature verification failed: {}",
                ErrorStack::get()
            )));
        }
        let chain = Bio {
            ptr: chain,
            _data: data.release(),
        };

        // run the content through the digest BIOs
        let mut buf = [0u8; 4096];
        while BIO_read(chain.ptr, buf.as_mut_ptr() as *mut c_void, buf.len() as c_int) > 0 {}

        let verified = (0..count).any(|i| {
            let info = OPENSSL_sk_value(signer_infos, i);
            !info.is_null()
                && PKCS7_signatureVerify(chain.ptr, p7.as_ptr(), info, cert.as_ptr()) == 1
        });

        let errors = ErrorStack::get();
        if verified {
            Ok(())
        } else {
            Err(CryptoError::Security(format!(
                "Signature verification failed: none of {} signer(s) matches the certificate: {}",
                count, errors
            )))
        }
    }
}
