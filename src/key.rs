//! Private key access for RSA-SHA1 signing.
//!
//! A [`KeyHandle`] is a scoped resource: the key is released when the handle
//! is dropped, so every exit path of a signing releases it.

use std::path::Path;

use log::debug;
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Private};
use zeroize::Zeroizing;

use crate::certificate::is_pem;
use crate::error::{Error, Result};

pub trait KeyHandle {
    /// RSA PKCS#1 v1.5 signature over the SHA-1 digest of `data`.
    fn sign_rsa_sha1(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn close(self)
    where
        Self: Sized,
    {
        drop(self)
    }
}

pub trait KeyMaterial {
    type Handle: KeyHandle;

    fn open(&self, path: &Path, pass_phrase: &str) -> Result<Self::Handle>;
}

/// Reads PEM (PKCS#1 or PKCS#8, encrypted or not) and DER PKCS#8 keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslKeys;

impl KeyMaterial for OpensslKeys {
    type Handle = OpensslKey;

    fn open(&self, path: &Path, pass_phrase: &str) -> Result<OpensslKey> {
        let contents = Zeroizing::new(
            std::fs::read(path)
                .map_err(|e| Error::KeyLoad(format!("unable to read {}: {}", path.display(), e)))?,
        );
        let pkey = decode_private_key(&contents, pass_phrase)?;
        if pkey.id() != Id::RSA {
            return Err(Error::KeyLoad(format!("unsupported key format {:?}", pkey.id())));
        }

        debug!("opened private key {}", path.display());
        Ok(OpensslKey { pkey })
    }
}

fn decode_private_key(contents: &[u8], pass_phrase: &str) -> Result<PKey<Private>> {
    let decoded = if is_pem(contents) {
        PKey::private_key_from_pem_passphrase(contents, pass_phrase.as_bytes())
    } else if pass_phrase.is_empty() {
        PKey::private_key_from_der(contents)
    } else {
        PKey::private_key_from_pkcs8_passphrase(contents, pass_phrase.as_bytes())
    };

    decoded.map_err(|e| Error::KeyLoad(format!("unable to open private key: {}", e)))
}

pub struct OpensslKey {
    pkey: PKey<Private>,
}

impl KeyHandle for OpensslKey {
    fn sign_rsa_sha1(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut signer = openssl::sign::Signer::new(MessageDigest::sha1(), &self.pkey)
            .map_err(|e| Error::Signing(format!("openssl error: {}", e)))?;

        signer
            .update(data)
            .map_err(|e| Error::Signing(format!("openssl error: {}", e)))?;

        signer
            .sign_to_vec()
            .map_err(|e| Error::Signing(format!("openssl error: {}", e)))
    }
}

impl Drop for OpensslKey {
    fn drop(&mut self) {
        debug!("private key released");
    }
}
