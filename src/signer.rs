//! Enveloped signature of a whole document.
//!
//! The order of the steps is part of the format. The document digest is
//! taken before the `Signature` element exists, and `SignedInfo` is
//! canonicalized only after it has been attached under `Signature` under the
//! root, so the namespaces declared by the document are part of what gets
//! signed.

use log::{debug, trace};
use openssl::hash::MessageDigest;

use crate::certificate::{CertificateAdapter, OpensslCertificates};
use crate::credentials::Credentials;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::key::{KeyHandle, KeyMaterial, OpensslKeys};
use crate::key_info::key_info;
use crate::proto::ds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerState {
    Init,
    DigestComputed,
    SignatureNodeAttached,
    SignedInfoCanonicalized,
    Signed,
    KeyInfoAttached,
}

/// Intermediate values of a successful signing, kept for audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningResult {
    digest_source: String,
    digest_value: String,
    signed_info_source: String,
    signed_info_value: String,
}

impl SigningResult {
    /// Canonical form of the document before the signature was appended.
    pub fn digest_source(&self) -> &str {
        &self.digest_source
    }

    /// Base64 SHA-1 of [`digest_source`](Self::digest_source).
    pub fn digest_value(&self) -> &str {
        &self.digest_value
    }

    /// Canonical form of `SignedInfo` as attached to the document.
    pub fn signed_info_source(&self) -> &str {
        &self.signed_info_source
    }

    /// Base64 RSA-SHA1 signature of [`signed_info_source`](Self::signed_info_source).
    pub fn signed_info_value(&self) -> &str {
        &self.signed_info_value
    }
}

pub struct DocumentSigner<'a, C = OpensslCertificates, K = OpensslKeys> {
    document: &'a mut Document,
    certificates: C,
    keys: K,
    state: SignerState,
    result: SigningResult,
}

impl<'a> DocumentSigner<'a> {
    pub fn new(document: &'a mut Document) -> Self {
        Self::with_adapters(document, OpensslCertificates, OpensslKeys)
    }
}

impl<'a, C: CertificateAdapter, K: KeyMaterial> DocumentSigner<'a, C, K> {
    pub fn with_adapters(document: &'a mut Document, certificates: C, keys: K) -> Self {
        DocumentSigner {
            document,
            certificates,
            keys,
            state: SignerState::Init,
            result: SigningResult::default(),
        }
    }

    pub fn state(&self) -> SignerState {
        self.state
    }

    pub fn result(&self) -> &SigningResult {
        &self.result
    }

    pub fn digest_source(&self) -> &str {
        self.result.digest_source()
    }

    pub fn digest_value(&self) -> &str {
        self.result.digest_value()
    }

    pub fn signed_info_source(&self) -> &str {
        self.result.signed_info_source()
    }

    pub fn signed_info_value(&self) -> &str {
        self.result.signed_info_value()
    }

    /// Appends the `Signature` element to the document root.
    ///
    /// On error the document may already hold a partial `Signature`
    /// element and must be discarded.
    pub fn sign(&mut self, credentials: &Credentials) -> Result<&SigningResult> {
        if self.state != SignerState::Init {
            return Err(Error::AlreadySigned);
        }

        let root = self.document.root()?;
        let certificate = self.certificates.load(credentials.certificate())?;
        let key_info = key_info(&certificate)?;

        let digest_source = self.document.canonicalize()?;
        let digest_value = base64::encode(sha1(digest_source.as_bytes())?);
        trace!("digest source: {}", digest_source);
        self.advance(SignerState::DigestComputed);

        let signature = ds::OuterSignature {
            signature: ds::Signature {
                signed_info: ds::SignedInfo::enveloped(digest_value.clone()),
                signature_value: None,
                key_info: None,
            },
        };
        let signature = self
            .document
            .append_child(root, ds::to_events(&signature)?)?;
        let signed_info = match self.document.children(signature).first() {
            Some(s) => *s,
            None => return Err(Error::Xml("SignedInfo was not attached".to_string())),
        };
        self.advance(SignerState::SignatureNodeAttached);

        let signed_info_source = self.document.canonicalize_node(signed_info)?;
        trace!("signed info source: {}", signed_info_source);
        self.advance(SignerState::SignedInfoCanonicalized);

        let signature_bytes = {
            let key = self
                .keys
                .open(credentials.private_key_path(), credentials.pass_phrase())?;
            let signed = key.sign_rsa_sha1(signed_info_source.as_bytes());
            key.close();
            signed?
        };
        let signed_info_value = base64::encode(&signature_bytes);
        self.advance(SignerState::Signed);

        let signature_value = ds::OuterSignatureValue {
            signature_value: ds::SignatureValue {
                value: signed_info_value.clone(),
            },
        };
        self.document
            .append_child(signature, ds::to_events(&signature_value)?)?;
        self.document
            .append_child(signature, ds::to_events(&ds::OuterKeyInfo { key_info })?)?;
        self.advance(SignerState::KeyInfoAttached);

        self.result = SigningResult {
            digest_source,
            digest_value,
            signed_info_source,
            signed_info_value,
        };
        Ok(&self.result)
    }

    fn advance(&mut self, state: SignerState) {
        debug!("signer state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

fn sha1(data: &[u8]) -> Result<openssl::hash::DigestBytes> {
    openssl::hash::hash(MessageDigest::sha1(), data)
        .map_err(|e| Error::Signing(format!("openssl error: {}", e)))
}
