//! Error kinds raised while signing a document.

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The certificate could not be read or decoded.
    #[error("unable to load certificate: {0}")]
    CertificateLoad(String),

    /// Bad key path, wrong passphrase or corrupt key.
    #[error("unable to load private key: {0}")]
    KeyLoad(String),

    /// The certificate decoded but its public key could not be extracted.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The node is not an element of the document or the tree is unbalanced.
    #[error("unable to canonicalize: {0}")]
    Canonicalization(String),

    /// The document could not be parsed or written.
    #[error("xml error: {0}")]
    Xml(String),

    /// The key loaded but producing the signature failed.
    #[error("unable to sign: {0}")]
    Signing(String),

    /// `sign` was already called on this signer.
    #[error("signer has already been used")]
    AlreadySigned,

    /// The string is neither `Aceptacion` nor `Rechazo`.
    #[error("unknown cancellation answer: {0}")]
    UnknownAnswer(String),
}
