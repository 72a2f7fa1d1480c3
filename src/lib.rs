//! Enveloped XMLDSig signatures for CFDI cancellation documents.
//!
//! The profile is fixed: inclusive C14N 1.0 without comments, SHA-1 digest,
//! RSA-SHA1 signature and a `KeyInfo` carrying the issuer/serial pair, the
//! raw certificate and the RSA public key components.
//!
//! ```no_run
//! use xml_cancelacion::{Credentials, Document, DocumentSigner};
//!
//! # fn main() -> xml_cancelacion::Result<()> {
//! let mut document = Document::parse(r#"<Cancelacion xmlns="http://cancelacfd.sat.gob.mx"/>"#)?;
//! let credentials = Credentials::new("certificate.cer", "private.key.pem", "12345678a");
//! DocumentSigner::new(&mut document).sign(&credentials)?;
//! println!("{}", document.to_xml_string()?);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate serde_derive;

pub mod answer;
pub mod c14n;
pub mod certificate;
pub mod credentials;
pub mod document;
pub mod error;
pub mod key;
pub mod key_info;
pub mod proto;
pub mod signer;

pub use answer::CancellationAnswer;
pub use certificate::{Certificate, CertificateAdapter, OpensslCertificates, PublicKeyAlgorithm};
pub use credentials::{CertificateSource, Credentials};
pub use document::{Document, NodeId};
pub use error::{Error, Result};
pub use key::{KeyHandle, KeyMaterial, OpensslKeys};
pub use signer::{DocumentSigner, SignerState, SigningResult};

pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";

pub const DIGEST_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

pub const TRANSFORM_ENVELOPED_SIGNATURE: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

pub const CANONICAL_1_0: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

pub const SIGNATURE_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
