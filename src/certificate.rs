//! Certificate access for `KeyInfo` assembly.

use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::x509::{X509NameRef, X509};

use crate::credentials::CertificateSource;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Other,
}

pub trait Certificate {
    /// Issuer distinguished name, RFC 4514 string form.
    fn issuer_name(&self) -> Result<String>;

    fn serial_decimal(&self) -> Result<String>;

    fn pem_contents(&self) -> Result<String>;

    fn public_key_algorithm(&self) -> Result<PublicKeyAlgorithm>;

    /// Big-endian RSA modulus.
    fn rsa_modulus_bytes(&self) -> Result<Vec<u8>>;

    /// Big-endian RSA public exponent.
    fn rsa_exponent_bytes(&self) -> Result<Vec<u8>>;
}

pub trait CertificateAdapter {
    type Certificate: Certificate;

    fn load(&self, source: &CertificateSource) -> Result<Self::Certificate>;
}

/// Loads PEM or DER certificates with openssl.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslCertificates;

impl CertificateAdapter for OpensslCertificates {
    type Certificate = OpensslCertificate;

    fn load(&self, source: &CertificateSource) -> Result<OpensslCertificate> {
        let contents = match source {
            CertificateSource::Path(path) => std::fs::read(path).map_err(|e| {
                Error::CertificateLoad(format!("unable to read {}: {}", path.display(), e))
            })?,
            CertificateSource::Bytes(bytes) => bytes.clone(),
        };

        OpensslCertificate::from_bytes(&contents)
    }
}

#[derive(Debug, Clone)]
pub struct OpensslCertificate {
    x509: X509,
}

impl OpensslCertificate {
    pub fn from_bytes(contents: &[u8]) -> Result<Self> {
        let x509 = if is_pem(contents) {
            X509::from_pem(contents)
        } else {
            X509::from_der(contents)
        }
        .map_err(|e| Error::CertificateLoad(format!("error decoding X509 cert: {}", e)))?;

        Ok(OpensslCertificate { x509 })
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    fn public_key(&self) -> Result<PKey<Public>> {
        self.x509.public_key().map_err(|e| {
            Error::InvalidCertificate(format!("cannot read public key from certificate: {}", e))
        })
    }

    fn rsa_public_key(&self) -> Result<openssl::rsa::Rsa<Public>> {
        self.public_key()?
            .rsa()
            .map_err(|e| Error::InvalidCertificate(format!("public key is not RSA: {}", e)))
    }
}

impl Certificate for OpensslCertificate {
    fn issuer_name(&self) -> Result<String> {
        Ok(x509_name_to_string(self.x509.issuer_name()))
    }

    fn serial_decimal(&self) -> Result<String> {
        self.x509
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_dec_str())
            .map(|dec| dec.to_string())
            .map_err(|e| Error::CertificateLoad(format!("error reading serial number: {}", e)))
    }

    fn pem_contents(&self) -> Result<String> {
        let pem = self
            .x509
            .to_pem()
            .map_err(|e| Error::CertificateLoad(format!("error encoding X509 cert: {}", e)))?;
        String::from_utf8(pem).map_err(|e| Error::CertificateLoad(e.to_string()))
    }

    fn public_key_algorithm(&self) -> Result<PublicKeyAlgorithm> {
        Ok(match self.public_key()?.id() {
            Id::RSA => PublicKeyAlgorithm::Rsa,
            _ => PublicKeyAlgorithm::Other,
        })
    }

    fn rsa_modulus_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.rsa_public_key()?.n().to_vec())
    }

    fn rsa_exponent_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.rsa_public_key()?.e().to_vec())
    }
}

pub(crate) fn is_pem(contents: &[u8]) -> bool {
    let start = contents
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(contents.len());
    contents[start..].starts_with(b"-----BEGIN")
}

/// Renders a distinguished name the RFC 4514 way: most specific RDN first,
/// `SN=value` pairs joined with commas.
pub fn x509_name_to_string(name: &X509NameRef) -> String {
    let entries = name.entries().collect::<Vec<_>>();
    entries
        .iter()
        .rev()
        .map(|e| {
            let object = e.object();
            let attribute_type = match object.nid().short_name() {
                Ok(sn) if object.nid() != Nid::UNDEF => sn.to_string(),
                _ => object.to_string(),
            };
            format!(
                "{}={}",
                attribute_type,
                match e.data().as_utf8() {
                    Ok(d) => escape_attribute_value(&d),
                    Err(_) => String::new(),
                }
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_attribute_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let needs_escape = matches!(c, '"' | '+' | ',' | ';' | '<' | '>' | '\\')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
