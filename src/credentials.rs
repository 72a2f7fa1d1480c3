use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

/// Where the signing certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    Path(PathBuf),
    /// PEM or DER contents.
    Bytes(Vec<u8>),
}

/// Certificate, private key and passphrase used for one signing.
#[derive(Debug)]
pub struct Credentials {
    certificate: CertificateSource,
    private_key_path: PathBuf,
    pass_phrase: SecretString,
}

impl Credentials {
    pub fn new(
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
        pass_phrase: impl Into<String>,
    ) -> Self {
        Credentials {
            certificate: CertificateSource::Path(certificate_path.into()),
            private_key_path: private_key_path.into(),
            pass_phrase: SecretString::new(pass_phrase.into()),
        }
    }

    pub fn with_certificate_bytes(
        certificate: impl Into<Vec<u8>>,
        private_key_path: impl Into<PathBuf>,
        pass_phrase: impl Into<String>,
    ) -> Self {
        Credentials {
            certificate: CertificateSource::Bytes(certificate.into()),
            private_key_path: private_key_path.into(),
            pass_phrase: SecretString::new(pass_phrase.into()),
        }
    }

    pub fn certificate(&self) -> &CertificateSource {
        &self.certificate
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    pub fn pass_phrase(&self) -> &str {
        self.pass_phrase.expose_secret()
    }
}
