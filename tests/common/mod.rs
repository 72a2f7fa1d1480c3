#![allow(dead_code)]

use std::path::PathBuf;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use xml::reader::XmlEvent;

use xml_cancelacion::{Credentials, Document, NodeId, XMLDSIG_NAMESPACE};

pub const PASS_PHRASE: &str = "12345678a";

pub const SERIAL: &str = "292233162870206001759766198425879490508935868472";

pub const ISSUER: &str = "CN=AC UAT,O=Servicio de Administracion Tributaria,C=MX";

/// Key pair and certificate written to a scratch directory.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub pkey: PKey<Private>,
    pub certificate: X509,
    pub certificate_path: PathBuf,
    pub pem_key_path: PathBuf,
    pub der_key_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = pretty_env_logger::try_init();

        let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let certificate = build_certificate(&pkey);
        let dir = tempfile::tempdir().unwrap();

        let certificate_path = dir.path().join("certificate.cer");
        std::fs::write(&certificate_path, certificate.to_der().unwrap()).unwrap();

        let pem_key_path = dir.path().join("private.key.pem");
        std::fs::write(
            &pem_key_path,
            pkey.private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), PASS_PHRASE.as_bytes())
                .unwrap(),
        )
        .unwrap();

        let der_key_path = dir.path().join("private.key");
        std::fs::write(
            &der_key_path,
            pkey.private_key_to_pkcs8_passphrase(Cipher::des_ede3_cbc(), PASS_PHRASE.as_bytes())
                .unwrap(),
        )
        .unwrap();

        Fixture {
            dir,
            pkey,
            certificate,
            certificate_path,
            pem_key_path,
            der_key_path,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.certificate_path, &self.pem_key_path, PASS_PHRASE)
    }
}

pub fn build_certificate(pkey: &PKey<Private>) -> X509 {
    let mut subject = X509NameBuilder::new().unwrap();
    subject.append_entry_by_text("CN", "Contribuyente de prueba").unwrap();
    let subject = subject.build();

    let mut issuer = X509NameBuilder::new().unwrap();
    issuer.append_entry_by_text("C", "MX").unwrap();
    issuer
        .append_entry_by_text("O", "Servicio de Administracion Tributaria")
        .unwrap();
    issuer.append_entry_by_text("CN", "AC UAT").unwrap();
    let issuer = issuer.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_dec_str(SERIAL).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&issuer).unwrap();
    builder.set_pubkey(pkey).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    builder.sign(pkey, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Certificate over a P-256 key, signed by itself.
pub fn ec_certificate() -> X509 {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let pkey = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
    build_certificate(&pkey)
}

pub fn child(document: &Document, parent: NodeId, local_name: &str) -> NodeId {
    document
        .find_child(parent, XMLDSIG_NAMESPACE, local_name)
        .unwrap_or_else(|| panic!("missing {}", local_name))
}

pub fn signature(document: &Document) -> NodeId {
    child(document, document.root().unwrap(), "Signature")
}

/// Drops the `Signature` element that is a direct child of the root.
fn strip_enveloped_signature(events: &[XmlEvent]) -> Vec<XmlEvent> {
    let mut level = 0;
    let mut output = vec![];
    let mut should_output = true;

    for evt in events {
        match evt {
            XmlEvent::StartElement { name, .. } => {
                level += 1;
                if level == 2
                    && name.namespace.as_deref() == Some(XMLDSIG_NAMESPACE)
                    && name.local_name == "Signature"
                {
                    should_output = false
                }
                if should_output {
                    output.push(evt.clone());
                }
            }
            XmlEvent::EndElement { name } => {
                if should_output {
                    output.push(evt.clone());
                }
                if level == 2
                    && name.namespace.as_deref() == Some(XMLDSIG_NAMESPACE)
                    && name.local_name == "Signature"
                {
                    should_output = true;
                }
                level -= 1;
            }
            e => {
                if should_output {
                    output.push(e.clone());
                }
            }
        }
    }

    output
}

/// Checks a serialized signed document the way a relying party would:
/// digest of the document without its signature, then the RSA-SHA1
/// signature of `SignedInfo` against the embedded certificate.
pub fn verify(signed_xml: &str) -> Result<(), String> {
    let document = Document::parse(signed_xml).map_err(|e| e.to_string())?;
    let signature = document
        .find_child(document.root().unwrap(), XMLDSIG_NAMESPACE, "Signature")
        .ok_or("no signature")?;
    let signed_info = document
        .find_child(signature, XMLDSIG_NAMESPACE, "SignedInfo")
        .ok_or("no signed info")?;
    let reference = document
        .find_child(signed_info, XMLDSIG_NAMESPACE, "Reference")
        .ok_or("no reference")?;
    let digest_value = document
        .find_child(reference, XMLDSIG_NAMESPACE, "DigestValue")
        .map(|n| document.text(n))
        .ok_or("no digest value")?;

    let digest_source =
        xml_cancelacion::c14n::canonicalize_document(&strip_enveloped_signature(document.events()))
            .map_err(|e| e.to_string())?;
    let digest = openssl::hash::hash(MessageDigest::sha1(), digest_source.as_bytes())
        .map_err(|e| e.to_string())?;
    if base64::encode(digest) != digest_value {
        return Err("digest mismatch".to_string());
    }

    let signature_value = document
        .find_child(signature, XMLDSIG_NAMESPACE, "SignatureValue")
        .map(|n| document.text(n))
        .ok_or("no signature value")?;
    let certificate = document
        .find_child(signature, XMLDSIG_NAMESPACE, "KeyInfo")
        .and_then(|n| document.find_child(n, XMLDSIG_NAMESPACE, "X509Data"))
        .and_then(|n| document.find_child(n, XMLDSIG_NAMESPACE, "X509Certificate"))
        .map(|n| document.text(n))
        .ok_or("no certificate")?;

    let certificate = X509::from_der(&base64::decode(certificate).map_err(|e| e.to_string())?)
        .map_err(|e| e.to_string())?;
    let public_key = certificate.public_key().map_err(|e| e.to_string())?;
    let signed_info_source = document
        .canonicalize_node(signed_info)
        .map_err(|e| e.to_string())?;

    let mut verifier = openssl::sign::Verifier::new(MessageDigest::sha1(), &public_key)
        .map_err(|e| e.to_string())?;
    let valid = verifier
        .verify_oneshot(
            &base64::decode(signature_value).map_err(|e| e.to_string())?,
            signed_info_source.as_bytes(),
        )
        .map_err(|e| e.to_string())?;

    if valid {
        Ok(())
    } else {
        Err("signature mismatch".to_string())
    }
}
