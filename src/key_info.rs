//! `KeyInfo` content derived from the signing certificate.

use log::warn;

use crate::certificate::{Certificate, PublicKeyAlgorithm};
use crate::error::Result;
use crate::proto::ds;

pub fn key_info<C: Certificate>(certificate: &C) -> Result<ds::KeyInfo> {
    let x509_data = ds::X509Data {
        x509_data: vec![
            ds::X509Datum::IssuerSerial(ds::X509IssuerSerial {
                issuer_name: certificate.issuer_name()?,
                serial_number: certificate.serial_decimal()?,
            }),
            ds::X509Datum::Certificate(pem_body(&certificate.pem_contents()?)),
        ],
    };

    Ok(ds::KeyInfo {
        keys_info: vec![
            ds::KeyInfoType::X509Data(x509_data),
            ds::KeyInfoType::KeyValue(key_value(certificate)?),
        ],
    })
}

/// RSA modulus and exponent; any other key type yields an empty `KeyValue`.
pub fn key_value<C: Certificate>(certificate: &C) -> Result<ds::KeyValue> {
    match certificate.public_key_algorithm()? {
        PublicKeyAlgorithm::Rsa => Ok(ds::KeyValue {
            rsa: Some(ds::RSAKeyValue {
                modulus: base64::encode(certificate.rsa_modulus_bytes()?),
                exponent: base64::encode(certificate.rsa_exponent_bytes()?),
            }),
        }),
        PublicKeyAlgorithm::Other => {
            warn!("certificate public key is not RSA, KeyValue left empty");
            Ok(ds::KeyValue::default())
        }
    }
}

/// PEM text without its delimiter lines, base64 lines joined.
pub fn pem_body(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('-'))
        .collect()
}
