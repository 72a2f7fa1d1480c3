use xml::reader::XmlEvent;

use crate::error::{Error, Result};

/// Serializes one of the `Outer*` wrappers into the events of its element.
pub fn to_events<T: serde::Serialize>(value: &T) -> Result<Vec<XmlEvent>> {
    xml_serde::to_events(value).map_err(|e| Error::Xml(format!("unable to encode XML: {}", e)))
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OuterSignature {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}Signature")]
    pub signature: Signature,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Signature {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}SignedInfo")]
    pub signed_info: SignedInfo,
    #[serde(
        rename = "{http://www.w3.org/2000/09/xmldsig#}SignatureValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_value: Option<SignatureValue>,
    #[serde(
        rename = "{http://www.w3.org/2000/09/xmldsig#}KeyInfo",
        skip_serializing_if = "Option::is_none"
    )]
    pub key_info: Option<KeyInfo>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OuterSignatureValue {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}SignatureValue")]
    pub signature_value: SignatureValue,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SignatureValue {
    #[serde(rename = "$value")]
    pub value: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}CanonicalizationMethod")]
    pub canonicalization_method: CanonicalizationMethod,
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}SignatureMethod")]
    pub signature_method: SignatureMethod,
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}Reference")]
    pub reference: Reference,
}

impl SignedInfo {
    /// `SignedInfo` of the cancellation profile: one reference to the whole
    /// document, enveloped-signature transform, C14N 1.0, RSA-SHA1.
    pub fn enveloped(digest_value: String) -> Self {
        SignedInfo {
            canonicalization_method: CanonicalizationMethod {
                algorithm: crate::CANONICAL_1_0.to_string(),
            },
            signature_method: SignatureMethod {
                algorithm: crate::SIGNATURE_RSA_SHA1.to_string(),
            },
            reference: Reference {
                uri: Some(String::new()),
                transforms: Some(Transforms {
                    transforms: vec![Transform {
                        algorithm: crate::TRANSFORM_ENVELOPED_SIGNATURE.to_string(),
                    }],
                }),
                digest_method: DigestMethod {
                    algorithm: crate::DIGEST_SHA1.to_string(),
                },
                digest_value,
            },
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CanonicalizationMethod {
    #[serde(rename = "$attr:Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SignatureMethod {
    #[serde(rename = "$attr:Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Reference {
    #[serde(
        rename = "{http://www.w3.org/2000/09/xmldsig#}Transforms",
        skip_serializing_if = "Option::is_none"
    )]
    pub transforms: Option<Transforms>,
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}DigestMethod")]
    pub digest_method: DigestMethod,
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}DigestValue")]
    pub digest_value: String,
    #[serde(rename = "$attr:URI", skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Transforms {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}Transform")]
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Transform {
    #[serde(rename = "$attr:Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DigestMethod {
    #[serde(rename = "$attr:Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct OuterKeyInfo {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}KeyInfo")]
    pub key_info: KeyInfo,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    #[serde(rename = "$value")]
    pub keys_info: Vec<KeyInfoType>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum KeyInfoType {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}X509Data")]
    X509Data(X509Data),
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}KeyValue")]
    KeyValue(KeyValue),
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct X509Data {
    #[serde(rename = "$value")]
    pub x509_data: Vec<X509Datum>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum X509Datum {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}X509IssuerSerial")]
    IssuerSerial(X509IssuerSerial),
    /// Base64 DER of the certificate, no PEM delimiters or line breaks.
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}X509Certificate")]
    Certificate(String),
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct X509IssuerSerial {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}X509IssuerName")]
    pub issuer_name: String,
    /// Decimal serial number.
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}X509SerialNumber")]
    pub serial_number: String,
}

/// Public key of the certificate; left empty for non-RSA keys.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct KeyValue {
    #[serde(
        rename = "{http://www.w3.org/2000/09/xmldsig#}RSAKeyValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub rsa: Option<RSAKeyValue>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RSAKeyValue {
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}Modulus")]
    pub modulus: String,
    #[serde(rename = "{http://www.w3.org/2000/09/xmldsig#}Exponent")]
    pub exponent: String,
}
