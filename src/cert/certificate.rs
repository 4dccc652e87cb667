use std::fmt::Display;

use der::{
    oid::{
        db::rfc5912::{
            ID_MD_5, ID_SHA_1, ID_SHA_224, ID_SHA_256, ID_SHA_384, ID_SHA_512,
            MD_5_WITH_RSA_ENCRYPTION, RSA_ENCRYPTION, SHA_1_WITH_RSA_ENCRYPTION,
            SHA_224_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION, SHA_384_WITH_RSA_ENCRYPTION,
            SHA_512_WITH_RSA_ENCRYPTION,
        },
        ObjectIdentifier,
    },
    pem::LineEnding,
    Encode, EncodePem,
};
use digest::{Digest, DynDigest};
use md5::Md5;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::{
    asn1_types::{
        ID_AT_COMMON_NAME, ID_AT_COUNTRY, ID_AT_DN_QUALIFIER, ID_AT_GENERATION_QUALIFIER,
        ID_AT_GIVEN_NAME, ID_AT_INITIALS, ID_AT_LOCALITY, ID_AT_ORGANIZATION,
        ID_AT_ORGANIZATIONAL_UNIT, ID_AT_PSEUDONYM, ID_AT_SERIAL_NUMBER, ID_AT_STATE,
        ID_AT_SURNAME, ID_AT_TITLE, ID_DSA, ID_EC_PUBLIC_KEY, ID_EMAIL_ADDRESS,
    },
    errors::{AuthenticodeError, AuthenticodeErrorKind},
    utils::{any_to_string, parse_time, serial_to_hex, to_hex_str, x500_name_to_string},
};

/// Non-owning view over a certificate held by a parsed PKCS#7 envelope.
///
/// The lifetime ties every view to its owning [`Pkcs7Signature`] (or
/// [`MsCounterSignature`]) so a view can never outlive the envelope it
/// borrows from.
///
/// [`Pkcs7Signature`]: crate::signature::Pkcs7Signature
/// [`MsCounterSignature`]: crate::ms_counter_signature::MsCounterSignature
#[derive(Clone, Copy, Debug)]
pub struct X509Certificate<'a> {
    cert: &'a x509_cert::Certificate,
}

impl<'a> X509Certificate<'a> {
    pub fn new(cert: &'a x509_cert::Certificate) -> Self {
        Self { cert }
    }

    pub fn as_inner(&self) -> &'a x509_cert::Certificate {
        self.cert
    }

    /// Uppercase hex of the arbitrary-precision serial, no sign prefix.
    pub fn serial_number(&self) -> String {
        serial_to_hex(self.cert.tbs_certificate.serial_number.as_bytes())
    }

    /// Dotted OID of the tbsCertificate signature algorithm.
    pub fn signature_algorithm(&self) -> String {
        self.cert.tbs_certificate.signature.oid.to_string()
    }

    pub fn valid_since(&self) -> String {
        parse_time(&self.cert.tbs_certificate.validity.not_before)
    }

    pub fn valid_until(&self) -> String {
        parse_time(&self.cert.tbs_certificate.validity.not_after)
    }

    pub fn subject(&self) -> Attributes {
        Attributes::from_name(&self.cert.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Attributes {
        Attributes::from_name(&self.cert.tbs_certificate.issuer)
    }

    pub fn raw_subject(&self) -> String {
        x500_name_to_string(&self.cert.tbs_certificate.subject)
    }

    pub fn raw_issuer(&self) -> String {
        x500_name_to_string(&self.cert.tbs_certificate.issuer)
    }

    /// PEM-encoded SubjectPublicKeyInfo.
    pub fn public_key(&self) -> String {
        self.cert
            .tbs_certificate
            .subject_public_key_info
            .to_pem(LineEnding::LF)
            .unwrap_or_else(|_| "unknown".to_owned())
    }

    pub fn public_key_algorithm(&self) -> String {
        match self.cert.tbs_certificate.subject_public_key_info.algorithm.oid {
            RSA_ENCRYPTION => "rsaEncryption".to_owned(),
            ID_EC_PUBLIC_KEY => "id-ecPublicKey".to_owned(),
            ID_DSA => "dsaEncryption".to_owned(),
            _ => "unknown".to_owned(),
        }
    }

    /// SHA-1 over the DER encoding of the full certificate.
    pub fn sha1(&self) -> String {
        self.fingerprint(&mut Sha1::new())
    }

    /// SHA-256 over the DER encoding of the full certificate.
    pub fn sha256(&self) -> String {
        self.fingerprint(&mut Sha256::new())
    }

    fn fingerprint(&self, hasher: &mut dyn DynDigest) -> String {
        match self.cert.to_der() {
            Ok(der_bytes) => {
                hasher.update(&der_bytes);
                to_hex_str(&hasher.finalize_reset())
            }
            Err(_) => "unknown".to_owned(),
        }
    }

    /// X.509 version in its ASN.1 form: 0, 1 or 2 for v1, v2, v3.
    pub fn version(&self) -> u8 {
        self.cert.tbs_certificate.version as u8
    }

    /// Flatten into an owned export record.
    pub fn to_certificate(&self) -> Certificate {
        Certificate {
            subject: self.subject(),
            issuer: self.issuer(),
            subject_raw: self.raw_subject(),
            issuer_raw: self.raw_issuer(),
            serial_number: self.serial_number(),
            valid_since: self.valid_since(),
            valid_until: self.valid_until(),
            public_key: self.public_key(),
            public_key_algo: self.public_key_algorithm(),
            signature_algo: self.signature_algorithm(),
            sha1_digest: self.sha1(),
            sha256_digest: self.sha256(),
        }
    }
}

/// Structured subset of the distinguished-name attributes. A type appearing
/// more than once keeps the last occurrence.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizational_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudonym: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_qualifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl Attributes {
    pub fn from_name(name: &x509_cert::name::Name) -> Self {
        let mut out = Self::default();

        for rdn in name.0.iter() {
            for atav in rdn.0.iter() {
                let Some(value) = any_to_string(&atav.value) else {
                    continue;
                };
                match atav.oid {
                    ID_AT_COUNTRY => out.country = Some(value),
                    ID_AT_ORGANIZATION => out.organization = Some(value),
                    ID_AT_ORGANIZATIONAL_UNIT => out.organizational_unit = Some(value),
                    ID_AT_DN_QUALIFIER => out.name_qualifier = Some(value),
                    ID_AT_STATE => out.state = Some(value),
                    ID_AT_COMMON_NAME => out.common_name = Some(value),
                    ID_AT_SERIAL_NUMBER => out.serial_number = Some(value),
                    ID_AT_LOCALITY => out.locality = Some(value),
                    ID_AT_TITLE => out.title = Some(value),
                    ID_AT_SURNAME => out.surname = Some(value),
                    ID_AT_GIVEN_NAME => out.given_name = Some(value),
                    ID_AT_INITIALS => out.initials = Some(value),
                    ID_AT_PSEUDONYM => out.pseudonym = Some(value),
                    ID_AT_GENERATION_QUALIFIER => out.generation_qualifier = Some(value),
                    ID_EMAIL_ADDRESS => out.email_address = Some(value),
                    _ => {}
                }
            }
        }

        out
    }
}

/// Flat, owned certificate record suitable for export.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub subject: Attributes,
    pub issuer: Attributes,
    pub subject_raw: String,
    pub issuer_raw: String,
    pub serial_number: String,
    pub valid_since: String,
    pub valid_until: String,
    pub public_key: String,
    pub public_key_algo: String,
    pub signature_algo: String,
    pub sha1_digest: String,
    pub sha256_digest: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Rsa,
    Dsa,
    Ec,
    Md5WithRsa,
    Sha1WithRsa,
    Sha224WithRsa,
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    Unsupported(String),
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<&ObjectIdentifier> for Algorithm {
    fn from(oid: &ObjectIdentifier) -> Self {
        match *oid {
            ID_MD_5 => Self::Md5,
            ID_SHA_1 => Self::Sha1,
            ID_SHA_224 => Self::Sha224,
            ID_SHA_256 => Self::Sha256,
            ID_SHA_384 => Self::Sha384,
            ID_SHA_512 => Self::Sha512,
            RSA_ENCRYPTION => Self::Rsa,
            ID_DSA => Self::Dsa,
            ID_EC_PUBLIC_KEY => Self::Ec,
            MD_5_WITH_RSA_ENCRYPTION => Self::Md5WithRsa,
            SHA_1_WITH_RSA_ENCRYPTION => Self::Sha1WithRsa,
            SHA_224_WITH_RSA_ENCRYPTION => Self::Sha224WithRsa,
            SHA_256_WITH_RSA_ENCRYPTION => Self::Sha256WithRsa,
            SHA_384_WITH_RSA_ENCRYPTION => Self::Sha384WithRsa,
            SHA_512_WITH_RSA_ENCRYPTION => Self::Sha512WithRsa,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl From<&AlgorithmIdentifierOwned> for Algorithm {
    fn from(value: &AlgorithmIdentifierOwned) -> Self {
        Self::from(&value.oid)
    }
}


impl Algorithm {
    /// Translate a dotted-OID string. Unknown and unparseable input both
    /// land in `Unsupported`, keeping the original text.
    pub fn from_oid_str(oid: &str) -> Self {
        match ObjectIdentifier::new(oid) {
            Ok(parsed) => Self::from(&parsed),
            Err(_) => Self::Unsupported(oid.to_owned()),
        }
    }

    /// Short name, or the dotted OID for algorithms outside the known set.
    pub fn name(&self) -> &str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Rsa => "rsaEncryption",
            Self::Dsa => "dsaEncryption",
            Self::Ec => "id-ecPublicKey",
            Self::Md5WithRsa => "md5WithRSAEncryption",
            Self::Sha1WithRsa => "sha1WithRSAEncryption",
            Self::Sha224WithRsa => "sha224WithRSAEncryption",
            Self::Sha256WithRsa => "sha256WithRSAEncryption",
            Self::Sha384WithRsa => "sha384WithRSAEncryption",
            Self::Sha512WithRsa => "sha512WithRSAEncryption",
            Self::Unsupported(oid) => oid,
        }
    }

    /// Output size in bytes, for the digest algorithms this crate computes.
    pub fn digest_len(&self) -> Option<usize> {
        match self {
            Self::Md5 | Self::Md5WithRsa => Some(16),
            Self::Sha1 | Self::Sha1WithRsa => Some(20),
            Self::Sha224 | Self::Sha224WithRsa => Some(28),
            Self::Sha256 | Self::Sha256WithRsa => Some(32),
            Self::Sha384 | Self::Sha384WithRsa => Some(48),
            Self::Sha512 | Self::Sha512WithRsa => Some(64),
            _ => None,
        }
    }

    pub fn new_digest(&self) -> Result<Box<dyn DynDigest>, AuthenticodeError> {
        match self {
            Self::Md5 | Self::Md5WithRsa => Ok(Box::new(Md5::new())),
            Self::Sha1 | Self::Sha1WithRsa => Ok(Box::new(Sha1::new())),
            Self::Sha224 | Self::Sha224WithRsa => Ok(Box::new(Sha224::new())),
            Self::Sha256 | Self::Sha256WithRsa => Ok(Box::new(Sha256::new())),
            Self::Sha384 | Self::Sha384WithRsa => Ok(Box::new(Sha384::new())),
            Self::Sha512 | Self::Sha512WithRsa => Ok(Box::new(Sha512::new())),
            _ => Err(AuthenticodeError {
                kind: AuthenticodeErrorKind::UnsupportedAlgorithm,
                message: self.name().to_owned(),
            }),
        }
    }

    pub fn compute_digest(&self, bytes: &[u8]) -> Result<Vec<u8>, AuthenticodeError> {
        let mut hasher = self.new_digest()?;
        hasher.update(bytes);
        Ok(hasher.finalize().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use x509_cert::name::Name;

    use super::*;

    #[test]
    fn algorithm_names_and_lengths() {
        let alg = Algorithm::from(&ID_SHA_256);
        assert_eq!(alg.name(), "sha256");
        assert_eq!(alg.digest_len(), Some(32));

        let unknown = Algorithm::from(&ObjectIdentifier::new_unwrap("1.2.3.4"));
        assert_eq!(unknown.name(), "1.2.3.4");
        assert_eq!(unknown.digest_len(), None);
        match unknown.new_digest() {
            Err(e) => assert_eq!(e.kind, AuthenticodeErrorKind::UnsupportedAlgorithm),
            Ok(_) => panic!("expected UnsupportedAlgorithm error"),
        }
    }

    #[test]
    fn algorithm_from_oid_string() {
        assert_eq!(
            Algorithm::from_oid_str("2.16.840.1.101.3.4.2.1").name(),
            "sha256"
        );
        assert_eq!(Algorithm::from_oid_str("1.2.3.4").name(), "1.2.3.4");
        assert_eq!(Algorithm::from_oid_str("not an oid").name(), "not an oid");
    }

    #[test]
    fn compute_digest_dispatches_by_algorithm() {
        let digest = Algorithm::Sha1.compute_digest(b"abc").unwrap();
        assert_eq!(
            to_hex_str(&digest),
            "A9993E364706816ABA3E25717850C26C9CD0D89D"
        );

        let digest = Algorithm::Md5.compute_digest(b"abc").unwrap();
        assert_eq!(to_hex_str(&digest), "900150983CD24FB0D6963F7D28E17F72");
    }

    #[test]
    fn attributes_keep_last_occurrence() {
        let name = Name::from_str("CN=First,O=Acme,CN=Second").unwrap();
        let attrs = Attributes::from_name(&name);
        assert_eq!(attrs.common_name.as_deref(), Some("Second"));
        assert_eq!(attrs.organization.as_deref(), Some("Acme"));
        assert_eq!(attrs.country, None);
    }
}
