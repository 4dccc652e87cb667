//! Builders for synthetic Authenticode envelopes. Everything is assembled
//! with the `cms`/`x509-cert`/`der` encoders, so the tests need no binary
//! fixtures and no signing keys; signature bytes are placeholders since
//! the parser performs no cryptographic checks.

use std::{str::FromStr, time::Duration};

use cms::{
    cert::{CertificateChoices, IssuerAndSerialNumber},
    content_info::{CmsVersion, ContentInfo},
    signed_data::{CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier,
        SignerInfo, SignerInfos},
};
use der::{
    asn1::{BitString, OctetString, SetOfVec, UtcTime},
    oid::{
        db::rfc5911::ID_SIGNED_DATA,
        db::rfc5912::{RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION},
        ObjectIdentifier,
    },
    Any, Decode, Encode,
};
use x509_cert::{
    attr::Attribute,
    certificate::{TbsCertificate, Version},
    name::Name,
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
    time::{Time, Validity},
    Certificate,
};

use pe_authenticode::asn1_types::{
    DigestInfo, SpcAttributeTypeAndOptionalValue, SpcIndirectDataContent, ID_SPC_INDIRECT_DATA,
    ID_SPC_PE_IMAGE_DATA,
};
use pe_authenticode::tstinfo::{MessageImprint, TSTInfo, TSTVersion};

pub fn alg(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    }
}

pub fn make_cert(subject: &str, issuer: &str, serial: &[u8]) -> Certificate {
    let validity = Validity {
        not_before: Time::UtcTime(
            UtcTime::from_unix_duration(Duration::from_secs(1_577_836_800)).unwrap(),
        ),
        not_after: Time::UtcTime(
            UtcTime::from_unix_duration(Duration::from_secs(1_893_456_000)).unwrap(),
        ),
    };
    Certificate {
        tbs_certificate: TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(serial).unwrap(),
            signature: alg(SHA_256_WITH_RSA_ENCRYPTION),
            issuer: Name::from_str(issuer).unwrap(),
            validity,
            subject: Name::from_str(subject).unwrap(),
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: alg(RSA_ENCRYPTION),
                subject_public_key: BitString::from_bytes(&[0x02, 0x01, 0x2A]).unwrap(),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        },
        signature_algorithm: alg(SHA_256_WITH_RSA_ENCRYPTION),
        signature: BitString::from_bytes(&[0x5A; 8]).unwrap(),
    }
}

/// DER of an SpcIndirectDataContent committing to `digest`.
pub fn spc_content(digest_alg: ObjectIdentifier, digest: &[u8]) -> Vec<u8> {
    SpcIndirectDataContent {
        data: SpcAttributeTypeAndOptionalValue {
            type_: ID_SPC_PE_IMAGE_DATA,
            value: None,
        },
        message_digest: DigestInfo {
            algorithm: alg(digest_alg),
            digest: OctetString::new(digest).unwrap(),
        },
    }
    .to_der()
    .unwrap()
}

pub fn attribute(oid: ObjectIdentifier, value_der: &[u8]) -> Attribute {
    let mut values = SetOfVec::new();
    values.insert(Any::from_der(value_der).unwrap()).unwrap();
    Attribute { oid, values }
}

fn attr_set(attrs: Vec<Attribute>) -> x509_cert::attr::Attributes {
    let mut set = SetOfVec::new();
    for attr in attrs {
        set.insert(attr).unwrap();
    }
    set
}

pub fn make_signer_info(
    issuer: &str,
    serial: &[u8],
    digest_alg: ObjectIdentifier,
    signed_attrs: Vec<Attribute>,
    unsigned_attrs: Vec<Attribute>,
) -> SignerInfo {
    SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: Name::from_str(issuer).unwrap(),
            serial_number: SerialNumber::new(serial).unwrap(),
        }),
        digest_alg: alg(digest_alg),
        signed_attrs: if signed_attrs.is_empty() {
            None
        } else {
            Some(attr_set(signed_attrs))
        },
        signature_algorithm: alg(RSA_ENCRYPTION),
        signature: OctetString::new(vec![0xDE; 32]).unwrap(),
        unsigned_attrs: if unsigned_attrs.is_empty() {
            None
        } else {
            Some(attr_set(unsigned_attrs))
        },
    }
}

/// DER of a full PKCS#7 ContentInfo/SignedData envelope.
pub fn make_envelope(
    digest_algs: &[ObjectIdentifier],
    econtent_type: ObjectIdentifier,
    econtent_der: Option<&[u8]>,
    certs: Vec<Certificate>,
    signers: Vec<SignerInfo>,
) -> Vec<u8> {
    let mut digest_algorithms = SetOfVec::new();
    for oid in digest_algs {
        digest_algorithms.insert(alg(*oid)).unwrap();
    }

    let certificates = if certs.is_empty() {
        None
    } else {
        let mut set = SetOfVec::new();
        for cert in certs {
            set.insert(CertificateChoices::Certificate(cert)).unwrap();
        }
        Some(CertificateSet(set))
    };

    let mut signer_infos = SetOfVec::new();
    for signer in signers {
        signer_infos.insert(signer).unwrap();
    }

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type,
            econtent: econtent_der.map(|der| Any::from_der(der).unwrap()),
        },
        certificates,
        crls: None,
        signer_infos: SignerInfos(signer_infos),
    };

    ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::from_der(&signed_data.to_der().unwrap()).unwrap(),
    }
    .to_der()
    .unwrap()
}

/// A minimal valid Authenticode envelope: SPC content plus a resolvable
/// signer, optionally carrying unsigned attributes.
pub fn make_authenticode_envelope(
    digest_alg: ObjectIdentifier,
    digest: &[u8],
    cert_subject: &str,
    cert_serial: &[u8],
    extra_certs: Vec<Certificate>,
    unsigned_attrs: Vec<Attribute>,
) -> Vec<u8> {
    let signer_cert = make_cert(cert_subject, cert_subject, cert_serial);
    let mut certs = vec![signer_cert];
    certs.extend(extra_certs);

    let spc = spc_content(digest_alg, digest);
    let signer = make_signer_info(cert_subject, cert_serial, digest_alg, Vec::new(), unsigned_attrs);

    make_envelope(
        &[digest_alg],
        ID_SPC_INDIRECT_DATA,
        Some(&spc),
        certs,
        vec![signer],
    )
}

/// DER of a Microsoft RFC 3161 timestamp token (the unsigned-attribute
/// value): a SignedData whose content is a TSTInfo.
pub fn make_timestamp_token(
    imprint_alg: ObjectIdentifier,
    imprint: &[u8],
    gen_time_secs: u64,
    tsa_subject: &str,
    tsa_serial: &[u8],
) -> Vec<u8> {
    let tst = TSTInfo {
        version: TSTVersion::V1,
        policy: ObjectIdentifier::new_unwrap("1.3.6.1.4.1.601.10.3.1"),
        message_imprint: MessageImprint {
            hash_algorithm: alg(imprint_alg),
            hashed_message: OctetString::new(imprint).unwrap(),
        },
        serial_number: SerialNumber::new(&[0x01]).unwrap(),
        gen_time: der::asn1::GeneralizedTime::from_unix_duration(Duration::from_secs(
            gen_time_secs,
        ))
        .unwrap(),
        accuracy: None,
        ordering: None,
        nonce: None,
        tsa: None,
        extensions: None,
    };

    // The encapsulated content is an OCTET STRING wrapping the TSTInfo.
    let octet = OctetString::new(tst.to_der().unwrap()).unwrap();
    let tsa_cert = make_cert(tsa_subject, tsa_subject, tsa_serial);
    let tst_signer = make_signer_info(
        tsa_subject,
        tsa_serial,
        der::oid::db::rfc5912::ID_SHA_256,
        Vec::new(),
        Vec::new(),
    );

    make_envelope(
        &[der::oid::db::rfc5912::ID_SHA_256],
        pe_authenticode::asn1_types::ID_TST_INFO,
        Some(&octet.to_der().unwrap()),
        vec![tsa_cert],
        vec![tst_signer],
    )
}

/// DER of a signingTime attribute value.
pub fn signing_time_der(secs: u64) -> Vec<u8> {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
        .to_der()
        .unwrap()
}

/// DER of a messageDigest attribute value.
pub fn message_digest_der(digest: &[u8]) -> Vec<u8> {
    OctetString::new(digest).unwrap().to_der().unwrap()
}
