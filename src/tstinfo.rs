use der::{
    asn1::{GeneralizedTime, Int, OctetString},
    oid::ObjectIdentifier,
    Any, Enumerated, Sequence,
};
use x509_cert::{ext::Extensions, serial_number::SerialNumber, spki::AlgorithmIdentifierOwned};

/// RFC 3161 timestamp token payload, carried as the encapsulated content of
/// the Microsoft counter-signature envelope.
///
/// ```text
/// TSTInfo ::= SEQUENCE {
///     version INTEGER { v1(1) },
///     policy TSAPolicyId,
///     messageImprint MessageImprint,
///     serialNumber INTEGER,
///     genTime GeneralizedTime,
///     accuracy Accuracy OPTIONAL,
///     ordering BOOLEAN DEFAULT FALSE,
///     nonce INTEGER OPTIONAL,
///     tsa [0] GeneralName OPTIONAL,
///     extensions [1] IMPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TSTInfo {
    pub version: TSTVersion,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: SerialNumber,
    pub gen_time: GeneralizedTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Any>,
    #[asn1(optional = "true")]
    pub ordering: Option<bool>,
    #[asn1(optional = "true")]
    pub nonce: Option<Int>,
    #[asn1(context_specific = "0", optional = "true")]
    pub tsa: Option<Any>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum TSTVersion {
    V1 = 1,
}

/// ```text
/// MessageImprint ::= SEQUENCE {
///     hashAlgorithm AlgorithmIdentifier,
///     hashedMessage OCTET STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub hashed_message: OctetString,
}
