use cms::cert::x509::spki::AlgorithmIdentifierOwned;
use der::{
    asn1::OctetString,
    oid::ObjectIdentifier,
    Any, Sequence, Tag, TagNumber, Tagged, ValueOrd,
};

use crate::utils::utf16be_to_string;

pub const ID_SPC_INDIRECT_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.4");
pub const ID_SPC_PE_IMAGE_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.15");
pub const ID_SPC_SP_OPUS_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.12");
pub const ID_SPC_NESTED_SIGNATURE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.4.1");
pub const ID_MS_COUNTER_SIGN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.3.3.1");

pub const ID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const ID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub const ID_SIGNING_TIME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
pub const ID_COUNTER_SIGNATURE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.6");
pub const ID_TST_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
pub const ID_EMAIL_ADDRESS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

// X.520 attribute types recognized in distinguished names.
pub const ID_AT_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
pub const ID_AT_SURNAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.4");
pub const ID_AT_SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");
pub const ID_AT_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
pub const ID_AT_LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
pub const ID_AT_STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
pub const ID_AT_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const ID_AT_ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
pub const ID_AT_TITLE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.12");
pub const ID_AT_GIVEN_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.42");
pub const ID_AT_INITIALS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.43");
pub const ID_AT_GENERATION_QUALIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.44");
pub const ID_AT_DN_QUALIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.46");
pub const ID_AT_PSEUDONYM: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.65");

pub const ID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
pub const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// ```text
/// DigestInfo ::= SEQUENCE {
///     digestAlgorithm DigestAlgorithmIdentifier,
///     digest Digest }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct DigestInfo {
    pub algorithm: AlgorithmIdentifierOwned,
    pub digest: OctetString,
}

/// ```text
/// SpcAttributeTypeAndOptionalValue ::= SEQUENCE {
///     type ObjectID,
///     value [0] EXPLICIT ANY OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcAttributeTypeAndOptionalValue {
    pub type_: ObjectIdentifier,
    pub value: Option<Any>,
}

/// ```text
/// SpcIndirectDataContent ::= SEQUENCE {
///     data SpcAttributeTypeAndOptionalValue,
///     messageDigest DigestInfo }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcIndirectDataContent {
    pub data: SpcAttributeTypeAndOptionalValue,
    pub message_digest: DigestInfo,
}

/// ```text
/// SpcSpOpusInfo ::= SEQUENCE {
///     programName [0] EXPLICIT SpcString OPTIONAL,
///     moreInfo [1] EXPLICIT SpcLink OPTIONAL }
/// ```
///
/// The inner SpcString and SpcLink CHOICEs are kept as [`Any`] so the raw
/// encoding survives round trips; accessors decode the common arms.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SpcSpOpusInfo {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub program_name: Option<Any>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub more_info: Option<Any>,
}

impl SpcSpOpusInfo {
    /// ```text
    /// SpcString ::= CHOICE {
    ///     unicode [0] IMPLICIT BMPSTRING,
    ///     ascii [1] IMPLICIT IA5STRING }
    /// ```
    pub fn program_name_string(&self) -> Option<String> {
        self.program_name.as_ref().and_then(spc_string_to_string)
    }

    /// ```text
    /// SpcLink ::= CHOICE {
    ///     url [0] IMPLICIT IA5STRING,
    ///     moniker [1] IMPLICIT SpcSerializedObject,
    ///     file [2] EXPLICIT SpcString }
    /// ```
    ///
    /// Only the url arm carries anything useful for reporting.
    pub fn more_info_url(&self) -> Option<String> {
        let any = self.more_info.as_ref()?;
        match any.tag() {
            Tag::ContextSpecific {
                constructed: false,
                number: TagNumber::N0,
            } => String::from_utf8(any.value().to_vec()).ok(),
            _ => None,
        }
    }
}

fn spc_string_to_string(any: &Any) -> Option<String> {
    match any.tag() {
        Tag::ContextSpecific {
            constructed: false,
            number: TagNumber::N0,
        } => utf16be_to_string(any.value()),
        Tag::ContextSpecific {
            constructed: false,
            number: TagNumber::N1,
        } => String::from_utf8(any.value().to_vec()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use der::{Decode, Encode};

    use super::*;

    #[test]
    fn spc_indirect_data_content_roundtrip() {
        let spc = SpcIndirectDataContent {
            data: SpcAttributeTypeAndOptionalValue {
                type_: ID_SPC_PE_IMAGE_DATA,
                value: None,
            },
            message_digest: DigestInfo {
                algorithm: AlgorithmIdentifierOwned {
                    oid: der::oid::db::rfc5912::ID_SHA_256,
                    parameters: None,
                },
                digest: OctetString::new([0xABu8; 32].as_slice()).unwrap(),
            },
        };

        let der_bytes = spc.to_der().unwrap();
        let decoded = SpcIndirectDataContent::from_der(&der_bytes).unwrap();
        assert_eq!(decoded, spc);
        assert_eq!(decoded.message_digest.digest.as_bytes().len(), 32);
    }

    #[test]
    fn opus_info_program_name_bmp_string() {
        // programName as [0] EXPLICIT { [0] IMPLICIT BMPSTRING "hi" }
        let inner = Any::from_der(&[0x80, 0x04, 0x00, b'h', 0x00, b'i']).unwrap();
        let opus = SpcSpOpusInfo {
            program_name: Some(inner),
            more_info: None,
        };

        let der_bytes = opus.to_der().unwrap();
        let decoded = SpcSpOpusInfo::from_der(&der_bytes).unwrap();
        assert_eq!(decoded.program_name_string().as_deref(), Some("hi"));
        assert_eq!(decoded.more_info_url(), None);
    }

    #[test]
    fn opus_info_more_info_url() {
        // moreInfo as [1] EXPLICIT { [0] IMPLICIT IA5STRING "https://e.x" }
        let inner = Any::from_der(&[
            0x80, 0x0B, b'h', b't', b't', b'p', b's', b':', b'/', b'/', b'e', b'.', b'x',
        ])
        .unwrap();
        let opus = SpcSpOpusInfo {
            program_name: None,
            more_info: Some(inner),
        };

        let der_bytes = opus.to_der().unwrap();
        let decoded = SpcSpOpusInfo::from_der(&der_bytes).unwrap();
        assert_eq!(decoded.more_info_url().as_deref(), Some("https://e.x"));
    }
}
