use std::time::Duration;

use chrono::{DateTime, Utc};
use cms::attr::SigningTime;
use der::{oid::ObjectIdentifier, Any, Decode, Encode, Tag, Tagged};
use log::warn;
use x509_cert::{name::Name, time::Time};

use crate::{
    asn1_types::{
        ID_AT_COMMON_NAME, ID_AT_COUNTRY, ID_AT_DN_QUALIFIER, ID_AT_GENERATION_QUALIFIER,
        ID_AT_GIVEN_NAME, ID_AT_INITIALS, ID_AT_LOCALITY, ID_AT_ORGANIZATION,
        ID_AT_ORGANIZATIONAL_UNIT, ID_AT_PSEUDONYM, ID_AT_SERIAL_NUMBER, ID_AT_STATE,
        ID_AT_SURNAME, ID_AT_TITLE, ID_EMAIL_ADDRESS,
    },
    errors::{AuthenticodeError, AuthenticodeErrorKind, AuthenticodeResult},
};

pub fn to_hex_str<T>(bytes: &T) -> String
where
    T: AsRef<[u8]> + ?Sized,
{
    bytes
        .as_ref()
        .iter()
        .map(|v| format!("{:02X}", v))
        .collect::<Vec<String>>()
        .join("")
}

/// Hex form of an arbitrary-precision big-endian integer: uppercase, no sign
/// prefix, leading zero digits trimmed. An all-zero input renders as `"0"`.
pub fn serial_to_hex(bytes: &[u8]) -> String {
    let hex = to_hex_str(bytes);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// ISO-8601 UTC rendering of a duration since the UNIX epoch.
pub fn format_unix_time(duration: Duration) -> String {
    match DateTime::<Utc>::from_timestamp(duration.as_secs() as i64, 0) {
        Some(datetime) => datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => "unknown".to_owned(),
    }
}

/// Accepts both UTCTime and GeneralizedTime; two-digit years follow the
/// RFC 5280 window (years below 50 land in 20YY).
pub fn parse_time(time: &Time) -> String {
    format_unix_time(time.to_unix_duration())
}

/// Decode a signingTime attribute value.
pub fn parse_time_der(bytes: &[u8]) -> Result<String, AuthenticodeError> {
    let time =
        SigningTime::from_der(bytes).map_app_err(AuthenticodeErrorKind::InvalidSigningTime)?;
    Ok(parse_time(&time))
}

/// Short name of an X.520 attribute type, if it is one this crate reports.
pub fn rdn_type_short_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    match *oid {
        ID_AT_COUNTRY => Some("C"),
        ID_AT_ORGANIZATION => Some("O"),
        ID_AT_ORGANIZATIONAL_UNIT => Some("OU"),
        ID_AT_DN_QUALIFIER => Some("dnQualifier"),
        ID_AT_STATE => Some("ST"),
        ID_AT_COMMON_NAME => Some("CN"),
        ID_AT_SERIAL_NUMBER => Some("serialNumber"),
        ID_AT_LOCALITY => Some("L"),
        ID_AT_TITLE => Some("title"),
        ID_AT_SURNAME => Some("SN"),
        ID_AT_GIVEN_NAME => Some("GN"),
        ID_AT_INITIALS => Some("initials"),
        ID_AT_PSEUDONYM => Some("pseudonym"),
        ID_AT_GENERATION_QUALIFIER => Some("generationQualifier"),
        ID_EMAIL_ADDRESS => Some("emailAddress"),
        _ => None,
    }
}

/// Canonical RFC 2253 rendering of an X.500 name: RDNs in reverse order of
/// the DER encoding, joined by `,`, multi-valued RDNs joined by `+`,
/// attribute types by short name where known else dotted OID.
pub fn x500_name_to_string(name: &Name) -> String {
    let mut rdns = Vec::new();

    for rdn in name.0.iter().rev() {
        let mut parts = Vec::new();
        for atav in rdn.0.iter() {
            let key = match rdn_type_short_name(&atav.oid) {
                Some(short) => short.to_owned(),
                None => atav.oid.to_string(),
            };
            let value = match any_to_string(&atav.value) {
                Some(text) => escape_rdn_value(&text),
                // Unprintable value types fall back to the RFC 2253 `#hex`
                // form over the full DER encoding.
                None => match atav.value.to_der() {
                    Ok(der_bytes) => format!("#{}", to_hex_str(&der_bytes)),
                    Err(_) => "#".to_owned(),
                },
            };
            parts.push(format!("{}={}", key, value));
        }
        rdns.push(parts.join("+"));
    }

    rdns.join(",")
}

/// Decode a directory-string-ish value into UTF-8 text.
pub fn any_to_string(any: &Any) -> Option<String> {
    match any.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString
        | Tag::VideotexString => String::from_utf8(any.value().to_vec()).ok(),
        Tag::BmpString => utf16be_to_string(any.value()),
        _ => None,
    }
}

pub(crate) fn utf16be_to_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

fn escape_rdn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (i, ch) in value.chars().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (i == 0 && (ch == ' ' || ch == '#'))
            || (i == last && ch == ' ');
        if needs_escape {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Append to the warnings log, mirroring the entry to the `log` facade.
pub(crate) fn record_warning(warnings: &mut Vec<String>, entry: String) {
    warn!("{}", entry);
    warnings.push(entry);
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use der::asn1::UtcTime;

    use super::*;

    #[test]
    fn hex_is_uppercase() {
        assert_eq!(to_hex_str(&[0xde, 0xad, 0x0f]), "DEAD0F");
    }

    #[test]
    fn serial_hex_trims_sign_and_leading_zeros() {
        assert_eq!(serial_to_hex(&[0x00, 0x8f, 0x01]), "8F01");
        assert_eq!(serial_to_hex(&[0x0a, 0xbc]), "ABC");
        assert_eq!(serial_to_hex(&[0x00, 0x00]), "0");
    }

    #[test]
    fn utc_time_formats_as_iso8601() {
        // 2021-06-01T12:30:00Z
        let time = Time::UtcTime(
            UtcTime::from_unix_duration(Duration::from_secs(1_622_550_600)).unwrap(),
        );
        assert_eq!(parse_time(&time), "2021-06-01T12:30:00Z");
    }

    #[test]
    fn signing_time_der_roundtrip() {
        let time = Time::UtcTime(
            UtcTime::from_unix_duration(Duration::from_secs(1_622_550_600)).unwrap(),
        );
        let der_bytes = time.to_der().unwrap();
        assert_eq!(parse_time_der(&der_bytes).unwrap(), "2021-06-01T12:30:00Z");
    }

    #[test]
    fn malformed_time_is_rejected() {
        let err = parse_time_der(&[0x30, 0x00]).unwrap_err();
        assert_eq!(err.kind.code(), "MALFORMED_TIME");
    }

    #[test]
    fn name_renders_reversed_with_short_names() {
        let name = Name::from_str("O=Acme,CN=Leaf").unwrap();
        assert_eq!(x500_name_to_string(&name), "CN=Leaf,O=Acme");
    }

    #[test]
    fn rdn_values_are_escaped() {
        let name = Name::from_str("CN=Example\\, Inc").unwrap();
        assert_eq!(x500_name_to_string(&name), "CN=Example\\, Inc");
    }
}
