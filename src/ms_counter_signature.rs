use cms::{
    content_info::ContentInfo,
    signed_data::{SignedData, SignerIdentifier},
};
use der::{oid::db::rfc5911::ID_SIGNED_DATA, Decode, SliceReader};

use crate::{
    asn1_types::ID_TST_INFO,
    cert::{find_by_issuer_and_serial, X509Certificate},
    errors::{AuthenticodeError, AuthenticodeErrorKind, AuthenticodeResult},
    signature::collect_certificates,
    tstinfo::TSTInfo,
    utils::format_unix_time,
};

/// Microsoft RFC 3161 counter-signature: a PKCS#7 SignedData carried in the
/// `1.3.6.1.4.1.311.3.3.1` unauthenticated attribute, whose content is a
/// TSTInfo. It is a timestamp token, not a nested Authenticode signature.
#[derive(Debug)]
pub struct MsCounterSignature {
    /// OID of the imprint hash algorithm, dotted form, exactly as declared.
    pub imprint_digest_algorithm: String,
    /// Imprint bytes: the digest over the enclosing signer's
    /// encryptedDigest.
    pub imprint_digest: Vec<u8>,
    /// genTime of the TSTInfo, ISO-8601 UTC.
    pub signing_time: String,
    /// Certificates carried by the TSP envelope. Timestamp authorities
    /// often include their root here even though the outer envelope does
    /// not.
    certificates: Vec<x509_cert::Certificate>,
    signer_cert_idx: Option<usize>,
}

impl MsCounterSignature {
    pub(crate) fn parse(data: &[u8]) -> Result<Self, AuthenticodeError> {
        let mut reader =
            SliceReader::new(data).map_app_err(AuthenticodeErrorKind::InvalidTimestamp)?;
        let content_info = ContentInfo::decode(&mut reader)
            .map_app_err(AuthenticodeErrorKind::InvalidTimestamp)?;

        if content_info.content_type != ID_SIGNED_DATA {
            return Err(AuthenticodeError {
                kind: AuthenticodeErrorKind::InvalidTimestamp,
                message: format!("unexpected content type {}", content_info.content_type),
            });
        }

        let signed_data = content_info
            .content
            .decode_as::<SignedData>()
            .map_app_err(AuthenticodeErrorKind::InvalidTimestamp)?;

        if signed_data.encap_content_info.econtent_type != ID_TST_INFO {
            return Err(AuthenticodeError {
                kind: AuthenticodeErrorKind::InvalidTimestamp,
                message: format!(
                    "unexpected encapsulated content type {}",
                    signed_data.encap_content_info.econtent_type
                ),
            });
        }

        let econtent = signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or(AuthenticodeError {
                kind: AuthenticodeErrorKind::InvalidTimestamp,
                message: "empty encapsulated content".to_owned(),
            })?;

        // The encapsulated content is an OCTET STRING wrapping the TSTInfo;
        // the value bytes are the TSTInfo encoding itself.
        let tst_info = TSTInfo::from_der(econtent.value())
            .map_app_err(AuthenticodeErrorKind::InvalidTimestamp)?;

        let certificates = collect_certificates(&signed_data);
        let signer_cert_idx = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .and_then(|signer_info| match &signer_info.sid {
                SignerIdentifier::IssuerAndSerialNumber(sid) => find_by_issuer_and_serial(
                    &certificates,
                    &sid.issuer,
                    sid.serial_number.as_bytes(),
                ),
                SignerIdentifier::SubjectKeyIdentifier(_) => None,
            });

        Ok(Self {
            imprint_digest_algorithm: tst_info.message_imprint.hash_algorithm.oid.to_string(),
            imprint_digest: tst_info.message_imprint.hashed_message.as_bytes().to_vec(),
            signing_time: format_unix_time(tst_info.gen_time.to_unix_duration()),
            certificates,
            signer_cert_idx,
        })
    }

    /// Certificates owned by the TSP envelope.
    pub fn certificates(&self) -> &[x509_cert::Certificate] {
        &self.certificates
    }

    /// The timestamp authority's signer certificate, when it resolves
    /// within the TSP envelope.
    pub fn signer_certificate(&self) -> Option<X509Certificate<'_>> {
        self.signer_cert_idx
            .and_then(|idx| self.certificates.get(idx))
            .map(X509Certificate::new)
    }

    pub(crate) fn signer_cert_idx(&self) -> Option<usize> {
        self.signer_cert_idx
    }
}
