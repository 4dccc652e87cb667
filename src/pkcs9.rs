use cms::signed_data::{SignerIdentifier, SignerInfo as CmsSignerInfo};
use der::{Decode, Encode};

use crate::{
    asn1_types::{ID_CONTENT_TYPE, ID_COUNTER_SIGNATURE, ID_MESSAGE_DIGEST, ID_SIGNING_TIME},
    cert::{find_by_issuer_and_serial, X509Certificate},
    errors::{AuthenticodeError, AuthenticodeErrorKind, AuthenticodeResult},
    signature::MAX_NESTING_DEPTH,
    utils::{parse_time_der, record_warning, serial_to_hex, to_hex_str, x500_name_to_string},
};

/// PKCS#9 counter-signature: a `SignerInfo` over the enclosing signer's
/// encryptedDigest, carried in an unauthenticated attribute. Typically a
/// third-party timestamp.
///
/// A counter-signature, having type SignerInfo, can itself carry a
/// countersignature attribute, so these form arbitrarily long series; the
/// recursion shares the nesting-depth cap with nested signatures.
#[derive(Debug)]
pub struct Pkcs9CounterSignature {
    /// UTC time of timestamp generation, from the signingTime attribute.
    pub signing_time: Option<String>,
    /// Hash over the enclosing signer's encryptedDigest, from the
    /// messageDigest attribute.
    pub digest: Option<String>,
    pub counter_signatures: Vec<Pkcs9CounterSignature>,
    signer_cert_idx: usize,
}

impl Pkcs9CounterSignature {
    /// Parse an attribute value against the certificate pool of the
    /// enclosing envelope. The counter-signer must resolve in the pool;
    /// otherwise the whole counter-signature is rejected.
    pub(crate) fn parse(
        data: &[u8],
        pool: &[x509_cert::Certificate],
        depth: usize,
        warnings: &mut Vec<String>,
    ) -> Result<Self, AuthenticodeError> {
        let signer_info = CmsSignerInfo::from_der(data)
            .map_app_err(AuthenticodeErrorKind::InvalidCounterSignature)?;

        let signer_cert_idx = match &signer_info.sid {
            SignerIdentifier::IssuerAndSerialNumber(sid) => find_by_issuer_and_serial(
                pool,
                &sid.issuer,
                sid.serial_number.as_bytes(),
            )
            .ok_or_else(|| AuthenticodeError {
                kind: AuthenticodeErrorKind::CounterSignerNotFound,
                message: format!(
                    "issuer: {}, serial: {}",
                    x500_name_to_string(&sid.issuer),
                    serial_to_hex(sid.serial_number.as_bytes())
                ),
            })?,
            SignerIdentifier::SubjectKeyIdentifier(_) => {
                return Err(AuthenticodeError {
                    kind: AuthenticodeErrorKind::CounterSignerNotFound,
                    message: "subjectKeyIdentifier signer identifier".to_owned(),
                })
            }
        };

        let mut out = Self {
            signing_time: None,
            digest: None,
            counter_signatures: Vec::new(),
            signer_cert_idx,
        };

        let Some(auth_attrs) = &signer_info.signed_attrs else {
            return Ok(out);
        };

        for attr in auth_attrs.iter() {
            match attr.oid {
                ID_COUNTER_SIGNATURE => {
                    for value in attr.values.iter() {
                        if depth + 1 >= MAX_NESTING_DEPTH {
                            record_warning(
                                warnings,
                                "MAX_DEPTH_EXCEEDED: counter-signature chain too deep".to_owned(),
                            );
                            continue;
                        }
                        let child = value
                            .to_der()
                            .map_app_err(AuthenticodeErrorKind::InvalidCounterSignature)
                            .and_then(|der| Self::parse(&der, pool, depth + 1, warnings));
                        match child {
                            Ok(counter_signature) => {
                                out.counter_signatures.push(counter_signature)
                            }
                            Err(err) => record_warning(warnings, err.to_warning()),
                        }
                    }
                }
                ID_CONTENT_TYPE => {}
                ID_SIGNING_TIME => {
                    if let Some(value) = attr.values.iter().next() {
                        match value
                            .to_der()
                            .map_app_err(AuthenticodeErrorKind::InvalidSigningTime)
                            .and_then(|der| parse_time_der(&der))
                        {
                            Ok(time) => out.signing_time = Some(time),
                            Err(err) => record_warning(warnings, err.to_warning()),
                        }
                    }
                }
                ID_MESSAGE_DIGEST => {
                    if let Some(value) = attr.values.iter().next() {
                        out.digest = Some(to_hex_str(value.value()));
                    }
                }
                _ => {}
            }
        }

        Ok(out)
    }

    /// View of the counter-signer's certificate within the pool the
    /// counter-signature was parsed against.
    pub fn signer_certificate<'a>(
        &self,
        pool: &'a [x509_cert::Certificate],
    ) -> Option<X509Certificate<'a>> {
        pool.get(self.signer_cert_idx).map(X509Certificate::new)
    }

    pub(crate) fn signer_cert_idx(&self) -> usize {
        self.signer_cert_idx
    }
}
