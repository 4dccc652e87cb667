use der::Decode;

use crate::errors::{AuthenticodeError, AuthenticodeErrorKind, AuthenticodeResult};

use super::X509Certificate;

/// Builds best-effort certificate chains for signers and counter-signers.
///
/// The trust store starts empty: Authenticode envelopes rarely embed their
/// root, and callers mostly want the constructed chain for reporting rather
/// than a trust verdict. Anchors added by the caller simply extend the pool
/// the chain walk may draw from.
#[derive(Clone, Debug, Default)]
pub struct CertificateProcessor {
    trust_store: Vec<x509_cert::Certificate>,
}

impl CertificateProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust_store(&self) -> &[x509_cert::Certificate] {
        &self.trust_store
    }

    pub fn add_trust_anchor(&mut self, cert: x509_cert::Certificate) {
        self.trust_store.push(cert);
    }

    /// Load every CERTIFICATE block from a PEM bundle into the trust store.
    /// Returns the number of anchors added.
    pub fn add_trust_anchors_pem(&mut self, input: &str) -> Result<usize, AuthenticodeError> {
        const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
        const END: &str = "-----END CERTIFICATE-----";

        let mut added = 0;
        let mut rest = input;

        while let Some(start) = rest.find(BEGIN) {
            let end = rest[start..]
                .find(END)
                .map(|offset| start + offset + END.len())
                .ok_or(AuthenticodeError {
                    kind: AuthenticodeErrorKind::InvalidPemCertificate,
                    message: "unterminated certificate block".to_owned(),
                })?;

            let (label, der_bytes) = pem_rfc7468::decode_vec(rest[start..end].as_bytes())
                .map_app_err(AuthenticodeErrorKind::InvalidPemCertificate)?;
            if label == "CERTIFICATE" {
                self.trust_store.push(
                    x509_cert::Certificate::from_der(&der_bytes)
                        .map_app_err(AuthenticodeErrorKind::InvalidPemCertificate)?,
                );
                added += 1;
            }

            rest = &rest[end..];
        }

        Ok(added)
    }

    /// Ordered chain for `signer`, leaf first, each subsequent element the
    /// issuer of the previous. The walk draws from `pool` and the trust
    /// store and stops at a self-signed certificate, an unresolvable
    /// issuer, or a cycle. Empty when `signer` is absent.
    pub fn get_chain<'a>(
        &'a self,
        signer: Option<X509Certificate<'a>>,
        pool: &'a [x509_cert::Certificate],
    ) -> Vec<X509Certificate<'a>> {
        let Some(signer) = signer else {
            return Vec::new();
        };

        let mut chain = vec![signer];
        let mut current = signer.as_inner();

        while !is_self_signed(current) {
            let Some(issuer) = self.find_issuer(current, pool) else {
                break;
            };
            if chain
                .iter()
                .any(|link| std::ptr::eq(link.as_inner(), issuer))
            {
                break;
            }
            chain.push(X509Certificate::new(issuer));
            current = issuer;
        }

        chain
    }

    fn find_issuer<'a>(
        &'a self,
        cert: &x509_cert::Certificate,
        pool: &'a [x509_cert::Certificate],
    ) -> Option<&'a x509_cert::Certificate> {
        pool.iter()
            .chain(self.trust_store.iter())
            .find(|candidate| candidate.tbs_certificate.subject == cert.tbs_certificate.issuer)
    }
}

fn is_self_signed(cert: &x509_cert::Certificate) -> bool {
    cert.tbs_certificate.subject == cert.tbs_certificate.issuer
}
