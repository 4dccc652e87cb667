use cms::{
    cert::CertificateChoices,
    content_info::ContentInfo as CmsContentInfo,
    signed_data::{SignedData, SignerIdentifier, SignerInfo as CmsSignerInfo},
};
use der::{
    oid::{db::rfc5911::ID_SIGNED_DATA, ObjectIdentifier},
    Decode, Encode, SliceReader,
};
use log::debug;

use crate::{
    asn1_types::{
        SpcIndirectDataContent, SpcSpOpusInfo, ID_CONTENT_TYPE, ID_COUNTER_SIGNATURE,
        ID_MESSAGE_DIGEST, ID_MS_COUNTER_SIGN, ID_SPC_INDIRECT_DATA, ID_SPC_NESTED_SIGNATURE,
        ID_SPC_SP_OPUS_INFO,
    },
    cert::{
        count_by_issuer_and_serial, find_by_issuer_and_serial, Algorithm, CertificateProcessor,
        X509Certificate,
    },
    errors::{AuthenticodeError, AuthenticodeErrorKind, AuthenticodeResult},
    export::{CounterSigner, DigitalSignature, Signer},
    ms_counter_signature::MsCounterSignature,
    pkcs9::Pkcs9CounterSignature,
    utils::{record_warning, serial_to_hex, to_hex_str, x500_name_to_string},
};

/// Hard cap on nested-signature and counter-signature recursion. Real
/// Authenticode files nest two or three levels; anything deeper is cut off
/// and reported.
pub const MAX_NESTING_DEPTH: usize = 16;

/// The indirectly-signed content: what the signer committed to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentInfo {
    /// OID of the SpcIndirectDataContent data type, dotted form.
    pub content_type: String,
    /// Hex of the PE image hash the signature commits to.
    pub digest: String,
    /// OID of the digest algorithm, dotted form, exactly as declared.
    pub digest_algorithm: String,
}

/// SpcSpOpusInfo payload: publisher-supplied program name and URL. The raw
/// attribute encoding is preserved alongside the decoded fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpcInfo {
    pub program_name: Option<String>,
    pub more_info: Option<String>,
    pub raw: Vec<u8>,
}

/// Per-signer record of the SignedData, with the recursive structures found
/// in its unauthenticated attributes.
#[derive(Debug)]
pub struct SignerInfo {
    pub version: u64,
    /// Uppercase hex serial from issuerAndSerialNumber.
    pub serial: String,
    /// Canonical issuer string from issuerAndSerialNumber.
    pub issuer: String,
    /// contentType authenticated attribute, dotted OID.
    pub content_type: Option<String>,
    /// messageDigest authenticated attribute: hex digest over the
    /// authenticated content.
    pub message_digest: Option<String>,
    pub spc_info: Option<SpcInfo>,
    pub digest_algorithm: Algorithm,
    pub digest_encrypt_algorithm: Algorithm,
    /// Raw encryptedDigest bytes.
    pub encrypt_digest: Vec<u8>,
    pub nested_signatures: Vec<Pkcs7Signature>,
    pub counter_signatures: Vec<Pkcs9CounterSignature>,
    pub ms_counter_signatures: Vec<MsCounterSignature>,
    signer_cert_idx: Option<usize>,
}

/// Parsed Authenticode PKCS#7 envelope.
///
/// Owns the parsed structures; [`X509Certificate`] views borrow from it and
/// cannot outlive it. Construction is total: malformed input degrades to an
/// empty object carrying warnings, never a panic or an error return.
/// Deliberately not `Clone`: it is the unique owner of its envelope.
#[derive(Debug)]
pub struct Pkcs7Signature {
    pub version: u64,
    pub content_info: Option<ContentInfo>,
    pub signer_info: Option<SignerInfo>,
    /// Digest algorithms declared at the SignedData level. A sequence, not
    /// a set: multiplicity is preserved.
    pub content_digest_algorithms: Vec<Algorithm>,
    certificates: Vec<x509_cert::Certificate>,
    warnings: Vec<String>,
    envelope_ok: bool,
}

impl Pkcs7Signature {
    /// Parse a DER-encoded PKCS#7 SignedData as extracted from a PE
    /// attribute certificate table (WIN_CERTIFICATE revision 2,
    /// PKCS_SIGNED_DATA).
    pub fn parse(input: &[u8]) -> Self {
        debug!("parsing {} byte signature blob", input.len());
        Self::parse_at_depth(input, 0)
    }

    pub(crate) fn parse_at_depth(input: &[u8], depth: usize) -> Self {
        match Self::decode_envelope(input) {
            Ok(signed_data) => Self::from_signed_data(signed_data, depth),
            Err(err) => {
                let mut warnings = Vec::new();
                record_warning(&mut warnings, err.to_warning());
                Self {
                    version: 0,
                    content_info: None,
                    signer_info: None,
                    content_digest_algorithms: Vec::new(),
                    certificates: Vec::new(),
                    warnings,
                    envelope_ok: false,
                }
            }
        }
    }

    fn decode_envelope(input: &[u8]) -> Result<SignedData, AuthenticodeError> {
        // Certificate tables are padded to an 8-byte boundary, so decode
        // through a reader that tolerates trailing data.
        let mut reader =
            SliceReader::new(input).map_app_err(AuthenticodeErrorKind::InvalidContentInfo)?;
        let content_info = CmsContentInfo::decode(&mut reader)
            .map_app_err(AuthenticodeErrorKind::InvalidContentInfo)?;

        if content_info.content_type != ID_SIGNED_DATA {
            return Err(AuthenticodeError {
                kind: AuthenticodeErrorKind::InvalidContentType,
                message: content_info.content_type.to_string(),
            });
        }

        content_info
            .content
            .decode_as::<SignedData>()
            .map_app_err(AuthenticodeErrorKind::InvalidSignedData)
    }

    fn from_signed_data(signed_data: SignedData, depth: usize) -> Self {
        let mut warnings = Vec::new();

        let version = signed_data.version as u64;
        let content_digest_algorithms: Vec<Algorithm> = signed_data
            .digest_algorithms
            .iter()
            .map(Algorithm::from)
            .collect();
        let certificates = collect_certificates(&signed_data);

        let content_info = match Self::parse_content(&signed_data) {
            Ok(content_info) => Some(content_info),
            Err(err) => {
                record_warning(&mut warnings, err.to_warning());
                None
            }
        };

        let signer_infos = &signed_data.signer_infos.0;
        if signer_infos.len() > 1 {
            record_warning(
                &mut warnings,
                format!(
                    "MULTIPLE_SIGNERS: {} signer infos present, extras ignored",
                    signer_infos.len()
                ),
            );
        }
        let signer_info = signer_infos.iter().next().map(|cms_signer| {
            if !signed_data
                .digest_algorithms
                .iter()
                .any(|alg| alg.oid == cms_signer.digest_alg.oid)
            {
                record_warning(
                    &mut warnings,
                    format!(
                        "DIGEST_ALG_MISMATCH: signer uses {}, not declared by the SignedData",
                        Algorithm::from(&cms_signer.digest_alg).name()
                    ),
                );
            }
            SignerInfo::parse(cms_signer, &certificates, depth, &mut warnings)
        });

        debug!(
            "parsed envelope: {} certificates, signer {}",
            certificates.len(),
            if signer_info.is_some() { "present" } else { "absent" },
        );

        Self {
            version,
            content_info,
            signer_info,
            content_digest_algorithms,
            certificates,
            warnings,
            envelope_ok: true,
        }
    }

    fn parse_content(signed_data: &SignedData) -> Result<ContentInfo, AuthenticodeError> {
        if signed_data.encap_content_info.econtent_type != ID_SPC_INDIRECT_DATA {
            return Err(AuthenticodeError {
                kind: AuthenticodeErrorKind::InvalidSpcIndirectDataContent,
                message: format!(
                    "unexpected content type {}",
                    signed_data.encap_content_info.econtent_type
                ),
            });
        }

        let econtent = signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or(AuthenticodeError {
                kind: AuthenticodeErrorKind::EmptyEncapsulatedContent,
                message: String::new(),
            })?;

        let spc = econtent
            .decode_as::<SpcIndirectDataContent>()
            .map_app_err(AuthenticodeErrorKind::InvalidSpcIndirectDataContent)?;

        Ok(ContentInfo {
            content_type: spc.data.type_.to_string(),
            digest_algorithm: spc.message_digest.algorithm.oid.to_string(),
            digest: to_hex_str(spc.message_digest.digest.as_bytes()),
        })
    }

    /// Views over the certificates embedded in this envelope.
    pub fn certificates(&self) -> impl Iterator<Item = X509Certificate<'_>> {
        self.certificates.iter().map(X509Certificate::new)
    }

    /// The resolved signer certificate, when the SignerInfo's
    /// (issuer, serial) pair matched exactly one embedded certificate.
    pub fn signer_certificate(&self) -> Option<X509Certificate<'_>> {
        self.signer_info
            .as_ref()
            .and_then(|signer_info| signer_info.signer_cert_idx)
            .and_then(|idx| self.certificates.get(idx))
            .map(X509Certificate::new)
    }

    /// Warnings recorded while constructing this envelope.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Structural verification: the construction warnings plus consistency
    /// findings (digest lengths against their algorithms). No cryptography
    /// happens here; digest and signature checking is the caller's job.
    pub fn verify(&self) -> Vec<String> {
        let mut out = self.warnings.clone();

        if let Some(content_info) = &self.content_info {
            check_digest_len(
                &mut out,
                "content digest",
                &content_info.digest,
                &Algorithm::from_oid_str(&content_info.digest_algorithm),
            );
        }

        if let Some(signer_info) = &self.signer_info {
            if let Some(message_digest) = &signer_info.message_digest {
                check_digest_len(
                    &mut out,
                    "messageDigest",
                    message_digest,
                    &signer_info.digest_algorithm,
                );
            }
        }

        out
    }

    /// Flatten this signature and every nested one into export records,
    /// depth-first, parent before children. A malformed envelope produces
    /// no records; its warnings stay reachable through [`Self::verify`].
    pub fn signatures(&self) -> Vec<DigitalSignature> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<DigitalSignature>) {
        if !self.envelope_ok {
            return;
        }
        out.push(self.to_digital_signature());
        if let Some(signer_info) = &self.signer_info {
            for nested in &signer_info.nested_signatures {
                nested.collect_into(out);
            }
        }
    }

    fn to_digital_signature(&self) -> DigitalSignature {
        let processor = CertificateProcessor::new();

        // Chains are resolved against the union of every certificate
        // reachable from this signature: the envelope's own pool plus the
        // pools of its timestamp envelopes.
        let mut pool = self.certificates.clone();
        let mut ms_bases = Vec::new();
        if let Some(signer_info) = &self.signer_info {
            for ms in &signer_info.ms_counter_signatures {
                ms_bases.push(pool.len());
                pool.extend_from_slice(ms.certificates());
            }
        }

        let signer = self.signer_info.as_ref().map(|signer_info| {
            let chain = signer_info
                .signer_cert_idx
                .and_then(|idx| pool.get(idx))
                .map(|cert| processor.get_chain(Some(X509Certificate::new(cert)), &pool))
                .unwrap_or_default();

            let mut counter_signers: Vec<CounterSigner> = signer_info
                .counter_signatures
                .iter()
                .map(|cs| counter_signer_from_pkcs9(cs, &processor, &pool))
                .collect();
            for (ms, base) in signer_info.ms_counter_signatures.iter().zip(&ms_bases) {
                counter_signers.push(counter_signer_from_ms(ms, *base, &processor, &pool));
            }

            Signer {
                chain: chain.iter().map(|cert| cert.to_certificate()).collect(),
                signing_time: None,
                counter_signers,
            }
        });

        // Deduplicate by SHA-256 fingerprint; first occurrence wins.
        let mut seen = Vec::new();
        let mut certificates = Vec::new();
        for cert in &pool {
            let view = X509Certificate::new(cert);
            let fingerprint = view.sha256();
            if !seen.contains(&fingerprint) {
                seen.push(fingerprint);
                certificates.push(view.to_certificate());
            }
        }

        DigitalSignature {
            signed_digest: self
                .content_info
                .as_ref()
                .map(|content_info| content_info.digest.clone()),
            digest_algorithm: self.content_info.as_ref().map(|content_info| {
                Algorithm::from_oid_str(&content_info.digest_algorithm)
                    .name()
                    .to_owned()
            }),
            file_digest: None,
            signer,
            certificates,
            warnings: self.verify(),
        }
    }
}

impl SignerInfo {
    fn parse(
        cms_signer: &CmsSignerInfo,
        certificates: &[x509_cert::Certificate],
        depth: usize,
        warnings: &mut Vec<String>,
    ) -> Self {
        let (issuer, serial, signer_cert_idx) = match &cms_signer.sid {
            SignerIdentifier::IssuerAndSerialNumber(sid) => {
                let issuer = x500_name_to_string(&sid.issuer);
                let serial = serial_to_hex(sid.serial_number.as_bytes());
                let matches = count_by_issuer_and_serial(
                    certificates,
                    &sid.issuer,
                    sid.serial_number.as_bytes(),
                );
                // The signer must be the unique certificate matching the
                // (issuer, serial) pair; zero and ambiguous both leave the
                // signer unresolved.
                let idx = if matches == 1 {
                    find_by_issuer_and_serial(
                        certificates,
                        &sid.issuer,
                        sid.serial_number.as_bytes(),
                    )
                } else {
                    record_warning(
                        warnings,
                        format!(
                            "SIGNER_NOT_FOUND: {} certificates match issuer {}, serial {}",
                            matches, issuer, serial
                        ),
                    );
                    None
                };
                (issuer, serial, idx)
            }
            SignerIdentifier::SubjectKeyIdentifier(_) => {
                record_warning(
                    warnings,
                    "SIGNER_NOT_FOUND: subjectKeyIdentifier signer identifier".to_owned(),
                );
                ("unknown".to_owned(), "unknown".to_owned(), None)
            }
        };

        let mut out = Self {
            version: cms_signer.version as u64,
            serial,
            issuer,
            content_type: None,
            message_digest: None,
            spc_info: None,
            digest_algorithm: Algorithm::from(&cms_signer.digest_alg),
            digest_encrypt_algorithm: Algorithm::from(&cms_signer.signature_algorithm),
            encrypt_digest: cms_signer.signature.as_bytes().to_vec(),
            nested_signatures: Vec::new(),
            counter_signatures: Vec::new(),
            ms_counter_signatures: Vec::new(),
            signer_cert_idx,
        };

        if let Some(auth_attrs) = &cms_signer.signed_attrs {
            for attr in auth_attrs.iter() {
                match attr.oid {
                    ID_CONTENT_TYPE => {
                        if let Some(value) = attr.values.iter().next() {
                            if let Ok(oid) = value.decode_as::<ObjectIdentifier>() {
                                out.content_type = Some(oid.to_string());
                            }
                        }
                    }
                    ID_MESSAGE_DIGEST => {
                        if let Some(value) = attr.values.iter().next() {
                            out.message_digest = Some(to_hex_str(value.value()));
                        }
                    }
                    ID_SPC_SP_OPUS_INFO => {
                        if let Some(value) = attr.values.iter().next() {
                            if let Ok(raw) = value.to_der() {
                                if let Ok(opus) = SpcSpOpusInfo::from_der(&raw) {
                                    out.spc_info = Some(SpcInfo {
                                        program_name: opus.program_name_string(),
                                        more_info: opus.more_info_url(),
                                        raw,
                                    });
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if let Some(unauth_attrs) = &cms_signer.unsigned_attrs {
            for attr in unauth_attrs.iter() {
                match attr.oid {
                    ID_COUNTER_SIGNATURE => {
                        for value in attr.values.iter() {
                            if depth + 1 >= MAX_NESTING_DEPTH {
                                record_warning(
                                    warnings,
                                    "MAX_DEPTH_EXCEEDED: counter-signature dropped".to_owned(),
                                );
                                continue;
                            }
                            let parsed = value
                                .to_der()
                                .map_app_err(AuthenticodeErrorKind::InvalidCounterSignature)
                                .and_then(|der| {
                                    Pkcs9CounterSignature::parse(
                                        &der,
                                        certificates,
                                        depth + 1,
                                        warnings,
                                    )
                                });
                            match parsed {
                                Ok(counter_signature) => {
                                    out.counter_signatures.push(counter_signature)
                                }
                                Err(err) => record_warning(warnings, err.to_warning()),
                            }
                        }
                    }
                    ID_MS_COUNTER_SIGN => {
                        for value in attr.values.iter() {
                            let parsed = value
                                .to_der()
                                .map_app_err(AuthenticodeErrorKind::InvalidTimestamp)
                                .and_then(|der| MsCounterSignature::parse(&der));
                            match parsed {
                                Ok(ms) => out.ms_counter_signatures.push(ms),
                                Err(err) => record_warning(warnings, err.to_warning()),
                            }
                        }
                    }
                    ID_SPC_NESTED_SIGNATURE => {
                        for value in attr.values.iter() {
                            if depth + 1 >= MAX_NESTING_DEPTH {
                                record_warning(
                                    warnings,
                                    "MAX_DEPTH_EXCEEDED: nested signature dropped".to_owned(),
                                );
                                continue;
                            }
                            match value.to_der() {
                                Ok(der) => out
                                    .nested_signatures
                                    .push(Pkcs7Signature::parse_at_depth(&der, depth + 1)),
                                Err(err) => record_warning(
                                    warnings,
                                    AuthenticodeError {
                                        kind: AuthenticodeErrorKind::Unknown,
                                        message: err.to_string(),
                                    }
                                    .to_warning(),
                                ),
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        out
    }
}

fn check_digest_len(out: &mut Vec<String>, what: &str, hex_digest: &str, algorithm: &Algorithm) {
    match algorithm.digest_len() {
        Some(expected) if hex_digest.len() == 2 * expected => {}
        Some(expected) => out.push(format!(
            "MALFORMED_CONTENT: {} is {} bytes, {} produces {}",
            what,
            hex_digest.len() / 2,
            algorithm.name(),
            expected
        )),
        None => out.push(format!("UNSUPPORTED_DIGEST: {}", algorithm.name())),
    }
}

fn counter_signer_from_pkcs9(
    counter_signature: &Pkcs9CounterSignature,
    processor: &CertificateProcessor,
    pool: &[x509_cert::Certificate],
) -> CounterSigner {
    let chain = pool
        .get(counter_signature.signer_cert_idx())
        .map(|cert| processor.get_chain(Some(X509Certificate::new(cert)), pool))
        .unwrap_or_default();

    CounterSigner {
        chain: chain.iter().map(|cert| cert.to_certificate()).collect(),
        signing_time: counter_signature.signing_time.clone(),
        digest: counter_signature.digest.clone(),
        nested_counter_signers: counter_signature
            .counter_signatures
            .iter()
            .map(|child| counter_signer_from_pkcs9(child, processor, pool))
            .collect(),
    }
}

fn counter_signer_from_ms(
    ms: &MsCounterSignature,
    pool_base: usize,
    processor: &CertificateProcessor,
    pool: &[x509_cert::Certificate],
) -> CounterSigner {
    let chain = ms
        .signer_cert_idx()
        .and_then(|idx| pool.get(pool_base + idx))
        .map(|cert| processor.get_chain(Some(X509Certificate::new(cert)), pool))
        .unwrap_or_default();

    CounterSigner {
        chain: chain.iter().map(|cert| cert.to_certificate()).collect(),
        signing_time: Some(ms.signing_time.clone()),
        digest: Some(to_hex_str(&ms.imprint_digest)),
        nested_counter_signers: Vec::new(),
    }
}

/// X.509 certificates of a SignedData envelope; non-certificate entries are
/// skipped.
pub(crate) fn collect_certificates(signed_data: &SignedData) -> Vec<x509_cert::Certificate> {
    let mut certificates = Vec::new();
    if let Some(cert_set) = &signed_data.certificates {
        for choice in cert_set.0.iter() {
            match choice {
                CertificateChoices::Certificate(cert) => certificates.push(cert.clone()),
                CertificateChoices::Other(other) => {
                    debug!(
                        "skipping certificate entry of format {}",
                        other.other_cert_format
                    );
                }
            }
        }
    }
    certificates
}
