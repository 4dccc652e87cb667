use serde::Serialize;

use crate::cert::Certificate;

/// Flattened, export-ready view of one Authenticode signature. Nested
/// signatures flatten into records of their own; see
/// [`Pkcs7Signature::signatures`](crate::signature::Pkcs7Signature::signatures).
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalSignature {
    /// Hex digest the signer committed to (the PE image hash).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_digest: Option<String>,
    /// Short name of the digest algorithm, e.g. `sha256`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_algorithm: Option<String>,
    /// The freshly computed hash of the PE image, filled in by the caller
    /// for comparison against `signed_digest`. Never set by the parser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<Signer>,
    /// Every certificate reachable from this signature, deduplicated by
    /// SHA-256 fingerprint, first occurrence first.
    pub certificates: Vec<Certificate>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signer {
    /// Best-effort chain, leaf first.
    pub chain: Vec<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_time: Option<String>,
    pub counter_signers: Vec<CounterSigner>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSigner {
    /// Best-effort chain, leaf first.
    pub chain: Vec<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub nested_counter_signers: Vec<CounterSigner>,
}
