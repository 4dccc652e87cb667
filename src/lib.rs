//! Authenticode PKCS#7 signature parsing for PE files.
//!
//! Takes the raw bytes of an attribute certificate table entry (a
//! DER-encoded PKCS#7 `SignedData` whose content is an
//! `SpcIndirectDataContent`) and produces a structured, recursively
//! resolved view: the signed digest, the signer with its certificate chain
//! and attributes, nested Authenticode signatures, PKCS#9
//! counter-signatures and Microsoft RFC 3161 timestamps.
//!
//! Parsing is total. Malformed structures degrade to partial results with
//! warnings; nothing panics and no error crosses the API boundary:
//!
//! ```no_run
//! use pe_authenticode::Pkcs7Signature;
//!
//! let blob = std::fs::read("signature.der").unwrap();
//! let signature = Pkcs7Signature::parse(&blob);
//! for record in signature.signatures() {
//!     println!(
//!         "{} digest {}",
//!         record.digest_algorithm.as_deref().unwrap_or("unknown"),
//!         record.signed_digest.as_deref().unwrap_or("-"),
//!     );
//! }
//! for warning in signature.verify() {
//!     eprintln!("warning: {warning}");
//! }
//! ```
//!
//! Out of scope by design: locating the certificate table inside the PE
//! image, hashing the PE image itself, and cryptographic verification of
//! signatures and digests. This crate exposes what was signed; comparing
//! it against the file is the caller's step.

pub mod asn1_types;
pub mod cert;
pub mod errors;
pub mod export;
pub mod ms_counter_signature;
pub mod pkcs9;
pub mod signature;
pub mod tstinfo;
pub mod utils;

pub use cert::{Algorithm, Attributes, Certificate, CertificateProcessor, X509Certificate};
pub use errors::{AuthenticodeError, AuthenticodeErrorKind, AuthenticodeResult};
pub use export::{CounterSigner, DigitalSignature, Signer};
pub use ms_counter_signature::MsCounterSignature;
pub use pkcs9::Pkcs9CounterSignature;
pub use signature::{ContentInfo, Pkcs7Signature, SignerInfo, SpcInfo, MAX_NESTING_DEPTH};
