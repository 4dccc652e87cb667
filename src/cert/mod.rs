mod certificate;
mod processor;

pub use certificate::{Algorithm, Attributes, Certificate, X509Certificate};
pub use processor::CertificateProcessor;

use x509_cert::name::Name;

// The (issuer, serial) pair is the unique key identifying a certificate
// within a PKCS#7 envelope; every signer and counter-signer resolves its
// certificate through these lookups.

/// First certificate in `pool` matching the (issuer, serial) pair.
pub(crate) fn find_by_issuer_and_serial(
    pool: &[x509_cert::Certificate],
    issuer: &Name,
    serial: &[u8],
) -> Option<usize> {
    pool.iter().position(|cert| {
        cert.tbs_certificate.issuer == *issuer
            && cert.tbs_certificate.serial_number.as_bytes() == serial
    })
}

/// Number of certificates in `pool` matching the (issuer, serial) pair.
pub(crate) fn count_by_issuer_and_serial(
    pool: &[x509_cert::Certificate],
    issuer: &Name,
    serial: &[u8],
) -> usize {
    pool.iter()
        .filter(|cert| {
            cert.tbs_certificate.issuer == *issuer
                && cert.tbs_certificate.serial_number.as_bytes() == serial
        })
        .count()
}
