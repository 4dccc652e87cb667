use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthenticodeErrorKind {
    /// Outer ContentInfo could not be decoded.
    InvalidContentInfo,

    /// Outer content type is not signedData.
    InvalidContentType,

    /// SignedData body could not be decoded.
    InvalidSignedData,

    /// Encapsulated content is missing.
    EmptyEncapsulatedContent,

    /// SpcIndirectDataContent could not be decoded, or the content type is wrong.
    InvalidSpcIndirectDataContent,

    /// Counter-signature SignerInfo could not be decoded.
    InvalidCounterSignature,

    /// Counter-signature signer certificate is not in the certificate pool.
    CounterSignerNotFound,

    /// RFC 3161 timestamp token could not be decoded.
    InvalidTimestamp,

    /// signingTime attribute value could not be decoded.
    InvalidSigningTime,

    /// Digest algorithm outside the supported set.
    UnsupportedAlgorithm,

    /// PEM certificate input could not be decoded.
    InvalidPemCertificate,

    Unknown,
}

impl AuthenticodeErrorKind {
    /// Stable code used as the prefix of warnings-log entries.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidContentInfo | Self::InvalidContentType | Self::InvalidSignedData => {
                "MALFORMED_ENVELOPE"
            }
            Self::EmptyEncapsulatedContent | Self::InvalidSpcIndirectDataContent => {
                "MALFORMED_CONTENT"
            }
            Self::InvalidCounterSignature => "MALFORMED_COUNTERSIGNATURE",
            Self::CounterSignerNotFound => "COUNTERSIG_SIGNER_NOT_FOUND",
            Self::InvalidTimestamp => "MALFORMED_TIMESTAMP",
            Self::InvalidSigningTime => "MALFORMED_TIME",
            Self::UnsupportedAlgorithm => "UNSUPPORTED_DIGEST",
            Self::InvalidPemCertificate => "INVALID_PEM",
            Self::Unknown => "PARSE_ERROR",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthenticodeError {
    pub kind: AuthenticodeErrorKind,
    pub message: String,
}

impl AuthenticodeError {
    /// Render as a warnings-log entry: `CODE: detail`.
    pub fn to_warning(&self) -> String {
        if self.message.is_empty() {
            self.kind.code().to_owned()
        } else {
            format!("{}: {}", self.kind.code(), self.message)
        }
    }
}

impl fmt::Display for AuthenticodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AuthenticodeError {}

pub trait AuthenticodeResult<T> {
    fn map_app_err(self, kind: AuthenticodeErrorKind) -> Result<T, AuthenticodeError>;
    fn map_unknown_err(self) -> Result<T, AuthenticodeError>;
}

impl<T, E> AuthenticodeResult<T> for std::result::Result<T, E>
where
    E: std::error::Error + 'static,
{
    fn map_app_err(self, kind: AuthenticodeErrorKind) -> Result<T, AuthenticodeError> {
        self.map_err(|err| AuthenticodeError {
            kind,
            message: err.to_string(),
        })
    }

    fn map_unknown_err(self) -> Result<T, AuthenticodeError> {
        self.map_app_err(AuthenticodeErrorKind::Unknown)
    }
}
