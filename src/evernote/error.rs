use std::fmt;

/// `EDAMErrorCode` from the Evernote API reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdamErrorCode {
    Unknown,
    BadDataFormat,
    PermissionDenied,
    InternalError,
    DataRequired,
    LimitReached,
    QuotaReached,
    InvalidAuth,
    AuthExpired,
    DataConflict,
    EnmlValidation,
    ShardUnavailable,
    LenTooShort,
    LenTooLong,
    TooFew,
    TooMany,
    UnsupportedOperation,
    TakenDown,
    RateLimitReached,
    Other(i32),
}

impl EdamErrorCode {
    pub fn from_i32(code: i32) -> Self {
        match code {
            1 => Self::Unknown,
            2 => Self::BadDataFormat,
            3 => Self::PermissionDenied,
            4 => Self::InternalError,
            5 => Self::DataRequired,
            6 => Self::LimitReached,
            7 => Self::QuotaReached,
            8 => Self::InvalidAuth,
            9 => Self::AuthExpired,
            10 => Self::DataConflict,
            11 => Self::EnmlValidation,
            12 => Self::ShardUnavailable,
            13 => Self::LenTooShort,
            14 => Self::LenTooLong,
            15 => Self::TooFew,
            16 => Self::TooMany,
            17 => Self::UnsupportedOperation,
            18 => Self::TakenDown,
            19 => Self::RateLimitReached,
            other => Self::Other(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::BadDataFormat => "BAD_DATA_FORMAT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DataRequired => "DATA_REQUIRED",
            Self::LimitReached => "LIMIT_REACHED",
            Self::QuotaReached => "QUOTA_REACHED",
            Self::InvalidAuth => "INVALID_AUTH",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::DataConflict => "DATA_CONFLICT",
            Self::EnmlValidation => "ENML_VALIDATION",
            Self::ShardUnavailable => "SHARD_UNAVAILABLE",
            Self::LenTooShort => "LEN_TOO_SHORT",
            Self::LenTooLong => "LEN_TOO_LONG",
            Self::TooFew => "TOO_FEW",
            Self::TooMany => "TOO_MANY",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            Self::TakenDown => "TAKEN_DOWN",
            Self::RateLimitReached => "RATE_LIMIT_REACHED",
            Self::Other(_) => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for EdamErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{code}"),
            known => f.write_str(known.name()),
        }
    }
}

/// Errors from talking to Evernote, either the OAuth endpoint or the NoteStore.
#[derive(Debug, thiserror::Error)]
pub enum EvernoteError {
    /// Something was wrong with the submitted data or the auth token.
    #[error("EDAMUserException(errorCode={code}, parameter={})", .parameter.as_deref().unwrap_or("None"))]
    User {
        code: EdamErrorCode,
        parameter: Option<String>,
    },

    #[error("EDAMSystemException(errorCode={code}, message={})", .message.as_deref().unwrap_or("None"))]
    System {
        code: EdamErrorCode,
        message: Option<String>,
        rate_limit_duration: Option<i32>,
    },

    /// A referenced object (e.g. notebook GUID) does not exist.
    #[error("EDAMNotFoundException(identifier={}, key={})", .identifier.as_deref().unwrap_or("None"), .key.as_deref().unwrap_or("None"))]
    NotFound {
        identifier: Option<String>,
        key: Option<String>,
    },

    #[error("TApplicationException(type={kind}): {message}")]
    Application { kind: i32, message: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl EvernoteError {
    /// Whether the stored access token is no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            EvernoteError::User {
                code: EdamErrorCode::InvalidAuth | EdamErrorCode::AuthExpired,
                ..
            }
        )
    }
}

impl From<thrift::Error> for EvernoteError {
    fn from(e: thrift::Error) -> Self {
        EvernoteError::Protocol(e.to_string())
    }
}

impl From<reqwest::Error> for EvernoteError {
    fn from(e: reqwest::Error) -> Self {
        EvernoteError::Http(e.to_string())
    }
}
