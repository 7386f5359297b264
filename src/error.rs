use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("The provided JWT does not match the expected issuer. Provided issuer: {0}")]
    WrongIssuer(String),
    #[error("The provided JWT has expired. Expiration timestamp: {0}")]
    TokenExpired(i64),
    #[error("The provided JWT carries no subject")]
    SubjectMissing,
    #[error("Missing 'kid' in the header of the provided JWT")]
    KeyIdMissing,
    #[error("Key of your provided JWT does not match in JWKs")]
    KeyNotMatchInJwks,
    #[error("Only RSA or Octet keys are currently supported, got: {0}")]
    AlgorithmNotSupported(String),
    #[error("Authorization header is not of the form '<type> <token>'")]
    MalformedAuthorizationHeader,
    #[error("JWKS cache error: {0}")]
    JwksCacheError(String),
    #[error("Token exchange failed: {0}")]
    Exchange(String),
    #[error("Authentication exception")]
    AuthenticationFailed,
    #[error("Identity store error: {0}")]
    Persistence(String),
    #[error("A renewal sweep is already running")]
    SweepInProgress,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(
        "No audiences configured - at least one expected audience must be configured for security"
    )]
    NoAudiencesConfigured,
}

/// Coarse classification used at the authentication boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed, unverifiable or expired credential; never retried
    RejectedCredential,
    /// Token endpoint refused or garbled the exchange
    ExchangeFailure,
    PersistenceFailure,
    Configuration,
    /// Another sweep holds the renewal lock
    Busy,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Jwt(_)
            | Error::WrongIssuer(_)
            | Error::TokenExpired(_)
            | Error::SubjectMissing
            | Error::KeyIdMissing
            | Error::KeyNotMatchInJwks
            | Error::AlgorithmNotSupported(_)
            | Error::MalformedAuthorizationHeader => ErrorKind::RejectedCredential,
            Error::Reqwest(_)
            | Error::JwksCacheError(_)
            | Error::Exchange(_)
            | Error::AuthenticationFailed => ErrorKind::ExchangeFailure,
            Error::Persistence(_) => ErrorKind::PersistenceFailure,
            Error::SweepInProgress => ErrorKind::Busy,
            Error::InvalidConfig(_) | Error::NoAudiencesConfigured => ErrorKind::Configuration,
        }
    }

    /// HTTP status the hosting boundary should answer with
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::RejectedCredential | ErrorKind::ExchangeFailure => StatusCode::UNAUTHORIZED,
            ErrorKind::PersistenceFailure | ErrorKind::Configuration => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

pub(crate) fn openid_jwks_error(error: reqwest::Error) -> Error {
    Error::JwksCacheError(format!("Failed to fetch OpenID config: {error}"))
}

pub(crate) fn fetch_jwks_error(error: reqwest::Error) -> Error {
    Error::JwksCacheError(format!("Failed to fetch JWKS: {error}"))
}

pub(crate) fn persistence_error(error: impl std::fmt::Display) -> Error {
    Error::Persistence(error.to_string())
}
