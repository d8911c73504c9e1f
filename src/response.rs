use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    NetworkError,
    /// Non-retryable HTTP status.
    HttpError(u16),
    RetryExhausted,
    MalformedResponse {
        raw_body: Option<String>,
    },
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::NetworkError => "network_error",
            Self::HttpError(_) => "http_error",
            Self::RetryExhausted => "retry_exhausted",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpError(status) => write!(f, "http_error({status})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of a single `generate` call. Expected API failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    Success { text: String },
    Failure { kind: ErrorKind, detail: String },
}

impl ApiResponse {
    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<String, GenerateError> {
        match self {
            Self::Success { text } => Ok(text),
            Self::Failure { kind, detail } => Err(GenerateError { kind, detail }),
        }
    }
}

/// `Failure` lifted into `std::error::Error` for front ends that propagate with `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)?;
        if let ErrorKind::MalformedResponse {
            raw_body: Some(body),
        } = &self.kind
        {
            write!(f, "\nRaw response: {body}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GenerateError {}
