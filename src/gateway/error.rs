use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Failure of a proxy handler, mapped onto the HTTP status the client sees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("The AI service needs more credits. Please try again later.")]
    QuotaExhausted,
    #[error("The AI service is taking a breather. Please try again in a moment.")]
    RateLimited,
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::InvalidInput(_) => 400,
            GatewayError::Unauthorized => 401,
            GatewayError::QuotaExhausted => 402,
            GatewayError::RateLimited => 429,
            GatewayError::Internal(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// What an upstream collaborator (AI gateway, database) can report.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upstream unreachable: {0}")]
    Transport(String),
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status: 429, .. } => GatewayError::RateLimited,
            UpstreamError::Status { status: 402, .. } => GatewayError::QuotaExhausted,
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, GatewayError> {
    let token = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(GatewayError::Unauthorized);
    }
    Ok(token)
}

/// Turns a handler result into a status code and JSON body.
pub fn respond<T: Serialize>(result: Result<T, GatewayError>) -> (u16, Value) {
    let outcome = result.and_then(|body| {
        serde_json::to_value(body).map_err(|err| GatewayError::Internal(err.to_string()))
    });
    match outcome {
        Ok(body) => (200, body),
        Err(err) => (
            err.status(),
            serde_json::to_value(err.body()).unwrap_or(Value::Null),
        ),
    }
}
