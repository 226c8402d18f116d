use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::{json, Value};
use tracing::error;

/// Failure modes of one check request, mapped to HTTP statuses at the
/// boundary. Everything not named here is an unexpected server error.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("{}", .0.join(" "))]
    Validation(Vec<String>),
    #[error("Could not resolve URL.")]
    UnresolvableHost,
    #[error("Request to third-party API failed with status code {0}.")]
    UpstreamStatus(u16),
    #[error("Request to third-party API timed out.")]
    UpstreamTimeout,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// `{"detail": ...}` for a single message, `{"details": [...]}` for several.
pub fn detail(messages: &[String]) -> Value {
    if messages.len() == 1 {
        json!({ "detail": messages[0] })
    } else {
        json!({ "details": messages })
    }
}

impl actix_web::ResponseError for CheckError {
    fn status_code(&self) -> StatusCode {
        match self {
            CheckError::Validation(_) | CheckError::UnresolvableHost => StatusCode::BAD_REQUEST,
            CheckError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
            CheckError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            CheckError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let messages = match self {
            CheckError::Validation(messages) => messages.clone(),
            CheckError::Unexpected(e) => {
                // The cause goes to the log, never to the client.
                error!(error=?e, "unexpected failure while checking site");
                vec!["Internal server error.".to_string()]
            }
            other => vec![other.to_string()],
        };
        HttpResponse::build(self.status_code()).json(detail(&messages))
    }
}
