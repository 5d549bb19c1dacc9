use std::time::Duration;
use ureq::{Agent, Error as UreqError};

use crate::error::RepositoryError;

// Fail fast: a slow network must surface as a transport error well before
// the next poll tick, never be mistaken for a missing campaign.
const TIMEOUT_GLOBAL: Duration = Duration::from_secs(15);
const TIMEOUT_PER_CALL: Duration = Duration::from_secs(10);
const TIMEOUT_RESOLVE: Duration = Duration::from_secs(3);
const TIMEOUT_CONNECT: Duration = Duration::from_secs(3);
const TIMEOUT_SEND_REQUEST: Duration = Duration::from_secs(3);
const TIMEOUT_SEND_BODY: Duration = Duration::from_secs(5);
const TIMEOUT_RECV_RESPONSE: Duration = Duration::from_secs(5);
const TIMEOUT_RECV_BODY: Duration = Duration::from_secs(10);

/// Agent used by the HTTP repository. Status codes are returned as responses
/// so error bodies (`{"detail": ...}`) can be read.
pub fn default_agent() -> Agent {
    let config = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(TIMEOUT_GLOBAL))
        .timeout_per_call(Some(TIMEOUT_PER_CALL))
        .timeout_resolve(Some(TIMEOUT_RESOLVE))
        .timeout_connect(Some(TIMEOUT_CONNECT))
        .timeout_send_request(Some(TIMEOUT_SEND_REQUEST))
        .timeout_send_body(Some(TIMEOUT_SEND_BODY))
        .timeout_recv_response(Some(TIMEOUT_RECV_RESPONSE))
        .timeout_recv_body(Some(TIMEOUT_RECV_BODY))
        .build();
    config.into()
}

/// Map a failed exchange (no usable response) onto the repository taxonomy.
pub fn transport_error(err: &UreqError) -> RepositoryError {
    match err {
        UreqError::StatusCode(code) => classify_status(*code, String::new()),
        UreqError::Timeout(_)
        | UreqError::Io(_)
        | UreqError::HostNotFound
        | UreqError::ConnectionFailed
        | UreqError::TooManyRedirects
        | UreqError::RedirectFailed => RepositoryError::Transport(err.to_string()),
        UreqError::Json(_) => RepositoryError::InvalidResponse(err.to_string()),
        _ => RepositoryError::Transport(err.to_string()),
    }
}

/// Map a non-success HTTP status onto the repository taxonomy.
pub fn classify_status(status: u16, detail: String) -> RepositoryError {
    let detail = if detail.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        detail
    };
    match status {
        404 => RepositoryError::NotFound(detail),
        401 | 403 => RepositoryError::Unauthorized(detail),
        400..=499 => RepositoryError::Rejected { status, detail },
        _ => RepositoryError::Transport(detail),
    }
}

/// Pull the human-readable reason out of an error body.
///
/// FastAPI answers `{"detail": "..."}` or, for validation errors, a list of
/// `{"msg": "..."}` objects. Plain-text bodies are passed through.
pub fn extract_detail(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };
    match value.get("detail") {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|msg| msg.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_separates_not_found_from_rejections() {
        assert!(classify_status(404, "gone".into()).is_not_found());
        assert_eq!(
            classify_status(409, "already running".into()),
            RepositoryError::Rejected {
                status: 409,
                detail: "already running".into()
            }
        );
        assert!(matches!(
            classify_status(401, String::new()),
            RepositoryError::Unauthorized(_)
        ));
        assert!(classify_status(502, String::new()).is_transient());
    }

    #[test]
    fn classify_status_fills_empty_detail() {
        assert_eq!(
            classify_status(404, "  ".into()),
            RepositoryError::NotFound("HTTP 404".into())
        );
    }

    #[test]
    fn extract_detail_reads_fastapi_bodies() {
        assert_eq!(
            extract_detail(r#"{"detail": "Prospecção não encontrada."}"#),
            "Prospecção não encontrada."
        );
        assert_eq!(
            extract_detail(r#"{"detail": [{"msg": "field required"}, {"msg": "bad id"}]}"#),
            "field required; bad id"
        );
        assert_eq!(extract_detail("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn transport_errors_are_transient() {
        assert!(transport_error(&UreqError::ConnectionFailed).is_transient());
        assert!(transport_error(&UreqError::StatusCode(404)).is_not_found());
    }
}
