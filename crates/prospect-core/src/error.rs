use thiserror::Error;

use crate::types::CampaignId;

/// Errors from the campaign repository boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RepositoryError {
    /// Whether the remote resource no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }

    /// Whether the failure is expected to clear on its own on a later request.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Transport(_))
    }
}

/// Errors surfaced by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Refused(String),

    #[error("{action} needs explicit confirmation")]
    ConfirmationRequired { action: &'static str },

    #[error("unknown campaign {0}")]
    UnknownCampaign(CampaignId),

    #[error("no campaign selected")]
    NoSelection,

    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

/// Coarse error class shown next to an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Rejected,
    Unauthorized,
    Transport,
    InvalidResponse,
    Refused,
}

/// Error state kept by the controller for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ControllerError> for ErrorNotice {
    fn from(err: &ControllerError) -> Self {
        let kind = match err {
            ControllerError::Repository(RepositoryError::NotFound(_)) => ErrorKind::NotFound,
            ControllerError::Repository(RepositoryError::Rejected { .. }) => ErrorKind::Rejected,
            ControllerError::Repository(RepositoryError::Unauthorized(_)) => {
                ErrorKind::Unauthorized
            }
            ControllerError::Repository(RepositoryError::Transport(_)) => ErrorKind::Transport,
            ControllerError::Repository(RepositoryError::InvalidResponse(_)) => {
                ErrorKind::InvalidResponse
            }
            ControllerError::Refused(_)
            | ControllerError::ConfirmationRequired { .. }
            | ControllerError::UnknownCampaign(_)
            | ControllerError::NoSelection => ErrorKind::Refused,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}
