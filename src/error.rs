use std::path::PathBuf;

use thiserror::Error;

use crate::fragment::FragmentError;
use crate::transport::TransportError;

/// Misconfiguration detected before a session is accepted.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("element id must be set")]
    EmptyElementId,
    #[error("failed to read template {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("no element found with an id of {0} in the template")]
    ElementNotFound(String),
    #[error("{count} elements share the id {id} in the template")]
    DuplicateElement { id: String, count: usize },
}

/// Fatal failures of a live session. Each one ends the connection.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed event message: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("handler for {event} failed: {message}")]
    Handler { event: String, message: String },
    #[error("render failed: {0}")]
    Render(#[from] minijinja::Error),
    #[error(transparent)]
    ElementNotFound(#[from] FragmentError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid page: {0}")]
    Setup(#[from] SetupError),
}

impl SessionError {
    /// Short machine-readable name, used as the WebSocket close reason.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Protocol(_) => "protocol_error",
            SessionError::Handler { .. } => "handler_error",
            SessionError::Render(_) => "render_error",
            SessionError::ElementNotFound(_) => "element_not_found",
            SessionError::Transport(_) => "transport_error",
            SessionError::Setup(_) => "setup_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            SessionError::Protocol(serde_json::from_str::<u8>("x").unwrap_err()),
            SessionError::Handler {
                event: "e".into(),
                message: "m".into(),
            },
            SessionError::Render(minijinja::Error::new(
                minijinja::ErrorKind::InvalidOperation,
                "x",
            )),
            SessionError::ElementNotFound(FragmentError::ElementNotFound("app".into())),
            SessionError::Transport(TransportError::Closed),
            SessionError::Setup(SetupError::EmptyElementId),
        ];
        let mut codes: Vec<_> = errors.iter().map(SessionError::code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn element_not_found_message_names_the_id() {
        let err = SessionError::from(FragmentError::ElementNotFound("app".into()));
        assert_eq!(
            err.to_string(),
            "no element found with an id of app in the template"
        );
    }

    #[test]
    fn handler_message_names_the_event() {
        let err = SessionError::Handler {
            event: "save".into(),
            message: "disk full".into(),
        };
        assert_eq!(err.to_string(), "handler for save failed: disk full");
    }
}
