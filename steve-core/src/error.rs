//! The error taxonomy every store, dispatcher, and formatter path returns (§7 "Error
//! Handling Design"), grounded in `pkg/apierror/error.go`'s `APIError{Code, Message, Cause,
//! FieldName}`.
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One of the seven error shapes the dispatcher is permitted to return to a client.
///
/// Each variant fixes an HTTP status and a wire `code`; `message`/`field`/`cause` carry the
/// specifics. Constructing one of these is the only way application code signals failure —
/// there is no generic "internal error" escape hatch beyond [`ErrorKind::server_error`].
#[derive(Error, Debug, Clone, Serialize)]
#[error("{code} ({status}): {message}")]
pub struct ErrorKind {
    /// HTTP status code.
    pub status: u16,
    /// Short machine-readable code, e.g. `"NotFound"`.
    pub code: &'static str,
    /// Human-readable detail.
    pub message: String,
    /// The request field this error pertains to, if any (e.g. a bad query parameter name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The underlying error, if this wraps one. Not serialized — clients see `message` only.
    #[serde(skip)]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
            && self.code == other.code
            && self.message == other.message
            && self.field == other.field
    }
}

impl ErrorKind {
    fn new(status: u16, code: &'static str, message: impl Into<String>) -> Self {
        ErrorKind {
            status,
            code,
            message: message.into(),
            field: None,
            cause: None,
        }
    }

    /// 404, requested object or collection does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, "NotFound", message)
    }

    /// 403, the caller's `AccessSet` does not grant the attempted verb.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(403, "Forbidden", message)
    }

    /// 403, a mutating request's CSRF token did not match.
    pub fn invalid_csrf_token() -> Self {
        Self::new(403, "InvalidCSRFToken", "invalid CSRF token")
    }

    /// 422, the request named an action the resource does not support.
    pub fn invalid_action(message: impl Into<String>) -> Self {
        Self::new(422, "InvalidAction", message)
    }

    /// 500, something failed that the caller cannot correct by changing the request.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(500, "ServerError", message)
    }

    /// 401, the caller presented no usable identity.
    pub fn unauthorized() -> Self {
        Self::new(401, "Unauthorized", "unauthorized")
    }

    /// 405, the resource does not support the attempted HTTP method.
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(405, "MethodNotAllowed", message)
    }

    /// Attach a field name, e.g. the offending query parameter.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach an underlying error for logging; not exposed on the wire.
    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }
}

impl From<serde_json::Error> for ErrorKind {
    fn from(err: serde_json::Error) -> Self {
        ErrorKind::server_error(err.to_string()).with_cause(err)
    }
}

/// The JSON shape an [`ErrorKind`] is rendered as on the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The status text, e.g. `"Forbidden"`.
    pub status: String,
    /// Human-readable detail.
    pub message: String,
    /// Machine-readable code, mirrors [`ErrorKind::code`].
    pub code: String,
    /// HTTP status.
    pub status_code: u16,
}

impl From<&ErrorKind> for ErrorResponse {
    fn from(kind: &ErrorKind) -> Self {
        ErrorResponse {
            status: kind.code.to_string(),
            message: kind.message.clone(),
            code: kind.code.to_string(),
            status_code: kind.status,
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fix_status_and_code() {
        assert_eq!(ErrorKind::not_found("x").status, 404);
        assert_eq!(ErrorKind::permission_denied("x").status, 403);
        assert_eq!(ErrorKind::invalid_csrf_token().code, "InvalidCSRFToken");
        assert_eq!(ErrorKind::invalid_action("x").status, 422);
        assert_eq!(ErrorKind::server_error("x").status, 500);
        assert_eq!(ErrorKind::unauthorized().status, 401);
        assert_eq!(ErrorKind::method_not_allowed("x").status, 405);
    }

    #[test]
    fn with_field_and_cause_attach_without_changing_wire_shape() {
        let err = ErrorKind::invalid_action("bad action").with_field("action");
        assert_eq!(err.field.as_deref(), Some("action"));
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.message, "bad action");
        assert_eq!(resp.status_code, 422);
    }
}
