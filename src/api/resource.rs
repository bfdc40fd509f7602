//! Success/error envelope for remote calls.

/// Fixed message for connectivity failures.
pub const MSG_CONNECTION: &str = "Verifique sua conexão de internet.";

/// Tagged outcome of a remote call. Exactly one arm is populated; there is no
/// partial-success state. `Error` carries a user-presentable message, already
/// classified; callers must not try to re-interpret transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    Success(T),
    Error(String),
}

impl<T> Resource<T> {
    /// Retained for API completeness; consumers mostly go through
    /// `into_result`.
    #[allow(dead_code)]
    pub fn is_success(&self) -> bool {
        matches!(self, Resource::Success(_))
    }

    /// Unwrap into a std `Result` at the presentation boundary.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Resource::Success(value) => Ok(value),
            Resource::Error(message) => Err(message),
        }
    }
}

/// Message for a non-2xx response.
pub(crate) fn request_error(status: u16) -> String {
    format!("Erro na requisição: {status}")
}

/// Message for anything that is neither a connectivity failure nor an HTTP
/// status, e.g. a body that fails to decode.
pub(crate) fn unknown_error(detail: impl std::fmt::Display) -> String {
    format!("Um erro desconhecido ocorreu: {detail}")
}

/// Classify a request-send failure. Connectivity problems get the fixed
/// connection message; everything else is reported as unknown.
pub(crate) fn classify_send_error(err: &reqwest::Error) -> String {
    if err.is_connect() || err.is_timeout() {
        MSG_CONNECTION.to_string()
    } else {
        unknown_error(err)
    }
}
