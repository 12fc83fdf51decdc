#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),
}

impl Error {
    /// Decodes a non-success response from the REST backend
    ///
    /// The backend only ever sends `{"message": ...}`, so the status code carries
    /// the actual error kind.
    pub fn from_response(status: http::StatusCode, body: &[u8]) -> Error {
        use http::StatusCode;
        let message = serde_json::from_slice::<crate::Message>(body)
            .map(|m| m.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
        match status {
            StatusCode::BAD_REQUEST => Error::InvalidArgument(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied,
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Unknown(format!("{status}: {message}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn backend_bodies_map_by_status() {
        let body = br#"{"message":"Comment not found"}"#;
        assert_eq!(
            Error::from_response(StatusCode::NOT_FOUND, body),
            Error::NotFound(String::from("Comment not found")),
        );
        let body = br#"{"message":"Invalid reaction type"}"#;
        assert_eq!(
            Error::from_response(StatusCode::BAD_REQUEST, body),
            Error::InvalidArgument(String::from("Invalid reaction type")),
        );
        let body = br#"{"message":"User not authorized"}"#;
        assert_eq!(
            Error::from_response(StatusCode::UNAUTHORIZED, body),
            Error::PermissionDenied,
        );
        assert_eq!(
            Error::from_response(StatusCode::FORBIDDEN, body),
            Error::PermissionDenied,
        );
    }

    #[test]
    fn garbage_body_is_kept_as_message() {
        assert_eq!(
            Error::from_response(StatusCode::BAD_GATEWAY, b"upstream down"),
            Error::Unknown(String::from("502 Bad Gateway: upstream down")),
        );
    }
}
