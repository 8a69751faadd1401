// shopwire/src/errors.rs

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Transport failure or peer gone mid-operation. Fatal for that
    /// connection only, never for the server.
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Malformed length prefix on the wire. The stream can no longer be
    /// trusted, so the connection is terminated.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Encode-side guard: the payload cannot be represented in the
    /// fixed-width length prefix.
    #[error("Frame payload of {0} bytes exceeds the protocol maximum")]
    FrameTooLarge(usize),

    /// Payload was not valid UTF-8 / JSON where text was expected.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid credentials or an unknown session id.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Declared upload size over the limit, or the received byte count
    /// did not match the declared size.
    #[error("Upload error: {0}")]
    UploadSize(String),

    /// Search or vision backend failure; the message is passed through
    /// verbatim to the client.
    #[error("{0}")]
    Collaborator(String),

    /// Client side only: the server answered a request with a
    /// structured `{"status":"error"}` response.
    #[error("Server rejected request: {0}")]
    Rejected(String),
}

impl AppError {
    /// Whether the command loop may continue on this connection after
    /// reporting the error to the client. Transport and framing faults
    /// are fatal; an aborted upload leaves the stream desynchronized,
    /// so it is fatal too.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Decode(_) | AppError::Auth(_) | AppError::Collaborator(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal() {
        let err = AppError::Connection(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(!err.is_recoverable());
        assert!(!AppError::Framing("bad prefix".into()).is_recoverable());
        assert!(!AppError::UploadSize("short read".into()).is_recoverable());
    }

    #[test]
    fn command_level_errors_keep_the_connection() {
        assert!(AppError::Auth("invalid session".into()).is_recoverable());
        assert!(AppError::Decode("not utf-8".into()).is_recoverable());
        assert!(AppError::Collaborator("backend down".into()).is_recoverable());
    }
}
