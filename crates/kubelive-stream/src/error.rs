use thiserror::Error;

/// Failure of a single transport open or of an open stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status {status}")]
    Status { status: u16 },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stream closed by server")]
    Closed,
}

/// Terminal error surfaced through the connection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("max reconnection attempts reached ({attempts}): {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_retries_message() {
        let err = ConnectionError::MaxRetriesExceeded {
            attempts: 10,
            last_error: TransportError::Status { status: 503 }.to_string(),
        };
        let shown = err.to_string();
        assert!(shown.starts_with("max reconnection attempts reached"));
        assert!(shown.contains("503"));
    }
}
