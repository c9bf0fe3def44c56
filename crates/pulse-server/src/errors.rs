//! Server error types.

/// Failures starting or running the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The global metrics recorder could not be installed.
    #[error("metrics recorder: {0}")]
    Metrics(String),

    /// Other listener I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Bind failure for `addr`.
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::bind(
            "127.0.0.1:8740",
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:8740"));
        assert!(msg.contains("in use"));
    }

    #[test]
    fn io_converts() {
        let err: ServerError = std::io::Error::other("boom").into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
