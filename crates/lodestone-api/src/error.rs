//! Listener errors surfaced to the binary.

use std::net::SocketAddr;

use thiserror::Error;

/// Result alias for API server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Errors raised while binding or serving the API.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listen address could not be bound.
    #[error("failed to bind api listener")]
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The accept loop stopped before shutdown was requested.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ApiServerError {
    /// Address the failure relates to, when known.
    #[must_use]
    pub const fn addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Bind { addr, .. } => Some(*addr),
            Self::Serve { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;
    use std::net::TcpListener;

    #[tokio::test]
    async fn occupied_port_reports_bind_failure() -> anyhow::Result<()> {
        let taken = TcpListener::bind("127.0.0.1:0")?;
        let addr = taken.local_addr()?;
        let err = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })
            .expect_err("port already bound");
        assert_eq!(err.to_string(), "failed to bind api listener");
        assert_eq!(err.addr(), Some(addr));
        assert!(err.source().is_some());
        Ok(())
    }

    #[test]
    fn serve_failure_has_no_address() {
        let err = ApiServerError::Serve {
            source: io::Error::new(io::ErrorKind::BrokenPipe, "lost"),
        };
        assert_eq!(err.to_string(), "api server terminated unexpectedly");
        assert_eq!(err.addr(), None);
    }
}
