//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The subscriber's connection closed before attachment completed
    ConnectionClosed { stream_id: String, session_id: u64 },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::ConnectionClosed {
                stream_id,
                session_id,
            } => write!(
                f,
                "connection {} closed before attaching to stream {}",
                session_id, stream_id
            ),
        }
    }
}

impl std::error::Error for RegistryError {}
