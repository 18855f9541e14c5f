use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// The closed error taxonomy surfaced to the outer ADBC layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed")]
    Unauthenticated,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("server error [{code}]: {message}")]
    ServerError { code: String, message: String },
}

/// Coarse-grained classification used by the outer ADBC C-ABI layer to pick
/// a status code without string-matching [`Error`]'s `Display` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    InvalidArgument,
    InvalidState,
    Io,
    Protocol,
    Unauthenticated,
    Unsupported,
    ServerError,
}

impl Error {
    pub fn kind(&self) -> Kind {
        match self {
            Self::InvalidArgument(_) => Kind::InvalidArgument,
            Self::InvalidState(_) => Kind::InvalidState,
            Self::Io(_) => Kind::Io,
            Self::Protocol(_) => Kind::Protocol,
            Self::Unauthenticated => Kind::Unauthenticated,
            Self::Unsupported(_) => Kind::Unsupported,
            Self::ServerError { .. } => Kind::ServerError,
        }
    }

    /// Whether this error should flip a [`crate::client::NativeClient`] into
    /// its broken state, where only `close()` is valid until reconnected.
    pub fn is_connection_broken(&self) -> bool {
        matches!(self.kind(), Kind::Io | Kind::Protocol)
    }
}
