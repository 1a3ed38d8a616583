use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed for {}: {message}", .parameters.join(", "))]
    Validation { parameters: Vec<String>, message: String },

    #[error("\"{call}\": {message}")]
    State { call: String, message: String },

    #[error("motion block topology mismatch: {message}")]
    TopologyMismatch { message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("expected {expected}, got {found}")]
    Type { expected: String, found: String },

    #[error("invalid hierarchy: {message}")]
    Hierarchy { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("unable to load \"{path}\": {message}")]
    Resource { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error)
}

impl Error {
    pub fn validation(parameters: Vec<String>, message: impl Into<String>) -> Self {
        Self::Validation { parameters, message: message.into() }
    }

    pub fn state(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self::State { call: call.into(), message: message.into() }
    }

    pub fn topology(message: impl Into<String>) -> Self {
        Self::TopologyMismatch { message: message.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn type_error(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Type { expected: expected.into(), found: found.into() }
    }

    pub fn hierarchy(message: impl Into<String>) -> Self {
        Self::Hierarchy { message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn resource(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resource { path: path.into(), message: message.into() }
    }

    /// Fatal errors abort the whole render. The rest may be swallowed at a
    /// procedural boundary, leaving that procedural empty.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Resource { .. } | Self::Io(_) | Self::Other(_))
    }
}
