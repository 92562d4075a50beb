use thiserror::Error;

/// Minimal shared error for cross-crate plumbing (parse failures and the
/// like). Domain crates define their own richer enums.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
