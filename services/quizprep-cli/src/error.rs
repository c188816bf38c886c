//! CLI-specific error types

use std::path::PathBuf;

use thiserror::Error;

/// Command errors that are not API or configuration failures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no password given: set QUIZPREP_PASSWORD or pass --password-file")]
    PasswordMissing,

    #[error("failed to read password file {path}: {source}")]
    PasswordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not signed in: run `quizprep login <email>` first")]
    NotSignedIn,
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
