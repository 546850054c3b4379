use thiserror::Error;

/// Errors raised while building or materializing a job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The job content was empty after decoding or upload
    #[error("Document content cannot be empty")]
    EmptyContent,

    /// The operation requires a password and none was supplied
    #[error("Password is required")]
    PasswordRequired,

    /// An option value could not be understood
    #[error("Invalid option {name}: {value}")]
    InvalidOption { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, JobError>;
