use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheafError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file name does not match the page pattern: {0}")]
    InvalidName(String),

    #[error("watcher error: {0}")]
    Watch(String),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SheafError>;
