use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration, detected before any page is laid out.
    #[error("configuration error: {0}")]
    Config(String),

    /// A block could not be laid out; aborts the whole build.
    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
