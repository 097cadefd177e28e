//! Error types for workherd.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("input queue is closed, no more work can be submitted")]
    InputClosed,

    #[error("{0} queue is closed")]
    QueueClosed(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
