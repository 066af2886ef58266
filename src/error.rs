use std::io;
use thiserror::Error;

/// the cart container could not be decoded
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed cart: {0}")]
    Malformed(String),
}

/// loading a cart failed; nothing can run, so the caller should give up
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{path}: invalid cart")]
    InvalidCart { path: String },
    #[error("{path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
}

/// persistent save data could not be opened or written
#[derive(Debug, Error)]
pub enum CartdataError {
    #[error("cartdata already open as {active:?}")]
    AlreadyOpen { active: String },
    #[error("invalid cartdata id {0:?}")]
    InvalidId(String),
    #[error("cartdata io error: {0}")]
    Io(#[from] io::Error),
}
