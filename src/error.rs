//! Error types for xml-compare

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    ParseError(String),

    #[error("XPath evaluation error: {0}")]
    XPathError(String),

    #[error("XSLT transformation error: {0}")]
    XsltError(String),

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
