//! Structured response parsing

use serde::de::DeserializeOwned;
use std::io::{self, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    #[error("Invalid JSON content: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read content: {0}")]
    Io(#[from] io::Error),
}

/// Turns a decoded response body into a value.
///
/// Implementations take ownership of the content, so it is closed when
/// parsing returns, whatever the result.
pub trait ObjectParser<T>: Send + Sync {
    fn parse_and_close(
        &self,
        content: Box<dyn Read + Send>,
        charset: Option<&str>,
    ) -> Result<T, ParseError>;
}

/// JSON parser backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectParser;

impl JsonObjectParser {
    pub fn new() -> Self {
        Self
    }
}

impl<T: DeserializeOwned> ObjectParser<T> for JsonObjectParser {
    fn parse_and_close(
        &self,
        content: Box<dyn Read + Send>,
        charset: Option<&str>,
    ) -> Result<T, ParseError> {
        ensure_utf8_compatible(charset)?;
        Ok(serde_json::from_reader(content)?)
    }
}

/// JSON is read as UTF-8; ASCII is a subset of it.
fn ensure_utf8_compatible(charset: Option<&str>) -> Result<(), ParseError> {
    match charset {
        None => Ok(()),
        Some(name) => {
            let name = name.trim();
            if ["utf-8", "utf8", "us-ascii"]
                .iter()
                .any(|accepted| name.eq_ignore_ascii_case(accepted))
            {
                Ok(())
            } else {
                Err(ParseError::UnsupportedCharset(name.to_string()))
            }
        }
    }
}
