use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::Config("bad filter".to_string()).to_string(),
            "Configuration error: bad filter"
        );
        assert_eq!(
            Error::Internal("boom".to_string()).to_string(),
            "Internal error: boom"
        );
    }
}
