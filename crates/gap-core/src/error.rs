use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Load error: {0}")]
    Load(String),

    #[error("News lookup failed for {ticker}: {message}")]
    Lookup { ticker: String, message: String },

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ScanError {
    pub fn lookup(ticker: &str, message: impl Into<String>) -> Self {
        ScanError::Lookup {
            ticker: ticker.to_string(),
            message: message.into(),
        }
    }
}
