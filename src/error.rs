use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Couldn't find a product id in the URL: {0}")]
    InvalidProductUrl(String),

    #[error("Server answered with a non-success status: {0}")]
    TransportStatus(u16),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseInvalidSelector(String),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Column '{0}' not found in the input file")]
    MissingColumn(String),

    #[error("Config Error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database Error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),
    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
}

impl Error {
    /// Failures of the network layer that are worth retrying the same page for.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::TransportStatus(_) | Error::Reqwest(_))
    }
}
