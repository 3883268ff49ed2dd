use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("Invalid label length: {0}")]
    InvalidLabelLength(usize),

    #[error("DNS name too long")]
    NameTooLong,

    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("Unknown record class: {0}")]
    UnknownClass(String),
}

pub type Result<T> = std::result::Result<T, DnsError>;

/// Configuration errors for the signer
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid signature validity: {0}")]
    InvalidValidity(String),

    #[error("Invalid inception granularity: {0}")]
    InvalidGranularity(String),

    #[error("Invalid DNSKEY TTL: {0}")]
    InvalidTtl(String),

    #[error("Invalid signing timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid unsigned fallback policy: {0}")]
    InvalidFallback(String),

    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: String, value: String },

    #[error("Invalid key entry: {0}")]
    InvalidKeySpec(String),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
