use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::DnsSecAlgorithm;

/// Errors raised while loading a key pair from its key files
#[derive(Debug, Error)]
pub enum KeyError {
    /// A key source could not be opened or read
    #[error("Key source {} unavailable: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The public key source does not describe a single DNSKEY record
    #[error("Malformed public key: {0}")]
    MalformedPublicKey(String),
    /// The private key does not match the declared algorithm's field set
    #[error("Malformed private key: {0}")]
    MalformedPrivateKey(String),
    /// The key format was understood but no signer exists for the algorithm
    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),
}

/// Errors raised while producing signatures for a response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignError {
    /// The cryptographic primitive rejected its input
    #[error("Signing with key {key_tag} failed: {reason}")]
    SigningFailure { key_tag: u16, reason: String },
    /// The records handed to the engine do not form one RRset
    #[error("Invalid RRset: {0}")]
    InvalidRecordSet(String),
    /// The reference time cannot be expressed as an RRSIG timestamp
    #[error("Reference time out of range: {0}")]
    ClockOutOfRange(i64),
    /// Signatures were requested but none could be produced and the
    /// fallback policy forbids an unsigned reply
    #[error("No signatures available for {0}")]
    SigningUnavailable(String),
}

/// Why a signer refused to produce a signature
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerFault {
    #[error("key/algorithm mismatch: key is {key}, signature requested for {requested}")]
    AlgorithmMismatch {
        key: DnsSecAlgorithm,
        requested: DnsSecAlgorithm,
    },
    #[error("{0} signing primitive rejected the input")]
    Rejected(DnsSecAlgorithm),
}

/// One key that failed to load, with the files it was loaded from
#[derive(Debug)]
pub struct KeyLoadFailure {
    pub key: String,
    pub error: KeyError,
}

/// Every key that failed while building a key set
#[derive(Debug, Error)]
pub struct KeySetError {
    pub failures: Vec<KeyLoadFailure>,
}

impl fmt::Display for KeySetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} key(s) failed to load", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.key, failure.error)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, KeyError>;
