pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod metrics;

pub use config::SignerConfig;
pub use dnssec::{DnskeyResponder, KeyPair, KeySet};
pub use metrics::SigningMetrics;
