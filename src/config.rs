use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dnssec::{
    KeyFiles, KeySet, KeySetError, ResponsePolicy, UnsignedFallback, ValidityPolicy,
};
use crate::error::ConfigError;

/// Largest TTL a resolver is required to honour (RFC 2181 section 8)
const MAX_TTL: u32 = 0x7FFF_FFFF;

/// Longest signing timeout accepted
const MAX_SIGNING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// Key files to load, in signing order
    pub keys: Vec<KeyFiles>,

    /// Lifetime of each signature
    pub signature_validity: Duration,

    /// Signature inception is rounded down to a multiple of this
    pub inception_granularity: Duration,

    /// TTL of DNSKEY records and original TTL of their signatures
    pub dnskey_ttl: u32,

    /// Upper bound for signing on the blocking pool
    pub signing_timeout: Duration,

    /// Reply policy when no key could sign
    pub unsigned_fallback: UnsignedFallback,

    /// Keep serving with the keys that loaded when others fail
    pub allow_partial_load: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            signature_validity: ValidityPolicy::DEFAULT_VALIDITY,
            inception_granularity: ValidityPolicy::DEFAULT_GRANULARITY,
            dnskey_ttl: ResponsePolicy::DEFAULT_DNSKEY_TTL,
            signing_timeout: ResponsePolicy::DEFAULT_SIGNING_TIMEOUT,
            unsigned_fallback: UnsignedFallback::Allow,
            allow_partial_load: false,
        }
    }
}

/// A key entry in the config file: either a base name or explicit paths
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeySpec {
    Base(PathBuf),
    Files(KeyFiles),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    keys: Vec<KeySpec>,
    signature_validity: Option<u64>,
    inception_granularity: Option<u64>,
    dnskey_ttl: Option<u32>,
    signing_timeout_ms: Option<u64>,
    unsigned_fallback: Option<UnsignedFallback>,
    allow_partial_load: Option<bool>,
}

impl SignerConfig {
    /// Defaults, then the config file if given, then environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Create a SignerConfig from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Create a SignerConfig from a TOML file. Relative key paths are
    /// resolved against the directory holding the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml(&text, base)
    }

    /// Parse TOML config text, resolving relative key paths against `base`
    pub fn from_toml(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        let mut config = Self::default();

        config.keys = file
            .keys
            .into_iter()
            .map(|entry| match entry {
                KeySpec::Base(base_name) => KeyFiles::from_base(base.join(base_name)),
                KeySpec::Files(files) => {
                    KeyFiles::new(base.join(files.public), base.join(files.private))
                }
            })
            .collect();

        if let Some(secs) = file.signature_validity {
            config.signature_validity = Duration::from_secs(secs);
        }
        if let Some(secs) = file.inception_granularity {
            config.inception_granularity = Duration::from_secs(secs);
        }
        if let Some(ttl) = file.dnskey_ttl {
            config.dnskey_ttl = ttl;
        }
        if let Some(ms) = file.signing_timeout_ms {
            config.signing_timeout = Duration::from_millis(ms);
        }
        if let Some(fallback) = file.unsigned_fallback {
            config.unsigned_fallback = fallback;
        }
        if let Some(partial) = file.allow_partial_load {
            config.allow_partial_load = partial;
        }

        Ok(config)
    }

    /// Override fields with the `DNSSEC_*` variables found by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(keys) = lookup("DNSSEC_KEYS") {
            let keys: Vec<KeyFiles> = keys
                .split(',')
                .map(str::trim)
                .filter(|base| !base.is_empty())
                .map(KeyFiles::from_base)
                .collect();
            if keys.is_empty() {
                return Err(ConfigError::InvalidKeySpec(
                    "DNSSEC_KEYS names no key files".to_string(),
                ));
            }
            self.keys = keys;
        }

        if let Some(validity) = lookup("DNSSEC_SIGNATURE_VALIDITY") {
            let secs = validity
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValidity(validity.clone()))?;
            self.signature_validity = Duration::from_secs(secs);
        }

        if let Some(granularity) = lookup("DNSSEC_INCEPTION_GRANULARITY") {
            let secs = granularity
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidGranularity(granularity.clone()))?;
            self.inception_granularity = Duration::from_secs(secs);
        }

        if let Some(ttl) = lookup("DNSSEC_DNSKEY_TTL") {
            self.dnskey_ttl = ttl
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidTtl(ttl.clone()))?;
        }

        if let Some(timeout) = lookup("DNSSEC_SIGNING_TIMEOUT_MS") {
            let ms = timeout
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout.clone()))?;
            self.signing_timeout = Duration::from_millis(ms);
        }

        if let Some(fallback) = lookup("DNSSEC_UNSIGNED_FALLBACK") {
            self.unsigned_fallback = fallback.parse()?;
        }

        if let Some(partial) = lookup("DNSSEC_ALLOW_PARTIAL_LOAD") {
            self.allow_partial_load =
                parse_bool(&partial).ok_or_else(|| ConfigError::InvalidBool {
                    name: "DNSSEC_ALLOW_PARTIAL_LOAD".to_string(),
                    value: partial.clone(),
                })?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validity_policy()?;

        if self.dnskey_ttl > MAX_TTL {
            return Err(ConfigError::InvalidTtl(format!(
                "{} exceeds the maximum TTL of {}",
                self.dnskey_ttl, MAX_TTL
            )));
        }

        if self.signing_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.signing_timeout > MAX_SIGNING_TIMEOUT {
            return Err(ConfigError::InvalidTimeout(format!(
                "Timeout too large (max {} seconds)",
                MAX_SIGNING_TIMEOUT.as_secs()
            )));
        }

        for files in &self.keys {
            if files.public.as_os_str().is_empty() || files.private.as_os_str().is_empty() {
                return Err(ConfigError::InvalidKeySpec(format!(
                    "empty path in key entry {:?}",
                    files
                )));
            }
        }

        Ok(())
    }

    pub fn validity_policy(&self) -> Result<ValidityPolicy, ConfigError> {
        ValidityPolicy::new(self.signature_validity, self.inception_granularity)
    }

    pub fn response_policy(&self) -> Result<ResponsePolicy, ConfigError> {
        Ok(ResponsePolicy {
            validity: self.validity_policy()?,
            dnskey_ttl: self.dnskey_ttl,
            fallback: self.unsigned_fallback,
            signing_timeout: self.signing_timeout,
        })
    }

    /// Load the configured keys, strictly unless partial loading is allowed
    pub fn load_keys(&self) -> Result<KeySet, KeySetError> {
        if self.allow_partial_load {
            let (keys, _failures) = KeySet::load_partial(&self.keys);
            Ok(keys)
        } else {
            KeySet::load(&self.keys)
        }
    }
}

/// Parse a boolean from a string, `None` for anything unrecognized
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
